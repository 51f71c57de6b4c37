//! aeroconf - replication topology configuration for a distributed database
//!
//! Decodes the raw `\xff/conf/` table into typed fields, classifies changes
//! by whether they need a recovery, and derives fault-tolerance numbers.

pub mod cli;
pub mod configuration;
pub mod observability;
