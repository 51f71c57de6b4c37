//! Snapshot codec
//!
//! Binary persisted form of a canonical configuration table:
//!
//! ```text
//! +------------------+
//! | Magic "AERC"     | (4 bytes)
//! +------------------+
//! | Version          | (u8)
//! +------------------+
//! | Entry Count      | (u32 LE)
//! +------------------+
//! | Key              | (u32 LE length + UTF-8 bytes)   } repeated
//! | Value            | (u32 LE length + bytes)         } per entry
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself. Entries are written
//! in key order, so equal tables always encode to identical bytes.

use crc32fast::Hasher;

use crate::observability::{log_event_with_fields, Event};

use super::database::DatabaseConfiguration;
use super::errors::{ConfigurationError, ConfigurationResult};
use super::raw::{ConfigurationEntry, RawConfiguration};

pub const SNAPSHOT_MAGIC: &[u8; 4] = b"AERC";
pub const SNAPSHOT_VERSION: u8 = 1;

const HEADER_SIZE: usize = 4 + 1 + 4;
const CHECKSUM_SIZE: usize = 4;

fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn encode_body<'a>(count: usize, entries: impl Iterator<Item = (&'a str, &'a [u8])>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + CHECKSUM_SIZE);
    buf.extend_from_slice(SNAPSHOT_MAGIC);
    buf.push(SNAPSHOT_VERSION);
    buf.extend_from_slice(&(count as u32).to_le_bytes());

    for (key, value) in entries {
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(value);
    }
    buf
}

fn encode_entries<'a>(count: usize, entries: impl Iterator<Item = (&'a str, &'a [u8])>) -> Vec<u8> {
    let mut buf = encode_body(count, entries);
    let checksum = compute_checksum(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

/// Encode a canonical table.
pub fn encode_snapshot(raw: &RawConfiguration) -> Vec<u8> {
    let bytes = encode_entries(
        raw.len(),
        raw.iter().map(|entry| (entry.key.as_str(), entry.value.as_slice())),
    );
    let entries = raw.len().to_string();
    let size = bytes.len().to_string();
    log_event_with_fields(
        Event::SnapshotEncoded,
        &[("bytes", size.as_str()), ("entries", entries.as_str())],
    );
    bytes
}

/// CRC32 of the canonical encoding, equal to its checksum trailer.
pub fn fingerprint(raw: &RawConfiguration) -> u32 {
    compute_checksum(&encode_body(
        raw.len(),
        raw.iter().map(|entry| (entry.key.as_str(), entry.value.as_slice())),
    ))
}

/// Decode and verify a snapshot.
pub fn decode_snapshot(data: &[u8]) -> ConfigurationResult<RawConfiguration> {
    let result = decode_verified(data);
    match &result {
        Ok(raw) => {
            let entries = raw.len().to_string();
            log_event_with_fields(Event::SnapshotDecoded, &[("entries", entries.as_str())]);
        }
        Err(err) => {
            let reason = err.to_string();
            log_event_with_fields(
                Event::SnapshotRejected,
                &[("code", err.code()), ("reason", reason.as_str())],
            );
        }
    }
    result
}

fn decode_verified(data: &[u8]) -> ConfigurationResult<RawConfiguration> {
    if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(ConfigurationError::SnapshotCorrupted("snapshot too short".into()));
    }
    if &data[..4] != SNAPSHOT_MAGIC {
        return Err(ConfigurationError::SnapshotCorrupted("bad magic".into()));
    }
    if data[4] != SNAPSHOT_VERSION {
        return Err(ConfigurationError::UnsupportedVersion(data[4]));
    }

    let (body, trailer) = data.split_at(data.len() - CHECKSUM_SIZE);
    let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = compute_checksum(body);
    if expected != computed {
        return Err(ConfigurationError::ChecksumMismatch { expected, computed });
    }

    let mut reader = Reader {
        data: body,
        pos: HEADER_SIZE,
    };
    let count = u32::from_le_bytes([body[5], body[6], body[7], body[8]]) as usize;

    let mut entries: Vec<ConfigurationEntry> = Vec::new();
    for _ in 0..count {
        let key = String::from_utf8(reader.read_chunk()?.to_vec())
            .map_err(|_| ConfigurationError::SnapshotCorrupted("key is not UTF-8".into()))?;
        let value = reader.read_chunk()?.to_vec();
        if let Some(last) = entries.last() {
            if last.key >= key {
                return Err(ConfigurationError::SnapshotCorrupted(format!(
                    "keys out of order at '{}'",
                    key.escape_debug()
                )));
            }
        }
        entries.push(ConfigurationEntry { key, value });
    }

    if reader.pos != body.len() {
        return Err(ConfigurationError::SnapshotCorrupted(format!(
            "{} trailing bytes",
            body.len() - reader.pos
        )));
    }
    Ok(RawConfiguration::from(entries))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> ConfigurationResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ConfigurationError::SnapshotCorrupted("entry runs past end".into()))?;
        let chunk = &self.data[self.pos..end];
        self.pos = end;
        Ok(chunk)
    }

    fn read_chunk(&mut self) -> ConfigurationResult<&'a [u8]> {
        let len = self.take(4)?;
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
        self.take(len)
    }
}

impl DatabaseConfiguration {
    /// CRC32 of the canonical encoding. Works in either representation.
    pub fn fingerprint(&self) -> u32 {
        let raw = self.raw_store();
        compute_checksum(&encode_body(raw.len(), raw.iter()))
    }

    /// Binary snapshot of the table, canonicalizing first.
    pub fn encode_snapshot(&mut self) -> Vec<u8> {
        encode_snapshot(self.to_canonical())
    }

    /// Configuration decoded from a binary snapshot.
    pub fn from_snapshot(data: &[u8]) -> ConfigurationResult<Self> {
        decode_snapshot(data).map(Self::from_key_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::keys::config_key;

    fn sample() -> RawConfiguration {
        [
            (config_key("initialized"), ""),
            (config_key("log_replicas"), "3"),
            (config_key("future_knob"), "\u{1}\u{2}"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_layout() {
        let bytes = encode_snapshot(&RawConfiguration::new());
        assert_eq!(&bytes[..4], b"AERC");
        assert_eq!(bytes[4], SNAPSHOT_VERSION);
        assert_eq!(&bytes[5..9], &0u32.to_le_bytes());
        assert_eq!(bytes.len(), HEADER_SIZE + CHECKSUM_SIZE);
    }

    #[test]
    fn test_decode_restores_table() {
        let raw = sample();
        assert_eq!(decode_snapshot(&encode_snapshot(&raw)).unwrap(), raw);
    }

    #[test]
    fn test_detects_corruption() {
        let mut bytes = encode_snapshot(&sample());
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(ConfigurationError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_header() {
        let mut bytes = encode_snapshot(&sample());
        bytes[0] = b'X';
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(ConfigurationError::SnapshotCorrupted(_))
        ));

        let mut bytes = encode_snapshot(&sample());
        bytes[4] = 9;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(ConfigurationError::UnsupportedVersion(9))
        ));

        assert!(decode_snapshot(b"AER").is_err());
    }

    #[test]
    fn test_rejects_truncated_entry() {
        // Claims one entry but carries none; checksum is valid.
        let mut body = Vec::new();
        body.extend_from_slice(SNAPSHOT_MAGIC);
        body.push(SNAPSHOT_VERSION);
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&100u32.to_le_bytes());
        let checksum = compute_checksum(&body);
        body.extend_from_slice(&checksum.to_le_bytes());

        assert!(matches!(
            decode_snapshot(&body),
            Err(ConfigurationError::SnapshotCorrupted(_))
        ));
    }

    #[test]
    fn test_rejects_unsorted_keys() {
        let bytes = encode_entries(2, [("b", &b"1"[..]), ("a", &b"2"[..])].into_iter());
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(ConfigurationError::SnapshotCorrupted(_))
        ));

        let dup = encode_entries(2, [("a", &b"1"[..]), ("a", &b"2"[..])].into_iter());
        assert!(decode_snapshot(&dup).is_err());
    }

    #[test]
    fn test_fingerprint_matches_across_representations() {
        let raw = sample();
        let canonical = DatabaseConfiguration::from_key_values(raw.clone());

        let mut buffered = DatabaseConfiguration::new();
        for entry in raw.iter().rev() {
            buffered.set(entry.key.clone(), entry.value.clone());
        }
        assert!(buffered.is_buffered());
        assert_eq!(buffered.fingerprint(), canonical.fingerprint());
        assert_eq!(canonical.fingerprint(), fingerprint(&raw));

        buffered.set(config_key("proxies"), "2");
        assert_ne!(buffered.fingerprint(), canonical.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_tables() {
        let proxies: RawConfiguration = [(config_key("proxies"), "1")].into_iter().collect();
        let logs: RawConfiguration = [
            (config_key("log_replicas"), "3"),
            (config_key("regions"), "[]"),
        ]
        .into_iter()
        .collect();
        let empty = RawConfiguration::new();

        assert_ne!(fingerprint(&proxies), fingerprint(&logs));
        assert_ne!(fingerprint(&proxies), fingerprint(&empty));
        assert_ne!(fingerprint(&logs), fingerprint(&empty));
    }

    #[test]
    fn test_fingerprint_is_checksum_trailer() {
        let raw = sample();
        let bytes = encode_snapshot(&raw);
        let trailer = &bytes[bytes.len() - CHECKSUM_SIZE..];
        assert_eq!(
            fingerprint(&raw),
            u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]])
        );
    }

    #[test]
    fn test_configuration_snapshot() {
        let mut config = DatabaseConfiguration::from_key_values(sample());
        config.set(config_key("resolvers"), "2");
        let bytes = config.encode_snapshot();
        let restored = DatabaseConfiguration::from_snapshot(&bytes).unwrap();
        assert_eq!(restored, config);
        assert_eq!(restored.fields(), config.fields());
    }
}
