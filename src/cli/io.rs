//! File and stdout handling for the CLI
//!
//! - Command results go to stdout as one JSON document or plain text
//! - Log lines go to stderr, never stdout
//! - Snapshot writes replace the target file atomically

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Write a JSON document to stdout
pub fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write plain text to stdout
pub fn write_text(text: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", text)?;
    stdout.flush()?;

    Ok(())
}

/// Read a whole file
pub fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|e| CliError::io_error(format!("Failed to read {:?}: {}", path, e)))
}

/// Write a file through a temporary sibling and rename
///
/// The sibling is removed if any step fails.
pub fn write_file(path: &Path, bytes: &[u8]) -> CliResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let result = write_synced(tmp, bytes)
        .map_err(|e| CliError::io_error(format!("Failed to write {:?}: {}", tmp, e)))
        .and_then(|()| {
            fs::rename(tmp, path)
                .map_err(|e| CliError::io_error(format!("Failed to replace {:?}: {}", path, e)))
        });
    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
