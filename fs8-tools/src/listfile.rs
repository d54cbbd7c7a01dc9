//! List-file parsing
//!
//! A build list has one entry per line, either `SOURCE` or
//! `SOURCE ARCHIVE_NAME`; an extraction list is just one archive name per
//! line. Blank lines are skipped, Windows line endings tolerated.

use std::io;
use std::path::Path;

/// Parse a build list into `(source, archive_name)` pairs. A missing
/// archive name comes back as an empty string, meaning "use the source
/// path".
pub fn read_build_list(path: &Path) -> io::Result<Vec<(String, String)>> {
    let text = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let source = match fields.next() {
            Some(source) => source.to_string(),
            None => continue,
        };
        let archive_name = fields.next().unwrap_or("").to_string();
        entries.push((source, archive_name));
    }

    Ok(entries)
}

/// Parse an extraction list into archive names, one per line.
pub fn read_name_list(path: &Path) -> io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter_map(|line| {
            let name = line.split_whitespace().next()?;
            Some(name.to_string())
        })
        .collect())
}
