//! The `bib.conf` registry: the flat `name:socket_path` file every server
//! appends itself to on startup and removes itself from on shutdown, and
//! every client reads to discover who to query. Access is coordinated by
//! [`crate::rwlock::RwLock2`].

use crate::error::RegistryError;
use crate::fsutil;
use crate::rwlock::RwLock2;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

fn is_line_empty(line: &str) -> bool {
    line.chars().all(|c| c == ' ' || c == '\n' || c == '\r')
}

/// Appends a `name:socket_path` line to the registry. Unlinks any stale
/// semaphore names first, matching the original program's assumption that a
/// server starting up is the first user of the lock since the last clean
/// shutdown.
pub fn add(bib_path: &Path, socket_path: &str, library_name: &str) -> Result<(), RegistryError> {
    RwLock2::unlink_all().ok();
    let lock = RwLock2::open()?;

    lock.writer_access()?;

    let result = (|| -> Result<(), RegistryError> {
        let mut file = OpenOptions::new().create(true).append(true).open(bib_path)?;
        let line = format!("{}:{}\n", library_name, socket_path);
        let written = file.write(line.as_bytes())?;
        if written != line.len() {
            return Err(RegistryError::WriteShort);
        }
        Ok(())
    })();

    lock.writer_exit()?;
    result
}

/// Removes every line mentioning `socket_path` from the registry, via a
/// temp-file-plus-rename rewrite with a backup copy restored on failure.
/// Unlinks every lock semaphore afterward if the registry ended up empty.
pub fn remove(bib_path: &Path, socket_path: &str, build_dir: &Path) -> Result<(), RegistryError> {
    let lock = RwLock2::open()?;
    lock.writer_access()?;

    let result = remove_locked(bib_path, socket_path, build_dir);

    lock.writer_exit()?;

    match result {
        Ok(became_empty) => {
            if became_empty {
                RwLock2::unlink_all().ok();
            }
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn remove_locked(bib_path: &Path, socket_path: &str, build_dir: &Path) -> Result<bool, RegistryError> {
    let pid = std::process::id();
    let temp_path = build_dir.join(format!("bib_{}.conf", pid));
    let backup_path = build_dir.join("bib.bak");

    {
        let input = std::fs::File::open(bib_path)?;
        let reader = BufReader::new(input);
        let mut output = std::fs::File::create(&temp_path)?;

        for line in reader.lines() {
            let line = line?;
            if !line.contains(socket_path) && !is_line_empty(&line) {
                writeln!(output, "{}", line)?;
            }
        }
    }

    let became_empty = std::fs::metadata(&temp_path)?.len() == 0;

    fsutil::copy_file(bib_path, &backup_path)?;

    if let Err(err) = std::fs::rename(&temp_path, bib_path) {
        let _ = std::fs::copy(&backup_path, bib_path);
        return Err(err.into());
    }

    let _ = std::fs::remove_file(&backup_path);
    Ok(became_empty)
}

/// Reads the entire registry file under a shared read lock. Unlike the
/// original program, does not unlink the lock semaphores afterward — every
/// reader unlinking on every read was a quirk of the original, not a
/// requirement, and would race a concurrent writer's own unlink.
pub fn read(bib_path: &Path) -> Result<String, RegistryError> {
    let lock = RwLock2::open()?;
    lock.reader_access()?;

    let result = std::fs::read_to_string(bib_path);

    lock.reader_exit()?;
    Ok(result?)
}

/// Parses the registry's text into `(name, socket_path)` pairs, skipping
/// blank lines.
pub fn parse_entries(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter(|line| !is_line_empty(line))
        .filter_map(|line| {
            let colon = line.find(':')?;
            let (name, rest) = line.split_at(colon);
            Some((name.to_string(), rest[1..].to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_socket_pairs() {
        let entries = parse_entries("central:sockets/socketServer_100\nbranch:sockets/socketServer_200\n");
        assert_eq!(
            entries,
            vec![
                ("central".to_string(), "sockets/socketServer_100".to_string()),
                ("branch".to_string(), "sockets/socketServer_200".to_string()),
            ]
        );
    }

    #[test]
    fn skips_blank_lines() {
        let entries = parse_entries("central:sockets/socketServer_100\n\n   \n");
        assert_eq!(entries.len(), 1);
    }
}
