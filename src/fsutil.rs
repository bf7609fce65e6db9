//! Small filesystem helpers shared by the catalogue and registry: atomic
//! whole-file rewrite via a sibling temp file plus `rename`.

use nix::sys::stat;
use nix::unistd;
use std::fs::File;
use std::io::Write;
use std::os::unix::io::FromRawFd;
use std::path::Path;

fn nix_to_io(err: nix::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err)
}

/// Writes `data` to `path` atomically: create a sibling temp file, write,
/// then `rename` over the target. Mirrors the mkstemp+fchmod+write+rename
/// sequence used throughout this codebase for any file multiple processes
/// might be reading concurrently.
pub fn atomic_write<P: AsRef<Path>>(path: P, data: &[u8]) -> std::io::Result<()> {
    let path = path.as_ref();

    let mut template = path.to_owned();
    let mut file_name = template
        .file_name()
        .map(|n| n.to_owned())
        .unwrap_or_default();
    file_name.push(".tmp_XXXXXX");
    template.set_file_name(file_name);

    let (fd, tmp_path) = unistd::mkstemp(&template).map_err(nix_to_io)?;

    let mode = stat::Mode::S_IRUSR | stat::Mode::S_IWUSR | stat::Mode::S_IRGRP | stat::Mode::S_IROTH;
    if let Err(err) = stat::fchmod(fd, mode) {
        let _ = unistd::unlink(&tmp_path);
        return Err(nix_to_io(err));
    }

    let mut file = unsafe { File::from_raw_fd(fd) };
    if let Err(err) = file.write_all(data) {
        let _ = unistd::unlink(&tmp_path);
        return Err(err);
    }

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = unistd::unlink(&tmp_path);
        return Err(err);
    }

    Ok(())
}

/// Copies `src` to `dest` byte-for-byte, used to snapshot the registry file
/// before a destructive rewrite.
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dest: Q) -> std::io::Result<()> {
    std::fs::copy(src, dest)?;
    Ok(())
}
