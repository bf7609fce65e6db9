//! Path and protocol constants shared by the server and client binaries.

/// Directory holding per-server Unix-domain socket files.
pub const SOCKET_DIR: &str = "sockets/";

/// Registry file listing every live server as `name:socket_path` lines.
pub const BIB_CONF_PATH: &str = "config/bib.conf";

/// Directory holding one append-only request log per server.
pub const LOGS_DIR: &str = "logs/";

/// Scratch directory for temporary files used during atomic rewrites
/// (catalogue persist, registry backup/remove).
pub const BUILD_DIR: &str = "build/";

/// Directory holding the flat catalogue record files.
pub const FILE_RECORDS_DIR: &str = "data/file_records/";

/// Upper bound on simultaneously open client connections a single server
/// acceptor will track (1 listener slot + this many client slots).
pub const MAX_CLIENTS: usize = 40;

/// Loans are considered expired after this many seconds, checked only when
/// a book is next accessed (no background sweep).
pub const LOAN_WINDOW_SECS: i64 = 30;

/// Historical maximum line length in registry/record files; kept as a sanity
/// bound when reading lines, not a hard protocol limit in this crate.
pub const MAX_LINE: usize = 1024;

/// Prepend the log directory to a server name, producing its log file path.
pub fn log_path(library_name: &str) -> String {
    format!("{}{}.log", LOGS_DIR, library_name)
}

/// Prepend the file-records directory to a record basename.
pub fn record_path(basename: &str) -> String {
    format!("{}{}.txt", FILE_RECORDS_DIR, basename)
}

/// Build this server's socket path from its pid, matching the convention
/// the registry and clients both expect (`sockets/socketServer_<pid>`).
pub fn socket_path(pid: u32) -> String {
    format!("{}socketServer_{}", SOCKET_DIR, pid)
}
