//! Structured error types for every subsystem, plus the exact client-facing
//! error strings the protocol requires.

use thiserror::Error;

/// Message sent back to a client when the catalogue could not be searched
/// due to an internal failure.
pub const STR_ERR_SYSCALL: &str =
    "C'è stato un fallimento di sistema durante la ricerca dei libri richiesti.\n";

/// Message sent back to a client whose request string was malformed.
pub const STR_ERR_FRMT_RIC: &str = "La richiesta inviata non è del formato corretto.\n";

/// Errors raised while parsing, formatting or matching a single book record.
#[derive(Error, Debug)]
pub enum BookError {
    #[error("record is not in the expected field:value; format")]
    BadFormatRecord,
    #[error("loan date field is not a valid date")]
    BadDate,
    #[error("system call failed: {0}")]
    System(#[from] std::io::Error),
}

/// Errors raised while loading or persisting a catalogue.
#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("record file is not in the expected format")]
    BadFormatRecord,
    #[error("record contains an invalid loan date")]
    BadDate,
    #[error("request string is not in the expected field:value; format")]
    BadFormatRequest,
    #[error("temporary record path exceeds the maximum path length")]
    PathOverflow,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the framed wire protocol codec.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("peer closed the connection before the frame was complete")]
    ClosedEarly,
    #[error("peer reported a communication failure")]
    Communication,
    #[error("short write: wrote {wrote} of {expected} bytes")]
    WriteShort { wrote: usize, expected: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the dispatch queue.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue mutex was poisoned by a panicking thread")]
    Poisoned,
    #[error("system call failed: {0}")]
    System(#[from] std::io::Error),
}

/// Errors raised by the registry (`bib.conf`) and its cross-process lock.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("temporary path exceeds the maximum path length")]
    PathOverflow,
    #[error("short write while updating the registry file")]
    WriteShort,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while broadcasting a request to one registered server that
/// are *not* a refused connection — per the client's abort contract, any of
/// these stops the broadcast loop outright.
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("could not connect to the server: {0}")]
    Connection(std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
