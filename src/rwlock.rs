//! A cross-process, writer-preferring (type 2) reader/writer lock built from
//! six named semaphores. Protects the registry file (`bib.conf`) against
//! concurrent writers, while letting readers run concurrently with each
//! other as long as no writer is waiting.
//!
//! The writer-preference protocol and its semaphore set are exactly the
//! classic "second readers-writers problem" solution: a `read_attempt_mutex`
//! that any waiting writer grabs first, so new readers queue up behind it.

use crate::semaphore::NamedSemaphore;
use std::io;

const READERS_VAR: &str = "/bibfed_readers_var";
const READERS_MUTEX: &str = "/bibfed_readers_mutex";
const WRITERS_VAR: &str = "/bibfed_writers_var";
const WRITERS_MUTEX: &str = "/bibfed_writers_mutex";
const READ_ATTEMPT_MUTEX: &str = "/bibfed_read_attempt_mutex";
const RESOURCE_MUTEX: &str = "/bibfed_resource_mutex";

const ALL_NAMES: [&str; 6] = [
    READERS_VAR,
    WRITERS_VAR,
    READERS_MUTEX,
    WRITERS_MUTEX,
    READ_ATTEMPT_MUTEX,
    RESOURCE_MUTEX,
];

pub struct RwLock2 {
    readers_var: NamedSemaphore,
    readers_mutex: NamedSemaphore,
    writers_var: NamedSemaphore,
    writers_mutex: NamedSemaphore,
    read_attempt_mutex: NamedSemaphore,
    resource_mutex: NamedSemaphore,
}

impl RwLock2 {
    pub fn open() -> io::Result<Self> {
        Ok(RwLock2 {
            readers_var: NamedSemaphore::open(READERS_VAR, 0)?,
            readers_mutex: NamedSemaphore::open(READERS_MUTEX, 1)?,
            writers_var: NamedSemaphore::open(WRITERS_VAR, 0)?,
            writers_mutex: NamedSemaphore::open(WRITERS_MUTEX, 1)?,
            read_attempt_mutex: NamedSemaphore::open(READ_ATTEMPT_MUTEX, 1)?,
            resource_mutex: NamedSemaphore::open(RESOURCE_MUTEX, 1)?,
        })
    }

    /// Removes every semaphore's name from the system. Existing handles
    /// (including this lock's own) stay usable until dropped; no further
    /// process can `open` these names afterward.
    pub fn unlink_all() -> io::Result<()> {
        let mut first_err = None;
        for name in ALL_NAMES {
            if let Err(err) = NamedSemaphore::unlink(name) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Blocks until this writer holds exclusive access to the resource.
    /// Registers ahead of new readers by taking `read_attempt_mutex` as
    /// soon as it becomes the first waiting writer.
    pub fn writer_access(&self) -> io::Result<()> {
        self.writers_mutex.wait()?;

        let post_writers_var = || -> io::Result<()> {
            self.writers_var.post()?;
            let count = self.writers_var.value()?;
            if count == 1 {
                self.read_attempt_mutex.wait()?;
            }
            Ok(())
        };

        if let Err(err) = post_writers_var() {
            let _ = self.writers_var.wait();
            let _ = self.writers_mutex.post();
            return Err(err);
        }

        if let Err(err) = self.writers_mutex.post() {
            let _ = self.read_attempt_mutex.post();
            let _ = self.writers_var.wait();
            return Err(err);
        }

        if let Err(err) = self.resource_mutex.wait() {
            let _ = self.read_attempt_mutex.post();
            let _ = self.writers_var.wait();
            return Err(err);
        }

        Ok(())
    }

    /// Releases exclusive access.
    pub fn writer_exit(&self) -> io::Result<()> {
        self.resource_mutex.post()?;
        self.writers_mutex.wait()?;

        let mut error_occurred = false;
        if let Err(_) = self.writers_var.wait() {
            let _ = self.writers_mutex.post();
            return Err(io::Error::new(io::ErrorKind::Other, "writers_var decrement failed"));
        }

        match self.writers_var.value() {
            Ok(0) => {
                if self.read_attempt_mutex.post().is_err() {
                    error_occurred = true;
                }
            }
            Ok(_) => {}
            Err(_) => error_occurred = true,
        }

        if self.writers_mutex.post().is_err() {
            error_occurred = true;
        }

        if error_occurred {
            Err(io::Error::new(io::ErrorKind::Other, "writer_exit encountered an error"))
        } else {
            Ok(())
        }
    }

    /// Blocks until this reader holds shared access to the resource.
    pub fn reader_access(&self) -> io::Result<()> {
        self.read_attempt_mutex.wait()?;

        if let Err(err) = self.readers_mutex.wait() {
            let _ = self.read_attempt_mutex.post();
            return Err(err);
        }

        let grab_resource = || -> io::Result<()> {
            self.readers_var.post()?;
            let count = self.readers_var.value()?;
            if count == 1 {
                self.resource_mutex.wait()?;
            }
            Ok(())
        };

        if let Err(err) = grab_resource() {
            let _ = self.readers_var.wait();
            let _ = self.readers_mutex.post();
            let _ = self.read_attempt_mutex.post();
            return Err(err);
        }

        if self.readers_mutex.post().is_err() || self.read_attempt_mutex.post().is_err() {
            let _ = self.readers_var.wait();
            return Err(io::Error::new(io::ErrorKind::Other, "reader_access could not release its mutexes"));
        }

        Ok(())
    }

    /// Releases shared access.
    pub fn reader_exit(&self) -> io::Result<()> {
        self.readers_mutex.wait()?;

        if self.readers_var.wait().is_err() {
            let _ = self.readers_mutex.post();
            return Err(io::Error::new(io::ErrorKind::Other, "readers_var decrement failed"));
        }

        let mut error_occurred = false;
        match self.readers_var.value() {
            Ok(0) => {
                if self.resource_mutex.post().is_err() {
                    error_occurred = true;
                }
            }
            Ok(_) => {}
            Err(_) => error_occurred = true,
        }

        let _ = self.readers_mutex.post();

        if error_occurred {
            Err(io::Error::new(io::ErrorKind::Other, "reader_exit encountered an error"))
        } else {
            Ok(())
        }
    }
}
