//! Thin safe wrapper over named POSIX semaphores, reached through `libc`
//! directly since named semaphores (`sem_open` and friends) aren't covered
//! by the pinned `nix` version.

use std::ffi::CString;
use std::io;
use std::ptr;

/// An open handle to a named semaphore. Closed (not unlinked) on drop —
/// unlinking is a separate, explicit operation since named semaphores
/// outlive any single process's handle to them.
pub struct NamedSemaphore {
    handle: *mut libc::sem_t,
    name: String,
}

unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Opens (creating if necessary) a named semaphore with the given
    /// initial value. The name must start with `/` per POSIX convention.
    pub fn open(name: &str, initial_value: u32) -> io::Result<Self> {
        let c_name = CString::new(name).expect("semaphore name has no interior NUL");
        let handle = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                0o700 as libc::mode_t,
                initial_value,
            )
        };
        if handle == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(NamedSemaphore {
            handle,
            name: name.to_string(),
        })
    }

    /// Decrements the semaphore, blocking while it is zero.
    pub fn wait(&self) -> io::Result<()> {
        if unsafe { libc::sem_wait(self.handle) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Increments the semaphore, waking a waiter if any.
    pub fn post(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.handle) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Reads the semaphore's current value without blocking.
    pub fn value(&self) -> io::Result<i32> {
        let mut val: i32 = 0;
        if unsafe { libc::sem_getvalue(self.handle, &mut val) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(val)
    }

    /// Removes the semaphore's name from the system, so no further process
    /// can `open` it; existing handles (including this one) stay valid
    /// until closed. Treats "already gone" (`ENOENT`) as success.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c_name = CString::new(name).expect("semaphore name has no interior NUL");
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        if !self.handle.is_null() && self.handle != libc::SEM_FAILED {
            unsafe {
                libc::sem_close(self.handle);
            }
        }
        self.handle = ptr::null_mut();
    }
}
