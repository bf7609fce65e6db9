//! The single-threaded acceptor loop: a `poll()` over one listening socket
//! plus up to [`crate::paths::MAX_CLIENTS`] client slots, handing each
//! completed request off to the dispatch queue for a worker to process.

use crate::paths::MAX_CLIENTS;
use crate::protocol;
use crate::queue::{DispatchItem, DispatchQueue};
use nix::poll::{poll, PollFd, PollFlags};
use std::mem::ManuallyDrop;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const POLL_TIMEOUT_MS: i32 = 200;

pub fn run(listener: UnixListener, queue: Arc<DispatchQueue>, running: &AtomicBool) -> std::io::Result<()> {
    let listener_fd = listener.as_raw_fd();
    let mut client_fds: [RawFd; MAX_CLIENTS] = [-1; MAX_CLIENTS];

    while running.load(Ordering::Relaxed) {
        let mut poll_fds = Vec::with_capacity(MAX_CLIENTS + 1);
        poll_fds.push(PollFd::new(listener_fd, PollFlags::POLLIN));
        for &fd in client_fds.iter() {
            if fd == -1 {
                poll_fds.push(PollFd::new(-1, PollFlags::empty()));
            } else {
                poll_fds.push(PollFd::new(fd, PollFlags::POLLIN));
            }
        }

        let num_events = match poll(&mut poll_fds, POLL_TIMEOUT_MS) {
            Ok(n) => n,
            Err(nix::Error::Sys(nix::errno::Errno::EINTR)) => continue,
            Err(err) => {
                log::error!("poll failed: {}", err);
                return Err(std::io::Error::new(std::io::ErrorKind::Other, err));
            }
        };
        if num_events == 0 {
            continue;
        }

        if let Some(revents) = poll_fds[0].revents() {
            if revents.contains(PollFlags::POLLIN) {
                accept_if_room(&listener, &mut client_fds);
            }
        }

        for (slot, &fd) in client_fds.clone().iter().enumerate() {
            if fd == -1 {
                continue;
            }
            let revents = match poll_fds[slot + 1].revents() {
                Some(r) => r,
                None => continue,
            };

            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
                let _ = nix::unistd::close(fd);
                client_fds[slot] = -1;
                continue;
            }

            if revents.contains(PollFlags::POLLIN) {
                let result = handle_readable_client(fd, &queue);
                client_fds[slot] = -1;
                if let Err(err) = result {
                    log::error!("failed to enqueue request, unwinding acceptor: {}", err);
                    close_all(&client_fds);
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, err));
                }
            }
        }
    }

    close_all(&client_fds);
    Ok(())
}

fn close_all(client_fds: &[RawFd; MAX_CLIENTS]) {
    for &fd in client_fds.iter() {
        if fd != -1 {
            let _ = nix::sys::socket::shutdown(fd, nix::sys::socket::Shutdown::Both);
            let _ = nix::unistd::close(fd);
        }
    }
}

fn accept_if_room(listener: &UnixListener, client_fds: &mut [RawFd; MAX_CLIENTS]) {
    let free_slot = client_fds.iter().position(|&fd| fd == -1);
    let slot = match free_slot {
        Some(slot) => slot,
        None => return,
    };

    match listener.accept() {
        Ok((stream, _addr)) => {
            client_fds[slot] = stream.as_raw_fd();
            std::mem::forget(stream);
        }
        Err(err) => {
            log::warn!("accept failed: {}", err);
        }
    }
}

/// Reads one request off `fd` and hands it to the dispatch queue. A read
/// failure or early close is not fatal here: the fd is closed and the
/// acceptor keeps running. A queue failure *is* fatal and is propagated to
/// the caller, which unwinds every other open slot.
fn handle_readable_client(fd: RawFd, queue: &Arc<DispatchQueue>) -> Result<(), crate::error::QueueError> {
    let mut stream = ManuallyDrop::new(unsafe { UnixStream::from_raw_fd(fd) });

    let frame = match protocol::read_frame(&mut *stream) {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            let _ = nix::unistd::close(fd);
            return Ok(());
        }
        Err(err) => {
            log::warn!("failed to read request from client: {}", err);
            let _ = nix::sys::socket::shutdown(fd, nix::sys::socket::Shutdown::Both);
            let _ = nix::unistd::close(fd);
            return Ok(());
        }
    };

    let item = DispatchItem {
        client_fd: fd,
        request_type: frame.message_type,
        request_data: Some(frame.data),
    };

    queue.put(item).map_err(|err| {
        let _ = nix::unistd::close(fd);
        err
    })
}
