//! Worker threads: each pulls one dispatched request off the queue, runs it
//! against the catalogue, writes the framed response, and logs the
//! operation.

use crate::catalogue::Catalogue;
use crate::error::{CatalogueError, STR_ERR_FRMT_RIC, STR_ERR_SYSCALL};
use crate::protocol::{self, Frame, MSG_ERROR, MSG_LOAN, MSG_NO, MSG_RECORD};
use crate::queue::DispatchQueue;
use crate::server::log::OperationLog;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

pub fn run(queue: Arc<DispatchQueue>, catalogue: Arc<Catalogue>, log: Arc<OperationLog>) {
    loop {
        let item = match queue.get() {
            Ok(item) => item,
            Err(err) => {
                log::error!("dispatch queue get failed: {}", err);
                break;
            }
        };

        if item.is_stop() {
            break;
        }

        let client_fd = item.client_fd;
        let grant_loan = item.request_type == MSG_LOAN;
        let kind = if grant_loan { "LOAN" } else { "QUERY" };

        let request = match &item.request_data {
            Some(bytes) => String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .to_string(),
            None => String::new(),
        };

        let (frame, matched, log_count, response_text) = match catalogue.query(&request, grant_loan) {
            Ok((0, _, _)) => (Frame::empty(MSG_NO), 0, 0, None),
            Ok((matched, granted, text)) => {
                let log_count = if grant_loan { granted } else { matched };
                (Frame::new(MSG_RECORD, &text), matched, log_count, Some(text))
            }
            Err(CatalogueError::BadFormatRequest) => (Frame::new(MSG_ERROR, STR_ERR_FRMT_RIC), 0, 0, None),
            Err(err) => {
                log::error!("catalogue query failed: {}", err);
                (Frame::new(MSG_ERROR, STR_ERR_SYSCALL), 0, 0, None)
            }
        };

        if matched != 0 {
            if let Err(err) = log.record(kind, log_count, response_text.as_deref()) {
                log::error!("failed to write operation log: {}", err);
            }
        } else if frame.message_type != MSG_ERROR {
            if let Err(err) = log.record(kind, 0, None) {
                log::error!("failed to write operation log: {}", err);
            }
        }

        send_and_close(client_fd, &frame);
    }
}

fn send_and_close(client_fd: RawFd, frame: &Frame) {
    let mut stream = unsafe { UnixStream::from_raw_fd(client_fd) };

    if let Err(err) = protocol::write_frame(&mut stream, frame) {
        log::warn!("failed to write response to client: {}", err);
        return;
    }

    if let Err(err) = protocol::confirm_client_done(&mut stream) {
        log::warn!("client violated the protocol after the response: {}", err);
    }

    let _ = nix::sys::socket::shutdown(client_fd, nix::sys::socket::Shutdown::Both);
}
