//! The framed wire protocol spoken between client and server: a one-byte
//! type, a four-byte native-order length, and a NUL-terminated payload of
//! that length, with half-close (`SHUT_WR`/`SHUT_RD`) marking each side done
//! with its half of the exchange.

use crate::error::ProtocolError;
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

pub const MSG_QUERY: u8 = b'Q';
pub const MSG_LOAN: u8 = b'L';
pub const MSG_RECORD: u8 = b'R';
pub const MSG_NO: u8 = b'N';
pub const MSG_ERROR: u8 = b'E';

/// Dispatch-queue-internal sentinel, never written to a socket. `0` is not a
/// message type any peer ever sends.
pub const MSG_STOP: u8 = 0;

/// One message in the wire protocol: a type byte plus a NUL-terminated
/// payload. `length` on the wire includes the trailing NUL.
#[derive(Debug, Clone)]
pub struct Frame {
    pub message_type: u8,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(message_type: u8, payload: &str) -> Self {
        let mut data = payload.as_bytes().to_vec();
        data.push(0);
        Frame { message_type, data }
    }

    pub fn empty(message_type: u8) -> Self {
        Frame {
            message_type,
            data: Vec::new(),
        }
    }

    /// The payload as a string, with the trailing NUL (if present) dropped.
    pub fn payload_str(&self) -> String {
        let bytes = if self.data.last() == Some(&0) {
            &self.data[..self.data.len() - 1]
        } else {
            &self.data[..]
        };
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Reads exactly `buf.len()` bytes, distinguishing a clean EOF before any
/// byte of this read (`Ok(false)`, the peer closed early but not mid-frame)
/// from a genuine I/O failure (`Err`). A short read that has already
/// consumed at least one byte is always an error: the peer violated the
/// framing, not just hung up.
fn read_exact_or_eof<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<bool, ProtocolError> {
    let mut read_so_far = 0;
    while read_so_far < buf.len() {
        let n = stream.read(&mut buf[read_so_far..])?;
        if n == 0 {
            if read_so_far == 0 {
                return Ok(false);
            }
            return Err(ProtocolError::ClosedEarly);
        }
        read_so_far += n;
    }
    Ok(true)
}

/// Reads one frame off `stream`. Returns `Ok(None)` if the peer closed the
/// connection cleanly before sending anything at all.
pub fn read_frame<R: Read>(stream: &mut R) -> Result<Option<Frame>, ProtocolError> {
    let mut type_buf = [0u8; 1];
    if !read_exact_or_eof(stream, &mut type_buf)? {
        return Ok(None);
    }

    let mut length_buf = [0u8; 4];
    if !read_exact_or_eof(stream, &mut length_buf)? {
        return Err(ProtocolError::ClosedEarly);
    }
    let length = i32::from_ne_bytes(length_buf);
    if length < 0 {
        return Err(ProtocolError::ClosedEarly);
    }

    let mut data = vec![0u8; length as usize];
    if length > 0 && !read_exact_or_eof(stream, &mut data)? {
        return Err(ProtocolError::ClosedEarly);
    }

    Ok(Some(Frame {
        message_type: type_buf[0],
        data,
    }))
}

/// Writes one frame to `stream` in full, erroring on any short write.
pub fn write_frame<W: Write>(stream: &mut W, frame: &Frame) -> Result<(), ProtocolError> {
    stream.write_all(&[frame.message_type])?;

    let length = frame.data.len() as i32;
    stream.write_all(&length.to_ne_bytes())?;

    let wrote = stream.write(&frame.data)?;
    if wrote != frame.data.len() {
        return Err(ProtocolError::WriteShort {
            wrote,
            expected: frame.data.len(),
        });
    }

    Ok(())
}

/// After a client has finished writing its request, it half-closes its
/// write side: the server reads until EOF, and the client still has its
/// read side open for the response.
pub fn shutdown_write<S: AsRawFd>(stream: &S) -> std::io::Result<()> {
    nix::sys::socket::shutdown(stream.as_raw_fd(), nix::sys::socket::Shutdown::Write)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// After reading a response in full, a client half-closes its read side,
/// matching the server's post-write informational-ACK-read: any further
/// byte received there is treated as a protocol violation.
pub fn shutdown_read<S: AsRawFd>(stream: &S) -> std::io::Result<()> {
    nix::sys::socket::shutdown(stream.as_raw_fd(), nix::sys::socket::Shutdown::Read)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// After a server has written its response, it performs an informational
/// read: any byte it receives there (rather than a clean EOF) means the
/// client sent something unexpected, which this codebase treats as a
/// protocol violation requiring the connection be dropped.
pub fn confirm_client_done<R: Read>(stream: &mut R) -> Result<(), ProtocolError> {
    let mut probe = [0u8; 1];
    let n = stream.read(&mut probe)?;
    if n != 0 {
        return Err(ProtocolError::Communication);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_frame_through_a_buffer() {
        let frame = Frame::new(MSG_QUERY, "autore: eco;");
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();

        let mut cursor = Cursor::new(buffer);
        let read_back = read_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(read_back.message_type, MSG_QUERY);
        assert_eq!(read_back.payload_str(), "autore: eco;");
    }

    #[test]
    fn clean_eof_before_any_byte_is_not_an_error() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let result = read_frame(&mut cursor).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn eof_mid_frame_is_an_error() {
        let mut cursor = Cursor::new(vec![MSG_QUERY]);
        let result = read_frame(&mut cursor);
        assert!(result.is_err());
    }

    #[test]
    fn empty_payload_round_trips() {
        let frame = Frame::empty(MSG_NO);
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();

        let mut cursor = Cursor::new(buffer);
        let read_back = read_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(read_back.message_type, MSG_NO);
        assert_eq!(read_back.data.len(), 0);
    }
}
