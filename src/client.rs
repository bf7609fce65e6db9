//! Client-side logic: assemble a request from `--field=value` pairs, then
//! broadcast it to every server listed in the registry.

use crate::error::BroadcastError;
use crate::protocol::{self, Frame};
use crate::registry;
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Builds the request string the same way the original client assembles it:
/// one ` field: value;` fragment per pair, in argument order.
pub fn build_request(fields: &[(String, String)]) -> String {
    let mut request = String::new();
    for (field, value) in fields {
        request.push(' ');
        request.push_str(field);
        request.push_str(": ");
        request.push_str(value);
        request.push(';');
    }
    request
}

/// The outcome of querying a single registered server. A refused connection
/// is not treated as an abort condition — see `broadcast`.
pub enum ServerOutcome {
    NoMatch,
    Matched(String),
    ServerError(String),
    ConnectionRefused,
}

/// Queries one server. A connection refused at `connect` time is reported
/// as `Ok(ServerOutcome::ConnectionRefused)`; every other failure — a
/// different connect error, a protocol violation, an early close — aborts
/// by returning `Err`, per the broadcast's "any other system error aborts"
/// contract.
pub fn query_one(socket_path: &str, message_type: u8, request: &str) -> Result<ServerOutcome, BroadcastError> {
    let mut stream = match UnixStream::connect(socket_path) {
        Ok(stream) => stream,
        Err(err) if err.kind() == std::io::ErrorKind::ConnectionRefused => {
            return Ok(ServerOutcome::ConnectionRefused);
        }
        Err(err) => return Err(BroadcastError::Connection(err)),
    };

    let frame = Frame::new(message_type, request);
    protocol::write_frame(&mut stream, &frame)?;
    protocol::shutdown_write(&stream)?;

    let response = match protocol::read_frame(&mut stream) {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            return Err(BroadcastError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection before responding",
            )));
        }
        Err(err) => return Err(err.into()),
    };
    let _ = protocol::shutdown_read(&stream);

    Ok(match response.message_type {
        protocol::MSG_NO => ServerOutcome::NoMatch,
        protocol::MSG_ERROR => ServerOutcome::ServerError(response.payload_str()),
        _ => ServerOutcome::Matched(response.payload_str()),
    })
}

/// Queries every server in the registry in turn, matching the original
/// client's sequential one-at-a-time broadcast. A refused connection to one
/// server is reported in its slot and iteration continues; any other
/// failure aborts the whole broadcast.
pub fn broadcast(
    bib_conf_path: &Path,
    message_type: u8,
    request: &str,
) -> Result<Vec<(String, ServerOutcome)>, BroadcastError> {
    let contents = match registry::read(bib_conf_path) {
        Ok(contents) => contents,
        Err(err) => {
            log::error!("failed to read the server registry: {}", err);
            return Ok(Vec::new());
        }
    };

    let mut results = Vec::new();
    for (name, socket_path) in registry::parse_entries(&contents) {
        let outcome = query_one(&socket_path, message_type, request)?;
        results.push((name, outcome));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_request_in_argument_order() {
        let fields = vec![
            ("autore".to_string(), "Umberto Eco".to_string()),
            ("titolo".to_string(), "Il Nome della Rosa".to_string()),
        ];
        let request = build_request(&fields);
        assert_eq!(request, " autore: Umberto Eco; titolo: Il Nome della Rosa;");
    }
}
