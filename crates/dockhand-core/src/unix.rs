//! HTTP/1.1 over a UNIX domain socket.
//!
//! Every request opens its own connection and asks the daemon to close it
//! (`Connection: close`), so the response is simply everything read until
//! EOF. Bodies framed by `Content-Length` or chunked transfer encoding are
//! both understood.

use crate::error::{Error, Result};
use crate::transport::{ApiRequest, RawResponse, Transport};
use crate::USER_AGENT;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info, trace};

/// Talks to a daemon listening on a UNIX domain socket.
#[derive(Debug, Clone)]
pub struct UnixTransport {
    socket_path: PathBuf,
}

impl UnixTransport {
    /// Create a transport for the given socket path.
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Get the socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

#[async_trait]
impl Transport for UnixTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let payload = encode_request(request)?;

        info!(method = %request.method, path = %request.path, "daemon request");

        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|err| {
                Error::Connection(format!(
                    "Failed to connect to daemon at {}: {err}",
                    self.socket_path.display()
                ))
            })?;

        stream.write_all(&payload).await?;
        stream.flush().await?;
        trace!("request written, waiting for response");

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;

        let response = parse_response(&raw)?;
        debug!(status = response.status, bytes = response.body.len(), "daemon response");
        Ok(response)
    }

    async fn close(&self) {
        // Streams live only as long as the call that opened them.
        debug!(socket = %self.socket_path.display(), "no pooled UNIX connections to close");
    }
}

/// Serialize a request into HTTP/1.1 wire format.
fn encode_request(request: &ApiRequest) -> Result<Vec<u8>> {
    let body = request
        .body
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()
        .map_err(|err| Error::InvalidRequest(format!("Failed to encode request body: {err}")))?;

    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: docker\r\nUser-Agent: {USER_AGENT}\r\nAccept: application/json\r\nConnection: close\r\n",
        request.method,
        request.target()
    );
    if let Some(body) = &body {
        head.push_str("Content-Type: application/json\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");

    let mut bytes = head.into_bytes();
    if let Some(body) = body {
        bytes.extend(body);
    }
    Ok(bytes)
}

fn malformed(what: &str) -> Error {
    Error::Decode(format!("Malformed HTTP response: {what}"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse a complete HTTP/1.1 response read up to EOF.
fn parse_response(raw: &[u8]) -> Result<RawResponse> {
    let head_end = find(raw, b"\r\n\r\n").ok_or_else(|| malformed("incomplete header block"))?;
    let head = std::str::from_utf8(&raw[..head_end]).map_err(|_| malformed("non-UTF-8 headers"))?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    match parts.next() {
        Some(version) if version.starts_with("HTTP/1.") => {}
        _ => return Err(malformed("missing HTTP/1.x status line")),
    }
    let status: u16 = parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| malformed("invalid status code"))?;

    let mut chunked = false;
    let mut content_length = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
        } else if name.eq_ignore_ascii_case("content-length") {
            content_length = Some(
                value
                    .parse::<usize>()
                    .map_err(|_| malformed("invalid Content-Length"))?,
            );
        }
    }

    let rest = &raw[head_end + 4..];
    let body = if chunked {
        decode_chunked(rest)?
    } else if let Some(length) = content_length {
        if rest.len() < length {
            return Err(malformed("body shorter than Content-Length"));
        }
        rest[..length].to_vec()
    } else {
        rest.to_vec()
    };

    Ok(RawResponse::new(status, body))
}

fn decode_chunked(mut input: &[u8]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = find(input, b"\r\n").ok_or_else(|| malformed("truncated chunk size"))?;
        let size_line =
            std::str::from_utf8(&input[..line_end]).map_err(|_| malformed("invalid chunk size"))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size =
            usize::from_str_radix(size_hex, 16).map_err(|_| malformed("invalid chunk size"))?;
        input = &input[line_end + 2..];

        if size == 0 {
            return Ok(body);
        }
        let end = size
            .checked_add(2)
            .filter(|end| *end <= input.len())
            .ok_or_else(|| malformed("truncated chunk"))?;
        if &input[size..end] != b"\r\n" {
            return Err(malformed("chunk not terminated by CRLF"));
        }
        body.extend_from_slice(&input[..size]);
        input = &input[end..];
    }
}
