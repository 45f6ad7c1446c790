use super::request::Request;
use super::response::Response;
use crate::security::{RequestLimits, SizeError, SizeValidator};
use bytes::{Buf, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, EXPECT, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_HEADERS: usize = 64;
const READ_CHUNK: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Request head larger than {max} bytes")]
    HeadTooLarge { max: usize },
    #[error(transparent)]
    BodyTooLarge(#[from] SizeError),
    #[error("Incomplete request")]
    IncompleteRequest,
}

impl HttpProtocolError {
    /// The response owed to the client, if the connection is still usable for one
    pub fn to_response(&self) -> Option<Response> {
        let status = match self {
            HttpProtocolError::HttpParse(_) | HttpProtocolError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            HttpProtocolError::HeadTooLarge { .. } => {
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
            HttpProtocolError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            HttpProtocolError::Io(_) | HttpProtocolError::IncompleteRequest => return None,
        };
        Some(Response::error(status, self.to_string()))
    }
}

/// Request line and headers, detached from the read buffer
struct RequestHead {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
}

/// HTTP/1.x framing over a byte stream
///
/// Reads requests one at a time, keeping any pipelined bytes buffered for
/// the next call, and writes encoded responses.
pub struct HttpStream<S> {
    inner: S,
    buffer: BytesMut,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl<S> HttpStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            inner: stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            peer_addr,
            local_addr,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Reads the next request.
    ///
    /// Returns `Ok(None)` when the peer closes the connection cleanly between
    /// requests.
    pub async fn read_request(
        &mut self,
        limits: &RequestLimits,
    ) -> Result<Option<Request>, HttpProtocolError> {
        let head = loop {
            if !self.buffer.is_empty() {
                if let Some(head) = self.parse_head(limits)? {
                    break head;
                }
            }

            let n = self.fill().await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(HttpProtocolError::IncompleteRequest);
            }
        };

        let body_validator = SizeValidator::new(limits.max_body_size);
        let chunked = is_chunked(&head.headers)?;
        let content_length = content_length(&head.headers)?;

        if let Some(length) = content_length.filter(|_| !chunked) {
            body_validator.validate_size(length)?;
        }

        let expects_body = chunked || content_length.is_some_and(|len| len > 0);
        if expects_body && expects_continue(&head) && self.buffer.is_empty() {
            self.inner
                .write_all(b"HTTP/1.1 100 Continue\r\n\r\n")
                .await?;
            self.inner.flush().await?;
        }

        let body = if chunked {
            self.read_chunked_body(body_validator, limits.max_head_size)
                .await?
        } else {
            self.read_sized_body(content_length.unwrap_or(0)).await?
        };

        Ok(Some(Request::from_parts(
            head.method,
            head.target,
            head.version,
            head.headers,
            body,
            self.peer_addr,
            self.local_addr,
        )))
    }

    /// Writes a response and flushes it
    pub async fn write_response(
        &mut self,
        response: &Response,
        version: Version,
        keep_alive: bool,
        head_only: bool,
    ) -> Result<(), HttpProtocolError> {
        let encoded = response.encode(version, keep_alive, head_only);
        self.inner.write_all(&encoded).await?;
        self.inner.flush().await?;
        Ok(())
    }

    fn parse_head(
        &mut self,
        limits: &RequestLimits,
    ) -> Result<Option<RequestHead>, HttpProtocolError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_len = match req.parse(&self.buffer) {
            Ok(httparse::Status::Complete(parsed_len)) => parsed_len,
            Ok(httparse::Status::Partial) => {
                if self.buffer.len() > limits.max_head_size {
                    return Err(HttpProtocolError::HeadTooLarge {
                        max: limits.max_head_size,
                    });
                }
                return Ok(None);
            }
            Err(httparse::Error::TooManyHeaders) => {
                return Err(HttpProtocolError::HeadTooLarge {
                    max: limits.max_head_size,
                });
            }
            Err(e) => {
                return Err(HttpProtocolError::HttpParse(format!(
                    "Failed to parse headers: {e}"
                )));
            }
        };

        if parsed_len > limits.max_head_size {
            return Err(HttpProtocolError::HeadTooLarge {
                max: limits.max_head_size,
            });
        }

        let method = req
            .method
            .map(|m| Method::from_bytes(m.as_bytes()))
            .transpose()
            .map_err(|e| HttpProtocolError::InvalidRequest(format!("Invalid method: {e}")))?
            .ok_or_else(|| HttpProtocolError::InvalidRequest("Missing method".to_string()))?;
        let target = req
            .path
            .filter(|p| p.starts_with('/'))
            .ok_or_else(|| {
                HttpProtocolError::InvalidRequest("Request target must be a path".to_string())
            })?
            .to_string();
        let version = match req.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        };

        let mut header_map = HeaderMap::with_capacity(req.headers.len());
        for header in req.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
                HttpProtocolError::InvalidRequest(format!("Invalid header name: {e}"))
            })?;
            let value = HeaderValue::from_bytes(header.value).map_err(|e| {
                HttpProtocolError::InvalidRequest(format!("Invalid header value: {e}"))
            })?;
            header_map.append(name, value);
        }

        self.buffer.advance(parsed_len);

        Ok(Some(RequestHead {
            method,
            target,
            version,
            headers: header_map,
        }))
    }

    async fn read_sized_body(&mut self, length: usize) -> Result<Bytes, HttpProtocolError> {
        while self.buffer.len() < length {
            self.fill_or_incomplete().await?;
        }
        Ok(self.buffer.split_to(length).freeze())
    }

    async fn read_chunked_body(
        &mut self,
        validator: SizeValidator,
        max_line: usize,
    ) -> Result<Bytes, HttpProtocolError> {
        let mut body = BytesMut::new();

        loop {
            let (size_len, chunk_size) = loop {
                match httparse::parse_chunk_size(&self.buffer) {
                    Ok(httparse::Status::Complete(found)) => break found,
                    Ok(httparse::Status::Partial) => self.fill_or_incomplete().await?,
                    Err(_) => {
                        return Err(HttpProtocolError::InvalidRequest(
                            "Invalid chunk size".to_string(),
                        ));
                    }
                }
            };

            let chunk_size = usize::try_from(chunk_size).map_err(|_| {
                HttpProtocolError::InvalidRequest("Chunk size overflows".to_string())
            })?;

            if chunk_size == 0 {
                self.buffer.advance(size_len);
                self.skip_trailers(max_line).await?;
                return Ok(body.freeze());
            }

            validator.validate_size(body.len().saturating_add(chunk_size))?;

            let framed = size_len + chunk_size + 2;
            while self.buffer.len() < framed {
                self.fill_or_incomplete().await?;
            }
            if &self.buffer[framed - 2..framed] != b"\r\n" {
                return Err(HttpProtocolError::InvalidRequest(
                    "Chunk is not terminated by CRLF".to_string(),
                ));
            }

            self.buffer.advance(size_len);
            body.extend_from_slice(&self.buffer[..chunk_size]);
            self.buffer.advance(chunk_size + 2);
        }
    }

    /// Consumes trailer lines up to and including the terminating empty line
    async fn skip_trailers(&mut self, max_line: usize) -> Result<(), HttpProtocolError> {
        loop {
            match self.buffer.windows(2).position(|w| w == b"\r\n") {
                Some(0) => {
                    self.buffer.advance(2);
                    return Ok(());
                }
                Some(end) => self.buffer.advance(end + 2),
                None if self.buffer.len() > max_line => {
                    return Err(HttpProtocolError::HeadTooLarge { max: max_line });
                }
                None => self.fill_or_incomplete().await?,
            }
        }
    }

    async fn fill(&mut self) -> io::Result<usize> {
        self.buffer.reserve(READ_CHUNK);
        self.inner.read_buf(&mut self.buffer).await
    }

    async fn fill_or_incomplete(&mut self) -> Result<(), HttpProtocolError> {
        let n = self.fill().await?;
        if n == 0 {
            return Err(HttpProtocolError::IncompleteRequest);
        }
        Ok(())
    }
}

fn is_chunked(headers: &HeaderMap) -> Result<bool, HttpProtocolError> {
    let Some(value) = headers.get(TRANSFER_ENCODING) else {
        return Ok(false);
    };
    let value = value.to_str().map_err(|_| {
        HttpProtocolError::InvalidRequest("Invalid Transfer-Encoding".to_string())
    })?;
    match value.rsplit(',').next().map(str::trim) {
        Some(last) if last.eq_ignore_ascii_case("chunked") => Ok(true),
        _ => Err(HttpProtocolError::InvalidRequest(format!(
            "Unsupported Transfer-Encoding: {value}"
        ))),
    }
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>, HttpProtocolError> {
    let mut lengths = headers.get_all(CONTENT_LENGTH).iter();
    let Some(first) = lengths.next() else {
        return Ok(None);
    };
    let parse = |value: &HeaderValue| {
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .ok_or_else(|| HttpProtocolError::InvalidRequest("Invalid Content-Length".to_string()))
    };

    let length = parse(first)?;
    for other in lengths {
        if parse(other)? != length {
            return Err(HttpProtocolError::InvalidRequest(
                "Conflicting Content-Length headers".to_string(),
            ));
        }
    }
    Ok(Some(length))
}

fn expects_continue(head: &RequestHead) -> bool {
    head.version == Version::HTTP_11
        && head
            .headers
            .get(EXPECT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
}
