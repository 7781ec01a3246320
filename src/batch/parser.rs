//! Multipart/mixed batch parser.
//!
//! The parser is a line-oriented state machine over the raw body. Lines end in
//! CRLF or a bare LF. Bodies are read by `Content-Length` and are otherwise
//! empty; they may contain arbitrary bytes, including line breaks.

use super::errors::{BatchError, BatchResult};
use super::{
    APPLICATION_HTTP, BINARY, BatchFrame, BatchResponseFrame, MULTIPART_MIXED, default_reason,
    media_type, parse_version,
};
use crate::config::DEFAULT_MAX_BATCH_PARTS;
use crate::http::{CONTENT_ID, CONTENT_LENGTH, CONTENT_TRANSFER_ENCODING, CONTENT_TYPE, Headers};
use bytes::Bytes;
use http::{Method, StatusCode, Version};
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Preamble, up to the first delimiter
    ExpectBoundary,
    ExpectFrameHeaders,
    /// Blank line closing the MIME part headers was read; headers are checked
    ExpectFrameBlankLine,
    /// `METHOD uri HTTP/1.1` or `HTTP/1.1 code reason`
    ExpectRequestLine,
    ExpectRequestHeaders,
    ExpectBody,
    ExpectNextBoundaryOrClose,
    /// After the close delimiter; the rest is epilogue
    Closed,
}

/// A MIME part before its start line is interpreted.
struct RawPart {
    content_id: Option<String>,
    start_line: String,
    start_line_number: usize,
    headers: Headers,
    body: Bytes,
}

/// Parser for one boundary.
#[derive(Debug, Clone)]
pub struct BatchParser {
    delimiter: String,
    close_delimiter: String,
    max_parts: usize,
}

impl BatchParser {
    pub fn new(boundary: &str) -> Self {
        Self {
            delimiter: format!("--{}", boundary),
            close_delimiter: format!("--{}--", boundary),
            max_parts: DEFAULT_MAX_BATCH_PARTS,
        }
    }

    pub fn with_max_parts(mut self, max_parts: usize) -> Self {
        self.max_parts = max_parts;
        self
    }

    /// Parse a batch request body into frames, in body order.
    pub fn parse_requests(&self, body: &[u8]) -> BatchResult<Vec<BatchFrame>> {
        self.parse_parts(body)?
            .into_iter()
            .map(|part| {
                let (method, uri) = parse_request_line(&part.start_line, part.start_line_number)?;
                Ok(BatchFrame {
                    method,
                    uri,
                    headers: part.headers,
                    body: part.body,
                    content_id: part.content_id,
                    line: part.start_line_number,
                })
            })
            .collect()
    }

    /// Parse a batch response body into frames, in body order.
    pub fn parse_responses(&self, body: &[u8]) -> BatchResult<Vec<BatchResponseFrame>> {
        self.parse_parts(body)?
            .into_iter()
            .map(|part| {
                let (version, status, reason) =
                    parse_status_line(&part.start_line, part.start_line_number)?;
                Ok(BatchResponseFrame {
                    status,
                    version,
                    reason,
                    headers: part.headers,
                    body: part.body,
                    content_id: part.content_id,
                })
            })
            .collect()
    }

    fn parse_parts(&self, body: &[u8]) -> BatchResult<Vec<RawPart>> {
        let mut cursor = Cursor::new(body);
        let mut state = State::ExpectBoundary;
        let mut parts = Vec::new();

        let mut part_headers = Headers::new();
        let mut part_headers_line = 0;
        let mut start_line = String::new();
        let mut start_line_number = 0;
        let mut headers = Headers::new();

        loop {
            if state == State::Closed {
                break;
            }
            if state == State::ExpectFrameBlankLine {
                check_part_headers(&part_headers, part_headers_line)?;
                state = transition(state, State::ExpectRequestLine);
                continue;
            }
            if state == State::ExpectBody {
                let length = content_length(&headers, cursor.line_number())?;
                let payload = cursor.take(length).ok_or_else(|| {
                    BatchError::malformed(
                        cursor.line_number(),
                        format!("body is shorter than Content-Length {}", length),
                    )
                })?;
                parts.push(RawPart {
                    content_id: part_headers.get(CONTENT_ID).map(str::to_string),
                    start_line: std::mem::take(&mut start_line),
                    start_line_number,
                    headers: std::mem::take(&mut headers),
                    body: Bytes::copy_from_slice(payload),
                });
                state = transition(state, State::ExpectNextBoundaryOrClose);
                continue;
            }

            let Some(line) = cursor.next_line()? else {
                break;
            };
            let number = cursor.line_number();

            match state {
                State::ExpectBoundary => {
                    if line.trim_end() == self.close_delimiter {
                        state = transition(state, State::Closed);
                    } else if line.trim_end() == self.delimiter {
                        part_headers = self.begin_part(parts.len())?;
                        part_headers_line = number;
                        state = transition(state, State::ExpectFrameHeaders);
                    }
                }
                State::ExpectFrameHeaders => {
                    if line.is_empty() {
                        state = transition(state, State::ExpectFrameBlankLine);
                    } else {
                        append_header(&mut part_headers, line, number)?;
                    }
                }
                State::ExpectRequestLine => {
                    if line.is_empty() {
                        return Err(BatchError::malformed(number, "expected a request line"));
                    }
                    start_line = line.to_string();
                    start_line_number = number;
                    state = transition(state, State::ExpectRequestHeaders);
                }
                State::ExpectRequestHeaders => {
                    if line.is_empty() {
                        state = transition(state, State::ExpectBody);
                    } else if line.trim_end() == self.delimiter || line.trim_end() == self.close_delimiter {
                        return Err(BatchError::malformed(
                            number,
                            "delimiter before the end of the request headers",
                        ));
                    } else {
                        append_header(&mut headers, line, number)?;
                    }
                }
                State::ExpectNextBoundaryOrClose => {
                    if line.trim_end() == self.close_delimiter {
                        state = transition(state, State::Closed);
                    } else if line.trim_end() == self.delimiter {
                        part_headers = self.begin_part(parts.len())?;
                        part_headers_line = number;
                        state = transition(state, State::ExpectFrameHeaders);
                    } else if !line.trim().is_empty() {
                        return Err(BatchError::malformed(
                            number,
                            "unexpected content after the part body",
                        ));
                    }
                }
                // handled before a line is read
                State::ExpectFrameBlankLine | State::ExpectBody | State::Closed => break,
            }
        }

        if state != State::Closed {
            return Err(BatchError::malformed(
                cursor.line_number(),
                format!("missing close delimiter {}", self.close_delimiter),
            ));
        }
        Ok(parts)
    }

    fn begin_part(&self, parsed: usize) -> BatchResult<Headers> {
        if parsed >= self.max_parts {
            return Err(BatchError::TooManyParts {
                max: self.max_parts,
            });
        }
        Ok(Headers::new())
    }
}

fn transition(from: State, to: State) -> State {
    trace!("Batch parser {:?} -> {:?}", from, to);
    to
}

fn check_part_headers(headers: &Headers, line: usize) -> BatchResult<()> {
    let content_type = headers.get(CONTENT_TYPE).ok_or(BatchError::MissingPartHeader {
        line,
        header: CONTENT_TYPE,
    })?;
    match media_type(content_type).as_str() {
        APPLICATION_HTTP => {}
        MULTIPART_MIXED => return Err(BatchError::UnsupportedChangeset { line }),
        other => {
            return Err(BatchError::malformed(
                line,
                format!("part Content-Type must be {}, got {}", APPLICATION_HTTP, other),
            ));
        }
    }

    let encoding = headers
        .get(CONTENT_TRANSFER_ENCODING)
        .ok_or(BatchError::MissingPartHeader {
            line,
            header: CONTENT_TRANSFER_ENCODING,
        })?;
    if !encoding.trim().eq_ignore_ascii_case(BINARY) {
        return Err(BatchError::malformed(
            line,
            format!("part Content-Transfer-Encoding must be {}, got {}", BINARY, encoding),
        ));
    }
    Ok(())
}

fn append_header(headers: &mut Headers, line: &str, number: usize) -> BatchResult<()> {
    let (name, value) = line
        .split_once(':')
        .filter(|(name, _)| !name.is_empty() && !name.contains(char::is_whitespace))
        .ok_or_else(|| BatchError::malformed(number, format!("malformed header line '{}'", line)))?;
    headers.append(name, value.trim());
    Ok(())
}

fn content_length(headers: &Headers, line: usize) -> BatchResult<usize> {
    match headers.get(CONTENT_LENGTH) {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BatchError::malformed(line, format!("invalid Content-Length '{}'", raw))),
    }
}

fn parse_request_line(line: &str, number: usize) -> BatchResult<(Method, String)> {
    let malformed = || BatchError::malformed(number, format!("malformed request line '{}'", line));
    let mut fields = line.split_whitespace();
    let (Some(method), Some(uri), Some(version), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed());
    };
    if !version.starts_with("HTTP/") {
        return Err(malformed());
    }
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| malformed())?;
    Ok((method, uri.to_string()))
}

fn parse_status_line(
    line: &str,
    number: usize,
) -> BatchResult<(Version, StatusCode, Option<String>)> {
    let malformed = || BatchError::malformed(number, format!("malformed status line '{}'", line));
    let mut fields = line.splitn(3, ' ');
    let (Some(version), Some(code)) = (fields.next(), fields.next()) else {
        return Err(malformed());
    };
    let version = parse_version(version).ok_or_else(malformed)?;
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(malformed)?;
    let reason = fields
        .next()
        .map(str::trim)
        .filter(|reason| !reason.is_empty() && *reason != default_reason(status))
        .map(str::to_string);
    Ok((version, status, reason))
}

/// Byte cursor that hands out lines and counts them.
struct Cursor<'a> {
    input: &'a [u8],
    position: usize,
    line_number: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            position: 0,
            line_number: 0,
        }
    }

    /// Number of the line most recently returned.
    fn line_number(&self) -> usize {
        self.line_number
    }

    /// Next line without its terminator; `None` at end of input.
    ///
    /// A final line without a terminator is still returned.
    fn next_line(&mut self) -> BatchResult<Option<&'a str>> {
        if self.position >= self.input.len() {
            return Ok(None);
        }
        let rest = &self.input[self.position..];
        let (raw, advance) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.position += advance;
        self.line_number += 1;

        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        std::str::from_utf8(raw)
            .map(Some)
            .map_err(|_| BatchError::malformed(self.line_number, "line is not valid UTF-8"))
    }

    /// Next `length` raw bytes.
    fn take(&mut self, length: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(length)?;
        let bytes = self.input.get(self.position..end)?;
        self.position = end;
        self.line_number += bytes.iter().filter(|&&b| b == b'\n').count();
        Some(bytes)
    }
}
