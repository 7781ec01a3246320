//! Multipart/mixed batch serialization.

use super::{APPLICATION_HTTP, BINARY, BatchFrame, BatchResponseFrame};
use crate::http::{CONTENT_ID, CONTENT_LENGTH, CONTENT_TRANSFER_ENCODING, CONTENT_TYPE, Headers};
use bytes::{BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Serialize response frames, in order, with `boundary`.
pub fn write_batch_response(boundary: &str, frames: &[BatchResponseFrame]) -> Bytes {
    let mut out = BytesMut::with_capacity(estimate(frames.iter().map(|f| f.body.len())));
    for frame in frames {
        write_part(
            &mut out,
            boundary,
            frame.content_id.as_deref(),
            &frame.status_line(),
            &frame.headers,
            &frame.body,
        );
    }
    close(&mut out, boundary);
    out.freeze()
}

/// Serialize request frames, in order, with `boundary`.
pub fn write_batch_request(boundary: &str, frames: &[BatchFrame]) -> Bytes {
    let mut out = BytesMut::with_capacity(estimate(frames.iter().map(|f| f.body.len())));
    for frame in frames {
        write_part(
            &mut out,
            boundary,
            frame.content_id.as_deref(),
            &format!("{} {} HTTP/1.1", frame.method, frame.uri),
            &frame.headers,
            &frame.body,
        );
    }
    close(&mut out, boundary);
    out.freeze()
}

fn estimate(bodies: impl Iterator<Item = usize>) -> usize {
    bodies.map(|len| len + 256).sum::<usize>() + 64
}

fn write_part(
    out: &mut BytesMut,
    boundary: &str,
    content_id: Option<&str>,
    start_line: &str,
    headers: &Headers,
    body: &[u8],
) {
    line(out, &format!("--{}", boundary));
    header(out, CONTENT_TYPE, APPLICATION_HTTP);
    header(out, CONTENT_TRANSFER_ENCODING, BINARY);
    if let Some(id) = content_id {
        header(out, CONTENT_ID, id);
    }
    out.put_slice(CRLF);

    line(out, start_line);
    for (name, value) in headers.iter() {
        header(out, name, value);
    }
    if !body.is_empty() && !headers.contains(CONTENT_LENGTH) {
        header(out, CONTENT_LENGTH, &body.len().to_string());
    }
    out.put_slice(CRLF);
    out.put_slice(body);
    out.put_slice(CRLF);
}

fn close(out: &mut BytesMut, boundary: &str) {
    line(out, &format!("--{}--", boundary));
}

fn header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(CRLF);
}

fn line(out: &mut BytesMut, text: &str) {
    out.put_slice(text.as_bytes());
    out.put_slice(CRLF);
}
