//! Incremental request-head parsing.
//!
//! The decoder re-parses the buffered prefix on every call, which keeps it
//! insensitive to how the stream was chopped into chunks — a `\r\n\r\n`
//! split across two reads is found as soon as the second half arrives.
//! Limits are enforced on both the partial and the complete path so an
//! endless header stream cannot grow the buffer unboundedly.

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue, Request, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHead};

const MAX_HEADER_NUM: usize = 64;
const MAX_HEADER_BYTES: usize = 8 * 1024;

pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHead, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed = req.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        })?;

        match parsed {
            Status::Complete(header_len) => {
                ensure!(header_len <= MAX_HEADER_BYTES, ParseError::too_large_header(header_len, MAX_HEADER_BYTES));

                let version = match req.version {
                    Some(0) => Version::HTTP_10,
                    Some(1) => Version::HTTP_11,
                    v => return Err(ParseError::InvalidVersion(v)),
                };

                let mut builder = Request::builder()
                    .method(req.method.ok_or(ParseError::InvalidMethod)?)
                    .uri(req.path.ok_or(ParseError::InvalidUri)?)
                    .version(version);

                let header_map = builder.headers_mut().ok_or(ParseError::InvalidMethod)?;
                header_map.reserve(req.headers.len());
                for header in req.headers.iter() {
                    let name = HeaderName::from_bytes(header.name.as_bytes())
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    let value = HeaderValue::from_bytes(header.value)
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    // repeated names: last occurrence wins
                    header_map.insert(name, value);
                }

                let head = RequestHead::from(
                    builder.body(()).map_err(|e| ParseError::invalid_header(e.to_string()))?,
                );
                let payload_size = parse_payload_size(head.headers());
                trace!(header_bytes = header_len, ?payload_size, "request head parsed");

                let _ = src.split_to(header_len);
                Ok(Some((head, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// `Content-Length` alone sizes the body; `Transfer-Encoding` is not
/// recognized. Absent or unparseable values mean no body.
fn parse_payload_size(headers: &HeaderMap) -> PayloadSize {
    let Some(value) = headers.get(http::header::CONTENT_LENGTH) else {
        return PayloadSize::Empty;
    };
    match value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(0) => PayloadSize::Empty,
        Some(length) => PayloadSize::Length(length),
        None => {
            trace!(?value, "unparseable content-length, treating body as empty");
            PayloadSize::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn decodes_head_and_leaves_body_prefix() {
        let mut buf = BytesMut::from(
            &b"POST /submit HTTP/1.1\r\nHost: 127.0.0.1:8080\r\nContent-Length: 5\r\n\r\nhello"[..],
        );

        let (head, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.method(), &Method::POST);
        assert_eq!(head.target(), "/submit");
        assert_eq!(head.version(), Version::HTTP_11);
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn partial_head_asks_for_more() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: x"[..]);
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
        // nothing consumed while incomplete
        assert_eq!(&buf[..], b"GET / HTTP/1.1\r\nHost: x");
    }

    #[test]
    fn header_keys_are_lowercased() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHoSt: here\r\nX-CUSTOM: 1\r\n\r\n"[..]);

        let (head, _) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        let keys: Vec<&str> = head.headers().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["host", "x-custom"]);
        assert!(keys.iter().all(|k| k.chars().all(|c| !c.is_ascii_uppercase())));
    }

    #[test]
    fn repeated_header_keeps_last_value() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-Tag: one\r\nX-Tag: two\r\n\r\n"[..]);

        let (head, _) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.headers().len(), 1);
        assert_eq!(head.headers().get("x-tag").unwrap(), "two");
    }

    #[test]
    fn unknown_method_is_preserved() {
        let mut buf = BytesMut::from(&b"FROB / HTTP/1.1\r\n\r\n"[..]);

        let (head, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(head.method().as_str(), "FROB");
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn malformed_content_length_means_no_body() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nContent-Length: banana\r\n\r\n"[..]);

        let (_, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.2\r\n\r\n"[..]);
        assert!(HeaderDecoder.decode(&mut buf).is_err());
    }

    #[test]
    fn oversized_header_block_is_rejected() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        let filler = "x".repeat(MAX_HEADER_BYTES);
        buf.extend_from_slice(b"X-Fill: ");
        buf.extend_from_slice(filler.as_bytes());

        match HeaderDecoder.decode(&mut buf) {
            Err(ParseError::TooLargeHeader { .. }) => {}
            other => panic!("expected TooLargeHeader, got {:?}", other.map(|_| ())),
        }
    }
}
