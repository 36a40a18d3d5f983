//! Streaming request decoding.
//!
//! [`RequestDecoder`] coordinates header parsing and payload framing as a
//! two-phase state machine, tracked by the `payload_decoder` field:
//! `None` means heads are being parsed, `Some` means a body is being
//! framed. Emitting [`PayloadItem::Eof`] returns the decoder to the
//! header phase, so one decoder serves every request on a keep-alive
//! connection.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHead};

pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHead, PayloadSize)>;
    type Error = ParseError;

    /// Decodes the next item of the current request.
    ///
    /// - `Ok(Some(Message::Header(_)))`: a complete request head
    /// - `Ok(Some(Message::Payload(_)))`: a body chunk, or `Eof` once the
    ///   declared length is consumed
    /// - `Ok(None)`: need more bytes
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    // request finished, next decode starts a new head
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((head, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((head, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Method;
    use indoc::indoc;

    /// Runs the decoder over `input` delivered in `chunk_size`d pieces and
    /// returns every framed request as (head, body).
    fn decode_chunked(input: &[u8], chunk_size: usize) -> Vec<(RequestHead, Bytes)> {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::new();
        let mut requests = Vec::new();

        let mut pending: Option<RequestHead> = None;
        let mut body = BytesMut::new();

        for chunk in input.chunks(chunk_size.max(1)) {
            buf.extend_from_slice(chunk);
            loop {
                match decoder.decode(&mut buf).unwrap() {
                    Some(Message::Header((head, _))) => pending = Some(head),
                    Some(Message::Payload(PayloadItem::Chunk(bytes))) => body.extend_from_slice(&bytes),
                    Some(Message::Payload(PayloadItem::Eof)) => {
                        requests.push((pending.take().unwrap(), body.split().freeze()));
                    }
                    None => break,
                }
            }
        }
        requests
    }

    const REQUEST: &[u8] = b"POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";

    #[test]
    fn any_chunk_partition_yields_the_same_parse() {
        let whole = decode_chunked(REQUEST, REQUEST.len());

        for chunk_size in 1..REQUEST.len() {
            let parsed = decode_chunked(REQUEST, chunk_size);
            assert_eq!(parsed.len(), 1, "chunk size {chunk_size}");
            assert_eq!(parsed[0].0.method(), whole[0].0.method());
            assert_eq!(parsed[0].0.target(), whole[0].0.target());
            assert_eq!(parsed[0].0.headers(), whole[0].0.headers());
            assert_eq!(parsed[0].1, whole[0].1);
        }
    }

    #[test]
    fn delimiter_split_across_chunks_is_detected() {
        // split right inside the \r\n\r\n
        let (left, right) = REQUEST.split_at(REQUEST.len() - 7);

        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from(left);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(right);
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Header(_))));
    }

    #[test]
    fn missing_content_length_finishes_on_headers_alone() {
        let input = indoc! {"
            GET /index.html HTTP/1.1
            Host: 127.0.0.1:8080

        "};

        let requests = decode_chunked(input.as_bytes(), input.len());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0.method(), &Method::GET);
        assert!(requests[0].1.is_empty());
    }

    #[test]
    fn zero_content_length_finishes_on_headers_alone() {
        let input = b"POST /drop HTTP/1.1\r\nContent-Length: 0\r\n\r\n";

        let requests = decode_chunked(input, input.len());
        assert_eq!(requests.len(), 1);
        assert!(requests[0].1.is_empty());
    }

    #[test]
    fn decoder_is_reusable_across_keep_alive_requests() {
        let mut input = Vec::from(REQUEST);
        input.extend_from_slice(b"GET /second HTTP/1.1\r\nHost: x\r\n\r\n");

        for chunk_size in [1, 7, input.len()] {
            let requests = decode_chunked(&input, chunk_size);
            assert_eq!(requests.len(), 2, "chunk size {chunk_size}");
            assert_eq!(requests[0].0.target(), "/echo");
            assert_eq!(&requests[0].1[..], b"hello");
            assert_eq!(requests[1].0.target(), "/second");
            assert!(requests[1].1.is_empty());
        }
    }
}
