//! Decoder for payloads framed by a `Content-Length` header.

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Tracks the bytes still owed by the peer; emits chunks as they arrive
/// and [`PayloadItem::Eof`] once the declared length is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.remaining, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.remaining -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumes_exactly_the_declared_length() {
        let mut buf = BytesMut::from(&b"hello, worldGET /next"[..]);
        let mut decoder = LengthDecoder::new(12);

        let chunk = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(chunk.into_bytes().unwrap(), &b"hello, world"[..]);

        // pipelined leftovers stay put
        assert_eq!(&buf[..], b"GET /next");
        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_eof());
    }

    #[test]
    fn emits_chunks_as_bytes_trickle_in() {
        let mut decoder = LengthDecoder::new(4);

        let mut buf = BytesMut::from(&b"ab"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap().into_bytes().unwrap(), &b"ab"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"cd");
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap().into_bytes().unwrap(), &b"cd"[..]);
        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_eof());
    }

    #[test]
    fn zero_length_is_immediately_eof() {
        let mut buf = BytesMut::new();
        assert!(LengthDecoder::new(0).decode(&mut buf).unwrap().unwrap().is_eof());
    }
}
