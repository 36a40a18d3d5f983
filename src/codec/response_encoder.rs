//! Response encoding.
//!
//! Bodies are fully materialized before the first write, so one `encode`
//! produces the entire wire image: head via [`HeaderEncoder`], then the
//! body appended verbatim.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::header::HeaderEncoder;
use crate::protocol::{ResponseHead, SendError};

pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder }
    }
}

impl Encoder<(ResponseHead, Bytes)> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, Bytes), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (head, body) = item;

        self.header_encoder.encode((head, body.len() as u64), dst)?;
        dst.reserve(body.len());
        dst.put_slice(&body);
        Ok(())
    }
}
