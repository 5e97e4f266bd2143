//! Framed codec for worker communication.
//!
//! Uses LinesCodec for framing + serde_json for serialization: one JSON
//! object per newline-terminated line, matching the worker's protocol.
//! Works over any AsyncRead/AsyncWrite.

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Upper bound on one protocol line; a worker reply past this is garbage.
const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Codec that frames messages as single lines and serializes with JSON.
///
/// serde_json escapes newlines inside strings, so an encoded message never
/// spans more than one line.
#[derive(Debug)]
pub struct LineJsonCodec<T> {
    inner: LinesCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for LineJsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LineJsonCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(MAX_LINE_BYTES),
            _phantom: PhantomData,
        }
    }
}

fn into_io(err: LinesCodecError) -> io::Error {
    match err {
        LinesCodecError::MaxLineLengthExceeded => io::Error::new(
            io::ErrorKind::InvalidData,
            "protocol line exceeds maximum length",
        ),
        LinesCodecError::Io(e) => e,
    }
}

impl<T: DeserializeOwned> Decoder for LineJsonCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src).map_err(into_io)? {
            Some(line) => {
                let item = serde_json::from_str(&line)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for LineJsonCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_string(&item)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tracing::trace!(line_bytes = json.len(), "Encoding frame");
        self.inner.encode(json, dst).map_err(into_io)
    }
}
