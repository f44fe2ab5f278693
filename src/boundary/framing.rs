/*!
 * Frame Codec
 *
 * Length-prefixed bincode frames. The same frames travel over a child
 * process's stdio pipes and over in-process channels, so every boundary
 * kind speaks exactly the same protocol.
 */

use crate::core::errors::BoundaryError;
use crate::core::limits::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};

/// Serialize a message into a frame payload
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, BoundaryError> {
    let payload = bincode::serialize(value)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(BoundaryError::FrameTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_SIZE,
        });
    }
    Ok(payload)
}

/// Deserialize a frame payload
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, BoundaryError> {
    Ok(bincode::deserialize(payload)?)
}

/// Sending half of a boundary channel
pub trait FrameWriter: Send {
    fn send(&mut self, payload: Vec<u8>) -> Result<(), BoundaryError>;
}

/// Receiving half of a boundary channel
///
/// Returns `BoundaryError::Closed` once the other side is gone.
pub trait FrameReader: Send {
    fn recv(&mut self) -> Result<Vec<u8>, BoundaryError>;
}

/// Frames over a byte stream: 4-byte little-endian length, then payload
pub struct StreamWriter<W: Write + Send> {
    inner: W,
}

impl<W: Write + Send> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write + Send> FrameWriter for StreamWriter<W> {
    fn send(&mut self, payload: Vec<u8>) -> Result<(), BoundaryError> {
        if payload.len() > MAX_FRAME_SIZE {
            return Err(BoundaryError::FrameTooLarge {
                size: payload.len(),
                limit: MAX_FRAME_SIZE,
            });
        }
        let header = (payload.len() as u32).to_le_bytes();
        let result = self
            .inner
            .write_all(&header)
            .and_then(|_| self.inner.write_all(&payload))
            .and_then(|_| self.inner.flush());
        result.map_err(closed_or_io)
    }
}

pub struct StreamReader<R: Read + Send> {
    inner: R,
}

impl<R: Read + Send> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> FrameReader for StreamReader<R> {
    fn recv(&mut self) -> Result<Vec<u8>, BoundaryError> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.inner.read_exact(&mut header).map_err(closed_or_io)?;

        let size = u32::from_le_bytes(header) as usize;
        if size > MAX_FRAME_SIZE {
            return Err(BoundaryError::FrameTooLarge {
                size,
                limit: MAX_FRAME_SIZE,
            });
        }

        let mut payload = vec![0u8; size];
        self.inner.read_exact(&mut payload).map_err(closed_or_io)?;
        Ok(payload)
    }
}

fn closed_or_io(err: std::io::Error) -> BoundaryError {
    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => {
            BoundaryError::Closed
        }
        _ => BoundaryError::Io(err),
    }
}

/// Frames over an in-process channel
pub struct ChannelWriter(pub flume::Sender<Vec<u8>>);

impl FrameWriter for ChannelWriter {
    fn send(&mut self, payload: Vec<u8>) -> Result<(), BoundaryError> {
        self.0.send(payload).map_err(|_| BoundaryError::Closed)
    }
}

pub struct ChannelReader(pub flume::Receiver<Vec<u8>>);

impl FrameReader for ChannelReader {
    fn recv(&mut self) -> Result<Vec<u8>, BoundaryError> {
        self.0.recv().map_err(|_| BoundaryError::Closed)
    }
}

/// Connected pair of in-process frame channels
pub fn channel_pair() -> ((ChannelWriter, ChannelReader), (ChannelWriter, ChannelReader)) {
    let (a_tx, a_rx) = flume::unbounded();
    let (b_tx, b_rx) = flume::unbounded();
    ((ChannelWriter(a_tx), ChannelReader(b_rx)), (ChannelWriter(b_tx), ChannelReader(a_rx)))
}
