//! Header-framed packets over any byte stream (pipes and sockets).
//!
//! Capacity is whatever the OS buffers; a full buffer blocks `write`, which is the
//! backpressure. A reader consumes exactly one frame per `pop`: the fixed header, then the
//! payload length it declares.

use std::io::{self, Read, Write};

use super::{PacketReceiver, PacketSender, TransportKind};
use crate::error::{ChannelError, DecodeError};
use crate::packet::{BatchPacket, HEADER_LEN, codec};

/// Writes one frame per pushed packet.
pub struct FramedWriter<W: Write> {
    inner: W,
    kind: TransportKind,
}

impl<W: Write> FramedWriter<W> {
    pub fn new(inner: W, kind: TransportKind) -> Self {
        Self { inner, kind }
    }
}

impl<W: Write + Send> PacketSender for FramedWriter<W> {
    fn push(&mut self, packet: BatchPacket) -> Result<(), ChannelError> {
        let frame = codec::encode(&packet);
        // write_all retries partial writes and EINTR until every byte is out.
        self.inner
            .write_all(&frame)
            .and_then(|()| self.inner.flush())
            .map_err(ChannelError::from_io)
    }

    fn transport(&self) -> TransportKind {
        self.kind
    }
}

/// Reads one frame per pop.
pub struct FramedReader<R: Read> {
    inner: R,
    kind: TransportKind,
}

impl<R: Read> FramedReader<R> {
    pub fn new(inner: R, kind: TransportKind) -> Self {
        Self { inner, kind }
    }
}

/// Read until `buf` is full or the stream ends. Returns the number of bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<R: Read + Send> PacketReceiver for FramedReader<R> {
    fn pop(&mut self) -> Result<BatchPacket, ChannelError> {
        let mut header_buf = [0u8; HEADER_LEN];
        let got = read_full(&mut self.inner, &mut header_buf).map_err(ChannelError::from_io)?;
        if got == 0 {
            // Clean EOF between frames: writer went away without a terminal.
            return Err(ChannelError::Disconnected);
        }
        if got < HEADER_LEN {
            return Err(DecodeError::Truncated {
                expected: HEADER_LEN,
                actual: got,
            }
            .into());
        }

        let header = codec::decode_header(&header_buf)?;
        let mut payload = vec![0u8; header.payload_len()];
        let got = read_full(&mut self.inner, &mut payload).map_err(ChannelError::from_io)?;
        if got < payload.len() {
            return Err(DecodeError::Truncated {
                expected: HEADER_LEN + payload.len(),
                actual: HEADER_LEN + got,
            }
            .into());
        }
        Ok(codec::packet_from_parts(header, payload))
    }

    fn transport(&self) -> TransportKind {
        self.kind
    }
}
