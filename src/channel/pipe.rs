//! Unidirectional OS pipe backend.

use std::io::{PipeReader, PipeWriter};

use super::TransportKind;
use super::stream::{FramedReader, FramedWriter};
use crate::error::ChannelError;

pub type PipeSender = FramedWriter<PipeWriter>;
pub type PipeReceiver = FramedReader<PipeReader>;

/// Create an anonymous pipe and wrap both ends in packet framing.
pub fn pipe() -> Result<(PipeSender, PipeReceiver), ChannelError> {
    let (reader, writer) = std::io::pipe()?;
    Ok((
        FramedWriter::new(writer, TransportKind::Pipe),
        FramedReader::new(reader, TransportKind::Pipe),
    ))
}
