//! Command factory: classifies a raw record by its leading type tag and
//! produces the matching [`Command`] variant.

use crate::protocol::codec::{BufferReader, CodecError};
use crate::protocol::command::{Command, CommandType};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A forward-incompatible or ignorable server message. Not fatal to the
    /// connection, the session logs it and keeps listening.
    #[error("unknown command tag {0:#04x}")]
    UnknownCommand(u8),
}

impl DecodeError {
    /// True when the buffer simply ends before the record does, so the
    /// caller should read more bytes and retry with the same prefix.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeError::Codec(CodecError::Truncated))
    }
}

/// Decode one complete record from the front of `buf`.
///
/// On success returns the command and the number of bytes it occupied, so a
/// stream accumulator can advance past it. The records are length-implicit,
/// the consumed size is only known after a full decode.
pub fn create(buf: &[u8]) -> Result<(Command, usize), DecodeError> {
    let mut reader = BufferReader::new(buf);
    let tag = reader.read_u8()?;
    let tag = CommandType::from_repr(tag).ok_or(DecodeError::UnknownCommand(tag))?;
    let command = Command::read_payload(tag, &mut reader)?;
    Ok((command, reader.position()))
}
