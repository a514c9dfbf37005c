use crate::protocol::{CodecError, CommandType, DecodeError};
use crate::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- recoverable frame errors ----------------------------------
    #[error("malformed frame: {0}")]
    Codec(#[from] CodecError),
    #[error("unknown command tag {0:#04x}")]
    UnknownCommand(u8),
    #[error("no transition for {command} in state {state}")]
    ProtocolState {
        state: SessionState,
        command: CommandType,
    },

    // --------------------------------- session-fatal errors --------------------------------------
    #[error("connection: {0}")]
    Connection(#[from] std::io::Error),
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Codec(e) => Error::Codec(e),
            DecodeError::UnknownCommand(tag) => Error::UnknownCommand(tag),
        }
    }
}

impl Error {
    /// Return a hint to the session loop - keep listening after this error or
    /// tear the whole session down.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Codec(_) => false,
            Error::UnknownCommand(_) => false,
            Error::ProtocolState { .. } => false,

            // currently fatal errors
            Error::Connection(_) => true,
        }
    }
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(target: "session", "{:#}", e);
                None
            }
        }
    };
}
