//! Wire protocol of the remote sandbox debugger: binary codec, typed command
//! model and the tag-dispatching command factory.

pub mod codec;
pub mod command;
pub mod factory;

pub use codec::{BufferReader, BufferWriter, CodecError};
pub use command::{
    BindState, BreakPointInfo, BreakState, Command, CommandType, InterruptType, SandboxInfo,
    SignalType,
};
pub use factory::DecodeError;
