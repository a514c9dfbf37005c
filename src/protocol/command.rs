//! Typed model of the server's command alphabet.
//!
//! Commands are immutable value objects: inbound ones are produced by the
//! factory from decoded bytes, outbound ones are built by session logic and
//! serialized through [`BufferWriter`]. Both paths yield value-equal objects
//! for the same logical content.

use crate::protocol::codec::{BufferReader, BufferWriter, CodecError};
use strum_macros::{Display, FromRepr};

/// Leading type tag of every wire record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum CommandType {
    Interrupt = 1,
    Machine = 2,
    Break = 3,
    Continue = 4,
    Signal = 5,
    Step = 6,
}

/// Lifecycle event carried by an [`Command::Interrupt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum InterruptType {
    SessionStarted = 1,
    SessionEnded = 2,
    RequestStarted = 3,
    BreakPointReached = 4,
}

/// Payload of the idle-channel [`Command::Signal`] exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum SignalType {
    SignalNone = 0,
    SignalBreak = 1,
}

/// Firing mode of a server-side breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum BreakState {
    Always = 1,
    Once = 2,
    Disabled = 3,
}

/// Whether the server confirmed the breakpoint location as resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum BindState {
    Unknown = 0,
    KnownToBeValid = 1,
    KnownToBeInvalid = 2,
}

/// Attach target: a (user, sandbox) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxInfo {
    pub user: String,
    pub sandbox: String,
}

impl SandboxInfo {
    pub fn new(user: impl Into<String>, sandbox: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            sandbox: sandbox.into(),
        }
    }

    fn serialize(&self, writer: &mut BufferWriter) -> Result<(), CodecError> {
        let mut nested = BufferWriter::new();
        nested.write_string(&self.user)?;
        nested.write_string(&self.sandbox)?;
        writer.write_blob(&nested.into_bytes())
    }

    fn read(reader: &mut BufferReader) -> Result<Self, CodecError> {
        let blob = reader.read_blob()?;
        let mut nested = BufferReader::new(blob);
        Ok(Self {
            user: nested.read_string()?,
            sandbox: nested.read_string()?,
        })
    }
}

/// Server-side breakpoint descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakPointInfo {
    pub break_state: BreakState,
    pub bind_state: BindState,
    pub interrupt_type: InterruptType,
}

impl BreakPointInfo {
    fn serialize(&self, writer: &mut BufferWriter) -> Result<(), CodecError> {
        let mut nested = BufferWriter::new();
        nested.write_u8(self.break_state as u8);
        nested.write_u8(self.bind_state as u8);
        nested.write_u8(self.interrupt_type as u8);
        writer.write_blob(&nested.into_bytes())
    }

    fn read(reader: &mut BufferReader) -> Result<Self, CodecError> {
        let blob = reader.read_blob()?;
        let mut nested = BufferReader::new(blob);
        Ok(Self {
            break_state: read_enum(&mut nested, "break state", BreakState::from_repr)?,
            bind_state: read_enum(&mut nested, "bind state", BindState::from_repr)?,
            interrupt_type: read_enum(&mut nested, "interrupt type", InterruptType::from_repr)?,
        })
    }
}

fn read_enum<T>(
    reader: &mut BufferReader,
    field: &'static str,
    from_repr: fn(u8) -> Option<T>,
) -> Result<T, CodecError> {
    let value = reader.read_u8()?;
    from_repr(value).ok_or(CodecError::InvalidValue {
        field,
        value: value as u64,
    })
}

/// The closed set of wire commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Asynchronous lifecycle notification from the server.
    Interrupt { interrupt_type: InterruptType },
    /// Sandbox-machine operation (attach handshake and its reply).
    Machine {
        verb: String,
        sandboxes: Vec<SandboxInfo>,
        succeed: bool,
    },
    /// Breakpoint-set update and its reply.
    Break {
        verb: String,
        breakpoints: Vec<BreakPointInfo>,
    },
    /// Resume execution after a breakpoint reply.
    Continue,
    /// Idle-channel exchange, optionally carrying a pause request.
    Signal { signal: SignalType },
    /// Advance execution to the next interruptible point.
    Step,
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Interrupt { .. } => CommandType::Interrupt,
            Command::Machine { .. } => CommandType::Machine,
            Command::Break { .. } => CommandType::Break,
            Command::Continue => CommandType::Continue,
            Command::Signal { .. } => CommandType::Signal,
            Command::Step => CommandType::Step,
        }
    }

    /// Serialize into a complete wire record (tag byte plus payload).
    pub fn serialize(&self, writer: &mut BufferWriter) -> Result<(), CodecError> {
        writer.write_u8(self.command_type() as u8);
        match self {
            Command::Interrupt { interrupt_type } => {
                writer.write_u8(*interrupt_type as u8);
            }
            Command::Machine {
                verb,
                sandboxes,
                succeed,
            } => {
                writer.write_string(verb)?;
                writer.write_u16(sandboxes.len() as u16);
                for sb in sandboxes {
                    sb.serialize(writer)?;
                }
                writer.write_bool(*succeed);
            }
            Command::Break { verb, breakpoints } => {
                writer.write_string(verb)?;
                writer.write_u16(breakpoints.len() as u16);
                for bp in breakpoints {
                    bp.serialize(writer)?;
                }
            }
            Command::Continue | Command::Step => {}
            Command::Signal { signal } => {
                writer.write_u8(*signal as u8);
            }
        }
        Ok(())
    }

    /// Convenience wrapper around [`Command::serialize`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = BufferWriter::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decode the payload that follows an already-consumed type tag.
    pub(crate) fn read_payload(
        tag: CommandType,
        reader: &mut BufferReader,
    ) -> Result<Self, CodecError> {
        let cmd = match tag {
            CommandType::Interrupt => Command::Interrupt {
                interrupt_type: read_enum(reader, "interrupt type", InterruptType::from_repr)?,
            },
            CommandType::Machine => {
                let verb = reader.read_string()?;
                let count = reader.read_u16()?;
                let mut sandboxes = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    sandboxes.push(SandboxInfo::read(reader)?);
                }
                Command::Machine {
                    verb,
                    sandboxes,
                    succeed: reader.read_bool()?,
                }
            }
            CommandType::Break => {
                let verb = reader.read_string()?;
                let count = reader.read_u16()?;
                let mut breakpoints = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    breakpoints.push(BreakPointInfo::read(reader)?);
                }
                Command::Break { verb, breakpoints }
            }
            CommandType::Continue => Command::Continue,
            CommandType::Signal => Command::Signal {
                signal: read_enum(reader, "signal", SignalType::from_repr)?,
            },
            CommandType::Step => Command::Step,
        };
        Ok(cmd)
    }
}
