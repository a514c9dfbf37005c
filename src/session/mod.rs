//! Debug session: owns the connection, the attach/interrupt state machine,
//! the breakpoint table and the variable handle registry.
//!
//! The server protocol is interrupt-driven. The session never polls: every
//! outbound command is a reaction to a specific inbound command, consumed
//! from a single-threaded read loop in arrival order.

pub mod breakpoints;
pub mod error;
pub mod handles;
pub mod transport;

use bytes::BytesMut;
use std::path::Path;
use std::time::Duration;
use strum_macros::Display;

use crate::protocol::{
    factory, BindState, BreakPointInfo, BreakState, Command, InterruptType, SandboxInfo, SignalType,
};
use breakpoints::{BreakpointTable, SourceBreakpoint};
pub use error::Error;
use handles::HandleRegistry;
use transport::{TcpTransport, Transport};

const ATTACH_VERB: &str = "attach";
const UPDATE_VERB: &str = "update";

/// Session lifecycle. `attached` is encoded in the state itself: reaching
/// [`SessionState::Attached`] is the one false→true transition, and the only
/// way back is connection teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Disconnected,
    /// The TCP connect itself is synchronous: [`DebugSession::connect`]
    /// returns an already-connected session, so a live session is never
    /// observed in this state.
    Connecting,
    AwaitingSessionStart,
    Attaching,
    Attached,
    Listening,
}

/// Why execution stopped, as reported to the IDE shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StopReason {
    #[strum(serialize = "entry")]
    Entry,
    #[strum(serialize = "breakpoint")]
    Breakpoint,
}

/// Seam to the surrounding IDE shell.
pub trait EventHook {
    fn on_initialized(&mut self);
    fn on_stopped(&mut self, reason: StopReason);
    fn on_terminated(&mut self);
}

/// Caller-supplied attach parameters.
#[derive(Debug, Clone)]
pub struct AttachParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub sandbox: String,
    pub stop_on_entry: bool,
    pub read_timeout: Option<Duration>,
}

/// A scope handle surfaced to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub name: String,
    pub variables_reference: i64,
}

/// One child entry of a paged variable structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub name: String,
    pub value: String,
}

pub struct DebugSession<T: Transport, H: EventHook> {
    transport: T,
    hook: H,
    state: SessionState,
    /// One-shot pause latch: consumed by rewriting the next idle Signal
    /// reply to SignalBreak, then cleared.
    need_interrupt: bool,
    terminated: bool,
    sandbox: SandboxInfo,
    stop_on_entry: bool,
    /// Accumulator for inbound bytes. A record can span several reads.
    inbox: BytesMut,
    breakpoints: BreakpointTable,
    handles: HandleRegistry,
}

impl<H: EventHook> DebugSession<TcpTransport, H> {
    /// Connect to the server and prepare a session awaiting its first
    /// interrupt.
    pub fn connect(params: &AttachParams, hook: H) -> Result<Self, Error> {
        log::info!(target: "session", "connecting to {}:{}", params.host, params.port);
        let transport = TcpTransport::connect(&params.host, params.port, params.read_timeout)?;
        if let Some(peer) = transport.peer_addr() {
            log::info!(target: "session", "connected to {peer}");
        }
        Ok(Self::new(transport, params, hook))
    }
}

impl<T: Transport, H: EventHook> DebugSession<T, H> {
    /// Wrap an already-connected transport.
    pub fn new(transport: T, params: &AttachParams, hook: H) -> Self {
        Self {
            transport,
            hook,
            state: SessionState::AwaitingSessionStart,
            need_interrupt: false,
            terminated: false,
            sandbox: SandboxInfo::new(params.user.clone(), params.sandbox.clone()),
            stop_on_entry: params.stop_on_entry,
            inbox: BytesMut::new(),
            breakpoints: BreakpointTable::new(),
            handles: HandleRegistry::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    // ------------------------------- upward interface --------------------------------------------

    pub fn initialize(&mut self) {
        self.hook.on_initialized();
    }

    /// Replace the breakpoint entry for `file` and echo the stored
    /// descriptors back. No source-line validation is performed.
    pub fn set_breakpoints(
        &mut self,
        file: &Path,
        breakpoints: Vec<SourceBreakpoint>,
    ) -> Vec<SourceBreakpoint> {
        self.breakpoints.set(file, breakpoints).to_vec()
    }

    /// Arm the pause latch. The pause is delivered on the next idle Signal
    /// exchange, there is no dedicated pause command on the wire.
    pub fn pause(&mut self) {
        self.need_interrupt = true;
    }

    pub fn continue_request(&mut self) {
        self.reactive_send(Command::Continue);
    }

    pub fn step_request(&mut self) {
        self.reactive_send(Command::Step);
    }

    /// Placeholder contract: expression evaluation is structurally wired but
    /// not connected to the live server.
    pub fn evaluate(&self, expression: &str, _context: Option<&str>) -> String {
        format!("{expression} = <not available>")
    }

    /// Allocate stable handles for the top-level scopes.
    pub fn scopes(&mut self) -> Vec<Scope> {
        ["Locals", "Globals"]
            .iter()
            .map(|name| Scope {
                name: name.to_string(),
                variables_reference: self.handles.create(&format!("scope:{name}")),
            })
            .collect()
    }

    /// Placeholder contract: a fixed illustrative child set per handle, not
    /// a live variable inspector.
    pub fn variables(&mut self, reference: i64) -> Vec<VariableEntry> {
        let Some(key) = self.handles.get(reference) else {
            return vec![];
        };
        vec![
            VariableEntry {
                name: "request".to_string(),
                value: format!("<{key}>"),
            },
            VariableEntry {
                name: "session".to_string(),
                value: self.sandbox.sandbox.clone(),
            },
        ]
    }

    /// Explicit close: tear the connection down and report `terminated`
    /// exactly once. Any accumulated inbound bytes are discarded.
    pub fn disconnect(&mut self) {
        self.teardown();
    }

    // ------------------------------- read loop ----------------------------------------------------

    /// Drive the session until the connection ends. Returns `Ok` on an
    /// orderly end (SessionEnded or explicit disconnect), an error on
    /// socket-level failure. Either way `terminated` has been reported.
    pub fn run(&mut self) -> Result<(), Error> {
        while self.state != SessionState::Disconnected {
            let read = match self.transport.read_chunk(&mut self.inbox) {
                Ok(n) => n,
                Err(err) => {
                    log::error!(target: "session", "read failed: {err:#}");
                    self.teardown();
                    return Err(err);
                }
            };
            if read == 0 {
                // Orderly end: the server closes the socket when the
                // debugged process goes away.
                log::info!(target: "session", "server closed the connection");
                self.teardown();
                return Ok(());
            }
            if let Err(err) = self.process_inbox() {
                self.teardown();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Decode and handle every complete record currently accumulated.
    /// Recoverable errors are consumed here and never escape; only
    /// session-fatal ones propagate to the caller.
    fn process_inbox(&mut self) -> Result<(), Error> {
        while !self.inbox.is_empty() && self.state != SessionState::Disconnected {
            match factory::create(&self.inbox) {
                Ok((command, used)) => {
                    let _ = self.inbox.split_to(used);
                    log::debug!(target: "session", "<- {command:?}");
                    if let Err(err) = self.handle_command(command) {
                        if err.is_fatal() {
                            return Err(err);
                        }
                        log::warn!(target: "session", "{err:#}");
                    }
                }
                Err(err) if err.is_incomplete() => break,
                Err(err) => {
                    let err = Error::from(err);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    // Corrupt or unknown record. The encoding is
                    // length-implicit, there is no way to resync past it,
                    // so the accumulated buffer is dropped whole. The
                    // connection stays open.
                    log::warn!(target: "session", "dropping inbound buffer: {err:#}");
                    self.inbox.clear();
                }
            }
        }
        Ok(())
    }

    /// The transition table. Total over the inbound alphabet: pairs without
    /// a defined transition log and change nothing, they must not tear the
    /// session down.
    fn handle_command(&mut self, command: Command) -> Result<(), Error> {
        use Command::*;
        use SessionState::*;

        match (self.state, command) {
            (
                AwaitingSessionStart,
                Interrupt {
                    interrupt_type: InterruptType::SessionStarted,
                },
            ) => {
                self.send(&Machine {
                    verb: ATTACH_VERB.to_string(),
                    sandboxes: vec![self.sandbox.clone()],
                    succeed: false,
                })?;
                self.state = Attaching;
            }
            (
                AwaitingSessionStart,
                Interrupt {
                    interrupt_type: InterruptType::SessionEnded,
                },
            ) => {
                self.teardown();
            }
            (Attaching, Machine { succeed: true, .. }) => {
                self.state = Attached;
                log::info!(target: "session", "attached to sandbox `{}`", self.sandbox.sandbox);
                self.send(&Break {
                    verb: UPDATE_VERB.to_string(),
                    breakpoints: vec![BreakPointInfo {
                        break_state: BreakState::Always,
                        bind_state: BindState::KnownToBeValid,
                        interrupt_type: InterruptType::RequestStarted,
                    }],
                })?;
            }
            (
                Attached | Listening,
                Interrupt {
                    interrupt_type: interrupt_type @ (InterruptType::RequestStarted
                    | InterruptType::BreakPointReached),
                },
            ) => {
                match interrupt_type {
                    InterruptType::RequestStarted if self.stop_on_entry => {
                        self.hook.on_stopped(StopReason::Entry)
                    }
                    InterruptType::BreakPointReached => {
                        self.hook.on_stopped(StopReason::Breakpoint)
                    }
                    _ => {}
                }
                self.send(&Step)?;
                self.state = Listening;
            }
            (Listening, Break { .. }) => {
                self.send(&Continue)?;
            }
            (
                Listening,
                Signal {
                    signal: SignalType::SignalNone,
                },
            ) => {
                let signal = if self.need_interrupt {
                    self.need_interrupt = false;
                    SignalType::SignalBreak
                } else {
                    SignalType::SignalNone
                };
                self.send(&Signal { signal })?;
            }
            (state, command) => {
                let err = Error::ProtocolState {
                    state,
                    command: command.command_type(),
                };
                log::warn!(target: "session", "{err:#}");
            }
        }
        Ok(())
    }

    // ------------------------------- outbound -----------------------------------------------------

    fn send(&mut self, command: &Command) -> Result<(), Error> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        log::debug!(target: "session", "-> {command:?}");
        let record = command.to_bytes()?;
        self.transport.write_record(&record)
    }

    /// Shell-initiated resume. Valid only while the session is listening,
    /// an outbound command must always answer a received one.
    fn reactive_send(&mut self, command: Command) {
        if self.state != SessionState::Listening {
            log::warn!(
                target: "session",
                "ignore {} request in state {}", command.command_type(), self.state
            );
            return;
        }
        crate::weak_error!(self.send(&command));
    }

    fn teardown(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.state = SessionState::Disconnected;
        self.inbox.clear();
        self.transport.shutdown();
        self.hook.on_terminated();
    }
}
