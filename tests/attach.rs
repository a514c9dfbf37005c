//! End-to-end attach scenario against a fake debug server on loopback TCP.

use serial_test::serial;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sandbug::protocol::{factory, Command, InterruptType, SandboxInfo};
use sandbug::session::{AttachParams, DebugSession, EventHook, StopReason};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct SharedHook {
    events: Arc<Mutex<Vec<String>>>,
}

impl SharedHook {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl EventHook for SharedHook {
    fn on_initialized(&mut self) {
        self.events.lock().unwrap().push("initialized".to_string());
    }

    fn on_stopped(&mut self, reason: StopReason) {
        self.events.lock().unwrap().push(format!("stopped:{reason}"));
    }

    fn on_terminated(&mut self) {
        self.events.lock().unwrap().push("terminated".to_string());
    }
}

/// Server side of the wire: accumulate bytes until one record decodes.
struct FakeServer {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl FakeServer {
    fn new(stream: TcpStream) -> Self {
        stream.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
        Self {
            stream,
            buf: vec![],
        }
    }

    fn send(&mut self, cmd: &Command) {
        self.stream.write_all(&cmd.to_bytes().unwrap()).unwrap();
        self.stream.flush().unwrap();
    }

    fn recv(&mut self) -> Command {
        loop {
            match factory::create(&self.buf) {
                Ok((cmd, used)) => {
                    self.buf.drain(..used);
                    return cmd;
                }
                Err(err) if err.is_incomplete() => {
                    let mut chunk = [0u8; 256];
                    let n = self.stream.read(&mut chunk).expect("server read");
                    assert_ne!(n, 0, "client closed before expected record");
                    self.buf.extend_from_slice(&chunk[..n]);
                }
                Err(err) => panic!("client sent malformed record: {err}"),
            }
        }
    }
}

fn attach_params(port: u16, stop_on_entry: bool) -> AttachParams {
    AttachParams {
        host: "127.0.0.1".to_string(),
        port,
        user: "alice".to_string(),
        sandbox: "dev".to_string(),
        stop_on_entry,
        read_timeout: Some(READ_TIMEOUT),
    }
}

#[test]
#[serial]
fn test_full_attach_session() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut srv = FakeServer::new(stream);

        srv.send(&Command::Interrupt {
            interrupt_type: InterruptType::SessionStarted,
        });

        let attach = srv.recv();
        match &attach {
            Command::Machine { verb, sandboxes, .. } => {
                assert_eq!(verb, "attach");
                assert_eq!(sandboxes, &[SandboxInfo::new("alice", "dev")]);
            }
            other => panic!("expected attach, got {other:?}"),
        }
        srv.send(&Command::Machine {
            verb: "attach".to_string(),
            sandboxes: vec![],
            succeed: true,
        });

        match srv.recv() {
            Command::Break { verb, breakpoints } => {
                assert_eq!(verb, "update");
                assert_eq!(breakpoints.len(), 1);
            }
            other => panic!("expected break update, got {other:?}"),
        }

        srv.send(&Command::Interrupt {
            interrupt_type: InterruptType::RequestStarted,
        });
        assert_eq!(srv.recv(), Command::Step);

        srv.send(&Command::Interrupt {
            interrupt_type: InterruptType::SessionEnded,
        });
    });

    let hook = SharedHook::default();
    let mut session =
        DebugSession::connect(&attach_params(port, true), hook.clone()).expect("connect");
    session.initialize();
    session.run().expect("orderly session end");

    server.join().unwrap();
    assert_eq!(
        hook.events(),
        vec!["initialized", "stopped:entry", "terminated"]
    );
}

#[test]
#[serial]
fn test_server_drop_terminates_session() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        // Drop the connection without a SessionEnded interrupt.
        drop(stream);
    });

    let hook = SharedHook::default();
    let mut session =
        DebugSession::connect(&attach_params(port, false), hook.clone()).expect("connect");
    session.run().expect("close tears the session down cleanly");

    server.join().unwrap();
    assert_eq!(hook.events(), vec!["terminated"]);
}
