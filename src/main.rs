//! sbg - command line shell around the sandbox debugger session.
//!
//! Connects to a running debug server, attaches to the named sandbox and
//! drives the interrupt loop until the server ends the session.

use anyhow::Context;
use clap::Parser;
use log::info;
use std::time::Duration;

use sandbug::session::{AttachParams, DebugSession, EventHook, StopReason};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Debug server host.
    #[clap(long, default_value = "127.0.0.1", env = "SBG_HOST")]
    host: String,

    /// Debug server port.
    #[clap(long, default_value_t = 2040, env = "SBG_PORT")]
    port: u16,

    /// User owning the attach target.
    #[clap(long, env = "SBG_USER")]
    user: String,

    /// Sandbox name to attach into.
    #[clap(long, env = "SBG_SANDBOX")]
    sandbox: String,

    /// Stop at the start of the first incoming request.
    #[clap(long)]
    stop_on_entry: bool,

    /// Socket read timeout in seconds (0 disables).
    #[clap(long, default_value_t = 0)]
    timeout: u64,
}

/// Shell hook: report lifecycle events to the user.
struct ConsoleHook;

impl EventHook for ConsoleHook {
    fn on_initialized(&mut self) {
        info!(target: "shell", "session initialized");
    }

    fn on_stopped(&mut self, reason: StopReason) {
        println!("stopped ({reason})");
    }

    fn on_terminated(&mut self) {
        println!("session terminated");
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let params = AttachParams {
        host: args.host,
        port: args.port,
        user: args.user,
        sandbox: args.sandbox,
        stop_on_entry: args.stop_on_entry,
        read_timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
    };

    let mut session = DebugSession::connect(&params, ConsoleHook)
        .with_context(|| format!("connect {}:{}", params.host, params.port))?;
    session.initialize();
    session.run().context("debug session failed")?;
    Ok(())
}
