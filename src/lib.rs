//! Sandbug - a client for the remote sandbox debugger wire protocol.
//!
//! [`protocol`] holds the binary codec, the typed command model and the
//! tag-dispatching factory. [`session`] drives the attach/interrupt state
//! machine over a socket and exposes the operations an IDE shell consumes.

pub mod protocol;
pub mod session;
