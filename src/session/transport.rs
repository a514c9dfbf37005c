//! Byte-stream transport under the session.
//!
//! The session owns record framing (the protocol is length-implicit, so a
//! record boundary is only known after a successful decode). The transport
//! only moves raw chunks, which keeps the session testable against an
//! in-memory fake.

use bytes::BytesMut;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::session::error::Error;

const READ_CHUNK: usize = 4096;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Trait for session byte transport (TCP or an in-memory test double).
pub trait Transport {
    /// Read one chunk of bytes, appending them to `buf`. Returns the number
    /// of bytes read; `Ok(0)` means the peer closed the stream.
    fn read_chunk(&mut self, buf: &mut BytesMut) -> Result<usize, Error>;

    /// Write a complete serialized record.
    fn write_record(&mut self, record: &[u8]) -> Result<(), Error>;

    /// Close the underlying stream. Idempotent.
    fn shutdown(&mut self);
}

/// TCP transport for a live server connection.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `(host, port)` with a bounded connect timeout and an
    /// optional read timeout (`None` blocks indefinitely).
    pub fn connect(host: &str, port: u16, read_timeout: Option<Duration>) -> Result<Self, Error> {
        let addr = resolve(host, port)?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(read_timeout)?;
        Ok(Self { stream })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, Error> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            Error::Connection(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot resolve {host}:{port}"),
            ))
        })
}

impl Transport for TcpTransport {
    fn read_chunk(&mut self, buf: &mut BytesMut) -> Result<usize, Error> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut chunk)?;
        buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn write_record(&mut self, record: &[u8]) -> Result<(), Error> {
        self.stream.write_all(record)?;
        self.stream.flush()?;
        Ok(())
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
