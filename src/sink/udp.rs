//! UDP sink: sends one datagram per record, best-effort.

use std::net::{ToSocketAddrs, UdpSocket};

use crate::error::{LoglyError, Result};
use crate::record::Record;
use crate::sink::Sink;

/// Sends each record's formatted bytes as a single UDP datagram.
/// Resolved once at construction; no retry on send failure.
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    /// Resolves `host:port` and binds an ephemeral local socket to send
    /// datagrams to it.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| LoglyError::SystemError {
                message: format!("failed to resolve {host}:{port}: {e}"),
                code: None,
            })?
            .next()
            .ok_or_else(|| LoglyError::SystemError {
                message: format!("{host}:{port} resolved to no addresses"),
                code: None,
            })?;
        let bind_addr = if addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(addr)?;
        Ok(UdpSink { socket })
    }
}

impl Sink for UdpSink {
    fn emit(&self, _record: &Record<'_>, formatted: &[u8]) -> Result<()> {
        self.socket.send(formatted)?;
        Ok(())
    }
}
