//! TCP sink: writes each record's formatted bytes to a connected stream.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;

use crate::error::{LoglyError, Result};
use crate::record::Record;
use crate::sink::Sink;

/// Writes formatted bytes directly to a TCP stream. Does not add a
/// trailing newline; framing is the formatter's responsibility. Resolved
/// and connected once at construction; a write failure surfaces as
/// [`LoglyError::SystemError`] with no automatic reconnect, leaving it to
/// the caller to decide whether to rebuild the sink.
pub struct TcpSink {
    stream: Mutex<TcpStream>,
}

impl TcpSink {
    /// Resolves `host:port` and connects.
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
        let stream = TcpStream::connect(addr)?;
        Ok(TcpSink {
            stream: Mutex::new(stream),
        })
    }
}

impl Sink for TcpSink {
    fn emit(&self, _record: &Record<'_>, formatted: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock().expect("tcp sink mutex poisoned");
        stream.write_all(formatted)?;
        Ok(())
    }
}
