//! Datagram transport for the management channel.
//!
//! The driver writes whole packets without waiting; reads are driven by
//! the runner. The kernel control channel is reached through a datagram
//! socket that relays packets one to one.

use std::io;
use std::path::Path;
use tokio::net::UnixDatagram;
use tracing::debug;

/// Outbound side of the management channel
pub trait MgmtSocket: Send + Sync + std::fmt::Debug {
    /// Write one complete packet without blocking
    fn send(&self, packet: &[u8]) -> io::Result<()>;
}

impl MgmtSocket for UnixDatagram {
    fn send(&self, packet: &[u8]) -> io::Result<()> {
        let written = self.try_send(packet)?;
        if written != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write ({} of {} bytes)", written, packet.len()),
            ));
        }
        Ok(())
    }
}

/// Connect an unbound datagram socket to the relay at `path`
pub fn connect_datagram(path: impl AsRef<Path>) -> io::Result<UnixDatagram> {
    let socket = UnixDatagram::unbound()?;
    socket.connect(path.as_ref())?;
    debug!("Connected management socket to {}", path.as_ref().display());
    Ok(socket)
}
