use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;
use anyhow::{Context, Result};
use log::debug;

/// A NetFlow v9 export never exceeds one UDP payload.
pub const MAX_DATAGRAM: usize = 65_536;

/// How often a blocked receive wakes up to observe the stop flag.
const POLL: Duration = Duration::from_secs(1);

pub fn bind(port: u16) -> Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
        .with_context(|| format!("cannot bind UDP port {}", port))?;
    socket.set_read_timeout(Some(POLL))
        .context("cannot arm the receive timeout")?;
    Ok(socket)
}

pub enum Received {
    Datagram(usize, SocketAddr),
    /// Nothing arrived within the poll interval; the caller re-checks its
    /// stop flag and calls again.
    Idle,
}

/// One blocking receive. Transient conditions surface as `Idle`; anything
/// else is a permanent socket failure and ends the probe.
pub fn receive_one(socket: &UdpSocket, buf: &mut [u8]) -> io::Result<Received> {
    match socket.recv_from(buf) {
        Ok((len, from)) => Ok(Received::Datagram(len, from)),
        Err(e) => match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Ok(Received::Idle),
            ErrorKind::Interrupted => {
                debug!("receive interrupted, retrying");
                Ok(Received::Idle)
            }
            _ => Err(e),
        },
    }
}
