//! UDP socket construction
//!
//! All transport and timecode sockets are built here so address reuse,
//! buffer sizes, multicast membership and read timeouts are set the same
//! way everywhere.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

pub use std::net::UdpSocket;

use crate::error::NetworkError;

/// Options applied before and after bind
#[derive(Debug, Clone, Default)]
pub struct SocketOptions {
    /// Allow several processes on one port (discovery, timecode)
    pub reuse_address: bool,
    /// Group to join after binding
    pub multicast_group: Option<Ipv4Addr>,
    /// Interface for multicast membership and outgoing multicast
    pub interface: Option<Ipv4Addr>,
    pub recv_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
    pub read_timeout: Option<Duration>,
}

/// Create and bind a UDP socket
pub fn create_socket(bind: SocketAddrV4, options: &SocketOptions) -> Result<UdpSocket, NetworkError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(format!("socket(): {}", e)))?;
    
    if options.reuse_address {
        socket
            .set_reuse_address(true)
            .map_err(|e| NetworkError::BindFailed(format!("SO_REUSEADDR: {}", e)))?;
        #[cfg(unix)]
        socket
            .set_reuse_port(true)
            .map_err(|e| NetworkError::BindFailed(format!("SO_REUSEPORT: {}", e)))?;
    }
    
    if let Some(size) = options.recv_buffer_size {
        // Kernels may clamp the size; not fatal
        if let Err(e) = socket.set_recv_buffer_size(size) {
            tracing::debug!("Failed to set receive buffer to {}: {}", size, e);
        }
    }
    if let Some(size) = options.send_buffer_size {
        if let Err(e) = socket.set_send_buffer_size(size) {
            tracing::debug!("Failed to set send buffer to {}: {}", size, e);
        }
    }
    
    socket
        .bind(&SockAddr::from(SocketAddr::V4(bind)))
        .map_err(|e| NetworkError::BindFailed(format!("{}: {}", bind, e)))?;
    
    if let Some(group) = options.multicast_group {
        let interface = options.interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket
            .join_multicast_v4(&group, &interface)
            .map_err(|e| NetworkError::BindFailed(format!("join {}: {}", group, e)))?;
    }
    
    if let Some(interface) = options.interface {
        if !interface.is_unspecified() {
            socket
                .set_multicast_if_v4(&interface)
                .map_err(|e| NetworkError::BindFailed(format!("IP_MULTICAST_IF: {}", e)))?;
        }
    }
    
    socket
        .set_read_timeout(options.read_timeout)
        .map_err(|e| NetworkError::BindFailed(format!("SO_RCVTIMEO: {}", e)))?;
    
    Ok(socket.into())
}

/// Whether a receive error only means "nothing arrived in time"
pub fn is_timeout(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
