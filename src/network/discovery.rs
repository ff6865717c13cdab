//! Source discovery
//!
//! Publishers periodically announce `(name, port)` to the discovery address.
//! [`SourceFinder`] listens there and keeps a table of recently heard
//! sources; entries silent for longer than the expiry are hidden.

use dashmap::DashMap;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::NetworkConfig;
use crate::error::NetworkError;
use crate::network::udp::{create_socket, is_timeout, SocketOptions};
use crate::protocol::{Packet, MAX_DATAGRAM_SIZE};
use crate::sync::{spawn_worker, CancelToken, Worker};

/// A source heard on the discovery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSource {
    pub name: String,
    /// Publisher control/video address
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
struct SourceEntry {
    addr: SocketAddr,
    last_seen: Instant,
}

/// Background listener for source announcements
pub struct SourceFinder {
    sources: Arc<DashMap<String, SourceEntry>>,
    expiry: Duration,
    cancel: CancelToken,
    worker: Option<Worker>,
    read_timeout: Duration,
}

impl SourceFinder {
    /// Bind the discovery address and start listening
    ///
    /// Failure here means the transport is unusable.
    pub fn start(config: &NetworkConfig) -> Result<Self, NetworkError> {
        let group = config.discovery_addr.ip();
        let multicast = group.is_multicast();
        let bind_ip = if multicast { config.bind_address } else { *group };

        let socket = create_socket(
            SocketAddrV4::new(bind_ip, config.discovery_addr.port()),
            &SocketOptions {
                reuse_address: true,
                multicast_group: multicast.then_some(*group),
                interface: Some(config.bind_address),
                read_timeout: Some(config.read_timeout()),
                ..Default::default()
            },
        )
        .map_err(|e| NetworkError::Init(format!("discovery listener: {}", e)))?;

        let sources: Arc<DashMap<String, SourceEntry>> = Arc::new(DashMap::new());
        let cancel = CancelToken::new();

        let table = sources.clone();
        let token = cancel.clone();
        let worker = spawn_worker("discovery", move || {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            while !token.is_cancelled() {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        if let Ok(Packet::Announce { name, port }) = Packet::decode(&buf[..len]) {
                            let addr = SocketAddr::new(from.ip(), port);
                            let previous = table.insert(
                                name.clone(),
                                SourceEntry {
                                    addr,
                                    last_seen: Instant::now(),
                                },
                            );
                            match previous {
                                None => tracing::info!("Discovered source '{}' at {}", name, addr),
                                Some(old) if old.addr != addr => {
                                    tracing::info!("Source '{}' moved to {}", name, addr)
                                }
                                _ => {}
                            }
                        }
                    }
                    Err(e) if is_timeout(&e) => {}
                    Err(e) => {
                        tracing::warn!("Discovery receive failed: {}", e);
                        token.sleep(Duration::from_millis(100));
                    }
                }
            }
        })
        .map_err(|e| NetworkError::Init(e.to_string()))?;

        tracing::info!("Listening for sources on {}", config.discovery_addr);

        Ok(Self {
            sources,
            expiry: config.source_expiry(),
            cancel,
            worker: Some(worker),
            read_timeout: config.read_timeout(),
        })
    }

    /// Currently visible sources, sorted by name
    pub fn sources(&self) -> Vec<DiscoveredSource> {
        let now = Instant::now();
        let mut found: Vec<DiscoveredSource> = self
            .sources
            .iter()
            .filter(|entry| now.duration_since(entry.last_seen) <= self.expiry)
            .map(|entry| DiscoveredSource {
                name: entry.key().clone(),
                addr: entry.addr,
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Address of a visible source
    pub fn find(&self, name: &str) -> Option<SocketAddr> {
        self.sources
            .get(name)
            .filter(|entry| entry.last_seen.elapsed() <= self.expiry)
            .map(|entry| entry.addr)
    }

    /// Poll for `name` up to `attempts` times, `interval` apart
    pub fn wait_for(&self, name: &str, attempts: u32, interval: Duration) -> Option<SocketAddr> {
        for attempt in 0..attempts.max(1) {
            if let Some(addr) = self.find(name) {
                return Some(addr);
            }
            if attempt + 1 < attempts && self.cancel.sleep(interval) {
                break;
            }
        }
        None
    }

    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            worker.join_timeout(self.read_timeout * 2);
        }
    }
}

impl Drop for SourceFinder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, UdpSocket};

    fn local_config(discovery_port: u16) -> NetworkConfig {
        NetworkConfig {
            bind_address: Ipv4Addr::LOCALHOST,
            discovery_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, discovery_port),
            read_timeout_ms: 20,
            source_expiry_ms: 300,
            ..Default::default()
        }
    }

    fn free_port() -> u16 {
        UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    #[test]
    fn test_announcement_discovered_and_expires() {
        let port = free_port();
        let finder = SourceFinder::start(&local_config(port)).unwrap();
        let announcer = UdpSocket::bind("127.0.0.1:0").unwrap();

        let packet = Packet::Announce {
            name: "Cam A".to_string(),
            port: 41234,
        }
        .encode()
        .unwrap();
        announcer.send_to(&packet, ("127.0.0.1", port)).unwrap();

        let addr = finder.wait_for("Cam A", 100, Duration::from_millis(10)).unwrap();
        assert_eq!(addr, "127.0.0.1:41234".parse::<SocketAddr>().unwrap());
        assert_eq!(finder.sources().len(), 1);

        std::thread::sleep(Duration::from_millis(400));
        assert!(finder.find("Cam A").is_none());
        assert!(finder.sources().is_empty());
    }

    #[test]
    fn test_missing_source_gives_up() {
        let finder = SourceFinder::start(&local_config(free_port())).unwrap();
        let start = Instant::now();
        assert!(finder.wait_for("nobody", 3, Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_non_announce_ignored() {
        let port = free_port();
        let finder = SourceFinder::start(&local_config(port)).unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let packet = Packet::Subscribe { name: "x".to_string() }.encode().unwrap();
        sender.send_to(&packet, ("127.0.0.1", port)).unwrap();
        sender.send_to(b"noise", ("127.0.0.1", port)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(finder.sources().is_empty());
    }
}
