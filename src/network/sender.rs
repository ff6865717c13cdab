//! Video publisher
//!
//! One UDP socket serves both control and video. A control thread answers
//! subscriptions, announces the source on the discovery address and expires
//! silent subscribers. `send_frame` runs on the caller's thread: encode,
//! chunk, send to every live subscriber. Nothing is buffered.

use dashmap::DashMap;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::codec::JpegEncoder;
use crate::config::NetworkConfig;
use crate::error::NetworkError;
use crate::network::udp::{create_socket, is_timeout, SocketOptions, UdpSocket};
use crate::protocol::{chunk_frame, Packet, MAX_DATAGRAM_SIZE};
use crate::sync::{spawn_worker, CancelToken, Worker};
use crate::video::frame::{Frame, PixelFormat};

/// Publisher statistics
#[derive(Debug, Clone, Default)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub subscribers: usize,
}

#[derive(Default)]
struct Counters {
    frames_sent: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_errors: AtomicU64,
}

/// Publishes frames under a source name
pub struct VideoSender {
    name: String,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    /// Subscriber address -> last subscribe time
    subscribers: Arc<DashMap<SocketAddr, Instant>>,
    encoder: JpegEncoder,
    frame_seq: u32,
    max_packet_size: usize,
    counters: Counters,
    cancel: CancelToken,
    worker: Option<Worker>,
    read_timeout: Duration,
}

impl VideoSender {
    /// Bind the publisher socket and start announcing `name`
    pub fn start(name: &str, config: &NetworkConfig) -> Result<Self, NetworkError> {
        let socket = create_socket(
            SocketAddrV4::new(config.bind_address, config.video_port),
            &SocketOptions {
                interface: Some(config.bind_address),
                send_buffer_size: Some(config.send_buffer_size),
                read_timeout: Some(config.read_timeout()),
                ..Default::default()
            },
        )
        .map_err(|e| NetworkError::Init(format!("publisher socket: {}", e)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| NetworkError::Init(e.to_string()))?;

        let announce = Packet::Announce {
            name: name.to_string(),
            port: local_addr.port(),
        }
        .encode()?;

        let socket = Arc::new(socket);
        let subscribers: Arc<DashMap<SocketAddr, Instant>> = Arc::new(DashMap::new());
        let cancel = CancelToken::new();

        let control = ControlLoop {
            name: name.to_string(),
            socket: socket.clone(),
            subscribers: subscribers.clone(),
            cancel: cancel.clone(),
            announce,
            discovery_addr: SocketAddr::V4(config.discovery_addr),
            announce_interval: config.announce_interval(),
            subscriber_timeout: config.subscriber_timeout(),
        };
        let worker = spawn_worker(format!("publish-{}", name), move || control.run())
            .map_err(|e| NetworkError::Init(e.to_string()))?;

        tracing::info!("Publishing '{}' on {}", name, local_addr);

        Ok(Self {
            name: name.to_string(),
            socket,
            local_addr,
            subscribers,
            encoder: JpegEncoder::new(config.jpeg_quality),
            frame_seq: 0,
            max_packet_size: config.max_packet_size,
            counters: Counters::default(),
            cancel,
            worker: Some(worker),
            read_timeout: config.read_timeout(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Encode and send one frame to every subscriber
    ///
    /// Returns the number of subscribers the frame went to. With no
    /// subscribers the frame is not encoded at all.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<usize, NetworkError> {
        let targets: Vec<SocketAddr> = self.subscribers.iter().map(|entry| *entry.key()).collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let rgb = if frame.format() == PixelFormat::Rgb8 {
            None
        } else {
            Some(frame.to_format(PixelFormat::Rgb8))
        };
        let encoded = self.encoder.encode(rgb.as_ref().unwrap_or(frame))?;

        let seq = self.frame_seq;
        self.frame_seq = self.frame_seq.wrapping_add(1);

        let packets = chunk_frame(
            seq,
            frame.width(),
            frame.height(),
            frame.timestamp_us(),
            &encoded,
            self.max_packet_size,
        )?;
        let datagrams = packets
            .iter()
            .map(Packet::encode)
            .collect::<Result<Vec<_>, _>>()?;

        let mut delivered = 0;
        for target in &targets {
            let mut ok = true;
            for datagram in &datagrams {
                match self.socket.send_to(datagram, target) {
                    Ok(sent) => {
                        self.counters.packets_sent.fetch_add(1, Ordering::Relaxed);
                        self.counters.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!("Send to {} failed: {}", target, e);
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                delivered += 1;
            }
        }

        self.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(delivered)
    }

    /// Get statistics
    pub fn stats(&self) -> SenderStats {
        SenderStats {
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
            packets_sent: self.counters.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.counters.send_errors.load(Ordering::Relaxed),
            subscribers: self.subscribers.len(),
        }
    }

    /// Stop announcing and drop all subscribers
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            worker.join_timeout(self.read_timeout * 2);
        }
        self.subscribers.clear();
    }
}

impl Drop for VideoSender {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the publisher's control thread
struct ControlLoop {
    name: String,
    socket: Arc<UdpSocket>,
    subscribers: Arc<DashMap<SocketAddr, Instant>>,
    cancel: CancelToken,
    announce: bytes::Bytes,
    discovery_addr: SocketAddr,
    announce_interval: Duration,
    subscriber_timeout: Duration,
}

impl ControlLoop {
    fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut next_announce = Instant::now();

        while !self.cancel.is_cancelled() {
            let now = Instant::now();
            if now >= next_announce {
                if let Err(e) = self.socket.send_to(&self.announce, self.discovery_addr) {
                    tracing::debug!("Announce to {} failed: {}", self.discovery_addr, e);
                }
                self.expire_subscribers(now);
                next_announce = now + self.announce_interval;
            }

            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => self.handle(&buf[..len], from),
                Err(e) if is_timeout(&e) => {}
                Err(e) => {
                    // ICMP port unreachable from a departed subscriber surfaces here on some platforms
                    tracing::debug!("Publisher receive error: {}", e);
                }
            }
        }
    }

    fn handle(&self, data: &[u8], from: SocketAddr) {
        match Packet::decode(data) {
            Ok(Packet::Subscribe { name }) if name == self.name => {
                if self.subscribers.insert(from, Instant::now()).is_none() {
                    tracing::info!("Receiver {} subscribed to '{}'", from, self.name);
                }
            }
            Ok(Packet::Unsubscribe { name }) if name == self.name => {
                if self.subscribers.remove(&from).is_some() {
                    tracing::info!("Receiver {} unsubscribed from '{}'", from, self.name);
                }
            }
            _ => {}
        }
    }

    fn expire_subscribers(&self, now: Instant) {
        let timeout = self.subscriber_timeout;
        self.subscribers.retain(|addr, last_seen| {
            let alive = now.duration_since(*last_seen) <= timeout;
            if !alive {
                tracing::info!("Receiver {} timed out", addr);
            }
            alive
        });
    }
}
