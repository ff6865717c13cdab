//! Network video receiver
//!
//! [`NetworkGrabber`] subscribes to one named publisher and turns its chunk
//! stream back into frames. It implements [`FrameGrabber`], so a network
//! stream plugs into a `FrameSource` exactly like a local camera.

use std::net::{SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use crate::codec::JpegDecoder;
use crate::config::NetworkConfig;
use crate::error::{NetworkError, SourceError};
use crate::network::assembler::{AssemblerStats, FrameAssembler};
use crate::network::discovery::SourceFinder;
use crate::network::udp::{create_socket, is_timeout, SocketOptions, UdpSocket};
use crate::protocol::Packet;
use crate::video::frame::Frame;
use crate::video::source::FrameGrabber;

/// Shortest socket wait; zero would mean "block forever"
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Subscription to one publisher
pub struct NetworkGrabber {
    name: String,
    publisher: SocketAddr,
    socket: UdpSocket,
    assembler: FrameAssembler,
    decoder: JpegDecoder,
    subscribe: bytes::Bytes,
    subscribe_interval: Duration,
    last_subscribe: Option<Instant>,
    buf: Vec<u8>,
}

impl NetworkGrabber {
    /// Look `name` up through the finder and subscribe to it
    ///
    /// Polls up to `connect_attempts` times before giving up with
    /// `SourceError::NotFound`.
    pub fn connect(name: &str, finder: &SourceFinder, config: &NetworkConfig) -> Result<Self, SourceError> {
        let publisher = finder
            .wait_for(name, config.connect_attempts, config.connect_interval())
            .ok_or_else(|| SourceError::NotFound(name.to_string()))?;
        Self::subscribe_to(name, publisher, config)
    }

    /// Subscribe to a publisher at a known address
    pub fn subscribe_to(name: &str, publisher: SocketAddr, config: &NetworkConfig) -> Result<Self, SourceError> {
        let socket = create_socket(
            SocketAddrV4::new(config.bind_address, 0),
            &SocketOptions {
                recv_buffer_size: Some(config.recv_buffer_size),
                read_timeout: Some(config.read_timeout()),
                ..Default::default()
            },
        )
        .map_err(|e| SourceError::DeviceOpen(format!("{}: {}", name, e)))?;

        let subscribe = Packet::Subscribe { name: name.to_string() }
            .encode()
            .map_err(|e| SourceError::DeviceOpen(e.to_string()))?;

        let mut grabber = Self {
            name: name.to_string(),
            publisher,
            socket,
            assembler: FrameAssembler::new(),
            decoder: JpegDecoder::new(),
            subscribe,
            subscribe_interval: config.subscribe_interval(),
            last_subscribe: None,
            buf: vec![0u8; 65_536],
        };
        grabber.renew_subscription();

        tracing::info!("✓ Connected to '{}' at {}", name, publisher);
        Ok(grabber)
    }

    pub fn publisher(&self) -> SocketAddr {
        self.publisher
    }

    pub fn assembler_stats(&self) -> AssemblerStats {
        self.assembler.stats()
    }

    fn renew_subscription(&mut self) {
        let due = self
            .last_subscribe
            .map_or(true, |at| at.elapsed() >= self.subscribe_interval);
        if !due {
            return;
        }
        if let Err(e) = self.socket.send_to(&self.subscribe, self.publisher) {
            tracing::debug!("Subscribe to '{}' failed: {}", self.name, e);
        }
        self.last_subscribe = Some(Instant::now());
    }

    fn receive_until(&mut self, deadline: Instant) -> Result<Option<Frame>, NetworkError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.socket
                .set_read_timeout(Some(remaining.max(MIN_WAIT)))
                .map_err(|e| NetworkError::ReceiveFailed(e.to_string()))?;

            let (len, from) = match self.socket.recv_from(&mut self.buf) {
                Ok(received) => received,
                Err(e) if is_timeout(&e) => return Ok(None),
                Err(e) => return Err(NetworkError::ReceiveFailed(e.to_string())),
            };
            if from != self.publisher {
                continue;
            }

            let Ok(Packet::VideoChunk { header, payload }) = Packet::decode(&self.buf[..len]) else {
                continue;
            };
            if let Some(done) = self.assembler.push(header, payload) {
                let frame = self.decoder.decode(&done.data)?;
                return Ok(Some(frame.with_timestamp(done.timestamp_us)));
            }
        }
    }
}

impl FrameGrabber for NetworkGrabber {
    fn grab(&mut self, timeout: Duration) -> Result<Option<Frame>, SourceError> {
        self.renew_subscription();
        self.receive_until(Instant::now() + timeout)
            .map_err(|e| SourceError::DeviceRead(format!("{}: {}", self.name, e)))
    }

    fn release(&mut self) {
        if let Ok(packet) = (Packet::Unsubscribe { name: self.name.clone() }).encode() {
            let _ = self.socket.send_to(&packet, self.publisher);
        }
        tracing::info!("Released '{}'", self.name);
    }

    fn describe(&self) -> String {
        format!("network {}", self.publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::sender::VideoSender;
    use crate::video::frame::{Color, PixelFormat};
    use std::net::Ipv4Addr;

    fn local_config() -> NetworkConfig {
        let discovery_port = std::net::UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        NetworkConfig {
            bind_address: Ipv4Addr::LOCALHOST,
            discovery_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, discovery_port),
            announce_interval_ms: 20,
            subscribe_interval_ms: 20,
            read_timeout_ms: 20,
            connect_attempts: 50,
            connect_interval_ms: 20,
            ..Default::default()
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(3) {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_loopback_stream() {
        let config = local_config();
        let finder = SourceFinder::start(&config).unwrap();
        let mut sender = VideoSender::start("Cam A", &config).unwrap();

        let mut grabber = NetworkGrabber::connect("Cam A", &finder, &config).unwrap();
        assert_eq!(grabber.publisher().port(), sender.local_addr().port());
        assert!(wait_until(|| sender.subscriber_count() == 1));

        let color = Color::new(200, 40, 40);
        let frame = Frame::filled(320, 180, PixelFormat::Bgra8, color).with_timestamp(1234);

        let mut received = None;
        for _ in 0..50 {
            assert_eq!(sender.send_frame(&frame).unwrap(), 1);
            if let Some(got) = grabber.grab(Duration::from_millis(50)).unwrap() {
                received = Some(got);
                break;
            }
        }

        let received = received.unwrap();
        assert_eq!((received.width(), received.height()), (320, 180));
        assert_eq!(received.format(), PixelFormat::Rgb8);
        assert_eq!(received.timestamp_us(), 1234);
        assert!(received.pixel(160, 90).distance(&color) < 10);
        assert!(sender.stats().packets_sent > 0);

        grabber.release();
        assert!(wait_until(|| sender.subscriber_count() == 0));
    }

    #[test]
    fn test_long_name_found_and_subscribed() {
        let config = local_config();
        let name = "C".repeat(300);
        let finder = SourceFinder::start(&config).unwrap();
        let sender = VideoSender::start(&name, &config).unwrap();

        let grabber = NetworkGrabber::connect(&name, &finder, &config).unwrap();
        assert_eq!(grabber.publisher().port(), sender.local_addr().port());
        assert!(wait_until(|| sender.subscriber_count() == 1));
    }

    #[test]
    fn test_unknown_source_not_found() {
        let mut config = local_config();
        config.connect_attempts = 2;
        config.connect_interval_ms = 10;
        let finder = SourceFinder::start(&config).unwrap();

        assert!(matches!(
            NetworkGrabber::connect("ghost", &finder, &config),
            Err(SourceError::NotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_grab_times_out_without_frames() {
        let config = local_config();
        let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut grabber = NetworkGrabber::subscribe_to("quiet", silent.local_addr().unwrap(), &config).unwrap();

        let start = Instant::now();
        assert!(grabber.grab(Duration::from_millis(40)).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_no_subscribers_skips_encode() {
        let config = local_config();
        let mut sender = VideoSender::start("Lonely", &config).unwrap();
        assert_eq!(sender.send_frame(&Frame::black(64, 64)).unwrap(), 0);
        assert_eq!(sender.stats().frames_sent, 0);
    }

    #[test]
    fn test_subscriber_expires() {
        let mut config = local_config();
        config.subscriber_timeout_ms = 60;
        let mut sender = VideoSender::start("Cam B", &config).unwrap();

        let receiver = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let subscribe = Packet::Subscribe { name: "Cam B".to_string() }.encode().unwrap();
        receiver.send_to(&subscribe, sender.local_addr()).unwrap();
        assert!(wait_until(|| sender.subscriber_count() == 1));

        // No renewals
        assert!(wait_until(|| sender.subscriber_count() == 0));
        sender.stop();
    }

    #[test]
    fn test_subscribe_for_other_name_ignored() {
        let config = local_config();
        let sender = VideoSender::start("Cam C", &config).unwrap();
        let receiver = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let subscribe = Packet::Subscribe { name: "Cam D".to_string() }.encode().unwrap();
        receiver.send_to(&subscribe, sender.local_addr()).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(sender.subscriber_count(), 0);
    }
}
