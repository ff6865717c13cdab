//! Network subsystem for the UDP video transport
//!
//! Publishers ([`VideoSender`]) announce themselves on the discovery
//! address; receivers find them with [`SourceFinder`] and pull frames through
//! a [`NetworkGrabber`].

pub mod assembler;
pub mod discovery;
pub mod receiver;
pub mod sender;
pub mod udp;

pub use assembler::{AssemblerStats, CompletedFrame, FrameAssembler};
pub use discovery::{DiscoveredSource, SourceFinder};
pub use receiver::NetworkGrabber;
pub use sender::{SenderStats, VideoSender};
pub use udp::{create_socket, SocketOptions, UdpSocket};
