//! OSC timecode listener
//!
//! Binds a UDP socket (optionally joined to a multicast group), decodes
//! OSC packets on a background thread and keeps the latest timecode
//! string. Readers never block on the network; before the first packet they
//! get the sentinel.

use rosc::{OscPacket, OscType};
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::{TimecodeConfig, TimecodeFields};
use crate::constants::TIMECODE_SENTINEL;
use crate::error::NetworkError;
use crate::network::udp::{create_socket, is_timeout, SocketOptions};
use crate::sync::{spawn_worker, CancelToken, LatestCell, Worker};

/// Largest OSC datagram accepted
const RECV_BUFFER_SIZE: usize = 65_536;

/// Background OSC listener holding the latest timecode
pub struct TimecodeListener {
    config: TimecodeConfig,
    latest: Arc<LatestCell<String>>,
    cancel: CancelToken,
    worker: Option<Worker>,
    local_addr: Option<SocketAddr>,
    accepted: Arc<AtomicU64>,
}

impl TimecodeListener {
    pub fn new(config: TimecodeConfig) -> Self {
        Self {
            config,
            latest: Arc::new(LatestCell::with_value(TIMECODE_SENTINEL.to_string())),
            cancel: CancelToken::new(),
            worker: None,
            local_addr: None,
            accepted: Arc::new(AtomicU64::new(0)),
        }
    }
    
    /// Bind the socket and start the receive thread
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if self.worker.is_some() {
            return Ok(());
        }
        
        let bind = SocketAddrV4::new(self.config.bind_address, self.config.port);
        let socket = create_socket(
            bind,
            &SocketOptions {
                reuse_address: true,
                multicast_group: self.config.multicast_group,
                read_timeout: Some(self.config.read_timeout()),
                ..Default::default()
            },
        )?;
        self.local_addr = socket.local_addr().ok();
        
        let latest = self.latest.clone();
        let cancel = self.cancel.clone();
        let accepted = self.accepted.clone();
        let address = self.config.osc_address.clone();
        let fields = self.config.fields;
        let retry_delay = self.config.read_timeout();
        
        let worker = spawn_worker("timecode", move || {
            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            
            while !cancel.is_cancelled() {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => match decode_timecode(&buf[..len], &address, fields) {
                        Ok(Some(timecode)) => {
                            latest.set(timecode);
                            accepted.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(None) => {}
                        Err(e) => tracing::debug!("Ignoring packet from {}: {}", from, e),
                    },
                    Err(e) if is_timeout(&e) => {}
                    Err(e) => {
                        tracing::warn!("Timecode receive failed: {}", e);
                        cancel.sleep(retry_delay);
                    }
                }
            }
        })
        .map_err(|e| NetworkError::Init(e.to_string()))?;
        
        self.worker = Some(worker);
        
        match self.config.multicast_group {
            Some(group) => tracing::info!(
                "Listening for OSC timecode on port {} (multicast {})",
                self.config.port,
                group
            ),
            None => tracing::info!("Listening for OSC timecode on port {}", self.config.port),
        }
        tracing::info!("OSC address: {}", self.config.osc_address);
        
        Ok(())
    }
    
    /// Latest timecode, or the sentinel before any packet
    pub fn get(&self) -> String {
        self.latest
            .get_copy()
            .unwrap_or_else(|| TIMECODE_SENTINEL.to_string())
    }
    
    /// Bound address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
    
    /// Number of messages that updated the timecode
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
    
    /// Stop the receive thread and close the socket
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            // One read timeout plus slack
            worker.join_timeout(self.config.read_timeout() * 2);
        }
    }
}

impl Drop for TimecodeListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode one datagram
///
/// Returns the new timecode when the packet carries a message at `address`
/// with at least one argument. Bundles are searched in order and the last
/// matching message wins.
pub fn decode_timecode(packet: &[u8], address: &str, fields: TimecodeFields) -> Result<Option<String>, NetworkError> {
    let (_, packet) = rosc::decoder::decode_udp(packet).map_err(|_| NetworkError::InvalidPacket)?;
    Ok(find_timecode(&packet, address, fields))
}

fn find_timecode(packet: &OscPacket, address: &str, fields: TimecodeFields) -> Option<String> {
    match packet {
        OscPacket::Message(message) => {
            if message.addr == address {
                format_arguments(&message.args, fields)
            } else {
                None
            }
        }
        OscPacket::Bundle(bundle) => bundle
            .content
            .iter()
            .filter_map(|inner| find_timecode(inner, address, fields))
            .last(),
    }
}

/// Render OSC arguments as a display string; `None` when there are none
///
/// A single field prints bare (`01:02:03:04`). A tuple prints like a Python
/// tuple: quoted strings, floats with a decimal point, a trailing comma
/// after a lone element.
pub fn format_arguments(args: &[OscType], fields: TimecodeFields) -> Option<String> {
    let first = args.first()?;
    
    Some(match fields {
        TimecodeFields::First => match first {
            OscType::String(s) => s.clone(),
            OscType::Char(c) => c.to_string(),
            other => repr_argument(other),
        },
        TimecodeFields::Tuple(count) => {
            let parts: Vec<String> = args.iter().take(count.max(1)).map(repr_argument).collect();
            if let [only] = parts.as_slice() {
                format!("({},)", only)
            } else {
                format!("({})", parts.join(", "))
            }
        }
    })
}

fn repr_argument(arg: &OscType) -> String {
    match arg {
        OscType::Int(v) => v.to_string(),
        OscType::Long(v) => v.to_string(),
        // Single-precision values widen the way a double-only reader sees them
        OscType::Float(v) => repr_float(*v as f64),
        OscType::Double(v) => repr_float(*v),
        OscType::String(s) => repr_str(s),
        OscType::Char(c) => repr_str(&c.to_string()),
        OscType::Bool(true) => "True".to_string(),
        OscType::Bool(false) => "False".to_string(),
        OscType::Nil => "None".to_string(),
        OscType::Inf => "inf".to_string(),
        other => format!("{:?}", other),
    }
}

fn repr_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let debug = format!("{:?}", v);
    match debug.split_once('e') {
        // 1e16 -> 1e+16, 1e-7 -> 1e-07
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}

/// Single quotes unless the text contains one and no double quote
fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
