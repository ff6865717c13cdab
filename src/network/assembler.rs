//! Frame reassembly from video chunks
//!
//! Only one frame is in flight at a time. A chunk from a newer frame
//! abandons the partial one; chunks from older frames are ignored. A large
//! backwards jump is taken as a publisher restart.

use bytes::Bytes;

use crate::protocol::ChunkHeader;

/// Backwards distance beyond which a sequence number means a restart
const RESTART_WINDOW: u32 = 1024;

/// A fully received encoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFrame {
    pub frame_seq: u32,
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    /// Encoded payload, chunks concatenated in order
    pub data: Vec<u8>,
}

/// Assembler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames_completed: u64,
    /// Partial frames abandoned for a newer one
    pub frames_dropped: u64,
    /// Chunks from frames older than the current one
    pub late_chunks: u64,
    pub duplicate_chunks: u64,
}

struct PartialFrame {
    header: ChunkHeader,
    chunks: Vec<Option<Bytes>>,
    received: usize,
}

impl PartialFrame {
    fn new(header: ChunkHeader) -> Self {
        Self {
            header,
            chunks: vec![None; header.chunk_count as usize],
            received: 0,
        }
    }
}

/// Collects chunks into frames
#[derive(Default)]
pub struct FrameAssembler {
    current: Option<PartialFrame>,
    last_completed: Option<u32>,
    stats: AssemblerStats,
}

/// `a` is after `b` in wrapping sequence order
fn is_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk; returns the frame it completes, if any
    pub fn push(&mut self, header: ChunkHeader, payload: Bytes) -> Option<CompletedFrame> {
        if header.chunk_count == 0 || header.chunk_index >= header.chunk_count {
            return None;
        }
        let seq = header.frame_seq;

        if let Some(last) = self.last_completed {
            if !is_newer(seq, last) && last.wrapping_sub(seq) < RESTART_WINDOW {
                self.stats.late_chunks += 1;
                return None;
            }
        }

        let in_flight = self
            .current
            .as_ref()
            .map(|partial| (partial.header.frame_seq, partial.header.chunk_count));

        match in_flight {
            Some((current, count)) if current == seq => {
                if count != header.chunk_count {
                    return None;
                }
            }
            Some((current, _)) if is_newer(current, seq) && current.wrapping_sub(seq) < RESTART_WINDOW => {
                self.stats.late_chunks += 1;
                return None;
            }
            Some(_) => {
                self.stats.frames_dropped += 1;
                self.current = Some(PartialFrame::new(header));
            }
            None => self.current = Some(PartialFrame::new(header)),
        }

        let partial = self.current.as_mut()?;
        let slot = &mut partial.chunks[header.chunk_index as usize];
        if slot.is_some() {
            self.stats.duplicate_chunks += 1;
            return None;
        }
        *slot = Some(payload);
        partial.received += 1;

        if partial.received < partial.chunks.len() {
            return None;
        }

        let partial = self.current.take()?;
        let size = partial.chunks.iter().flatten().map(Bytes::len).sum();
        let mut data = Vec::with_capacity(size);
        for chunk in partial.chunks.iter().flatten() {
            data.extend_from_slice(chunk);
        }

        self.last_completed = Some(seq);
        self.stats.frames_completed += 1;

        Some(CompletedFrame {
            frame_seq: seq,
            width: partial.header.width,
            height: partial.header.height,
            timestamp_us: partial.header.timestamp_us,
            data,
        })
    }

    /// Forget any partial frame and sequence history
    pub fn reset(&mut self) {
        self.current = None;
        self.last_completed = None;
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats.clone()
    }
}
