//! # Audio Chunk Buffer
//!
//! Accumulates decoded `voice` payloads for one WebSocket connection, in the order
//! they were received.
//!
//! ## Key Features:
//! - **Receipt order**: chunks are never reordered, `event_id`s are not consulted
//! - **Unbounded**: the buffer grows for the life of the connection
//! - **Single owner**: each connection actor owns its buffer, so no locking is needed
//! - **Last-seen rate**: only the most recent `sampleRate` is kept for the whole recording

/// Ordered sequence of raw PCM16 chunks plus the sample rate last announced.
#[derive(Debug, Default, Clone)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
    last_sample_rate: Option<u32>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one decoded chunk and remember its announced sample rate.
    ///
    /// Empty chunks still update the sample rate but add no bytes.
    pub fn push(&mut self, data: Vec<u8>, sample_rate: u32) {
        self.last_sample_rate = Some(sample_rate);
        if data.is_empty() {
            return;
        }
        self.total_bytes += data.len();
        self.chunks.push(data);
    }

    /// Discard all buffered audio. The last-seen sample rate is kept.
    ///
    /// ## Returns:
    /// The number of bytes that were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.total_bytes;
        self.chunks.clear();
        self.total_bytes = 0;
        discarded
    }

    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }

    pub fn len_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn last_sample_rate(&self) -> Option<u32> {
        self.last_sample_rate
    }

    /// All chunks joined in receipt order.
    pub fn concatenate(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}
