//! Decoder stage. The actual media-codec library is an external
//! collaborator out of scope for this crate (spec.md §1); `Decoder` is the
//! seam a real AAC+/MP3 decoder plugs into, modeled on
//! `pmoaudio::nodes::decoder_node`'s packet-in/frames-out shape.

use super::AudioError;
use crate::chunk::AudioChunk;

/// Interrupt callback: returns non-zero to abort decoding mid-stream,
/// matching spec.md §5's "decoder calls (via interrupt callback)".
pub trait Decoder: Send {
    /// Decodes the full encoded payload into a sequence of chunks at the
    /// decoder's native sample rate. `is_interrupted` is polled between
    /// chunks.
    fn decode(
        &mut self,
        encoded: &[u8],
        is_interrupted: &dyn Fn() -> bool,
    ) -> Result<Vec<AudioChunk>, AudioError>;

    fn native_sample_rate(&self) -> u32;
}

/// Splits raw bytes into fixed-size fake "chunks" of silence, standing in
/// for a real AAC+/MP3 decoder in tests.
pub struct FakeDecoder {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_frames: usize,
}

impl FakeDecoder {
    pub fn new(sample_rate: u32, channels: u16, chunk_frames: usize) -> Self {
        Self {
            sample_rate,
            channels,
            chunk_frames,
        }
    }
}

impl Decoder for FakeDecoder {
    fn decode(
        &mut self,
        encoded: &[u8],
        is_interrupted: &dyn Fn() -> bool,
    ) -> Result<Vec<AudioChunk>, AudioError> {
        let frame_count = encoded.len().max(self.chunk_frames);
        let mut chunks = Vec::new();
        let mut frame = 0usize;
        let mut timestamp_ms = 0u64;
        while frame < frame_count {
            if is_interrupted() {
                return Err(AudioError::Interrupted);
            }
            let n = self.chunk_frames.min(frame_count - frame);
            let samples = vec![0i16; n * self.channels as usize];
            let chunk = AudioChunk::new(samples, self.sample_rate, self.channels, timestamp_ms);
            timestamp_ms += chunk.duration_ms();
            chunks.push(chunk);
            frame += n;
        }
        Ok(chunks)
    }

    fn native_sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
