//! Sink stage. The concrete audio output device is an external
//! collaborator out of scope for this crate (spec.md §1); `AudioSink` is
//! the interface a real device backend plugs into. Modeled on
//! `pmoaudio::nodes::sink_node::SinkNode`'s mock/logging variants.

use super::AudioError;
use crate::chunk::AudioChunk;

pub trait AudioSink: Send {
    fn write(&mut self, chunk: &AudioChunk) -> Result<(), AudioError>;
}

/// Discards every chunk. Used by tests and whenever no device is open yet.
#[derive(Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _chunk: &AudioChunk) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Accumulates every chunk it receives, for assertions in tests.
#[derive(Default)]
pub struct RecordingSink {
    pub received: Vec<AudioChunk>,
}

impl AudioSink for RecordingSink {
    fn write(&mut self, chunk: &AudioChunk) -> Result<(), AudioError> {
        self.received.push(chunk.clone());
        Ok(())
    }
}
