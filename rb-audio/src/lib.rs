//! Streaming playback: fetch, decode, volume, convert, sink, driven by a
//! blocking producer/consumer thread pair with a bounded look-ahead buffer.

pub mod chunk;
pub mod nodes;
pub mod player;

pub use chunk::AudioChunk;
pub use nodes::{AudioError, AudioSink, Decoder, FakeDecoder, FormatConverter, HttpSource, NullSink, VolumeFilter};
pub use player::{Mode, Player, PlayerConfig, PlayerOutcome};
