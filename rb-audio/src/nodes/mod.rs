//! The pipeline's stage shapes, grounded in `pmoaudio::nodes::*` (source,
//! decoder, volume, converter, sink) but connected by direct calls inside
//! the producer/consumer loop instead of per-stage mpsc channels -- the
//! look-ahead buffer between them is a single shared bounded queue, not a
//! pipe per stage.

pub mod convert;
pub mod decoder;
pub mod sink;
pub mod source;
pub mod volume;

pub use convert::FormatConverter;
pub use decoder::{Decoder, FakeDecoder};
pub use sink::{AudioSink, NullSink, RecordingSink};
pub use source::HttpSource;
pub use volume::VolumeFilter;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("stream open failed: {0}")]
    OpenFailed(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("sink write failed: {0}")]
    SinkFailed(String),
    #[error("request interrupted")]
    Interrupted,
    #[error("no audio device available")]
    NoDevice,
}
