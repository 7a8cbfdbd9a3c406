pub mod codec;
pub mod decoder;

pub use codec::{DecodeError, decode, encode, fix_padding};
pub use decoder::{
    BoxChunkStream, ChunkStream, DecoderState, HttpChunkStream, MemoryChunkStream, MessageSink,
    StreamDecoder, StreamError, StreamReport, UnitOutcome, stream_to_message,
};
