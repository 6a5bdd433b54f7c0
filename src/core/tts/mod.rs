pub mod base;
pub mod edge;

pub use base::{
    ChunkStream, ErrorKind, OutputChunk, SpeechSynthesizer, SynthesisOutput, TTSError, TTSResult,
    WordBoundary,
};
pub use edge::{
    ClientHeaders, DEFAULT_MAX_CONCURRENCY, EDGE_TTS_URL, EDGE_VOICE_LIST_URL, EdgeConnectionConfig,
    EdgeTts, OutputFormat, SynthesisOptions, SynthesisRequest, Voice, VoiceDescriptor,
};
