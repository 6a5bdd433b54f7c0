pub mod orchestrator;
pub mod tts;

// Re-export commonly used types for convenience
pub use orchestrator::{BatchReport, SynthesisOrchestrator, TaskResult};

pub use tts::{
    ChunkStream, EdgeConnectionConfig, EdgeTts, ErrorKind, OutputChunk, OutputFormat,
    SpeechSynthesizer, SynthesisOptions, SynthesisOutput, SynthesisRequest, TTSError, TTSResult,
    Voice, VoiceDescriptor, WordBoundary,
};
