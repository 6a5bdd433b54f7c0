//! Persistence of synthesis results.
//!
//! Audio is written verbatim. Word boundaries are written as a JSON array of
//! `{"offset","duration","text"}` objects in milliseconds.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::core::tts::{OutputFormat, SynthesisOutput, TTSError, TTSResult, WordBoundary};

/// Creates the parent directory of `path` if it is missing.
async fn ensure_parent(path: &Path) -> TTSResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Writes `audio` to `path`, truncating any existing file.
pub async fn write_audio(path: &Path, audio: &[u8]) -> TTSResult<()> {
    ensure_parent(path).await?;
    fs::write(path, audio).await?;
    debug!(path = %path.display(), bytes = audio.len(), "Wrote audio");
    Ok(())
}

/// Writes word boundaries to `path` as a JSON array.
pub async fn write_metadata(path: &Path, boundaries: &[WordBoundary]) -> TTSResult<()> {
    let json = serde_json::to_vec(boundaries).map_err(|e| {
        TTSError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    ensure_parent(path).await?;
    fs::write(path, json).await?;
    debug!(path = %path.display(), words = boundaries.len(), "Wrote metadata");
    Ok(())
}

/// Writes whichever of the two files were requested.
pub async fn save_output(
    output: &SynthesisOutput,
    media: Option<&Path>,
    metadata: Option<&Path>,
) -> TTSResult<()> {
    if let Some(path) = media {
        write_audio(path, &output.audio).await?;
    }
    if let Some(path) = metadata {
        write_metadata(path, &output.word_boundaries).await?;
    }
    Ok(())
}

/// Audio and metadata paths for a batch input, named after its file stem.
///
/// `notes/chapter1.txt` with `--output-dir out` and MP3 output becomes
/// `out/chapter1.mp3` and `out/chapter1.json`.
pub fn batch_output_paths(
    output_dir: &Path,
    input: &Path,
    index: usize,
    format: OutputFormat,
) -> (PathBuf, PathBuf) {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("task-{index}"));

    (
        output_dir.join(format!("{stem}.{}", format.extension())),
        output_dir.join(format!("{stem}.json")),
    )
}
