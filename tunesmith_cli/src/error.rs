// Errors surfaced by the `tunesmith` binary.
//
// Wraps everything that can stop a run before a result is written: reading
// input files, parsing JSON requests or MIDI, and the core `BuildError`.
// Per-note problems never land here; they travel inside the result's
// diagnostics.

use std::path::PathBuf;
use thiserror::Error;
use tunesmith_core::BuildError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write output: {0}")]
    Write(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed MIDI file: {0}")]
    Midi(#[from] midly::Error),

    #[error("MIDI file uses timecode timing; only metrical (ticks per beat) files are supported")]
    TimecodeTiming,

    #[error(transparent)]
    Build(#[from] BuildError),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Read a whole file, keeping the path for the error message.
pub fn read_file(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
