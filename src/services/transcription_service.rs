use crate::config::{INPUT_SUFFIX, OUTPUT_SUFFIX, TranscriptionConfig};
use crate::models::{ErrorKind, HexMidi, UploadRequest};
use crate::services::staging::{ScratchSpace, StagingError};
use crate::services::transcriber::{Transcriber, TranscriberError};
use crate::utils::validation::{is_compressed_audio, validate_audio_payload, validate_midi};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("staging failed: {0}")]
    StagingFailed(#[from] StagingError),

    #[error("transcriber failed: {0}")]
    CollaboratorFailure(#[from] TranscriberError),

    #[error("transcriber produced output that is not MIDI at {path}: {reason}")]
    InvalidOutput { path: PathBuf, reason: String },

    #[error("transcriber reported success but wrote nothing at {path}")]
    OutputMissing { path: PathBuf },

    #[error("failed to read transcriber output at {path}: {source}")]
    OutputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TranscriptionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscriptionError::InvalidUpload(_) => ErrorKind::InvalidUpload,
            TranscriptionError::StagingFailed(_) => ErrorKind::StagingFailed,
            TranscriptionError::CollaboratorFailure(_) | TranscriptionError::InvalidOutput { .. } => {
                ErrorKind::CollaboratorFailure
            }
            TranscriptionError::OutputMissing { .. } | TranscriptionError::OutputUnreadable { .. } => {
                ErrorKind::OutputMissing
            }
        }
    }
}

/// Request-scoped audio → MIDI pipeline.
///
/// Each call stages its own input, runs the collaborator once, and releases
/// both artifacts on every exit path. Nothing is shared between calls except
/// the scratch directory namespace.
///
/// There is no admission control: concurrent calls run the collaborator
/// concurrently and compete for the same compute.
pub struct TranscriptionService {
    scratch: ScratchSpace,
    transcriber: Arc<dyn Transcriber>,
    timeout: Option<Duration>,
}

impl TranscriptionService {
    pub fn new(scratch: ScratchSpace, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            scratch,
            transcriber,
            timeout: None,
        }
    }

    /// Builds the service around an already prepared scratch space. Sharing
    /// it with the janitor lets sweeps skip files of in-flight requests.
    pub fn from_config(
        config: &TranscriptionConfig,
        scratch: ScratchSpace,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self::new(scratch, transcriber).with_timeout(config.transcriber_timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    pub fn transcriber(&self) -> &Arc<dyn Transcriber> {
        &self.transcriber
    }

    pub async fn handle(&self, upload: &UploadRequest) -> Result<HexMidi, TranscriptionError> {
        let started = Instant::now();
        let result = self.run(upload).await;

        match &result {
            Ok(midi) => info!(
                upload_bytes = upload.payload.len(),
                midi_bytes = midi.as_str().len() / 2,
                elapsed_ms = %started.elapsed().as_millis(),
                "Transcription succeeded"
            ),
            Err(e) => error!(
                kind = %e.kind(),
                upload_bytes = upload.payload.len(),
                elapsed_ms = %started.elapsed().as_millis(),
                "Transcription failed: {}",
                e
            ),
        }

        result
    }

    async fn run(&self, upload: &UploadRequest) -> Result<HexMidi, TranscriptionError> {
        validate_audio_payload(&upload.payload)
            .map_err(|e| TranscriptionError::InvalidUpload(e.to_string()))?;

        match upload.media_type() {
            Some(media_type) if is_compressed_audio(&media_type) => warn!(
                "Upload looks like {}, staging it as {} anyway",
                media_type, INPUT_SUFFIX
            ),
            media_type => debug!("Upload media type: {:?}", media_type),
        }

        // From here on `staged` owns both artifacts; any early return drops it
        // and deletes them.
        let mut staged = self.scratch.stage(&upload.payload, INPUT_SUFFIX).await?;
        let output_path = staged.claim_sibling(OUTPUT_SUFFIX);
        let output_dir = staged.parent().to_path_buf();
        let inputs = [staged.path().to_path_buf()];

        debug!(
            "Invoking transcriber '{}' on {}",
            self.transcriber.name(),
            staged.path().display()
        );
        let call = self.transcriber.transcribe(&inputs, &output_dir);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| TranscriberError::TimedOut(limit))??,
            None => call.await?,
        }

        let midi = read_output(&output_path).await?;
        let encoded = HexMidi::encode(&midi);

        staged.release();
        Ok(encoded)
    }
}

async fn read_output(path: &Path) -> Result<Vec<u8>, TranscriptionError> {
    let midi = tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            TranscriptionError::OutputMissing {
                path: path.to_path_buf(),
            }
        } else {
            TranscriptionError::OutputUnreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    validate_midi(&midi).map_err(|e| TranscriptionError::InvalidOutput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(midi)
}
