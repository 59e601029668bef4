use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Suffix forced onto every staged upload. The collaborator only accepts
/// waveform containers, so uploads are always staged as WAV.
pub const INPUT_SUFFIX: &str = ".wav";

/// Suffix the collaborator uses for the MIDI file it writes next to its input.
pub const OUTPUT_SUFFIX: &str = ".mid";

/// Adapts the `basic-pitch` CLI's `<stem>_basic_pitch.mid` output to the
/// `<stem>.mid` naming rule. Relative to the working directory.
pub const DEFAULT_TRANSCRIBER_COMMAND: &str = "scripts/basic-pitch-wrapper.sh";

/// Runtime configuration for the transcription pipeline
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Directory holding staged uploads and collaborator output
    /// (default: `<system temp>/rust-midi-backend`)
    pub scratch_dir: PathBuf,

    /// Collaborator type: "command" or "stub" (default: "command")
    pub transcriber_type: String,

    /// Program invoked by the command collaborator
    /// (default: [`DEFAULT_TRANSCRIBER_COMMAND`])
    pub transcriber_command: String,

    /// Extra arguments placed before `<output_dir> <input>`
    pub transcriber_args: Vec<String>,

    /// Upper bound on a single collaborator run (default: none)
    pub transcriber_timeout_secs: Option<u64>,

    /// Request body limit in bytes (default: none, left to the surrounding layer)
    pub max_upload_size: Option<usize>,

    /// Age after which orphaned scratch files are swept (default: 1 hour).
    /// Files of requests still in progress are never swept, whatever their
    /// age, so this does not need to exceed the collaborator timeout.
    pub stale_artifact_age_secs: u64,

    /// Interval between scratch sweeps (default: 10 minutes)
    pub janitor_interval_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: env::temp_dir().join("rust-midi-backend"),
            transcriber_type: "command".to_string(),
            transcriber_command: DEFAULT_TRANSCRIBER_COMMAND.to_string(),
            transcriber_args: Vec::new(),
            transcriber_timeout_secs: None,
            max_upload_size: None,
            stale_artifact_age_secs: 60 * 60,
            janitor_interval_secs: 10 * 60,
        }
    }
}

impl TranscriptionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            scratch_dir: env::var("SCRATCH_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.scratch_dir),

            transcriber_type: env::var("TRANSCRIBER_TYPE").unwrap_or(default.transcriber_type),

            transcriber_command: env::var("TRANSCRIBER_COMMAND")
                .unwrap_or(default.transcriber_command),

            transcriber_args: env::var("TRANSCRIBER_ARGS")
                .ok()
                .map(|v| parse_args(&v))
                .unwrap_or(default.transcriber_args),

            transcriber_timeout_secs: env::var("TRANSCRIBER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size| *size > 0),

            stale_artifact_age_secs: env::var("STALE_ARTIFACT_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.stale_artifact_age_secs),

            janitor_interval_secs: env::var("JANITOR_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(default.janitor_interval_secs),
        }
    }

    /// Create config for development (stub collaborator, no external model needed)
    pub fn development() -> Self {
        Self {
            transcriber_type: "stub".to_string(),
            ..Self::default()
        }
    }

    /// Create config for production (real model, bounded collaborator runtime)
    pub fn production() -> Self {
        Self {
            transcriber_type: "command".to_string(),
            transcriber_command: env::var("TRANSCRIBER_COMMAND")
                .unwrap_or_else(|_| DEFAULT_TRANSCRIBER_COMMAND.to_string()),
            transcriber_timeout_secs: Some(300),
            ..Self::default()
        }
    }

    pub fn transcriber_timeout(&self) -> Option<Duration> {
        self.transcriber_timeout_secs.map(Duration::from_secs)
    }

    pub fn stale_artifact_age(&self) -> Duration {
        Duration::from_secs(self.stale_artifact_age_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }
}

fn parse_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
