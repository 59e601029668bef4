use crate::config::{OUTPUT_SUFFIX, TranscriptionConfig};
use crate::services::staging::derive_sibling;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Longest stderr excerpt kept for diagnostics
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Error, Debug)]
pub enum TranscriberError {
    #[error("missing command `{command}` on PATH")]
    CommandMissing { command: String },

    #[error("failed to launch transcriber: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("transcriber i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcriber `{command}` exited with status {status:?}: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("transcriber did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("transcriber error: {0}")]
    Internal(String),
}

/// The external pitch-transcription engine.
///
/// Contract: for every input `<dir>/<stem>.<ext>` a successful run leaves a
/// MIDI file at `<output_dir>/<stem>.mid`. The output location is never
/// reported back; callers derive it with [`derive_sibling`].
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Result<(), TranscriberError>;

    /// Check if the engine is available
    async fn health_check(&self) -> bool;

    fn name(&self) -> &str;
}

/// Runs an external program as `<program> <args...> <output_dir> <inputs...>`.
///
/// The program must write `<stem>.mid` into the output directory. The
/// `basic-pitch` CLI names its output `<stem>_basic_pitch.mid`, so the default
/// configuration runs it through `scripts/basic-pitch-wrapper.sh`:
/// ```bash
/// scripts/basic-pitch-wrapper.sh /tmp/rust-midi-backend /tmp/rust-midi-backend/upload-XXXXXX.wav
/// ```
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self::new(
            config.transcriber_command.clone(),
            config.transcriber_args.clone(),
        )
    }

    fn rendered(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Result<(), TranscriberError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(output_dir)
            .args(inputs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future (timeout, aborted request) must not leave
            // the model running against files that are about to be deleted.
            .kill_on_drop(true);

        tracing::debug!("Running transcriber: {} ({} input(s))", self.rendered(), inputs.len());

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TranscriberError::CommandMissing {
                    command: self.program.clone(),
                }
            } else {
                TranscriberError::Spawn(e)
            }
        })?;

        if !output.status.success() {
            return Err(TranscriberError::Failed {
                command: self.rendered(),
                status: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(())
    }

    async fn health_check(&self) -> bool {
        resolve_program(&self.program).is_some()
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Development collaborator: writes an empty single-track MIDI file for each
/// input, following the same output naming rule as the real engine.
pub struct StubTranscriber;

impl StubTranscriber {
    /// Format 0, one track, 480 ticks per quarter, immediate end-of-track
    pub const EMPTY_MIDI: &'static [u8] = &[
        b'M', b'T', b'h', b'd', 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01, 0x01, 0xE0,
        b'M', b'T', b'r', b'k', 0x00, 0x00, 0x00, 0x04, 0x00, 0xFF, 0x2F, 0x00,
    ];
}

#[async_trait::async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Result<(), TranscriberError> {
        tracing::warn!("StubTranscriber: Emitting empty MIDI (development mode)");
        for input in inputs {
            let file_name = derive_sibling(input, OUTPUT_SUFFIX);
            let file_name = file_name
                .file_name()
                .ok_or_else(|| TranscriberError::Internal(format!("bad input path {}", input.display())))?;
            tokio::fs::write(output_dir.join(file_name), Self::EMPTY_MIDI).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Transcriber that always fails (for testing)
#[cfg(test)]
pub struct FailingTranscriber;

#[cfg(test)]
#[async_trait::async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(
        &self,
        _inputs: &[PathBuf],
        _output_dir: &Path,
    ) -> Result<(), TranscriberError> {
        Err(TranscriberError::Internal("model crashed".to_string()))
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Factory function to create the configured transcriber
pub fn create_transcriber(config: &TranscriptionConfig) -> Box<dyn Transcriber> {
    match config.transcriber_type.to_lowercase().as_str() {
        "command" | "basic-pitch" => Box::new(CommandTranscriber::from_config(config)),
        "stub" | "noop" => Box::new(StubTranscriber),
        other => {
            tracing::warn!("Unknown transcriber type '{}', using StubTranscriber", other);
            Box::new(StubTranscriber)
        }
    }
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|full| full.is_file())
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_transcriber_follows_naming_rule() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("upload-abc123.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        StubTranscriber
            .transcribe(&[input.clone()], dir.path())
            .await
            .unwrap();

        let midi = std::fs::read(dir.path().join("upload-abc123.mid")).unwrap();
        assert!(midi.starts_with(b"MThd"));
        assert_eq!(midi, StubTranscriber::EMPTY_MIDI);
    }

    #[tokio::test]
    async fn test_failing_transcriber() {
        let dir = tempfile::tempdir().unwrap();
        let result = FailingTranscriber.transcribe(&[], dir.path()).await;
        assert!(matches!(result, Err(TranscriberError::Internal(_))));
        assert!(!FailingTranscriber.health_check().await);
    }

    #[tokio::test]
    async fn test_missing_command() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = CommandTranscriber::new("definitely-not-a-transcriber-binary", vec![]);

        let result = transcriber
            .transcribe(&[dir.path().join("upload-x.wav")], dir.path())
            .await;
        assert!(matches!(result, Err(TranscriberError::CommandMissing { .. })));
        assert!(!transcriber.health_check().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_transcriber_passes_output_dir_then_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("upload-cmd.wav");
        std::fs::write(&input, b"MThd-from-script").unwrap();

        // $1 = output dir, $2 = input
        let script = r#"cp "$2" "$1/$(basename "$2" .wav).mid""#;
        let transcriber = CommandTranscriber::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "transcriber".to_string()],
        );

        transcriber
            .transcribe(&[input.clone()], dir.path())
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("upload-cmd.mid")).unwrap();
        assert_eq!(written, b"MThd-from-script");
        assert!(transcriber.health_check().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failure_captures_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = CommandTranscriber::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo 'model exploded' >&2; exit 3".to_string(),
                "transcriber".to_string(),
            ],
        );

        let result = transcriber
            .transcribe(&[dir.path().join("upload-x.wav")], dir.path())
            .await;
        match result {
            Err(TranscriberError::Failed { status, stderr, .. }) => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "model exploded");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_create_transcriber() {
        let config = TranscriptionConfig::development();
        assert_eq!(create_transcriber(&config).name(), "stub");

        let config = TranscriptionConfig {
            transcriber_type: "command".to_string(),
            transcriber_command: "basic-pitch".to_string(),
            ..TranscriptionConfig::default()
        };
        assert_eq!(create_transcriber(&config).name(), "basic-pitch");

        let config = TranscriptionConfig {
            transcriber_type: "mystery".to_string(),
            ..TranscriptionConfig::default()
        };
        assert_eq!(create_transcriber(&config).name(), "stub");
    }

    #[tokio::test]
    async fn test_stub_write_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("upload-abc123.wav");

        let result = StubTranscriber
            .transcribe(&[input], &dir.path().join("missing"))
            .await;
        assert!(matches!(result, Err(TranscriberError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wrapper_renames_basic_pitch_output() {
        let tools = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let input = scratch.path().join("upload-wrap01.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        // Stands in for the basic-pitch CLI: `<bin> <out> <inputs...>`.
        let fake = tools.path().join("fake-basic-pitch.sh");
        std::fs::write(
            &fake,
            r#"out="$1"; shift
for input in "$@"; do
    stem=$(basename "$input"); stem="${stem%.*}"
    printf 'MThd' > "$out/${stem}_basic_pitch.mid"
done"#,
        )
        .unwrap();

        let wrapper = Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts/basic-pitch-wrapper.sh");
        let transcriber = CommandTranscriber::new(
            "env",
            vec![
                format!("BASIC_PITCH_BIN=sh {}", fake.display()),
                "sh".to_string(),
                wrapper.display().to_string(),
            ],
        );

        transcriber
            .transcribe(&[input.clone()], scratch.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(scratch.path().join("upload-wrap01.mid")).unwrap(), b"MThd");
        assert!(!scratch.path().join("upload-wrap01_basic_pitch.mid").exists());
    }

    #[test]
    fn test_stderr_tail_truncates() {
        let long = "x".repeat(STDERR_TAIL_BYTES + 100);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), STDERR_TAIL_BYTES + 3);
    }
}
