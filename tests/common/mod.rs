#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use rust_midi_backend::config::TranscriptionConfig;
use rust_midi_backend::services::staging::{ScratchSpace, derive_sibling};
use rust_midi_backend::services::transcriber::{Transcriber, TranscriberError};
use rust_midi_backend::services::transcription_service::TranscriptionService;
use rust_midi_backend::{AppState, create_app};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// 16-bit mono PCM WAV of a sine tone
pub fn sine_wav(seconds: f32, frequency: f32) -> Vec<u8> {
    let sample_rate: u32 = 16_000;
    let samples = (seconds * sample_rate as f32) as u32;
    let data_len = samples * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());

    for n in 0..samples {
        let t = n as f32 / sample_rate as f32;
        let sample = (t * frequency * std::f32::consts::TAU).sin() * 0.5 * i16::MAX as f32;
        wav.extend_from_slice(&(sample as i16).to_le_bytes());
    }
    wav
}

pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

pub fn test_app(scratch_dir: &Path, transcriber: Arc<dyn Transcriber>) -> Router {
    test_app_with_config(
        TranscriptionConfig {
            scratch_dir: scratch_dir.to_path_buf(),
            ..TranscriptionConfig::development()
        },
        transcriber,
    )
}

pub fn test_app_with_config(config: TranscriptionConfig, transcriber: Arc<dyn Transcriber>) -> Router {
    let scratch = ScratchSpace::new(&config.scratch_dir);
    let service = TranscriptionService::from_config(&config, scratch, transcriber);

    create_app(AppState {
        transcription_service: Arc::new(service),
        config,
    })
}

pub fn scratch_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

fn output_for(input: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(derive_sibling(input, ".mid").file_name().unwrap())
}

/// Writes "MThd" + the staged input bytes, so every response is traceable to its upload.
#[derive(Default)]
pub struct EchoTranscriber {
    pub inputs: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Transcriber for EchoTranscriber {
    async fn transcribe(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<(), TranscriberError> {
        for input in inputs {
            self.inputs.lock().unwrap().push(input.clone());
            let audio = tokio::fs::read(input).await?;
            tokio::task::yield_now().await;
            let mut midi = b"MThd".to_vec();
            midi.extend_from_slice(&audio);
            tokio::fs::write(output_for(input, output_dir), midi).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Leaves a partial output behind and reports failure.
pub struct AlwaysFailingTranscriber;

#[async_trait]
impl Transcriber for AlwaysFailingTranscriber {
    async fn transcribe(&self, inputs: &[PathBuf], output_dir: &Path) -> Result<(), TranscriberError> {
        if let Some(input) = inputs.first() {
            tokio::fs::write(output_for(input, output_dir), b"MTh").await?;
        }
        Err(TranscriberError::Failed {
            command: "basic-pitch".to_string(),
            status: Some(1),
            stderr: format!("Traceback: cannot decode {}", output_dir.display()),
        })
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "always-failing"
    }
}

pub struct PanickingTranscriber;

#[async_trait]
impl Transcriber for PanickingTranscriber {
    async fn transcribe(&self, _inputs: &[PathBuf], _output_dir: &Path) -> Result<(), TranscriberError> {
        panic!("model runtime aborted");
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "panicking"
    }
}
