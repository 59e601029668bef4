use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

/// One uploaded recording, alive only for the duration of its request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub payload: Bytes,
    /// Content type declared by the client, if any
    pub declared_type: Option<String>,
}

impl UploadRequest {
    pub fn new(payload: impl Into<Bytes>, declared_type: Option<String>) -> Self {
        Self {
            payload: payload.into(),
            declared_type,
        }
    }

    /// Declared media type, falling back to the type sniffed from magic bytes.
    pub fn media_type(&self) -> Option<String> {
        self.declared_type
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| crate::utils::validation::sniff_media_type(&self.payload))
    }
}

/// MIDI bytes encoded as lowercase hexadecimal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexMidi(String);

impl HexMidi {
    pub fn encode(midi: &[u8]) -> Self {
        Self(hex::encode(midi))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.0)
    }
}

impl fmt::Display for HexMidi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Diagnostic classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUpload,
    StagingFailed,
    CollaboratorFailure,
    OutputMissing,
    /// Only ever logged; never the error a caller sees.
    CleanupFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUpload => "invalid_upload",
            ErrorKind::StagingFailed => "staging_failed",
            ErrorKind::CollaboratorFailure => "collaborator_failure",
            ErrorKind::OutputMissing => "output_missing",
            ErrorKind::CleanupFailure => "cleanup_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
