use anyhow::{Result, anyhow};

/// Header chunk tag every Standard MIDI File starts with ("MThd")
pub const MIDI_SIGNATURE: &[u8; 4] = b"MThd";

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Rejects payloads the pipeline cannot stage. No size ceiling is applied
/// here; an upper bound belongs to the HTTP body limit, if one is configured.
pub fn validate_audio_payload(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_UPLOAD",
            message: "Uploaded file is empty".to_string(),
        }));
    }
    Ok(())
}

/// Detects the media type from magic bytes
pub fn sniff_media_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Whether the sniffed type is a compressed format rather than a waveform
/// container. The collaborator reads the staged file as WAV regardless, so
/// this only feeds diagnostics.
pub fn is_compressed_audio(media_type: &str) -> bool {
    matches!(
        media_type,
        "audio/mpeg" | "audio/ogg" | "audio/aac" | "audio/m4a" | "audio/x-flac" | "audio/flac"
    )
}

/// Checks that collaborator output is a Standard MIDI File
pub fn validate_midi(data: &[u8]) -> Result<()> {
    if !data.starts_with(MIDI_SIGNATURE) {
        return Err(anyhow!(ValidationError {
            code: "INVALID_MIDI",
            message: format!(
                "Output does not start with the MIDI header signature ({} bytes)",
                data.len()
            ),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_audio_payload() {
        assert!(validate_audio_payload(b"RIFF").is_ok());

        let err = validate_audio_payload(b"").unwrap_err();
        let validation = err.downcast_ref::<ValidationError>().unwrap();
        assert_eq!(validation.code, "EMPTY_UPLOAD");
    }

    #[test]
    fn test_sniff_media_type() {
        let wav = b"RIFF\x24\x00\x00\x00WAVEfmt \x10\x00\x00\x00";
        assert_eq!(sniff_media_type(wav).as_deref(), Some("audio/x-wav"));
        assert_eq!(sniff_media_type(b"ID3\x03\x00\x00\x00").as_deref(), Some("audio/mpeg"));
        assert!(sniff_media_type(b"plain words").is_none());
    }

    #[test]
    fn test_is_compressed_audio() {
        assert!(is_compressed_audio("audio/mpeg"));
        assert!(!is_compressed_audio("audio/x-wav"));
    }

    #[test]
    fn test_validate_midi() {
        assert!(validate_midi(b"MThd\x00\x00\x00\x06").is_ok());
        assert!(validate_midi(b"RIFF").is_err());
        assert!(validate_midi(b"").is_err());
    }
}
