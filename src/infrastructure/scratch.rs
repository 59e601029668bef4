use crate::config::TranscriptionConfig;
use crate::services::staging::ScratchSpace;
use tracing::info;

/// Creates the scratch directory and clears anything a previous process left behind.
pub async fn setup_scratch(config: &TranscriptionConfig) -> anyhow::Result<ScratchSpace> {
    let scratch = ScratchSpace::new(&config.scratch_dir);
    scratch.ensure_exists().await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to create scratch dir {}: {}",
            config.scratch_dir.display(),
            e
        )
    })?;

    let removed = scratch.sweep_stale(config.stale_artifact_age()).await?;
    info!(
        "📂 Scratch dir ready at {} ({} stale artifact(s) removed)",
        scratch.dir().display(),
        removed
    );

    Ok(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_creates_dir_and_sweeps() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("scratch");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("upload-left-over.wav"), b"x").unwrap();

        let config = TranscriptionConfig {
            scratch_dir: dir.clone(),
            stale_artifact_age_secs: 0,
            ..TranscriptionConfig::development()
        };
        let scratch = setup_scratch(&config).await.unwrap();

        assert_eq!(scratch.dir(), dir.as_path());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_setup_creates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let config = TranscriptionConfig {
            scratch_dir: root.path().join("nested").join("scratch"),
            ..TranscriptionConfig::development()
        };

        setup_scratch(&config).await.unwrap();
        assert!(config.scratch_dir.is_dir());
    }
}
