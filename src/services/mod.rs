pub mod janitor;
pub mod staging;
pub mod transcriber;
pub mod transcription_service;
