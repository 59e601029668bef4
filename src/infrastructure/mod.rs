pub mod scratch;
pub mod transcriber;
