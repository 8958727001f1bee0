pub mod audio;
pub mod config;
pub mod dub;
pub mod error;
pub mod media;
pub mod services;
pub mod transcription;

pub use config::RedubConfig;
pub use dub::{DubPipeline, DubReport, DubRequest};
pub use error::DubError;
