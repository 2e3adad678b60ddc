// Configuration loading

pub mod settings;

pub use settings::{ConfigError, OutputFormat, RetrySettings, Settings, MAX_CHUNK_SIZE};
