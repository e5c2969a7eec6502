pub mod batch;
pub mod config;
pub mod converter;
pub mod metrics;
pub mod source;
pub mod testing;

pub use batch::{
    channel_callback, BatchConfig, BatchError, BatchEvent, BatchEventCallback, BatchRunner,
    BatchState, BatchStatus, BatchSummary, JobError, JobOutcome, Progress,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogFormat,
    LoggingConfig,
};
pub use converter::{
    ConversionJob, ConverterConfig, FfmpegTranscoder, ProcessHandle, ProcessStatus, Transcoder,
};
pub use source::{plan_jobs, scan_directory, SourceConfig, SourceError};
