//! Converter module: the seam to the external transcoding engine.
//!
//! This module provides the `Transcoder` trait, the ffmpeg implementation,
//! and `ProcessHandle`, which owns one spawned conversion process.
//!
//! # Example
//!
//! ```ignore
//! use batchconv_core::converter::{ConversionJob, FfmpegTranscoder, ProcessHandle, Transcoder};
//!
//! let transcoder = FfmpegTranscoder::with_defaults();
//! transcoder.validate().await?;
//!
//! let job = ConversionJob::new("/music/in/track.wma", Path::new("/music/out"), "mp3");
//! let mut handle = ProcessHandle::start(&transcoder.command(&job));
//! let status = handle.wait().await;
//! ```

mod config;
mod error;
mod ffmpeg;
mod process;
mod traits;
mod types;

pub use config::ConverterConfig;
pub use error::{ProcessError, TranscoderError};
pub use ffmpeg::FfmpegTranscoder;
pub use process::{ExitFailure, ProcessCommand, ProcessHandle, ProcessStatus};
pub use traits::Transcoder;
pub use types::ConversionJob;
