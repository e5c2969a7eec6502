//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::config::ConverterConfig;
use super::error::TranscoderError;
use super::process::ProcessCommand;
use super::traits::Transcoder;
use super::types::ConversionJob;

/// FFmpeg-based transcoder.
pub struct FfmpegTranscoder {
    config: ConverterConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Builds ffmpeg arguments for one conversion.
    fn build_args(&self, job: &ConversionJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-i".to_string(),
            job.source.to_string_lossy().to_string(),
        ];

        args.extend(self.config.extra_args.iter().cloned());

        args.extend(["-f".to_string(), self.config.output_format.clone()]);

        // Output
        args.push(job.destination.to_string_lossy().to_string());

        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn command(&self, job: &ConversionJob) -> ProcessCommand {
        ProcessCommand::new(&self.config.ffmpeg_path)
            .args(self.build_args(job))
            .input(&job.source)
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        let status = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscoderError::Io(e)
                }
            })?;

        if !status.success() {
            return Err(TranscoderError::SelfCheckFailed {
                code: status.code(),
            });
        }

        Ok(())
    }
}
