//! Trait definitions for the converter module.

use async_trait::async_trait;

use super::error::TranscoderError;
use super::process::ProcessCommand;
use super::types::ConversionJob;

/// Builds the external command that converts one job.
///
/// The batch runner only needs the command line; everything about how the
/// engine behaves stays behind this trait.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Builds the command converting `job.source` into `job.destination`.
    fn command(&self, job: &ConversionJob) -> ProcessCommand;

    /// Validates that the engine is installed and runnable.
    async fn validate(&self) -> Result<(), TranscoderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct EchoTranscoder;

    #[async_trait]
    impl Transcoder for EchoTranscoder {
        fn name(&self) -> &str {
            "echo"
        }

        fn command(&self, job: &ConversionJob) -> ProcessCommand {
            ProcessCommand::new("echo")
                .arg(job.source.to_string_lossy())
                .arg(job.destination.to_string_lossy())
        }

        async fn validate(&self) -> Result<(), TranscoderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let transcoder: Box<dyn Transcoder> = Box::new(EchoTranscoder);
        assert_eq!(transcoder.name(), "echo");
        assert!(transcoder.validate().await.is_ok());

        let job = ConversionJob::new("/in/a.wma", Path::new("/out"), "mp3");
        let command = transcoder.command(&job);
        assert_eq!(command.args, vec!["/in/a.wma", "/out/a.mp3"]);
        assert!(command.inputs.is_empty());
    }
}
