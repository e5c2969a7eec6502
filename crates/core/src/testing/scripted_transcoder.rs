//! Transcoder that runs shell scripts instead of a real engine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::converter::{ConversionJob, ProcessCommand, TranscoderError, Transcoder};

/// Mock implementation of the Transcoder trait.
///
/// Each job runs `sh -c <script> batchconv <source> <destination>`, so scripts
/// can refer to the paths as `$1` and `$2`. Scripts are chosen by the source
/// file name, falling back to a default.
///
/// # Example
///
/// ```rust,ignore
/// use batchconv_core::testing::ScriptedTranscoder;
///
/// let transcoder = ScriptedTranscoder::new()
///     .with_default_script("sleep 0.1")
///     .with_script("broken.wma", "exit 1");
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedTranscoder {
    default_script: String,
    scripts: HashMap<String, String>,
    require_inputs: bool,
    commanded: Arc<Mutex<Vec<ConversionJob>>>,
}

impl Default for ScriptedTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTranscoder {
    /// Every job succeeds immediately.
    pub fn new() -> Self {
        Self {
            default_script: "exit 0".to_string(),
            scripts: HashMap::new(),
            require_inputs: false,
            commanded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_default_script(mut self, script: impl Into<String>) -> Self {
        self.default_script = script.into();
        self
    }

    /// Script for the job whose source file is named `file_name`.
    pub fn with_script(mut self, file_name: impl Into<String>, script: impl Into<String>) -> Self {
        self.scripts.insert(file_name.into(), script.into());
        self
    }

    /// Treat the job source as a required input, like a real engine would.
    pub fn requiring_inputs(mut self) -> Self {
        self.require_inputs = true;
        self
    }

    /// Jobs a command was built for, in call order.
    pub fn commanded(&self) -> Vec<ConversionJob> {
        self.commanded
            .lock()
            .map(|jobs| jobs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn command(&self, job: &ConversionJob) -> ProcessCommand {
        if let Ok(mut jobs) = self.commanded.lock() {
            jobs.push(job.clone());
        }

        let script = self
            .scripts
            .get(&job.display_name())
            .unwrap_or(&self.default_script);

        let command = ProcessCommand::new("sh").args([
            "-c".to_string(),
            script.clone(),
            "batchconv".to_string(),
            job.source.to_string_lossy().to_string(),
            job.destination.to_string_lossy().to_string(),
        ]);

        if self.require_inputs {
            command.input(&job.source)
        } else {
            command
        }
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        Ok(())
    }
}
