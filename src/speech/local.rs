use crate::config::SpeechConfig;
use crate::{CoachError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// On-device speech, used once remote synthesis has failed
#[async_trait]
pub trait LocalSpeech: Send + Sync {
    /// Speak the text, resolving when the utterance has finished
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Speaks through a local program such as `espeak-ng` or `say`.
///
/// The text is passed as the final argument. The child is killed if the
/// future is dropped, so an outer timeout really stops the voice.
#[derive(Clone, Debug)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.local_command.clone(), config.local_args.clone())
    }
}

#[async_trait]
impl LocalSpeech for CommandSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        debug!("Local speech via {}: {}", self.program, text);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                CoachError::SpeechError(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !status.success() {
            return Err(CoachError::SpeechError(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}
