//! Model inference via an external helper process.
//!
//! The helper receives the encoded frame on stdin and the model base URL in
//! `FOODLENS_MODEL_URL`, and prints the class scores as JSON on stdout:
//! either `[0.1, 0.9]` in metadata label order, or
//! `[{"className": "apple", "probability": 0.9}, ...]`.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::InferenceBackend;
use crate::config::CommandSettings;
use crate::domain::{Frame, Prediction};

/// Scores printed by an inference helper
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InferenceOutput {
    /// One probability per class, in label order
    Scores(Vec<f32>),

    /// Labeled probabilities
    Predictions(Vec<Prediction>),
}

impl InferenceOutput {
    /// Parse helper stdout
    pub fn parse(stdout: &str) -> Result<Self> {
        serde_json::from_str(stdout.trim()).context("Inference output is not a JSON score list")
    }

    /// Number of classes scored
    pub fn len(&self) -> usize {
        match self {
            InferenceOutput::Scores(scores) => scores.len(),
            InferenceOutput::Predictions(predictions) => predictions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inference backend that shells out to a helper program
pub struct CommandInference {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandInference {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_settings(settings: &CommandSettings) -> Self {
        Self::new(settings.program.clone(), settings.args.clone(), settings.timeout())
    }
}

#[async_trait]
impl InferenceBackend for CommandInference {
    fn name(&self) -> &str {
        &self.program
    }

    async fn infer(&self, model_url: &str, frame: &Frame) -> Result<InferenceOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("FOODLENS_MODEL_URL", model_url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn inference helper '{}'", self.program))?;

        // The helper may stall before reading its input, so the stdin
        // write shares the timeout with the wait
        let stdin = child.stdin.take();
        let run = async {
            if let Some(mut stdin) = stdin {
                stdin
                    .write_all(&frame.data)
                    .await
                    .context("Failed to write frame to inference helper")?;
                // Drop stdin to signal EOF
            }
            child
                .wait_with_output()
                .await
                .with_context(|| format!("Failed to wait for inference helper '{}'", self.program))
        };

        let output = timeout(self.timeout, run).await.with_context(|| {
            format!(
                "Inference helper '{}' timed out after {:?}",
                self.program, self.timeout
            )
        })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Inference helper '{}' failed with exit code {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let stdout =
            String::from_utf8(output.stdout).context("Inference output is not valid UTF-8")?;

        InferenceOutput::parse(&stdout)
    }
}
