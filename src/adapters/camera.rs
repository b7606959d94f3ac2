//! Camera frame sources.
//!
//! `CommandCamera` runs a capture command (ffmpeg by default) that writes a
//! single encoded frame to stdout. `StillImageCamera` serves a file from disk.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::FrameSource;
use crate::config::CameraSettings;
use crate::domain::Frame;

/// Upper bound on a single capture command
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while acquiring or reading the camera
#[derive(Debug, Clone, Error)]
pub enum CameraError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("camera unavailable: {0}")]
    Unavailable(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

impl CameraError {
    fn from_io(context: &str, e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied(format!("{}: {}", context, e)),
            ErrorKind::NotFound => Self::Unavailable(format!("{}: {}", context, e)),
            _ => Self::Capture(format!("{}: {}", context, e)),
        }
    }
}

/// Camera backed by an external capture command
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(settings.program.clone(), settings.args.clone())
    }

    async fn run_capture(&self) -> Result<Frame, CameraError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CameraError::from_io(&self.program, e))?;

        let output = timeout(CAPTURE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                CameraError::Capture(format!("'{}' timed out after {:?}", self.program, CAPTURE_TIMEOUT))
            })?
            .map_err(|e| CameraError::from_io(&self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("Permission denied") {
                return Err(CameraError::PermissionDenied(stderr));
            }
            return Err(CameraError::Unavailable(format!(
                "'{}' exited with code {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr
            )));
        }

        if output.stdout.is_empty() {
            return Err(CameraError::Capture(format!(
                "'{}' produced no image data",
                self.program
            )));
        }

        Ok(Frame::from_bytes(output.stdout))
    }
}

#[async_trait]
impl FrameSource for CommandCamera {
    fn name(&self) -> &str {
        &self.program
    }

    async fn open(&self) -> Result<(), CameraError> {
        // A throwaway frame proves the device exists and is readable
        let frame = self.run_capture().await?;
        debug!(bytes = frame.len(), "Camera opened");
        Ok(())
    }

    async fn grab(&self) -> Result<Frame, CameraError> {
        self.run_capture().await
    }
}

/// Camera that always returns the same image file
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for StillImageCamera {
    fn name(&self) -> &str {
        "still-image"
    }

    async fn open(&self) -> Result<(), CameraError> {
        let context = self.path.display().to_string();
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| CameraError::from_io(&context, e))?;

        if !metadata.is_file() {
            return Err(CameraError::Unavailable(format!("{} is not a file", context)));
        }
        Ok(())
    }

    async fn grab(&self) -> Result<Frame, CameraError> {
        let context = self.path.display().to_string();
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CameraError::from_io(&context, e))?;

        if data.is_empty() {
            return Err(CameraError::Capture(format!("{} is empty", context)));
        }
        Ok(Frame::from_bytes(data))
    }
}
