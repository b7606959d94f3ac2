//! Configuration for foodlens.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FOODLENS_MODEL_URL, FOODLENS_LOCALE,
//!    FOODLENS_NUTRITION_ENDPOINT)
//! 2. Config file (.foodlens/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .foodlens/config.yaml
//! - Falls back to ~/.foodlens/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub inference: CommandSettings,
    #[serde(default)]
    pub nutrition: NutritionSettings,
    #[serde(default)]
    pub speech: SpeechSettings,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub camera: CameraSettings,
}

/// Where the image model lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Base URL holding model.json and metadata.json
    #[serde(default = "default_model_url")]
    pub url: String,

    /// How long `capture` waits for the model before giving up (seconds)
    #[serde(default = "default_model_load_timeout")]
    pub load_timeout_seconds: u64,
}

fn default_model_url() -> String {
    "https://teachablemachine.withgoogle.com/models/1r6QwK2vK/".to_string()
}
fn default_model_load_timeout() -> u64 {
    30
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            load_timeout_seconds: default_model_load_timeout(),
        }
    }
}

impl ModelSettings {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_seconds)
    }
}

/// External helper program that runs model inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSettings {
    #[serde(default = "default_inference_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_inference_timeout")]
    pub timeout_seconds: u64,
}

fn default_inference_program() -> String {
    "tm-image-infer".to_string()
}
fn default_inference_timeout() -> u64 {
    10
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            program: default_inference_program(),
            args: Vec::new(),
            timeout_seconds: default_inference_timeout(),
        }
    }
}

impl CommandSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Food database lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionSettings {
    #[serde(default = "default_nutrition_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_nutrition_timeout")]
    pub timeout_seconds: u64,
}

fn default_nutrition_endpoint() -> String {
    "https://world.openfoodfacts.org/cgi/search.pl".to_string()
}
fn default_nutrition_timeout() -> u64 {
    10
}

impl Default for NutritionSettings {
    fn default() -> Self {
        Self {
            endpoint: default_nutrition_endpoint(),
            timeout_seconds: default_nutrition_timeout(),
        }
    }
}

impl NutritionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Speech output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// Locale tag utterances are tagged with and voices are matched against
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Synthesizer program (espeak-ng compatible command line)
    #[serde(default = "default_speech_program")]
    pub program: String,

    /// Poll interval while waiting for the voice list (milliseconds)
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Give up after this many polls (unbounded when unset)
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// How often the installed voices are re-listed to detect changes
    /// (milliseconds)
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_ms: u64,
}

fn default_locale() -> String {
    "ko-KR".to_string()
}
fn default_speech_program() -> String {
    "espeak-ng".to_string()
}
fn default_retry_interval() -> u64 {
    200
}
fn default_monitor_interval() -> u64 {
    5000
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            program: default_speech_program(),
            retry_interval_ms: default_retry_interval(),
            max_retries: None,
            monitor_interval_ms: default_monitor_interval(),
        }
    }
}

impl SpeechSettings {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

/// Capture cycle timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Narration starts when the lookup finishes or this long after
    /// prediction began, whichever comes first (milliseconds)
    #[serde(default = "default_narration_timeout")]
    pub narration_timeout_ms: u64,
}

fn default_narration_timeout() -> u64 {
    1200
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            narration_timeout_ms: default_narration_timeout(),
        }
    }
}

impl CaptureSettings {
    pub fn narration_timeout(&self) -> Duration {
        Duration::from_millis(self.narration_timeout_ms)
    }
}

/// Camera capture command (writes one encoded frame to stdout)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default = "default_camera_program")]
    pub program: String,
    #[serde(default = "default_camera_args")]
    pub args: Vec<String>,
}

fn default_camera_program() -> String {
    "ffmpeg".to_string()
}
fn default_camera_args() -> Vec<String> {
    [
        "-loglevel", "error", "-f", "v4l2", "-i", "/dev/video0", "-frames:v", "1", "-f",
        "image2pipe", "-vcodec", "png", "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            program: default_camera_program(),
            args: default_camera_args(),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedConfig {
    pub model: ModelSettings,
    pub inference: CommandSettings,
    pub nutrition: NutritionSettings,
    pub speech: SpeechSettings,
    pub capture: CaptureSettings,
    pub camera: CameraSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    fn from_file(file: ConfigFile, config_file: Option<PathBuf>) -> Self {
        Self {
            model: file.model,
            inference: file.inference,
            nutrition: file.nutrition,
            speech: file.speech,
            capture: file.capture,
            camera: file.camera,
            config_file,
        }
    }

    /// Apply environment variable overrides
    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("FOODLENS_MODEL_URL") {
            self.model.url = url;
        }
        if let Some(locale) = get("FOODLENS_LOCALE") {
            self.speech.locale = locale;
        }
        if let Some(endpoint) = get("FOODLENS_NUTRITION_ENDPOINT") {
            self.nutrition.endpoint = endpoint;
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".foodlens").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let home_config = dirs::home_dir()?.join(".foodlens").join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse config YAML content
fn parse_config(content: &str) -> Result<ConfigFile> {
    // An empty file is valid and means "all defaults"
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();

    let mut config = match config_file {
        Some(ref path) => ResolvedConfig::from_file(load_config_file(path)?, config_file.clone()),
        None => ResolvedConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));

    Ok(config)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ResolvedConfig::default();

        assert_eq!(config.speech.locale, "ko-KR");
        assert_eq!(config.speech.retry_interval(), Duration::from_millis(200));
        assert_eq!(config.speech.max_retries, None);
        assert_eq!(config.speech.monitor_interval(), Duration::from_secs(5));
        assert_eq!(config.capture.narration_timeout(), Duration::from_millis(1200));
        assert!(config.model.url.ends_with('/'));
        assert!(config.nutrition.endpoint.contains("openfoodfacts"));
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let foodlens_dir = temp.path().join(".foodlens");
        std::fs::create_dir_all(&foodlens_dir).unwrap();

        let config_path = foodlens_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
model:
  url: https://example.com/models/abc/
speech:
  locale: en-US
  retry_interval_ms: 50
  max_retries: 20
capture:
  narration_timeout_ms: 3000
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version.as_deref(), Some("1.0"));
        assert_eq!(config.model.url, "https://example.com/models/abc/");
        assert_eq!(config.model.load_timeout_seconds, 30);
        assert_eq!(config.speech.locale, "en-US");
        assert_eq!(config.speech.program, "espeak-ng");
        assert_eq!(config.speech.max_retries, Some(20));
        assert_eq!(config.capture.narration_timeout_ms, 3000);
        assert_eq!(config.inference.program, "tm-image-infer");
    }

    #[test]
    fn test_empty_config_is_defaults() {
        let config = parse_config("\n").unwrap();
        assert_eq!(config.speech.locale, "ko-KR");
        assert_eq!(config.camera.program, "ffmpeg");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FOODLENS_MODEL_URL", "https://example.com/m/"),
            ("FOODLENS_LOCALE", "ja-JP"),
        ]
        .into_iter()
        .collect();

        let mut config = ResolvedConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.model.url, "https://example.com/m/");
        assert_eq!(config.speech.locale, "ja-JP");
        assert_eq!(config.nutrition.endpoint, default_nutrition_endpoint());
    }
}
