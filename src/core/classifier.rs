//! Image classifier adapter.
//!
//! Loads the model description (`model.json`) and class metadata
//! (`metadata.json`) from the model base URL, then scores frames through an
//! [`InferenceBackend`]. Load progress is published as a [`ModelStatus`]
//! on a watch channel.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::adapters::{InferenceBackend, InferenceOutput};
use crate::domain::{Frame, Prediction};

/// Errors from loading or running the model
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model is not loaded")]
    NotLoaded,

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid model asset {url}: {source}")]
    InvalidAsset {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model metadata lists no classes")]
    NoClasses,

    #[error("model load failed: {0}")]
    LoadFailed(String),

    #[error("model did not finish loading within {0:?}")]
    LoadTimeout(Duration),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("inference returned {actual} scores for {expected} classes")]
    ClassMismatch { expected: usize, actual: usize },
}

/// Load state of the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    /// Not loaded yet (or still loading)
    Loading,

    /// Loaded with this many output classes
    Ready { classes: usize },

    /// Loading failed
    Failed(String),
}

/// Class metadata written by the model trainer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    labels: Vec<String>,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    image_size: Option<u32>,
}

/// Everything loaded from the model base URL
#[derive(Debug, Clone)]
pub struct ModelAssets {
    /// Base URL the assets came from
    pub url: String,

    /// Class labels in output order
    pub labels: Vec<String>,

    pub model_name: Option<String>,

    /// Square input size in pixels
    pub image_size: Option<u32>,

    /// Raw `model.json` document
    pub topology: serde_json::Value,
}

impl ModelAssets {
    /// Assets with only labels (no remote documents)
    pub fn from_labels(url: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            url: url.into(),
            labels,
            model_name: None,
            image_size: None,
            topology: serde_json::Value::Null,
        }
    }

    pub fn total_classes(&self) -> usize {
        self.labels.len()
    }
}

/// `{base}/{name}` regardless of a trailing slash on `base`
pub fn asset_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Wraps the opaque image model
pub struct Classifier {
    client: reqwest::Client,
    backend: Arc<dyn InferenceBackend>,
    assets: RwLock<Option<Arc<ModelAssets>>>,
    status: watch::Sender<ModelStatus>,
}

impl Classifier {
    /// Create an unloaded classifier
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        let (status, _) = watch::channel(ModelStatus::Loading);
        Self {
            client: reqwest::Client::new(),
            backend,
            assets: RwLock::new(None),
            status,
        }
    }

    /// Create a classifier with assets already in hand
    pub fn with_assets(backend: Arc<dyn InferenceBackend>, assets: ModelAssets) -> Self {
        let classifier = Self::new(backend);
        classifier.install(assets);
        classifier
    }

    fn install(&self, assets: ModelAssets) -> usize {
        let classes = assets.total_classes();
        *self.assets.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(assets));
        self.status.send_replace(ModelStatus::Ready { classes });
        classes
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, ClassifierError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClassifierError::Fetch {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ClassifierError::Fetch {
                url: url.clone(),
                source,
            })?;

        serde_json::from_str(&body).map_err(|source| ClassifierError::InvalidAsset { url, source })
    }

    /// Fetch `model.json` and `metadata.json` and record the class count.
    ///
    /// Failures are also published as [`ModelStatus::Failed`].
    #[instrument(skip(self))]
    pub async fn load_model(&self, model_url: &str) -> Result<usize, ClassifierError> {
        self.status.send_replace(ModelStatus::Loading);

        match self.fetch_assets(model_url).await {
            Ok(assets) => {
                let classes = self.install(assets);
                info!(classes, "Model loaded");
                Ok(classes)
            }
            Err(e) => {
                warn!(error = %e, "Model load failed");
                self.status.send_replace(ModelStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn fetch_assets(&self, model_url: &str) -> Result<ModelAssets, ClassifierError> {
        let (topology, metadata) = tokio::try_join!(
            self.fetch_json::<serde_json::Value>(asset_url(model_url, "model.json")),
            self.fetch_json::<Metadata>(asset_url(model_url, "metadata.json")),
        )?;

        if metadata.labels.is_empty() {
            return Err(ClassifierError::NoClasses);
        }

        Ok(ModelAssets {
            url: model_url.to_string(),
            labels: metadata.labels,
            model_name: metadata.model_name,
            image_size: metadata.image_size,
            topology,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.assets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Number of output classes, once loaded
    pub fn total_classes(&self) -> Option<usize> {
        self.assets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|a| a.total_classes())
    }

    pub fn status(&self) -> ModelStatus {
        self.status.borrow().clone()
    }

    /// Wait until loading settles (ready or failed)
    pub async fn wait_ready(&self, limit: Duration) -> Result<usize, ClassifierError> {
        let mut status = self.status.subscribe();

        let settled = tokio::time::timeout(
            limit,
            status.wait_for(|s| !matches!(s, ModelStatus::Loading)),
        )
        .await
        .map_err(|_| ClassifierError::LoadTimeout(limit))?
        .map_err(|_| ClassifierError::NotLoaded)?
        .clone();

        match settled {
            ModelStatus::Ready { classes } => Ok(classes),
            ModelStatus::Failed(error) => Err(ClassifierError::LoadFailed(error)),
            ModelStatus::Loading => Err(ClassifierError::NotLoaded),
        }
    }

    /// Score every class against `frame`.
    ///
    /// Returns the full per-class sequence in label order.
    pub async fn predict(&self, frame: &Frame) -> Result<Vec<Prediction>, ClassifierError> {
        let assets = self
            .assets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ClassifierError::NotLoaded)?;

        let output = self
            .backend
            .infer(&assets.url, frame)
            .await
            .map_err(|e| ClassifierError::Inference(format!("{:#}", e)))?;

        if output.len() != assets.total_classes() {
            return Err(ClassifierError::ClassMismatch {
                expected: assets.total_classes(),
                actual: output.len(),
            });
        }

        Ok(match output {
            InferenceOutput::Scores(scores) => assets
                .labels
                .iter()
                .zip(scores)
                .map(|(label, probability)| Prediction::new(label.clone(), probability))
                .collect(),
            InferenceOutput::Predictions(predictions) => predictions,
        })
    }
}
