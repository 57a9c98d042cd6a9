//! Image classification behind a lazily loaded, process-wide model handle.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use tokio::sync::OnceCell;

use crate::config::ClassifierConfig;
use crate::error::StoryError;
use crate::models::Prediction;

/// A loaded model: pixels in, ranked labels out (highest confidence first).
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Takes the pixels by value; the buffer is dropped when this returns.
    async fn classify(&self, pixels: DynamicImage) -> Result<Vec<Prediction>, StoryError>;
}

/// Knows how to bring a [`Classifier`] into existence.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn init_runtime(&self) -> Result<(), StoryError> {
        Ok(())
    }

    async fn load(&self) -> Result<Arc<dyn Classifier>, StoryError>;
}

/// Shared handle that initializes the model at most once.
///
/// Concurrent callers racing the first load all wait on the same initialization.
/// A failed or timed-out load leaves the handle empty so a later call can retry.
pub struct ClassifierProvider {
    loader: Box<dyn ModelLoader>,
    load_timeout: Duration,
    runtime: OnceCell<()>,
    model: OnceCell<Arc<dyn Classifier>>,
}

impl ClassifierProvider {
    pub fn new(loader: impl ModelLoader + 'static, load_timeout: Duration) -> Self {
        Self {
            loader: Box::new(loader),
            load_timeout,
            runtime: OnceCell::new(),
            model: OnceCell::new(),
        }
    }

    pub async fn ensure_runtime(&self) -> Result<(), StoryError> {
        self.runtime
            .get_or_try_init(|| async {
                tracing::info!("initializing classifier runtime");
                self.bounded(self.loader.init_runtime()).await
            })
            .await?;
        Ok(())
    }

    pub async fn ensure_ready(&self) -> Result<Arc<dyn Classifier>, StoryError> {
        self.ensure_runtime().await?;
        let model = self
            .model
            .get_or_try_init(|| async {
                tracing::info!("loading classifier model");
                let model = self.bounded(self.loader.load()).await?;
                tracing::info!("classifier model ready");
                Ok::<_, StoryError>(model)
            })
            .await?;
        Ok(Arc::clone(model))
    }

    pub fn is_ready(&self) -> bool {
        self.model.initialized()
    }

    /// Classifies with the already loaded model; never triggers a load.
    pub async fn classify(&self, pixels: DynamicImage) -> Result<Vec<Prediction>, StoryError> {
        let model = self.model.get().ok_or_else(|| {
            StoryError::ModelUnavailable("classifier has not been initialized".to_string())
        })?;
        model.classify(pixels).await
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, StoryError>>,
    ) -> Result<T, StoryError> {
        match tokio::time::timeout(self.load_timeout, fut).await {
            Ok(result) => result.map_err(|e| match e {
                StoryError::ModelUnavailable(_) => e,
                other => StoryError::ModelUnavailable(other.to_string()),
            }),
            Err(_) => Err(StoryError::ModelUnavailable(format!(
                "model initialization exceeded {}s",
                self.load_timeout.as_secs()
            ))),
        }
    }
}

/// Loader for a hosted image-classification endpoint.
pub struct HttpModelLoader {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl HttpModelLoader {
    pub fn new(client: reqwest::Client, config: ClassifierConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ModelLoader for HttpModelLoader {
    async fn init_runtime(&self) -> Result<(), StoryError> {
        let Some(health_url) = &self.config.health_url else {
            return Ok(());
        };
        self.client
            .get(health_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoryError::ModelUnavailable(format!("health probe failed: {e}")))?;
        Ok(())
    }

    async fn load(&self) -> Result<Arc<dyn Classifier>, StoryError> {
        Ok(Arc::new(HttpClassifier {
            client: self.client.clone(),
            url: self.config.url.clone(),
            api_token: self.config.api_token.clone(),
            top_k: self.config.top_k,
        }))
    }
}

/// Posts PNG-encoded pixels and expects `[{"label": .., "score": ..}]` back.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    api_token: Option<String>,
    top_k: usize,
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, pixels: DynamicImage) -> Result<Vec<Prediction>, StoryError> {
        let body = encode_png(pixels)?;

        let mut request_builder = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(body);

        if let Some(token) = &self.api_token {
            request_builder = request_builder.bearer_auth(token);
        }

        let response = request_builder
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoryError::ClassificationFailed(e.to_string()))?;

        let mut predictions: Vec<Prediction> = response
            .json()
            .await
            .map_err(|e| StoryError::ClassificationFailed(format!("unexpected response: {e}")))?;

        predictions.truncate(self.top_k);
        Ok(predictions)
    }
}

fn encode_png(pixels: DynamicImage) -> Result<Vec<u8>, StoryError> {
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(StoryError::ClassificationFailed(
            "image has no pixels".to_string(),
        ));
    }
    let mut buf = Cursor::new(Vec::new());
    pixels
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| StoryError::ClassificationFailed(e.to_string()))?;
    Ok(buf.into_inner())
}
