use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

const DEFAULT_CLASSIFIER_URL: &str =
    "https://api-inference.huggingface.co/models/google/mobilenet_v2_1.0_224";
const DEFAULT_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Classifier,
    Vision,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classifier" => Ok(BackendKind::Classifier),
            "vision" => Ok(BackendKind::Vision),
            other => bail!("unknown STORY_BACKEND `{other}` (expected `classifier` or `vision`)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub url: String,
    pub api_token: Option<String>,
    pub health_url: Option<String>,
    pub top_k: usize,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub story_model: String,
    pub title_model: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: BackendKind,
    pub classifier: ClassifierConfig,
    pub vision: VisionConfig,
    pub model_load_timeout: Duration,
    pub http_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let config = AppConfig {
            bind_addr: parse_or(&var, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            backend: parse_or(&var, "STORY_BACKEND", BackendKind::Classifier)?,
            classifier: ClassifierConfig {
                url: string_or("CLASSIFIER_URL", DEFAULT_CLASSIFIER_URL),
                api_token: var("CLASSIFIER_API_TOKEN"),
                health_url: var("CLASSIFIER_HEALTH_URL"),
                top_k: parse_or(&var, "CLASSIFIER_TOP_K", 3)?,
            },
            vision: VisionConfig {
                api_url: string_or("OPENAI_API_URL", DEFAULT_CHAT_URL),
                api_key: var("OPENAI_API_KEY"),
                story_model: string_or("VISION_MODEL", "gpt-4o"),
                title_model: string_or("TITLE_MODEL", "gpt-4o-mini"),
            },
            model_load_timeout: Duration::from_secs(parse_or(&var, "MODEL_LOAD_TIMEOUT_SECS", 60)?),
            http_timeout: Duration::from_secs(parse_or(&var, "HTTP_TIMEOUT_SECS", 30)?),
            max_upload_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        };

        if config.classifier.top_k == 0 {
            bail!("CLASSIFIER_TOP_K must be at least 1");
        }
        if config.backend == BackendKind::Vision && config.vision.api_key.is_none() {
            bail!("OPENAI_API_KEY is required when STORY_BACKEND=vision");
        }

        Ok(config)
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid value for {key}: `{raw}`")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.backend, BackendKind::Classifier);
        assert_eq!(config.classifier.url, DEFAULT_CLASSIFIER_URL);
        assert_eq!(config.classifier.top_k, 3);
        assert_eq!(config.model_load_timeout, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.vision.api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("STORY_BACKEND", "Vision"),
            ("OPENAI_API_KEY", "sk-test"),
            ("CLASSIFIER_TOP_K", "5"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.backend, BackendKind::Vision);
        assert_eq!(config.classifier.top_k, 5);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn vision_backend_requires_api_key() {
        let err = config_from(&[("STORY_BACKEND", "vision")]).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let err = config_from(&[("CLASSIFIER_TOP_K", "three")]).unwrap_err();
        assert!(err.to_string().contains("CLASSIFIER_TOP_K"));

        assert!(config_from(&[("CLASSIFIER_TOP_K", "0")]).is_err());
        assert!(config_from(&[("STORY_BACKEND", "oracle")]).is_err());
    }
}
