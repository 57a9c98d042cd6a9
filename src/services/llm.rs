use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::VisionConfig;
use crate::error::StoryError;
use crate::models::{Genre, Story, StoryText};
use crate::services::image_source::ImageSource;
use crate::services::pipeline::StoryGenerator;
use crate::services::progress::{Checkpoints, ProgressSink};

const STORY_MAX_TOKENS: u32 = 1000;
const TITLE_MAX_TOKENS: u32 = 50;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Writes stories with a multimodal chat-completion API: one call for the
/// story, a second for its title.
pub struct VisionStoryClient {
    client: reqwest::Client,
    config: VisionConfig,
}

impl VisionStoryClient {
    pub fn new(client: reqwest::Client, config: VisionConfig) -> Self {
        VisionStoryClient { client, config }
    }

    pub async fn write_story(&self, image_bytes: &[u8], genre: Genre) -> Result<String, StoryError> {
        let prompt = format!(
            "Analyze this image and create a compelling {genre} story based on what you see. The story should be engaging and match the genre's style. Keep the story between 300-500 words."
        );
        let image_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(image_bytes));

        self.complete(json!({
            "model": self.config.story_model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image_url } }
                ]
            }],
            "max_tokens": STORY_MAX_TOKENS
        }))
        .await
    }

    pub async fn write_title(&self, story: &str, genre: Genre) -> Result<String, StoryError> {
        let prompt = format!("Generate a short, captivating title for this {genre} story:\n\n{story}");

        let title = self
            .complete(json!({
                "model": self.config.title_model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": TITLE_MAX_TOKENS
            }))
            .await?;

        Ok(strip_quotes(&title))
    }

    async fn complete(&self, body: Value) -> Result<String, StoryError> {
        let mut request_builder = self
            .client
            .post(&self.config.api_url)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(api_key) = &self.config.api_key {
            request_builder = request_builder.bearer_auth(api_key);
        }

        let response = request_builder.send().await?.error_for_status()?;
        let completion: ChatCompletion = response.json().await?;

        first_message(completion)
    }
}

fn first_message(completion: ChatCompletion) -> Result<String, StoryError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| StoryError::Upstream("completion contained no message".to_string()))
}

fn strip_quotes(title: &str) -> String {
    title.replace(['"', '\''], "").trim().to_string()
}

#[async_trait]
impl StoryGenerator for VisionStoryClient {
    async fn generate(
        &self,
        image: &ImageSource,
        genre: Genre,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Story, StoryError> {
        let mut checkpoints = Checkpoints::new(progress);

        let result = async {
            let bytes = image.resolve(&self.client).await?;
            checkpoints.reach(20);

            let content = self.write_story(&bytes, genre).await?;
            checkpoints.reach(60);

            let title = self.write_title(&content, genre).await?;
            checkpoints.reach(100);

            Ok::<_, StoryError>(StoryText { title, content })
        }
        .await;

        match result {
            Ok(text) => {
                let story = Story::new(text, genre, image.reference());
                tracing::info!(id = %story.id, %genre, title = %story.title, "story written by vision model");
                Ok(story)
            }
            Err(e) => {
                tracing::error!(error = %e, %genre, "vision story generation failed");
                Err(e.into_generation_failure())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::image_source::tests::png_data_url;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/v1/chat/completions")
    }

    fn client(api_url: String) -> VisionStoryClient {
        VisionStoryClient::new(
            reqwest::Client::new(),
            VisionConfig {
                api_url,
                api_key: Some("sk-test".to_string()),
                story_model: "vision-model".to_string(),
                title_model: "title-model".to_string(),
            },
        )
    }

    #[test]
    fn title_quotes_are_removed() {
        assert_eq!(strip_quotes("\"The Lighthouse's Secret\"\n"), "The Lighthouses Secret");
    }

    #[test]
    fn empty_completion_is_upstream_error() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(first_message(completion), Err(StoryError::Upstream(_))));
    }

    #[tokio::test]
    async fn makes_story_then_title_requests() {
        let requests: Arc<Mutex<Vec<Value>>> = Arc::default();
        let recorded = Arc::clone(&requests);
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<Value>| {
                let recorded = Arc::clone(&recorded);
                async move {
                    let reply = if body["model"] == "vision-model" {
                        "Once upon a time.\n\nThe end."
                    } else {
                        "\"A Quiet Harbor\""
                    };
                    recorded.lock().unwrap().push(body);
                    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": reply } }] }))
                }
            }),
        );
        let vision = client(serve(app).await);
        let source = ImageSource::parse(&png_data_url()).unwrap();
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);

        let story = vision
            .generate(&source, Genre::Adventure, Some(&sink))
            .await
            .unwrap();

        assert_eq!(story.title, "A Quiet Harbor");
        assert_eq!(story.content, "Once upon a time.\n\nThe end.");
        assert_eq!(*seen.lock().unwrap(), vec![20, 60, 100]);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["max_tokens"], 1000);
        let image_part = &requests[0]["messages"][0]["content"][1]["image_url"]["url"];
        assert!(image_part.as_str().unwrap().starts_with("data:image/jpeg;base64,"));
        assert_eq!(requests[1]["max_tokens"], 50);
        assert!(
            requests[1]["messages"][0]["content"]
                .as_str()
                .unwrap()
                .contains("adventure story")
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_generation_failure() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let vision = client(serve(app).await);
        let source = ImageSource::parse(&png_data_url()).unwrap();

        let err = vision.generate(&source, Genre::Horror, None).await.unwrap_err();
        match err {
            StoryError::GenerationFailed(inner) => {
                assert!(matches!(*inner, StoryError::Upstream(_)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
