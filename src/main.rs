mod config;
mod error;
mod models;
mod services;

use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    response::{Html, Json},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt};

use config::{AppConfig, BackendKind};
use error::StoryError;
use models::{AnalyzeRequest, AnalyzeResponse, Genre, GenreDescriptor, Story};
use services::classifier::{ClassifierProvider, HttpModelLoader};
use services::image_source::ImageSource;
use services::llm::VisionStoryClient;
use services::pipeline::{StoryGenerator, StoryPipeline};
use services::progress::ProgressGauge;

#[derive(Clone)]
struct AppState {
    generator: Arc<dyn StoryGenerator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let generator = build_generator(&config)?;
    tracing::info!(backend = ?config.backend, "story backend configured");

    let app = router(AppState { generator }, config.max_upload_bytes);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_generator(config: &AppConfig) -> anyhow::Result<Arc<dyn StoryGenerator>> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let generator: Arc<dyn StoryGenerator> = match config.backend {
        BackendKind::Classifier => {
            let loader = HttpModelLoader::new(http.clone(), config.classifier.clone());
            let provider = Arc::new(ClassifierProvider::new(loader, config.model_load_timeout));
            Arc::new(StoryPipeline::new(provider, http))
        }
        BackendKind::Vision => Arc::new(VisionStoryClient::new(http, config.vision.clone())),
    };

    Ok(generator)
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/genres", get(list_genres))
        .route("/analyze-image", post(analyze_image))
        .route("/upload", post(upload_image))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Picture Tales</title></head>
<body>
    <h1>Picture Tales</h1>
    <p>Post a picture and a genre; get a short story back.</p>
    <ul>
        <li><code>GET /genres</code> lists fantasy, sci-fi, romance, mystery, adventure and horror</li>
        <li><code>POST /analyze-image</code> takes <code>{"imageUrl", "genre"}</code> and answers <code>{"title", "content"}</code></li>
        <li><code>POST /upload</code> takes a multipart form with <code>image_file</code> and <code>genre</code></li>
        <li><code>GET /health</code></li>
    </ul>
</body>
</html>
"#,
    )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_genres() -> Json<Vec<GenreDescriptor>> {
    Json(Genre::ALL.into_iter().map(Genre::descriptor).collect())
}

async fn generate_tracked(
    generator: &dyn StoryGenerator,
    source: &ImageSource,
    genre: Genre,
) -> Result<Story, StoryError> {
    let gauge = ProgressGauge::new();
    gauge
        .track(async {
            generator
                .generate(source, genre, Some(&gauge))
                .await
                .inspect_err(|_| tracing::warn!(%genre, reached = gauge.current(), "generation stopped"))
        })
        .await
}

async fn analyze_image(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, StoryError> {
    let Json(request) = payload?;
    let genre: Genre = request.genre.parse()?;
    let source = ImageSource::parse(&request.image_url)
        .map_err(|e| StoryError::BadRequest(e.to_string()))?;

    let story = generate_tracked(state.generator.as_ref(), &source, genre).await?;

    Ok(Json(AnalyzeResponse {
        title: story.title,
        content: story.content,
    }))
}

async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Story>, StoryError> {
    let mut multipart = multipart?;
    let mut image = None;
    let mut genre = None;

    // Extract the uploaded image and the chosen genre
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or("unknown").to_string();
        match field_name.as_str() {
            "image_file" => {
                let name = field.file_name().unwrap_or("image").to_string();
                let bytes = field.bytes().await?;
                image = Some(ImageSource::Upload {
                    name,
                    bytes: bytes.to_vec(),
                });
            }
            "genre" => {
                let text = field.text().await?;
                genre = Some(text.parse::<Genre>()?);
            }
            _ => {}
        }
    }

    let genre = genre.ok_or_else(|| StoryError::InvalidGenre("<missing>".to_string()))?;
    let image =
        image.ok_or_else(|| StoryError::BadRequest("missing image_file field".to_string()))?;

    let story = generate_tracked(state.generator.as_ref(), &image, genre).await?;
    Ok(Json(story))
}
