use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoryError;
use crate::models::{Genre, Story};
use crate::services::classifier::ClassifierProvider;
use crate::services::image_source::ImageSource;
use crate::services::progress::{Checkpoints, ProgressSink};
use crate::services::templates::{self, Labels};

/// Anything that can turn a picture and a genre into a finished story.
///
/// Failures are always reported as [`StoryError::GenerationFailed`]; a story is
/// either returned whole or not at all.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate(
        &self,
        image: &ImageSource,
        genre: Genre,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Story, StoryError>;
}

/// Classifies the picture and fills the genre template with the top labels.
pub struct StoryPipeline {
    classifier: Arc<ClassifierProvider>,
    http: reqwest::Client,
}

impl StoryPipeline {
    pub fn new(classifier: Arc<ClassifierProvider>, http: reqwest::Client) -> Self {
        Self { classifier, http }
    }

    async fn run(
        &self,
        image: &ImageSource,
        genre: Genre,
        checkpoints: &mut Checkpoints<'_>,
    ) -> Result<Story, StoryError> {
        // Step 1: Make sure the classifier runtime is up
        self.classifier.ensure_runtime().await?;
        checkpoints.reach(20);

        // Step 2: Load the model (only slow the first time)
        if !self.classifier.is_ready() {
            tracing::info!("classifier not loaded yet, first generation will wait for it");
        }
        self.classifier.ensure_ready().await?;
        checkpoints.reach(40);

        // Step 3: Decode the picture
        let pixels = image.load(&self.http).await?;
        checkpoints.reach(60);

        // Step 4: Classify; pixels are consumed here
        let predictions = self.classifier.classify(pixels).await?;
        tracing::debug!(?predictions, "classified image");
        checkpoints.reach(80);

        // Step 5: Fill the template
        let labels = Labels::from_predictions(&predictions);
        let text = templates::compose(genre, &labels);
        checkpoints.reach(100);

        Ok(Story::new(text, genre, image.reference()))
    }
}

#[async_trait]
impl StoryGenerator for StoryPipeline {
    async fn generate(
        &self,
        image: &ImageSource,
        genre: Genre,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Story, StoryError> {
        let mut checkpoints = Checkpoints::new(progress);
        match self.run(image, genre, &mut checkpoints).await {
            Ok(story) => {
                tracing::info!(id = %story.id, %genre, title = %story.title, "story generated");
                Ok(story)
            }
            Err(e) => {
                tracing::warn!(error = %e, %genre, "story generation failed");
                Err(e.into_generation_failure())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::tests::FixedLoader;
    use crate::services::image_source::tests::{png_bytes, png_data_url};
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn pipeline(loader: FixedLoader) -> StoryPipeline {
        StoryPipeline::new(
            Arc::new(ClassifierProvider::new(loader, Duration::from_secs(5))),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn generates_fantasy_story_with_progress() {
        let pipeline = pipeline(FixedLoader::new(vec!["dog", "park", "sunset"]));
        let source = ImageSource::parse(&png_data_url()).unwrap();
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);

        let story = pipeline
            .generate(&source, Genre::Fantasy, Some(&sink))
            .await
            .unwrap();

        assert_eq!(story.title, "The Enchanted Dog");
        assert!(story.content.starts_with("In a realm where magic permeated"));
        assert_eq!(story.genre, Genre::Fantasy);
        assert_eq!(story.image_url, png_data_url());
        assert_eq!(*seen.lock().unwrap(), vec![20, 40, 60, 80, 100]);
    }

    #[tokio::test]
    async fn works_without_progress_sink() {
        let pipeline = pipeline(FixedLoader::new(vec![]));
        let source = ImageSource::Upload {
            name: "beach.png".to_string(),
            bytes: png_bytes(),
        };
        let story = pipeline.generate(&source, Genre::Horror, None).await.unwrap();
        assert_eq!(story.title, "The Mysterious scene Haunting");
        assert_eq!(story.image_url, "upload:beach.png");
    }

    #[tokio::test]
    async fn unreachable_image_fails_without_story() {
        let pipeline = pipeline(FixedLoader::new(vec!["dog"]));
        let source = ImageSource::Remote("http://127.0.0.1:9/dog.png".to_string());
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);

        let err = pipeline
            .generate(&source, Genre::Mystery, Some(&sink))
            .await
            .unwrap_err();

        match err {
            StoryError::GenerationFailed(inner) => {
                assert!(matches!(*inner, StoryError::ImageDecodeFailed(_)))
            }
            other => panic!("unexpected {other:?}"),
        }
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![20, 40]);
    }

    #[tokio::test]
    async fn corrupt_upload_is_generation_failure() {
        let pipeline = pipeline(FixedLoader::new(vec!["dog"]));
        let source = ImageSource::Upload {
            name: "notes.txt".to_string(),
            bytes: b"hello".to_vec(),
        };
        let err = pipeline.generate(&source, Genre::SciFi, None).await.unwrap_err();
        assert!(matches!(err, StoryError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn concurrent_generations_share_one_model_load() {
        let mut loader = FixedLoader::new(vec!["ship", "harbor", "fog"]);
        loader.delay = Duration::from_millis(50);
        let loads = Arc::clone(&loader.loads);
        let pipeline = Arc::new(pipeline(loader));
        let source = ImageSource::parse(&png_data_url()).unwrap();

        let (a, b) = tokio::join!(
            pipeline.generate(&source, Genre::Adventure, None),
            pipeline.generate(&source, Genre::Romance, None),
        );

        assert_eq!(a.unwrap().title, "Quest for the Ship");
        assert_eq!(b.unwrap().title, "Love by the Ship");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_story_gets_a_fresh_id() {
        let pipeline = pipeline(FixedLoader::new(vec!["cat"]));
        let source = ImageSource::parse(&png_data_url()).unwrap();
        let first = pipeline.generate(&source, Genre::Mystery, None).await.unwrap();
        let second = pipeline.generate(&source, Genre::Mystery, None).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.content, second.content);
    }
}
