use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Genre {
    Fantasy,
    SciFi,
    Romance,
    Mystery,
    Adventure,
    Horror,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::Fantasy,
        Genre::SciFi,
        Genre::Romance,
        Genre::Mystery,
        Genre::Adventure,
        Genre::Horror,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Genre::Fantasy => "fantasy",
            Genre::SciFi => "sci-fi",
            Genre::Romance => "romance",
            Genre::Mystery => "mystery",
            Genre::Adventure => "adventure",
            Genre::Horror => "horror",
        }
    }

    /// Display metadata shown by the genre picker.
    pub fn descriptor(self) -> GenreDescriptor {
        let (name, description) = match self {
            Genre::Fantasy => (
                "Fantasy",
                "Magical worlds with heroes, creatures, and enchanting adventures",
            ),
            Genre::SciFi => (
                "Science Fiction",
                "Futuristic tales of technology, space, and scientific possibilities",
            ),
            Genre::Romance => (
                "Romance",
                "Stories of love, relationships, and emotional connections",
            ),
            Genre::Mystery => (
                "Mystery",
                "Intriguing puzzles, secrets, and suspenseful revelations",
            ),
            Genre::Adventure => (
                "Adventure",
                "Exciting journeys, quests, and daring explorations",
            ),
            Genre::Horror => (
                "Horror",
                "Chilling tales designed to frighten and unsettle",
            ),
        };

        GenreDescriptor {
            id: self,
            name,
            description,
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .into_iter()
            .find(|genre| genre.as_str() == s.trim())
            .ok_or_else(|| StoryError::InvalidGenre(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenreDescriptor {
    pub id: Genre,
    pub name: &'static str,
    pub description: &'static str,
}

/// A finished story. Built once by a story backend and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub genre: Genre,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl Story {
    pub fn new(text: StoryText, genre: Genre, image_url: impl Into<String>) -> Self {
        Story {
            id: Uuid::new_v4(),
            title: text.title,
            content: text.content,
            genre,
            image_url: image_url.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryText {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    #[serde(alias = "score")]
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub image_url: String,
    pub genre: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub title: String,
    pub content: String,
}
