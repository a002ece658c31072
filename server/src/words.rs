//! Word source: hands out one random word per turn for a category.

use crate::error::{GameError, GameResult, NotFoundKind};
use async_trait::async_trait;
use dashmap::DashMap;
use log::warn;
use rand::seq::SliceRandom;

#[async_trait]
pub trait WordSource: Send + Sync {
    /// Fails with `NotFound` when the category has no words.
    async fn random_word(&self, category_id: &str) -> GameResult<String>;
}

const DEFAULT_WORDS: &[(&str, &[&str])] = &[
    (
        "animals",
        &[
            "cat", "dog", "elephant", "giraffe", "penguin", "octopus", "kangaroo", "snail",
            "owl", "sea horse",
        ],
    ),
    (
        "food",
        &[
            "pizza", "banana", "ice cream", "hot dog", "pancake", "broccoli", "sushi", "taco",
        ],
    ),
    (
        "objects",
        &[
            "umbrella", "bicycle", "lighthouse", "scissors", "guitar", "toothbrush", "ladder",
            "alarm clock",
        ],
    ),
];

/// In-memory category -> words pool.
#[derive(Debug, Default)]
pub struct InMemoryWordSource {
    categories: DashMap<String, Vec<String>>,
}

impl InMemoryWordSource {
    pub fn new() -> Self {
        Self {
            categories: DashMap::new(),
        }
    }

    /// Pool preloaded with a few built-in categories.
    pub fn with_defaults() -> Self {
        let source = Self::new();
        for (category, words) in DEFAULT_WORDS {
            for word in *words {
                source.add_word(category, word);
            }
        }
        source
    }

    /// Parses `category:word` lines. Blank lines and `#` comments are
    /// skipped; malformed lines are logged and ignored.
    pub fn from_lines(text: &str) -> Self {
        let source = Self::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(':') {
                Some((category, word)) if !category.trim().is_empty() && !word.trim().is_empty() => {
                    source.add_word(category.trim(), word.trim());
                }
                _ => warn!("Ignoring malformed word list line {}: {:?}", number + 1, line),
            }
        }
        source
    }

    /// Categories are stored lowercase, the form rooms ask for.
    pub fn add_word(&self, category_id: &str, word: &str) {
        self.categories
            .entry(category_id.trim().to_lowercase())
            .or_default()
            .push(word.to_string());
    }

    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn word_count(&self, category_id: &str) -> usize {
        self.categories
            .get(&category_id.trim().to_lowercase())
            .map(|words| words.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl WordSource for InMemoryWordSource {
    async fn random_word(&self, category_id: &str) -> GameResult<String> {
        self.categories
            .get(category_id)
            .and_then(|words| words.choose(&mut rand::thread_rng()).cloned())
            .ok_or_else(|| GameError::NotFound(NotFoundKind::Category(category_id.to_string())))
    }
}
