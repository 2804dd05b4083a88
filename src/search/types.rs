use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Anything that can be ranked by a similarity score. Higher is better.
pub trait Scored {
    fn score(&self) -> f32;
}

/// A single hit returned by a shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SearchResult {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl Scored for SearchResult {
    fn score(&self) -> f32 {
        self.score
    }
}
