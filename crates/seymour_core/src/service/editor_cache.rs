//! Per-session editor lookup caches.
//!
//! # Invariants
//! - Created empty when the application context starts.
//! - Cleared whenever another project is opened or created.
//! - Keys are lowercased words.

use std::collections::HashMap;

const MAX_CACHED_WORDS: usize = 10_000;

#[derive(Debug, Default)]
pub struct EditorCaches {
    /// Word under the last context-menu click in the editor.
    pub last_clicked_word: Option<String>,
    spelling: HashMap<String, bool>,
    synonyms: HashMap<String, Vec<String>>,
}

impl EditorCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spelling_verdict(&self, word: &str) -> Option<bool> {
        self.spelling.get(&cache_key(word)).copied()
    }

    pub fn record_spelling(&mut self, word: &str, is_correct: bool) {
        if self.spelling.len() >= MAX_CACHED_WORDS {
            self.spelling.clear();
        }
        self.spelling.insert(cache_key(word), is_correct);
    }

    pub fn synonyms_for(&self, word: &str) -> Option<&[String]> {
        self.synonyms.get(&cache_key(word)).map(Vec::as_slice)
    }

    pub fn record_synonyms(&mut self, word: &str, synonyms: Vec<String>) {
        if self.synonyms.len() >= MAX_CACHED_WORDS {
            self.synonyms.clear();
        }
        self.synonyms.insert(cache_key(word), synonyms);
    }

    pub fn is_empty(&self) -> bool {
        self.last_clicked_word.is_none() && self.spelling.is_empty() && self.synonyms.is_empty()
    }

    pub fn clear(&mut self) {
        self.last_clicked_word = None;
        self.spelling.clear();
        self.synonyms.clear();
    }
}

fn cache_key(word: &str) -> String {
    word.trim().to_lowercase()
}
