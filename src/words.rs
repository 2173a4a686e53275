use std::collections::{HashSet, VecDeque};

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::error::EmptyCorpus;
use crate::types::WordEntry;

/// Picks hidden words, keeping the last `window` picks out of the draw.
pub struct WordPicker {
    corpus: Vec<WordEntry>,
    recent: VecDeque<String>,
    window: usize,
}

impl WordPicker {
    pub fn new(corpus: Vec<WordEntry>, window: usize) -> Self {
        Self {
            corpus,
            recent: VecDeque::with_capacity(window + 1),
            window,
        }
    }

    pub fn select(&mut self) -> Result<WordEntry, EmptyCorpus> {
        self.select_with(&mut rand::rng())
    }

    pub fn select_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<WordEntry, EmptyCorpus> {
        let mut candidates: Vec<&WordEntry> = {
            let recent: HashSet<&str> = self.recent.iter().map(String::as_str).collect();
            self.corpus
                .iter()
                .filter(|entry| !recent.contains(entry.word.as_str()))
                .collect()
        };

        if candidates.is_empty() {
            tracing::debug!("Recent word history exhausted the corpus, starting over");
            let last = self.recent.back().cloned();
            self.recent.clear();
            candidates = self
                .corpus
                .iter()
                .filter(|entry| Some(&entry.word) != last.as_ref())
                .collect();
            if candidates.is_empty() {
                candidates = self.corpus.iter().collect();
            }
        }

        let entry = (*candidates.choose(rng).ok_or(EmptyCorpus)?).clone();

        self.recent.push_back(entry.word.clone());
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }

        Ok(entry)
    }
}
