//! Reference guide search
//!
//! A plain-text document split into overlapping chunks. Queries are
//! scored by the share of their words (longer than two characters) that
//! appear in a chunk.

use std::path::Path;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;
pub const TOP_CHUNKS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct ReferenceGuide {
    chunks: Vec<String>,
}

impl ReferenceGuide {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let guide = Self::from_text(&text);
        tracing::info!(path = %path.display(), chunks = guide.len(), "Reference guide loaded");
        Ok(guide)
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            chunks: chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Best matching chunks, highest score first
    pub fn search(&self, query: &str) -> Vec<&str> {
        let words: Vec<String> = query
            .split_whitespace()
            .filter(|w| w.chars().count() > 2)
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &str)> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let lower = chunk.to_lowercase();
                let matches = words.iter().filter(|w| lower.contains(w.as_str())).count();
                (matches > 0).then_some((matches, chunk.as_str()))
            })
            .collect();

        // Stable, so equal scores keep document order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(TOP_CHUNKS).map(|(_, c)| c).collect()
    }

    /// Search results formatted as prompt context
    pub fn context_for(&self, query: &str) -> Option<String> {
        let hits = self.search(query);
        if hits.is_empty() {
            return None;
        }
        Some(format!(
            "Relevant reference material:\n\n{}",
            hits.join("\n\n---\n\n")
        ))
    }
}

/// Split into chunks of at most `size` characters overlapping by
/// `overlap`, preferring to end a chunk on whitespace
fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step_floor = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            // Back off to the last whitespace in the second half of the window
            if let Some(ws) = (start + size / 2..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { start + step_floor };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_overlap() {
        let text = "word ".repeat(600);
        let chunks = chunk_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);

        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= CHUNK_SIZE));
    }

    #[test]
    fn test_short_text_single_chunk() {
        let guide = ReferenceGuide::from_text("Insulin lowers blood glucose.");
        assert_eq!(guide.len(), 1);
        assert!(ReferenceGuide::from_text("   ").is_empty());
    }

    #[test]
    fn test_search_ranking() {
        let mut text = String::new();
        text.push_str(&"Exercise lowers glucose during activity. ".repeat(30));
        text.push_str(&"x ".repeat(600));
        text.push_str(&"Hypoglycemia treatment: take fast carbohydrates and recheck glucose. ".repeat(20));
        let guide = ReferenceGuide::from_text(&text);

        let hits = guide.search("how to treat hypoglycemia with carbohydrates");
        assert!(!hits.is_empty());
        assert!(hits.len() <= TOP_CHUNKS);
        assert!(hits[0].contains("Hypoglycemia"));

        assert!(guide.search("a an").is_empty());
        assert!(guide.context_for("zebra").is_none());
    }
}
