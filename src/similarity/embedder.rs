use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::text::simple_tokenize;

/// Turns text into a dense vector. Implementations must be cheap to share
/// across concurrent requests.
pub trait TextEmbedder: Send + Sync {
    fn is_available(&self) -> bool;

    /// `None` when the model is unavailable. Text with no known tokens embeds
    /// to a zero vector, which is similar to nothing.
    fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom < 1e-12 {
        return 0.0;
    }
    dot / denom
}

/// Word-vector table exported from the trained document model.
#[derive(Debug, Deserialize)]
pub struct WordVectors {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectors {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let table: WordVectors = serde_json::from_str(&raw)?;
        if table.dimensions == 0 {
            anyhow::bail!("word vectors declare zero dimensions");
        }
        if let Some((word, _)) = table
            .vectors
            .iter()
            .find(|(_, v)| v.len() != table.dimensions)
        {
            anyhow::bail!(
                "vector for {:?} does not have {} dimensions",
                word,
                table.dimensions
            );
        }
        Ok(table)
    }

    /// Exact token first, then ever shorter prefixes so inflected Korean
    /// forms ("행복했다") land on their stem ("행복").
    fn lookup(&self, token: &str) -> Option<&Vec<f32>> {
        if let Some(v) = self.vectors.get(token) {
            return Some(v);
        }
        let chars: Vec<char> = token.chars().collect();
        (2..chars.len())
            .rev()
            .find_map(|n| self.vectors.get(&chars[..n].iter().collect::<String>()))
    }

    pub fn infer_vector(&self, tokens: &[String]) -> Vec<f32> {
        let mut sum = vec![0f32; self.dimensions];
        let mut hits = 0usize;
        for token in tokens {
            if let Some(v) = self.lookup(token) {
                for (acc, x) in sum.iter_mut().zip(v) {
                    *acc += x;
                }
                hits += 1;
            }
        }
        if hits > 0 {
            let n = hits as f32;
            sum.iter_mut().for_each(|x| *x /= n);
        }
        sum
    }
}

/// Lazily loads a [`WordVectors`] file on first use. A missing or broken file
/// leaves the embedder permanently unavailable for this process.
pub struct FileEmbedder {
    path: Option<PathBuf>,
    model: OnceLock<Option<Arc<WordVectors>>>,
}

impl FileEmbedder {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            model: OnceLock::new(),
        }
    }

    fn model(&self) -> Option<Arc<WordVectors>> {
        self.model
            .get_or_init(|| {
                let path = self.path.as_ref()?;
                match WordVectors::load(path) {
                    Ok(table) => {
                        tracing::info!(
                            path = %path.display(),
                            words = table.vectors.len(),
                            dimensions = table.dimensions,
                            "Loaded similarity model"
                        );
                        Some(Arc::new(table))
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Similarity model failed to load"
                        );
                        None
                    }
                }
            })
            .clone()
    }
}

impl TextEmbedder for FileEmbedder {
    fn is_available(&self) -> bool {
        self.model().is_some()
    }

    fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let model = self.model()?;
        Some(model.infer_vector(&simple_tokenize(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vectors(body: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", body).unwrap();
        file
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_file_embedder_averages_known_tokens_with_prefix_fallback() {
        let file = write_vectors(serde_json::json!({
            "dimensions": 2,
            "vectors": { "행복": [1.0, 0.0], "친구": [0.0, 1.0] }
        }));
        let embedder = FileEmbedder::new(Some(file.path().to_path_buf()));
        assert!(embedder.is_available());

        let v = embedder.embed("행복했다 친구들과").unwrap();
        assert!((v[0] - 0.5).abs() < 1e-6);
        assert!((v[1] - 0.5).abs() < 1e-6);

        let unknown = embedder.embed("전혀 모르는 말").unwrap();
        assert_eq!(unknown, vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let embedder = FileEmbedder::new(None);
        assert!(!embedder.is_available());
        assert!(embedder.embed("아무거나").is_none());

        let broken = FileEmbedder::new(Some(PathBuf::from("/nonexistent/vectors.json")));
        assert!(!broken.is_available());
    }

    #[test]
    fn test_rejects_ragged_vectors() {
        let file = write_vectors(serde_json::json!({
            "dimensions": 3,
            "vectors": { "a": [1.0, 0.0] }
        }));
        assert!(WordVectors::load(file.path()).is_err());
    }
}
