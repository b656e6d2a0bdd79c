use std::path::Path;

use super::backend::LoadError;

/// Class names indexed by model output position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels(Vec<String>);

impl Labels {
    pub fn new(labels: Vec<String>) -> Result<Self, LoadError> {
        if labels.is_empty() {
            return Err(LoadError::Labels("label table is empty".to_string()));
        }
        Ok(Self(labels))
    }

    /// Reads a label table: a JSON array of strings for `.json` files,
    /// otherwise one label per line. Blank lines are skipped.
    pub async fn load(path: &Path) -> Result<Self, LoadError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            LoadError::Labels(format!("cannot read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_lines(&contents)
        }
    }

    pub fn from_lines(contents: &str) -> Result<Self, LoadError> {
        let labels = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(labels)
    }

    pub fn from_json(contents: &str) -> Result<Self, LoadError> {
        let labels: Vec<String> = serde_json::from_str(contents)
            .map_err(|e| LoadError::Labels(format!("expected a JSON array of strings: {}", e)))?;
        Self::new(labels)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
