use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Code assigned to categories never seen during fit
pub const UNKNOWN_CATEGORY: f64 = -1.0;

/// Ordinal encoder for one categorical column.
///
/// Categories are sorted during fit and coded by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    categories: Vec<String>,
    is_fitted: bool,
}

impl OrdinalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit<S: AsRef<str>>(&mut self, values: &[S]) {
        let mut categories: Vec<String> = values.iter().map(|v| v.as_ref().to_string()).collect();
        categories.sort();
        categories.dedup();

        self.categories = categories;
        self.is_fitted = true;
    }

    pub fn encode(&self, value: &str) -> Result<f64> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "OrdinalEncoder must be fitted before encode".to_string(),
            ));
        }

        Ok(self
            .categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .map(|idx| idx as f64)
            .unwrap_or(UNKNOWN_CATEGORY))
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_codes() {
        let mut encoder = OrdinalEncoder::new();
        encoder.fit(&["org", "com", "net", "com"]);

        assert_eq!(encoder.categories(), &["com", "net", "org"]);
        assert_eq!(encoder.encode("com").unwrap(), 0.0);
        assert_eq!(encoder.encode("net").unwrap(), 1.0);
        assert_eq!(encoder.encode("org").unwrap(), 2.0);
    }

    #[test]
    fn test_unseen_category() {
        let mut encoder = OrdinalEncoder::new();
        encoder.fit(&["yes", "no"]);

        assert_eq!(encoder.encode("maybe").unwrap(), UNKNOWN_CATEGORY);
        assert_eq!(encoder.encode("").unwrap(), UNKNOWN_CATEGORY);
    }

    #[test]
    fn test_encode_requires_fit() {
        let encoder = OrdinalEncoder::new();
        assert!(encoder.encode("com").is_err());
    }
}
