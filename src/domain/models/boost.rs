use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Per-field multipliers applied at query time (no reindex required).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoostConfiguration {
    pub content: f32,
    pub entity_name: f32,
    pub doc_summary: f32,
}

impl Default for BoostConfiguration {
    fn default() -> Self {
        Self {
            content: 1.0,
            entity_name: 3.0,
            doc_summary: 2.0,
        }
    }
}

impl BoostConfiguration {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("content", self.content),
            ("entity_name", self.entity_name),
            ("doc_summary", self.doc_summary),
        ] {
            if !(value > 0.0) {
                return Err(DomainError::validation(format!(
                    "boost.{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Linear-combination weights for the hybrid merge. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HybridWeights {
    pub keyword_weight: f32,
    pub vector_weight: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            keyword_weight: 0.6,
            vector_weight: 0.4,
        }
    }
}

impl HybridWeights {
    pub fn new(keyword_weight: f32, vector_weight: f32) -> Result<Self, DomainError> {
        let weights = Self {
            keyword_weight,
            vector_weight,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.keyword_weight) || !(0.0..=1.0).contains(&self.vector_weight) {
            return Err(DomainError::validation(
                "hybrid weights must each be within [0, 1]",
            ));
        }
        if (self.keyword_weight + self.vector_weight - 1.0).abs() > 1e-3 {
            return Err(DomainError::validation(format!(
                "hybrid weights must sum to 1.0, got {} + {} = {}",
                self.keyword_weight,
                self.vector_weight,
                self.keyword_weight + self.vector_weight
            )));
        }
        Ok(())
    }
}

/// Facet aggregation tunables: top-N values returned per facet field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FacetConfig {
    pub limit: usize,
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

/// Bounds for the transitive graph resolver: the depth used when a query
/// doesn't specify one, and the ceiling a caller-supplied depth is validated
/// against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransitiveConfig {
    pub default_depth: u32,
    pub max_depth: u32,
}

impl Default for TransitiveConfig {
    fn default() -> Self {
        Self {
            default_depth: 5,
            max_depth: 10,
        }
    }
}

impl TransitiveConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.default_depth == 0 || self.default_depth > self.max_depth {
            return Err(DomainError::validation(
                "transitive default-depth must be in [1, max-depth]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let boost = BoostConfiguration::default();
        assert_eq!(boost.entity_name, 3.0);
        assert_eq!(boost.doc_summary, 2.0);
        assert_eq!(boost.content, 1.0);

        let weights = HybridWeights::default();
        assert_eq!(weights.keyword_weight, 0.6);
        assert_eq!(weights.vector_weight, 0.4);
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert!(HybridWeights::new(0.5, 0.6).is_err());
        assert!(HybridWeights::new(0.7, 0.3).is_ok());
    }

    #[test]
    fn boost_rejects_non_positive_values() {
        let boost = BoostConfiguration {
            content: 0.0,
            ..Default::default()
        };
        assert!(boost.validate().is_err());
    }
}
