//! Baker configuration.

use serde::{Deserialize, Serialize};

use crate::error::BakeError;

/// Tolerances and naming used by the baker.
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Appended to a source clip name to form the baked clip name.
    /// Clips whose name already contains it are never baked again.
    pub suffix: String,
    /// Distance from the neutral value below which a single-key channel is dropped.
    pub noop_epsilon: f64,
    /// Distance from the extrapolated line below which a key counts as collinear.
    pub linear_epsilon: f64,
    /// Value delta under which [`CleanKeyframes`](crate::collapse::CleanKeyframes) treats keys as equal.
    pub clean_threshold: f64,
    /// Absolute determinant under which a matrix is treated as non-invertible.
    pub degenerate_epsilon: f64,
    /// Flag source clips as not exportable once their baked copy exists.
    pub mark_sources_no_export: bool,
    /// Run linear segment detection after no-op elimination.
    pub detect_linear: bool,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            suffix: "_BAKED".to_string(),
            noop_epsilon: 1e-4,
            linear_epsilon: 1e-4,
            clean_threshold: 1e-4,
            degenerate_epsilon: 1e-12,
            mark_sources_no_export: true,
            detect_linear: true,
        }
    }
}

impl BakeConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json_str(s: &str) -> Result<Self, BakeError> {
        let cfg: BakeConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject tolerances that would make the reducer or resolver meaningless.
    pub fn validate(&self) -> Result<(), BakeError> {
        if self.suffix.is_empty() {
            return Err(BakeError::Config {
                reason: "suffix must not be empty".into(),
            });
        }
        let tolerances = [
            ("noop_epsilon", self.noop_epsilon),
            ("linear_epsilon", self.linear_epsilon),
            ("clean_threshold", self.clean_threshold),
            ("degenerate_epsilon", self.degenerate_epsilon),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value <= 0.0 {
                return Err(BakeError::Config {
                    reason: format!("{name} must be finite and > 0 (got {value})"),
                });
            }
        }
        Ok(())
    }

    /// Name of the baked clip derived from `source`.
    pub fn baked_name(&self, source: &str) -> String {
        format!("{source}{}", self.suffix)
    }

    /// True when `name` already refers to a baked clip.
    pub fn is_baked_name(&self, name: &str) -> bool {
        name.contains(&self.suffix)
    }
}
