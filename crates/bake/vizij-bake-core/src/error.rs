//! Error types for rig baking.

use serde::{Deserialize, Serialize};

/// Which matrix of a resolver evaluation turned out to be non-invertible.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixRole {
    Rest,
    Pose,
    ParentRest,
    ParentPose,
}

impl std::fmt::Display for MatrixRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatrixRole::Rest => "rest",
            MatrixRole::Pose => "pose",
            MatrixRole::ParentRest => "parent rest",
            MatrixRole::ParentPose => "parent pose",
        };
        f.write_str(name)
    }
}

/// Errors raised while validating rigs or baking clips.
///
/// An empty or inverted frame range is not an error: it bakes to an empty
/// channel set instead of failing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BakeError {
    /// A rest or pose matrix cannot be inverted (degenerate scale).
    #[error("degenerate {matrix} matrix for bone '{bone}' at frame {frame}")]
    DegenerateTransform {
        bone: String,
        frame: i64,
        matrix: MatrixRole,
    },

    /// Bone has no rest matrix.
    #[error("bone '{bone}' has no rest pose")]
    MissingRestPose { bone: String },

    /// The pose sampler returned no matrix for a bone that must be baked.
    #[error("pose sample for bone '{bone}' missing at frame {frame}")]
    MissingPoseSample { bone: String, frame: i64 },

    /// Frame range endpoints are not finite.
    #[error("invalid frame range [{start}, {end}]")]
    InvalidFrameRange { start: f64, end: f64 },

    /// Skeleton topology is broken (duplicate names, unknown parent, cycle).
    #[error("invalid skeleton: {reason}")]
    InvalidSkeleton { reason: String },

    /// Sampler was asked for an armature it does not know.
    #[error("unknown armature '{name}'")]
    UnknownArmature { name: String },

    /// Sampler was asked for a clip it does not know.
    #[error("unknown clip '{name}'")]
    UnknownClip { name: String },

    /// Rig or config JSON could not be parsed.
    #[error("parse error: {reason}")]
    Parse { reason: String },

    /// Configuration values are out of range.
    #[error("invalid config: {reason}")]
    Config { reason: String },
}

impl From<serde_json::Error> for BakeError {
    fn from(err: serde_json::Error) -> Self {
        BakeError::Parse {
            reason: err.to_string(),
        }
    }
}
