//! Per-frame pose samples and the sampler contract.

use nalgebra::Matrix4;

use crate::error::BakeError;
use crate::ids::BoneId;
use crate::skeleton::Skeleton;

/// Armature-space pose matrices of one skeleton at one frame, indexed by [`BoneId`].
///
/// Matrices are the fully evaluated result (constraints, IK and drivers applied).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pose {
    matrices: Vec<Option<Matrix4<f64>>>,
}

impl Pose {
    /// Pose with no matrices for `len` bones.
    pub fn empty(len: usize) -> Self {
        Self {
            matrices: vec![None; len],
        }
    }

    /// Every bone sitting at its rest matrix.
    pub fn rest(skeleton: &Skeleton) -> Self {
        Self {
            matrices: skeleton.ids().map(|id| skeleton.rest(id).copied()).collect(),
        }
    }

    /// Forward kinematics from per-bone local bases:
    /// `pose = parent_pose * parent_rest⁻¹ * rest * basis`.
    ///
    /// Bones without a rest matrix (and everything below them) get no matrix.
    pub fn from_local_basis<F>(skeleton: &Skeleton, mut basis: F) -> Self
    where
        F: FnMut(BoneId) -> Matrix4<f64>,
    {
        let mut pose = Pose::empty(skeleton.len());
        for id in skeleton.parents_first() {
            let Some(rest) = skeleton.rest(id) else {
                continue;
            };
            let local = rest * basis(id);
            let matrix = match skeleton.parent(id) {
                None => Some(local),
                Some(parent) => {
                    let parent_pose = pose.get(parent);
                    let parent_rest_inv = skeleton.rest(parent).and_then(|r| r.try_inverse());
                    match (parent_pose, parent_rest_inv) {
                        (Some(pp), Some(pri)) => Some(pp * pri * local),
                        _ => None,
                    }
                }
            };
            pose.matrices[id.index()] = matrix;
        }
        pose
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn get(&self, id: BoneId) -> Option<&Matrix4<f64>> {
        self.matrices.get(id.index()).and_then(Option::as_ref)
    }

    /// Set or override the matrix of `id`, growing the pose if needed.
    pub fn set(&mut self, id: BoneId, matrix: Matrix4<f64>) {
        if self.matrices.len() <= id.index() {
            self.matrices.resize(id.index() + 1, None);
        }
        self.matrices[id.index()] = Some(matrix);
    }
}

/// Evaluates a clip on an armature at a frame.
///
/// Implementations must be deterministic and must fully resolve constraints/IK for
/// the requested frame. Clip and frame are passed explicitly; a stateful host wraps
/// its own active-clip switching around this call.
pub trait PoseSampler {
    fn evaluate(&mut self, armature: &str, clip: &str, frame: i64) -> Result<Pose, BakeError>;
}
