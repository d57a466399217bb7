//! Pose transform resolver.
//!
//! Works backwards from a bone's fully evaluated armature-space matrix to the local
//! basis that would reproduce it without constraints:
//!
//! ```text
//! channel = pose * rest⁻¹
//! channel = (parent_pose * parent_rest⁻¹)⁻¹ * channel      (when parented)
//! local   = rest⁻¹ * channel * rest
//! ```
//!
//! The local matrix is then split into translation, rotation and scale. Shear has no
//! channel and is dropped.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::MatrixRole;

/// Local transform of one bone at one frame, relative to its rest pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BakedTransform {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

impl BakedTransform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::repeat(1.0),
        }
    }

    /// Component values in channel order: translation xyz, rotation wxyz, scale xyz.
    pub fn channel_values(&self) -> [f64; 10] {
        let t = &self.translation;
        let q = self.rotation.quaternion();
        let s = &self.scale;
        [t.x, t.y, t.z, q.w, q.i, q.j, q.k, s.x, s.y, s.z]
    }
}

/// Parent matrices needed to strip inherited motion.
#[derive(Clone, Copy, Debug)]
pub struct ParentFrame<'a> {
    pub pose: &'a Matrix4<f64>,
    pub rest: &'a Matrix4<f64>,
}

/// Serializable TRS triple used at the JSON boundary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trs {
    #[serde(default)]
    pub translation: [f64; 3],
    /// Quaternion (w, x, y, z)
    #[serde(default = "identity_wxyz")]
    pub rotation: [f64; 4],
    #[serde(default = "unit_scale")]
    pub scale: [f64; 3],
}

fn identity_wxyz() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn unit_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for Trs {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: identity_wxyz(),
            scale: unit_scale(),
        }
    }
}

impl Trs {
    /// Compose `T * R * S`. The rotation is normalized first.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let [w, x, y, z] = self.rotation;
        let rotation = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z));
        let [tx, ty, tz] = self.translation;
        let [sx, sy, sz] = self.scale;
        Matrix4::new_translation(&Vector3::new(tx, ty, tz))
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }
}

/// Invert `m`, refusing non-finite or near-singular input.
pub(crate) fn checked_inverse(m: &Matrix4<f64>, degenerate_epsilon: f64) -> Option<Matrix4<f64>> {
    if m.iter().any(|v| !v.is_finite()) || m.determinant().abs() < degenerate_epsilon {
        return None;
    }
    m.try_inverse()
}

/// Resolve the baked local transform of one bone.
///
/// Fails with the role of the first matrix that cannot be inverted; the caller
/// attaches bone and frame context.
pub fn resolve(
    pose: &Matrix4<f64>,
    rest: &Matrix4<f64>,
    parent: Option<ParentFrame<'_>>,
    degenerate_epsilon: f64,
) -> Result<BakedTransform, MatrixRole> {
    let rest_inv = checked_inverse(rest, degenerate_epsilon).ok_or(MatrixRole::Rest)?;
    if checked_inverse(pose, degenerate_epsilon).is_none() {
        return Err(MatrixRole::Pose);
    }

    let mut channel = pose * rest_inv;

    if let Some(parent) = parent {
        let parent_rest_inv =
            checked_inverse(parent.rest, degenerate_epsilon).ok_or(MatrixRole::ParentRest)?;
        let parent_channel = parent.pose * parent_rest_inv;
        let parent_channel_inv = checked_inverse(&parent_channel, degenerate_epsilon)
            .ok_or(MatrixRole::ParentPose)?;
        channel = parent_channel_inv * channel;
    }

    let local = rest_inv * channel * rest;
    Ok(decompose(&local))
}

/// Split an affine matrix into translation, rotation and positive per-axis scale.
/// A negative determinant flips the rotation basis; shear is discarded.
pub fn decompose(m: &Matrix4<f64>) -> BakedTransform {
    let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let basis: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let scale = Vector3::new(
        basis.column(0).norm(),
        basis.column(1).norm(),
        basis.column(2).norm(),
    );

    let mut rot = basis;
    for i in 0..3 {
        if scale[i] > 0.0 {
            rot.set_column(i, &(basis.column(i) / scale[i]));
        }
    }
    if rot.determinant() < 0.0 {
        rot = -rot;
    }
    // Renormalize: with shear the column basis is not orthogonal.
    let rotation = UnitQuaternion::new_normalize(
        *UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot)).quaternion(),
    );

    BakedTransform {
        translation,
        rotation,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-12;

    fn rest_with_offset() -> Matrix4<f64> {
        Trs {
            translation: [0.0, 1.5, 0.2],
            rotation: [0.9238795, 0.3826834, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
        .to_matrix()
    }

    #[test]
    fn pose_at_rest_resolves_to_identity() {
        let parent_rest = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 1.0));
        let rest = rest_with_offset();
        let baked = resolve(
            &rest,
            &rest,
            Some(ParentFrame {
                pose: &parent_rest,
                rest: &parent_rest,
            }),
            EPS,
        )
        .unwrap();
        let expected = BakedTransform::identity().channel_values();
        for (got, want) in baked.channel_values().iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
    }

    #[test]
    fn parent_motion_is_removed() {
        let parent_rest = Matrix4::identity();
        let rest = rest_with_offset();
        // Parent rotates, child keeps its rest relation: the child bakes to identity.
        let parent_pose = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.7).to_homogeneous();
        let child_pose = parent_pose * rest;
        let baked = resolve(
            &child_pose,
            &rest,
            Some(ParentFrame {
                pose: &parent_pose,
                rest: &parent_rest,
            }),
            EPS,
        )
        .unwrap();
        assert_relative_eq!(baked.translation, Vector3::<f64>::zeros(), epsilon = 1e-9);
        assert_relative_eq!(baked.rotation.angle(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(baked.scale, Vector3::<f64>::repeat(1.0), epsilon = 1e-9);
    }

    #[test]
    fn local_basis_is_recovered_in_rest_space() {
        let rest = rest_with_offset();
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        let basis = Trs {
            translation: [0.1, -0.2, 0.3],
            rotation: [q.w, q.i, q.j, q.k],
            scale: [1.0, 2.0, 1.0],
        };
        let pose = rest * basis.to_matrix();
        let baked = resolve(&pose, &rest, None, EPS).unwrap();
        assert_relative_eq!(baked.translation, Vector3::<f64>::new(0.1, -0.2, 0.3), epsilon = 1e-9);
        assert_relative_eq!(baked.scale, Vector3::<f64>::new(1.0, 2.0, 1.0), epsilon = 1e-9);
        assert_relative_eq!(baked.rotation.angle_to(&q), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_rest_is_reported() {
        let rest = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 0.0, 1.0));
        let err = resolve(&Matrix4::identity(), &rest, None, EPS).unwrap_err();
        assert_eq!(err, MatrixRole::Rest);
    }

    #[test]
    fn degenerate_pose_and_parent_are_reported() {
        let flat = Matrix4::new_scaling(0.0);
        let id = Matrix4::identity();
        assert_eq!(resolve(&flat, &id, None, EPS).unwrap_err(), MatrixRole::Pose);
        let err = resolve(
            &id,
            &id,
            Some(ParentFrame {
                pose: &flat,
                rest: &id,
            }),
            EPS,
        )
        .unwrap_err();
        assert_eq!(err, MatrixRole::ParentPose);
    }

    #[test]
    fn mirrored_basis_keeps_positive_scale() {
        let m = Matrix4::from_diagonal(&nalgebra::Vector4::new(-1.0, 1.0, 1.0, 1.0));
        let baked = decompose(&m);
        assert_relative_eq!(baked.scale, Vector3::<f64>::new(1.0, 1.0, 1.0));
        assert_relative_eq!(baked.translation, Vector3::<f64>::zeros());
        assert_relative_eq!(baked.rotation.angle(), std::f64::consts::PI, epsilon = 1e-9);
        assert_relative_eq!(baked.rotation.quaternion().i.abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn shear_is_dropped() {
        let mut sheared = Matrix4::identity();
        sheared[(0, 1)] = 0.5;
        let baked = decompose(&sheared);
        assert_relative_eq!(baked.translation, Vector3::<f64>::zeros());
        // Column 1 picks up the shear as length; no shear channel exists.
        assert_relative_eq!(baked.scale.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(baked.scale.y, 1.25f64.sqrt(), epsilon = 1e-12);
        assert!(baked.rotation.angle() > 0.0);
    }
}
