use hashbrown::HashMap;
use nalgebra::Matrix4;
use serde::Deserialize;
use serde_json::json;

use crate::channels::BakedClip;
use crate::error::BakeError;
use crate::orchestrator::Armature;
use crate::pose::{Pose, PoseSampler};
use crate::registry::{ClipTarget, MemoryClipRegistry, SourceClip};
use crate::resolver::Trs;
use crate::skeleton::{Bone, Skeleton};

/// Rig plus recorded clips loaded from JSON.
#[derive(Clone, Debug)]
pub struct StoredRig {
    pub name: String,
    pub armatures: Vec<Armature>,
    pub clips: Vec<RecordedClip>,
}

/// Per-frame records of one clip.
#[derive(Clone, Debug)]
pub struct RecordedClip {
    pub source: SourceClip,
    pub frames: Vec<RecordedFrame>,
}

/// Pose of one armature at one frame: local bases go through forward kinematics,
/// then explicit armature-space matrices override the result.
#[derive(Clone, Debug)]
pub struct RecordedFrame {
    pub armature: String,
    pub frame: i64,
    pub basis: HashMap<String, Matrix4<f64>>,
    pub pose: HashMap<String, Matrix4<f64>>,
}

impl StoredRig {
    /// Registry holding every recorded clip as a source clip.
    pub fn registry(&self) -> MemoryClipRegistry {
        let mut reg = MemoryClipRegistry::new();
        for clip in &self.clips {
            reg.add_source(clip.source.clone());
        }
        reg
    }

    pub fn sampler(&self) -> RecordedPoseSampler {
        RecordedPoseSampler {
            armatures: self.armatures.clone(),
            clips: self.clips.clone(),
            calls: 0,
        }
    }

    pub fn armature(&self, name: &str) -> Option<&Armature> {
        self.armatures.iter().find(|a| a.name == name)
    }
}

/// Replays recorded frames. A frame without a record holds the closest earlier
/// record of the same armature; before the first record the rig sits at rest.
#[derive(Clone, Debug)]
pub struct RecordedPoseSampler {
    armatures: Vec<Armature>,
    clips: Vec<RecordedClip>,
    calls: usize,
}

impl RecordedPoseSampler {
    /// Number of `evaluate` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl PoseSampler for RecordedPoseSampler {
    fn evaluate(&mut self, armature: &str, clip: &str, frame: i64) -> Result<Pose, BakeError> {
        self.calls += 1;
        let skeleton = &self
            .armatures
            .iter()
            .find(|a| a.name == armature)
            .ok_or_else(|| BakeError::UnknownArmature {
                name: armature.to_string(),
            })?
            .skeleton;
        let recorded = self
            .clips
            .iter()
            .find(|c| c.source.name == clip)
            .ok_or_else(|| BakeError::UnknownClip {
                name: clip.to_string(),
            })?;

        let held = recorded
            .frames
            .iter()
            .filter(|f| f.armature == armature && f.frame <= frame)
            .max_by_key(|f| f.frame);

        let Some(record) = held else {
            return Ok(Pose::rest(skeleton));
        };

        let mut pose = Pose::from_local_basis(skeleton, |id| {
            record
                .basis
                .get(skeleton.name(id))
                .copied()
                .unwrap_or_else(Matrix4::identity)
        });
        for (bone, matrix) in &record.pose {
            if let Some(id) = skeleton.find(bone) {
                pose.set(id, *matrix);
            }
        }
        Ok(pose)
    }
}

/// Parse rig JSON (armatures with bones, recorded clips) into a [`StoredRig`].
///
/// Notes:
/// - `rest` and `pose` matrices accept a TRS object (`rotation` as w, x, y, z) or 16
///   column-major numbers. A bone without `rest` has no rest pose.
/// - Frame records without `armature` belong to the first armature.
/// - Unknown bone names in records are rejected.
pub fn parse_stored_rig_json(s: &str) -> Result<StoredRig, BakeError> {
    let raw: RawRig = serde_json::from_str(s)?;

    let mut armatures = Vec::with_capacity(raw.armatures.len());
    for ra in raw.armatures {
        let bones = ra
            .bones
            .into_iter()
            .map(|rb| Bone {
                name: rb.name,
                parent: rb.parent,
                rest: rb.rest.map(|m| m.to_matrix()),
                deforms: rb.deform,
            })
            .collect();
        armatures.push(Armature::new(ra.name, Skeleton::from_bones(bones)?));
    }
    let default_armature = armatures.first().map(|a| a.name.clone());

    let mut clips = Vec::with_capacity(raw.clips.len());
    for rc in raw.clips {
        let mut frames = Vec::with_capacity(rc.frames.len());
        for rf in rc.frames {
            let armature = rf
                .armature
                .or_else(|| default_armature.clone())
                .ok_or_else(|| BakeError::Parse {
                    reason: format!("clip '{}' records frames but the rig has no armature", rc.name),
                })?;
            let skeleton = &armatures
                .iter()
                .find(|a| a.name == armature)
                .ok_or_else(|| BakeError::Parse {
                    reason: format!("clip '{}' references unknown armature '{armature}'", rc.name),
                })?
                .skeleton;
            let basis = to_matrix_map(rf.basis, skeleton, &rc.name)?;
            let pose = to_matrix_map(rf.pose, skeleton, &rc.name)?;
            frames.push(RecordedFrame {
                armature,
                frame: rf.frame,
                basis,
                pose,
            });
        }
        clips.push(RecordedClip {
            source: SourceClip {
                name: rc.name,
                target: rc.target,
                frame_range: (rc.frame_range[0], rc.frame_range[1]),
                exportable: true,
            },
            frames,
        });
    }

    Ok(StoredRig {
        name: raw.name,
        armatures,
        clips,
    })
}

fn to_matrix_map(
    raw: HashMap<String, RawMatrix>,
    skeleton: &Skeleton,
    clip: &str,
) -> Result<HashMap<String, Matrix4<f64>>, BakeError> {
    raw.into_iter()
        .map(|(bone, m)| {
            if skeleton.find(&bone).is_none() {
                return Err(BakeError::Parse {
                    reason: format!("clip '{clip}' records unknown bone '{bone}'"),
                });
            }
            Ok((bone, m.to_matrix()))
        })
        .collect()
}

/// Export a baked clip as JSON. Channels are listed per bone in serialized order
/// (translation xyz, rotation wxyz, scale xyz); eliminated channels are absent.
pub fn export_baked_json(clip: &BakedClip) -> serde_json::Value {
    let bones: Vec<serde_json::Value> = clip
        .bones
        .iter()
        .map(|bone| {
            let channels: Vec<serde_json::Value> = bone
                .channels()
                .map(|(role, curve)| {
                    json!({
                        "path": role.target_path(&bone.bone),
                        "index": role.index,
                        "keys": curve.keys.iter().map(|k| json!({
                            "frame": k.frame,
                            "value": k.value,
                            "interpolation": k.interpolation,
                            "handleLeft": k.handle_left,
                            "handleRight": k.handle_right,
                        })).collect::<Vec<_>>(),
                    })
                })
                .collect();
            json!({ "bone": bone.bone, "channels": channels })
        })
        .collect();

    json!({
        "name": clip.name,
        "source": clip.source,
        "frameRange": clip.frames.map(|(s, e)| [s, e]),
        "bones": bones,
    })
}

// ----- JSON schema (serde) -----

#[derive(Debug, Deserialize)]
struct RawRig {
    #[serde(default)]
    name: String,
    armatures: Vec<RawArmature>,
    #[serde(default)]
    clips: Vec<RawClip>,
}

#[derive(Debug, Deserialize)]
struct RawArmature {
    name: String,
    bones: Vec<RawBone>,
}

#[derive(Debug, Deserialize)]
struct RawBone {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    deform: bool,
    #[serde(default)]
    rest: Option<RawMatrix>,
}

#[derive(Debug, Deserialize)]
struct RawClip {
    name: String,
    #[serde(default = "default_target")]
    target: ClipTarget,
    #[serde(rename = "frameRange")]
    frame_range: [f64; 2],
    #[serde(default)]
    frames: Vec<RawFrame>,
}

fn default_target() -> ClipTarget {
    ClipTarget::Armature
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    frame: i64,
    #[serde(default)]
    armature: Option<String>,
    #[serde(default)]
    basis: HashMap<String, RawMatrix>,
    #[serde(default)]
    pose: HashMap<String, RawMatrix>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMatrix {
    ColumnMajor([f64; 16]),
    Trs(Trs),
}

impl RawMatrix {
    fn to_matrix(&self) -> Matrix4<f64> {
        match self {
            RawMatrix::ColumnMajor(values) => Matrix4::from_column_slice(values),
            RawMatrix::Trs(trs) => trs.to_matrix(),
        }
    }
}
