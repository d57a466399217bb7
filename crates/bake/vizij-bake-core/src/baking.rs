//! Curve synthesis: sample a clip at every integer frame and resolve baked local
//! transforms for the needed bones.
//!
//! Output curves are dense (one key per frame, all keys SMOOTH) and are meant to be
//! handed to the reducer afterwards.

use log::trace;

use crate::channels::BoneChannels;
use crate::error::BakeError;
use crate::ids::BoneId;
use crate::pose::{Pose, PoseSampler};
use crate::resolver::{resolve, ParentFrame};
use crate::skeleton::Skeleton;

/// Inclusive integer frame range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
}

impl FrameRange {
    /// Round a clip's float range to whole frames (ties to even).
    ///
    /// Returns `Ok(None)` when the rounded range is empty or inverted.
    pub fn from_clip_range(start: f64, end: f64) -> Result<Option<Self>, BakeError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(BakeError::InvalidFrameRange { start, end });
        }
        let start_i = start.round_ties_even() as i64;
        let end_i = end.round_ties_even() as i64;
        if end_i <= start_i {
            return Ok(None);
        }
        Ok(Some(Self {
            start: start_i,
            end: end_i,
        }))
    }

    pub fn frames(&self) -> std::ops::RangeInclusive<i64> {
        self.start..=self.end
    }

    pub fn frame_count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }
}

/// Where poses come from: armature name and source clip name.
#[derive(Clone, Copy, Debug)]
pub struct SampleSource<'a> {
    pub armature: &'a str,
    pub clip: &'a str,
}

/// Split `needed` into bones that can be resolved and bones lacking rest data
/// (their own, or their parent's). Excluded bones carry a `MissingRestPose` error.
pub fn partition_resolvable(
    skeleton: &Skeleton,
    needed: &[BoneId],
) -> (Vec<BoneId>, Vec<(BoneId, BakeError)>) {
    let mut ok = Vec::with_capacity(needed.len());
    let mut excluded = Vec::new();
    for &id in needed {
        let missing = if skeleton.rest(id).is_none() {
            Some(id)
        } else {
            skeleton.parent(id).filter(|p| skeleton.rest(*p).is_none())
        };
        match missing {
            None => ok.push(id),
            Some(bone) => excluded.push((
                id,
                BakeError::MissingRestPose {
                    bone: skeleton.name(bone).to_string(),
                },
            )),
        }
    }
    (ok, excluded)
}

/// Needed bones of one armature within a multi-armature bake.
#[derive(Clone, Copy, Debug)]
pub struct ArmatureBones<'a> {
    pub armature: &'a str,
    pub skeleton: &'a Skeleton,
    pub bones: &'a [BoneId],
}

/// Bake `needed` bones of `skeleton` over `range`, calling the sampler once per frame.
///
/// An empty range (`None`) yields no channels and never calls the sampler. Any
/// degenerate matrix or missing sample aborts the whole call.
pub fn synthesize(
    skeleton: &Skeleton,
    needed: &[BoneId],
    sampler: &mut dyn PoseSampler,
    source: SampleSource<'_>,
    range: Option<FrameRange>,
    degenerate_epsilon: f64,
) -> Result<Vec<BoneChannels>, BakeError> {
    let job = ArmatureBones {
        armature: source.armature,
        skeleton,
        bones: needed,
    };
    synthesize_scene(&[job], sampler, source.clip, range, degenerate_epsilon)
}

/// Bake several armatures playing the same clip. Frames are the outer loop: at each
/// frame every armature is sampled before moving on, in `jobs` order.
///
/// Channels come back grouped by armature, bones in `bones` order.
pub fn synthesize_scene(
    jobs: &[ArmatureBones<'_>],
    sampler: &mut dyn PoseSampler,
    clip: &str,
    range: Option<FrameRange>,
    degenerate_epsilon: f64,
) -> Result<Vec<BoneChannels>, BakeError> {
    let Some(range) = range else {
        return Ok(Vec::new());
    };

    let mut out: Vec<Vec<BoneChannels>> = jobs
        .iter()
        .map(|job| {
            job.bones
                .iter()
                .map(|&id| BoneChannels::new(job.skeleton.name(id)))
                .collect()
        })
        .collect();

    for frame in range.frames() {
        for (job, channels) in jobs.iter().zip(out.iter_mut()) {
            let pose = sampler.evaluate(job.armature, clip, frame)?;
            trace!("sampled '{clip}' on '{}' at frame {frame}", job.armature);
            sample_bones(job, &pose, frame, channels, degenerate_epsilon)?;
        }
    }

    let mut out: Vec<BoneChannels> = out.into_iter().flatten().collect();
    for channels in &mut out {
        for curve in channels.curves_mut() {
            curve.recalculate_handles();
        }
    }
    Ok(out)
}

fn sample_bones(
    job: &ArmatureBones<'_>,
    pose: &Pose,
    frame: i64,
    out: &mut [BoneChannels],
    degenerate_epsilon: f64,
) -> Result<(), BakeError> {
    let skeleton = job.skeleton;
    for (channels, &id) in out.iter_mut().zip(job.bones) {
        let name = skeleton.name(id);
        let rest = skeleton.rest(id).ok_or_else(|| BakeError::MissingRestPose {
            bone: name.to_string(),
        })?;
        let pose_m = pose.get(id).ok_or_else(|| BakeError::MissingPoseSample {
            bone: name.to_string(),
            frame,
        })?;

        let parent = match skeleton.parent(id) {
            None => None,
            Some(p) => {
                let parent_name = skeleton.name(p);
                Some(ParentFrame {
                    pose: pose.get(p).ok_or_else(|| BakeError::MissingPoseSample {
                        bone: parent_name.to_string(),
                        frame,
                    })?,
                    rest: skeleton.rest(p).ok_or_else(|| BakeError::MissingRestPose {
                        bone: parent_name.to_string(),
                    })?,
                })
            }
        };

        let baked = resolve(pose_m, rest, parent, degenerate_epsilon).map_err(|matrix| {
            BakeError::DegenerateTransform {
                bone: name.to_string(),
                frame,
                matrix,
            }
        })?;
        channels.push_sample(frame as f64, baked.channel_values());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatrixRole;
    use crate::skeleton::Bone;
    use nalgebra::{Matrix4, Vector3};

    /// Root slides along X one unit per frame; child follows without own motion.
    struct Slide {
        skeleton: Skeleton,
        calls: Vec<i64>,
    }

    impl PoseSampler for Slide {
        fn evaluate(&mut self, _armature: &str, _clip: &str, frame: i64) -> Result<Pose, BakeError> {
            self.calls.push(frame);
            let root = self.skeleton.find("root").unwrap();
            Ok(Pose::from_local_basis(&self.skeleton, |id| {
                if id == root {
                    Matrix4::new_translation(&Vector3::new(frame as f64, 0.0, 0.0))
                } else {
                    Matrix4::identity()
                }
            }))
        }
    }

    fn slide() -> Slide {
        Slide {
            skeleton: Skeleton::from_bones(vec![
                Bone::new("root").deforming(true),
                Bone::new("child")
                    .with_parent("root")
                    .with_rest(Matrix4::new_translation(&Vector3::new(0.0, 1.0, 0.0)))
                    .deforming(true),
            ])
            .unwrap(),
            calls: Vec::new(),
        }
    }

    const SRC: SampleSource<'static> = SampleSource {
        armature: "rig",
        clip: "Slide",
    };

    #[test]
    fn range_rounds_ties_to_even() {
        assert_eq!(
            FrameRange::from_clip_range(0.5, 3.5).unwrap(),
            Some(FrameRange { start: 0, end: 4 })
        );
        assert_eq!(FrameRange::from_clip_range(1.4, 2.6).unwrap().unwrap().frame_count(), 3);
    }

    #[test]
    fn empty_or_inverted_range_is_none() {
        assert_eq!(FrameRange::from_clip_range(5.0, 5.0).unwrap(), None);
        assert_eq!(FrameRange::from_clip_range(5.0, 1.0).unwrap(), None);
        assert!(matches!(
            FrameRange::from_clip_range(f64::NAN, 1.0),
            Err(BakeError::InvalidFrameRange { .. })
        ));
    }

    #[test]
    fn dense_curves_one_sample_per_frame() {
        let mut s = slide();
        let skel = s.skeleton.clone();
        let needed: Vec<BoneId> = skel.ids().collect();
        let range = FrameRange::from_clip_range(2.0, 6.0).unwrap();
        let out = synthesize(&skel, &needed, &mut s, SRC, range, 1e-12).unwrap();

        assert_eq!(s.calls, vec![2, 3, 4, 5, 6]);
        assert_eq!(out.len(), 2);
        for bone in &out {
            assert_eq!(bone.channel_count(), 10);
            for (_, curve) in bone.channels() {
                let frames: Vec<f64> = curve.frames().collect();
                assert_eq!(frames, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
            }
        }
        let tx: Vec<f64> = out[0].translation.x.as_ref().unwrap().values().collect();
        assert_eq!(tx, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        // Parent motion is stripped from the child.
        assert!(out[1].translation.x.as_ref().unwrap().values().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn empty_range_skips_sampling() {
        let mut s = slide();
        let skel = s.skeleton.clone();
        let needed: Vec<BoneId> = skel.ids().collect();
        let out = synthesize(&skel, &needed, &mut s, SRC, None, 1e-12).unwrap();
        assert!(out.is_empty());
        assert!(s.calls.is_empty());
    }

    struct Collapsing;

    impl PoseSampler for Collapsing {
        fn evaluate(&mut self, _: &str, _: &str, frame: i64) -> Result<Pose, BakeError> {
            let mut pose = Pose::empty(1);
            let scale = if frame == 1 { 0.0 } else { 1.0 };
            pose.set(BoneId(0), Matrix4::new_scaling(scale));
            Ok(pose)
        }
    }

    #[test]
    fn degenerate_pose_aborts_with_context() {
        let skel = Skeleton::from_bones(vec![Bone::new("blob").deforming(true)]).unwrap();
        let err = synthesize(
            &skel,
            &[BoneId(0)],
            &mut Collapsing,
            SRC,
            Some(FrameRange { start: 0, end: 2 }),
            1e-12,
        )
        .unwrap_err();
        assert_eq!(
            err,
            BakeError::DegenerateTransform {
                bone: "blob".into(),
                frame: 1,
                matrix: MatrixRole::Pose,
            }
        );
    }

    #[test]
    fn missing_rest_partitions_bone_and_children() {
        let skel = Skeleton::from_bones(vec![
            Bone::new("root"),
            Bone::new("broken").with_parent("root").without_rest(),
            Bone::new("tip").with_parent("broken").deforming(true),
        ])
        .unwrap();
        let needed: Vec<BoneId> = skel.ids().collect();
        let (ok, excluded) = partition_resolvable(&skel, &needed);
        assert_eq!(ok, vec![skel.find("root").unwrap()]);
        assert_eq!(excluded.len(), 2);
        assert!(excluded
            .iter()
            .all(|(_, e)| *e == BakeError::MissingRestPose { bone: "broken".into() }));
    }

    struct Recorder {
        skeleton: Skeleton,
        calls: Vec<(String, i64)>,
    }

    impl PoseSampler for Recorder {
        fn evaluate(&mut self, armature: &str, _clip: &str, frame: i64) -> Result<Pose, BakeError> {
            self.calls.push((armature.to_string(), frame));
            Ok(Pose::rest(&self.skeleton))
        }
    }

    #[test]
    fn scene_samples_every_armature_per_frame() {
        let skel = Skeleton::from_bones(vec![Bone::new("b").deforming(true)]).unwrap();
        let bones = [BoneId(0)];
        let jobs = [
            ArmatureBones {
                armature: "Body",
                skeleton: &skel,
                bones: &bones,
            },
            ArmatureBones {
                armature: "Prop",
                skeleton: &skel,
                bones: &bones,
            },
        ];
        let mut sampler = Recorder {
            skeleton: skel.clone(),
            calls: Vec::new(),
        };
        let out = synthesize_scene(
            &jobs,
            &mut sampler,
            "Walk",
            Some(FrameRange { start: 1, end: 2 }),
            1e-12,
        )
        .unwrap();

        let calls: Vec<(&str, i64)> = sampler.calls.iter().map(|(a, f)| (a.as_str(), *f)).collect();
        assert_eq!(calls, vec![("Body", 1), ("Prop", 1), ("Body", 2), ("Prop", 2)]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|b| b.translation.x.as_ref().unwrap().len() == 2));
    }
}
