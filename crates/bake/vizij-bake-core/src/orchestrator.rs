//! Batch baking over every clip of a registry.
//!
//! For each armature clip that is not itself a baked clip:
//! - round the frame range, bake every armature's needed bones into one fresh [`BakedClip`]
//! - reduce it
//! - install it atomically in the registry
//!
//! A failing clip leaves the registry untouched and does not stop the batch; failures are
//! collected in the [`BakeReport`].

use hashbrown::HashSet;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::baking::{partition_resolvable, synthesize_scene, ArmatureBones, FrameRange};
use crate::channels::BakedClip;
use crate::collapse::{CleanKeyframes, KeyframeCollapse};
use crate::config::BakeConfig;
use crate::error::BakeError;
use crate::filter::needed_bones;
use crate::host::{ActiveClipGuard, AutoKeyingGuard, HostSession};
use crate::ids::BoneId;
use crate::pose::PoseSampler;
use crate::reducer::{reduce_clip, ReductionStats};
use crate::registry::{ClipRegistry, ClipTarget, SourceClip};
use crate::skeleton::Skeleton;

/// A named skeleton instance in the scene.
#[derive(Clone, Debug)]
pub struct Armature {
    pub name: String,
    pub skeleton: Skeleton,
}

impl Armature {
    pub fn new(name: impl Into<String>, skeleton: Skeleton) -> Self {
        Self {
            name: name.into(),
            skeleton,
        }
    }
}

/// Non-fatal problem noticed while baking a clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub clip: String,
    pub armature: String,
    pub bone: String,
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Clip animates something other than an armature.
    NotArmature,
    /// Clip name carries the baked suffix.
    AlreadyBaked,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedClip {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedSummary {
    pub name: String,
    pub source: String,
    pub bones: usize,
    pub stats: ReductionStats,
}

/// A clip whose bake was aborted. The registry kept its previous content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipFailure {
    pub clip: String,
    pub error: BakeError,
}

/// Outcome of a batch run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BakeReport {
    pub baked: Vec<BakedSummary>,
    pub skipped: Vec<SkippedClip>,
    pub failures: Vec<ClipFailure>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BakeReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs synthesis and reduction for clips; holds config and the collapse pass.
pub struct Baker {
    config: BakeConfig,
    collapse: Box<dyn KeyframeCollapse>,
}

impl std::fmt::Debug for Baker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Baker").field("config", &self.config).finish()
    }
}

impl Baker {
    /// Baker with the built-in [`CleanKeyframes`] pass.
    pub fn new(config: BakeConfig) -> Result<Self, BakeError> {
        config.validate()?;
        let collapse = Box::new(CleanKeyframes {
            threshold: config.clean_threshold,
        });
        Ok(Self { config, collapse })
    }

    /// Swap in a host-provided collapse pass.
    pub fn with_collapse(mut self, collapse: Box<dyn KeyframeCollapse>) -> Self {
        self.collapse = collapse;
        self
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// Bake every eligible clip in `registry`.
    pub fn run(
        &self,
        armatures: &[Armature],
        registry: &mut dyn ClipRegistry,
        sampler: &mut dyn PoseSampler,
        host: &mut dyn HostSession,
    ) -> BakeReport {
        let mut report = BakeReport::default();
        let mut keying = AutoKeyingGuard::new(host);

        for clip in registry.clips() {
            if clip.target != ClipTarget::Armature {
                report.skipped.push(SkippedClip {
                    name: clip.name,
                    reason: SkipReason::NotArmature,
                });
                continue;
            }
            if self.config.is_baked_name(&clip.name) {
                report.skipped.push(SkippedClip {
                    name: clip.name,
                    reason: SkipReason::AlreadyBaked,
                });
                continue;
            }

            info!("processing clip '{}'", clip.name);
            match self.bake_clip(armatures, &clip, sampler, keying.host(), &mut report.diagnostics)
            {
                Ok((baked, stats)) => {
                    if self.config.mark_sources_no_export {
                        registry.set_exportable(&clip.name, false);
                    }
                    report.baked.push(BakedSummary {
                        name: baked.name.clone(),
                        source: clip.name.clone(),
                        bones: baked.bones.len(),
                        stats,
                    });
                    registry.replace_baked(baked);
                }
                Err(err) => {
                    error!("baking '{}' failed: {err}", clip.name);
                    report.failures.push(ClipFailure {
                        clip: clip.name,
                        error: err,
                    });
                }
            }
        }

        report
    }

    /// Bake and reduce one clip without touching any registry.
    pub fn bake_clip(
        &self,
        armatures: &[Armature],
        clip: &SourceClip,
        sampler: &mut dyn PoseSampler,
        host: &mut dyn HostSession,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(BakedClip, ReductionStats), BakeError> {
        let cfg = &self.config;
        let range = FrameRange::from_clip_range(clip.frame_range.0, clip.frame_range.1)?;

        let mut baked = BakedClip::new(cfg.baked_name(&clip.name), clip.name.clone());
        baked.frames = range.map(|r| (r.start, r.end));
        if range.is_none() {
            info!("clip '{}' has an empty frame range, nothing to sample", clip.name);
            return Ok((baked, ReductionStats::default()));
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut plans: Vec<Vec<BoneId>> = Vec::with_capacity(armatures.len());
        for armature in armatures {
            let skeleton = &armature.skeleton;
            let needed = needed_bones(skeleton);
            let (resolvable, excluded) = partition_resolvable(skeleton, &needed);

            let mut note = |bone: &str, message: String| {
                warn!("clip '{}', armature '{}': {message}", clip.name, armature.name);
                diagnostics.push(Diagnostic {
                    clip: clip.name.clone(),
                    armature: armature.name.clone(),
                    bone: bone.to_string(),
                    message,
                });
            };

            for (id, err) in excluded {
                note(skeleton.name(id), format!("bone '{}' excluded: {err}", skeleton.name(id)));
            }

            let mut bones = Vec::with_capacity(resolvable.len());
            for id in resolvable {
                let name = skeleton.name(id);
                if seen.insert(name.to_string()) {
                    bones.push(id);
                } else {
                    note(name, format!("bone '{name}' already baked from another armature"));
                }
            }
            plans.push(bones);
        }

        let jobs: Vec<ArmatureBones<'_>> = armatures
            .iter()
            .zip(&plans)
            .map(|(armature, bones)| ArmatureBones {
                armature: &armature.name,
                skeleton: &armature.skeleton,
                bones,
            })
            .collect();
        let names: Vec<&str> = armatures.iter().map(|a| a.name.as_str()).collect();

        // Every armature plays the clip while any of them is sampled.
        let channels = {
            let _active = ActiveClipGuard::new(&mut *host, &names, &clip.name);
            synthesize_scene(&jobs, sampler, &clip.name, range, cfg.degenerate_epsilon)?
        };
        baked.bones.extend(channels);

        let stats = reduce_clip(&mut baked, self.collapse.as_ref(), cfg);
        Ok((baked, stats))
    }
}
