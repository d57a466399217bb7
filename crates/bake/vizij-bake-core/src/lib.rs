//! Vizij Bake Core (engine-agnostic)
//!
//! Turns constraint/IK driven skeletal poses into plain per-bone keyframe curves
//! and reduces them for runtime export.
//!
//! Pipeline per source clip:
//! - filter: pick bones that deform or have deforming descendants
//! - baking: sample the pose at every integer frame and resolve local TRS per bone
//! - reducer: collapse constant keys, drop no-op channels, detect linear segments
//! - orchestrator: run the above for every clip and install results atomically

pub mod baking;
pub mod channels;
pub mod collapse;
pub mod config;
pub mod error;
pub mod filter;
pub mod host;
pub mod ids;
pub mod orchestrator;
pub mod pose;
pub mod reducer;
pub mod registry;
pub mod resolver;
pub mod skeleton;
pub mod stored_rig;

// Re-exports for consumers (host adapters)
pub use baking::{synthesize, synthesize_scene, ArmatureBones, FrameRange, SampleSource};
pub use channels::{BakedClip, BoneChannels, ChannelRole, Curve, Interpolation, Keyframe};
pub use collapse::{CleanKeyframes, KeyframeCollapse};
pub use config::BakeConfig;
pub use error::{BakeError, MatrixRole};
pub use filter::{is_needed, needed_bones};
pub use host::{ActiveClipGuard, AutoKeyingGuard, HostSession, NullHost};
pub use ids::BoneId;
pub use orchestrator::{
    Armature, BakeReport, BakedSummary, Baker, ClipFailure, Diagnostic, SkipReason, SkippedClip,
};
pub use pose::{Pose, PoseSampler};
pub use reducer::{detect_linear_parts, eliminate_noop_channels, reduce_clip, ReductionStats};
pub use registry::{ClipRegistry, ClipTarget, MemoryClipRegistry, SourceClip};
pub use resolver::{decompose, resolve, BakedTransform};
pub use skeleton::{Bone, Skeleton};
pub use stored_rig::{
    export_baked_json, parse_stored_rig_json, RecordedClip, RecordedFrame, RecordedPoseSampler,
    StoredRig,
};
