//! Curve reduction passes applied to a freshly baked clip, in order:
//! 1. redundant-keyframe collapse (pluggable, see [`KeyframeCollapse`])
//! 2. no-op channel elimination
//! 3. linear segment detection with handle repair

use log::debug;
use serde::{Deserialize, Serialize};

use crate::channels::{BakedClip, Curve, Interpolation};
use crate::collapse::KeyframeCollapse;
use crate::config::BakeConfig;

/// Counters reported by [`reduce_clip`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionStats {
    pub keys_before: usize,
    pub keys_after: usize,
    pub channels_removed: usize,
    pub linear_keys: usize,
}

/// Run all reduction passes over `clip`.
pub fn reduce_clip(
    clip: &mut BakedClip,
    collapse: &dyn KeyframeCollapse,
    cfg: &BakeConfig,
) -> ReductionStats {
    let keys_before = clip.key_count();

    for bone in &mut clip.bones {
        for curve in bone.curves_mut() {
            collapse.collapse(curve);
        }
    }

    let channels_removed = eliminate_noop_channels(clip, cfg.noop_epsilon);

    let mut linear_keys = 0;
    if cfg.detect_linear {
        for bone in &mut clip.bones {
            for curve in bone.curves_mut() {
                linear_keys += detect_linear_parts(curve, cfg.linear_epsilon);
            }
        }
    }

    let stats = ReductionStats {
        keys_before,
        keys_after: clip.key_count(),
        channels_removed,
        linear_keys,
    };
    debug!(
        "reduced '{}': keys {} -> {}, {} channels removed, {} linear keys",
        clip.name, stats.keys_before, stats.keys_after, stats.channels_removed, stats.linear_keys
    );
    stats
}

/// Remove single-key channels sitting at their neutral value. Returns the number removed.
pub fn eliminate_noop_channels(clip: &mut BakedClip, epsilon: f64) -> usize {
    let mut removed = 0;
    for bone in &mut clip.bones {
        for (role, slot) in bone.slots_mut() {
            let noop = match slot {
                Some(curve) if curve.len() == 1 => {
                    (curve.keys[0].value - role.neutral_value()).abs() < epsilon
                }
                _ => false,
            };
            if noop {
                *slot = None;
                removed += 1;
            }
        }
    }
    removed
}

/// Mark interior keys LINEAR where the curve runs straight (or keys are one frame
/// apart) and repair handles at SMOOTH/LINEAR joins. Returns the number of interior
/// keys marked.
///
/// Ends of the curve only become LINEAR through their interior neighbour.
pub fn detect_linear_parts(curve: &mut Curve, epsilon: f64) -> usize {
    let keys = &mut curve.keys;
    let n = keys.len();
    let mut marked = 0;

    for i in 1..n.saturating_sub(1) {
        let (x1, y1) = (keys[i - 1].frame, keys[i - 1].value);
        let (x2, y2) = (keys[i].frame, keys[i].value);
        let (x3, y3) = (keys[i + 1].frame, keys[i + 1].value);

        // Keys on consecutive frames gain nothing from curvature.
        let neighbour = x3 - x2 == 1.0;

        let k = (y2 - y1) / (x2 - x1);
        let b = y1 - k * x1;
        let on_line = (k * x3 + b - y3).abs() < epsilon;

        if neighbour || on_line {
            keys[i].interpolation = Interpolation::Linear;
            marked += 1;
            if i == 1 {
                keys[0].interpolation = Interpolation::Linear;
            }
            if i == n - 2 {
                keys[n - 1].interpolation = Interpolation::Linear;
            }
        }

        let prev_linear = keys[i - 1].is_linear();
        let cur_linear = keys[i].is_linear();
        if !prev_linear && cur_linear {
            let hl = keys[i].handle_left[0];
            keys[i].handle_left[1] = k * hl + b;
            let hr = keys[i - 1].handle_right[0];
            keys[i - 1].handle_right[1] = k * hr + b;
        } else if prev_linear && !cur_linear {
            keys[i].handle_left[1] = y1;
        }
    }
    marked
}
