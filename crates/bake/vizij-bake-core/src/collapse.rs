//! Redundant-keyframe collapse.
//!
//! The reducer treats this pass as a black box that runs once per clip before
//! no-op elimination. Hosts with their own "clean keys" operator implement
//! [`KeyframeCollapse`]; [`CleanKeyframes`] is the built-in equivalent.

use crate::channels::{Curve, Keyframe};

/// Removes keys that do not change the shape of a curve.
pub trait KeyframeCollapse {
    fn collapse(&self, curve: &mut Curve);
}

/// Drops keys whose value matches both the previous kept key and the next key,
/// and a trailing key that repeats the previous kept key. A constant curve ends up
/// with a single key. Handles are recalculated afterwards.
#[derive(Clone, Copy, Debug)]
pub struct CleanKeyframes {
    pub threshold: f64,
}

impl Default for CleanKeyframes {
    fn default() -> Self {
        Self { threshold: 1e-4 }
    }
}

impl KeyframeCollapse for CleanKeyframes {
    fn collapse(&self, curve: &mut Curve) {
        let n = curve.keys.len();
        if n < 2 {
            return;
        }
        let same = |a: f64, b: f64| (a - b).abs() < self.threshold;

        let keys = std::mem::take(&mut curve.keys);
        let mut kept: Vec<Keyframe> = Vec::with_capacity(n);
        for (i, key) in keys.iter().enumerate() {
            let Some(last) = kept.last().map(|k| k.value) else {
                kept.push(key.clone());
                continue;
            };
            let redundant = match keys.get(i + 1) {
                Some(next) => same(key.value, last) && same(key.value, next.value),
                None => same(key.value, last),
            };
            if !redundant {
                kept.push(key.clone());
            }
        }
        curve.keys = kept;
        curve.recalculate_handles();
    }
}
