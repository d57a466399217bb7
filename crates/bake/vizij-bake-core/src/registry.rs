//! Clip registry contract and an in-memory implementation.
//!
//! Baked clips are always installed whole: a fresh [`BakedClip`] replaces whatever
//! was stored under its name, so readers never observe a partially rebuilt clip.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::channels::BakedClip;

/// What a clip animates. Only armature clips are baked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipTarget {
    Armature,
    Other,
}

/// A clip as enumerated by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceClip {
    pub name: String,
    pub target: ClipTarget,
    /// Float frame range as reported by the host (rounded when baking).
    pub frame_range: (f64, f64),
    /// Whether the clip should be written by exporters.
    pub exportable: bool,
}

impl SourceClip {
    pub fn armature(name: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            name: name.into(),
            target: ClipTarget::Armature,
            frame_range: (start, end),
            exportable: true,
        }
    }
}

/// Host storage for source and baked clips.
pub trait ClipRegistry {
    /// Every clip the host knows about, baked ones included.
    fn clips(&self) -> Vec<SourceClip>;

    fn fetch_baked(&self, name: &str) -> Option<&BakedClip>;

    /// Install `clip` under its name, returning the clip it replaced.
    fn replace_baked(&mut self, clip: BakedClip) -> Option<BakedClip>;

    /// Drop a baked clip, returning it.
    fn clear_baked(&mut self, name: &str) -> Option<BakedClip>;

    fn set_exportable(&mut self, name: &str, exportable: bool);
}

/// Insertion-ordered registry kept in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryClipRegistry {
    sources: IndexMap<String, SourceClip>,
    baked: IndexMap<String, BakedClip>,
}

impl MemoryClipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, clip: SourceClip) {
        self.sources.insert(clip.name.clone(), clip);
    }

    pub fn source(&self, name: &str) -> Option<&SourceClip> {
        self.sources.get(name)
    }

    pub fn baked(&self) -> impl Iterator<Item = &BakedClip> {
        self.baked.values()
    }
}

impl ClipRegistry for MemoryClipRegistry {
    fn clips(&self) -> Vec<SourceClip> {
        let baked = self.baked.values().map(|b| {
            let (start, end) = b.frames.unwrap_or((0, 0));
            SourceClip {
                name: b.name.clone(),
                target: ClipTarget::Armature,
                frame_range: (start as f64, end as f64),
                exportable: true,
            }
        });
        self.sources.values().cloned().chain(baked).collect()
    }

    fn fetch_baked(&self, name: &str) -> Option<&BakedClip> {
        self.baked.get(name)
    }

    fn replace_baked(&mut self, clip: BakedClip) -> Option<BakedClip> {
        self.baked.insert(clip.name.clone(), clip)
    }

    fn clear_baked(&mut self, name: &str) -> Option<BakedClip> {
        self.baked.shift_remove(name)
    }

    fn set_exportable(&mut self, name: &str, exportable: bool) {
        if let Some(src) = self.sources.get_mut(name) {
            src.exportable = exportable;
        }
    }
}
