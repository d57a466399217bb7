//! Baked channel data model.
//!
//! Each baked bone owns ten scalar curves addressed by name (translation xyz,
//! rotation wxyz, scale xyz). The serialized order at the boundary is fixed and is
//! given by [`ChannelRole::ALL`].

use serde::{Deserialize, Serialize};

/// Interpolation from a key to the next one.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpolation {
    /// Cubic bezier driven by the key handles.
    #[default]
    Smooth,
    Linear,
}

/// One curve key. Handles are `[frame, value]` control points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: f64,
    pub value: f64,
    pub interpolation: Interpolation,
    pub handle_left: [f64; 2],
    pub handle_right: [f64; 2],
}

impl Keyframe {
    pub fn new(frame: f64, value: f64) -> Self {
        Self {
            frame,
            value,
            interpolation: Interpolation::Smooth,
            handle_left: [frame, value],
            handle_right: [frame, value],
        }
    }

    #[inline]
    pub fn is_linear(&self) -> bool {
        self.interpolation == Interpolation::Linear
    }
}

/// Frame-ordered keys of one scalar channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub keys: Vec<Keyframe>,
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            keys: Vec::with_capacity(n),
        }
    }

    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let mut curve = Curve::with_capacity(points.len());
        for &(frame, value) in points {
            curve.push(frame, value);
        }
        curve.recalculate_handles();
        curve
    }

    /// Append a smooth key. Frames must be pushed in increasing order.
    #[inline]
    pub fn push(&mut self, frame: f64, value: f64) {
        debug_assert!(self.keys.last().map_or(true, |k| k.frame < frame));
        self.keys.push(Keyframe::new(frame, value));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.keys.iter().map(|k| k.value)
    }

    pub fn frames(&self) -> impl Iterator<Item = f64> + '_ {
        self.keys.iter().map(|k| k.frame)
    }

    /// Auto-clamped handles: a third of the way to each neighbour, sloped along
    /// the neighbour chord, flat on local extremes and at both ends.
    pub fn recalculate_handles(&mut self) {
        let n = self.keys.len();
        for i in 0..n {
            let (frame, value) = (self.keys[i].frame, self.keys[i].value);
            let prev = (i > 0).then(|| (self.keys[i - 1].frame, self.keys[i - 1].value));
            let next = (i + 1 < n).then(|| (self.keys[i + 1].frame, self.keys[i + 1].value));

            let dx_left = prev.map_or(1.0, |(f, _)| (frame - f) / 3.0);
            let dx_right = next.map_or(1.0, |(f, _)| (f - frame) / 3.0);
            let slope = match (prev, next) {
                (Some((pf, pv)), Some((nf, nv))) => {
                    let extreme = (value >= pv && value >= nv) || (value <= pv && value <= nv);
                    if extreme {
                        0.0
                    } else {
                        (nv - pv) / (nf - pf)
                    }
                }
                _ => 0.0,
            };

            let key = &mut self.keys[i];
            key.handle_left = [frame - dx_left, value - slope * dx_left];
            key.handle_right = [frame + dx_right, value + slope * dx_right];
        }
    }
}

/// Semantic group of a channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Translation,
    Rotation,
    Scale,
}

/// One of the ten baked channels: a transform kind plus component index.
/// Rotation components are indexed w=0, x=1, y=2, z=3.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRole {
    pub kind: TransformKind,
    pub index: u8,
}

impl ChannelRole {
    pub const TRANSLATION_X: Self = Self::new(TransformKind::Translation, 0);
    pub const TRANSLATION_Y: Self = Self::new(TransformKind::Translation, 1);
    pub const TRANSLATION_Z: Self = Self::new(TransformKind::Translation, 2);
    pub const ROTATION_W: Self = Self::new(TransformKind::Rotation, 0);
    pub const ROTATION_X: Self = Self::new(TransformKind::Rotation, 1);
    pub const ROTATION_Y: Self = Self::new(TransformKind::Rotation, 2);
    pub const ROTATION_Z: Self = Self::new(TransformKind::Rotation, 3);
    pub const SCALE_X: Self = Self::new(TransformKind::Scale, 0);
    pub const SCALE_Y: Self = Self::new(TransformKind::Scale, 1);
    pub const SCALE_Z: Self = Self::new(TransformKind::Scale, 2);

    /// Serialized channel order.
    pub const ALL: [Self; 10] = [
        Self::TRANSLATION_X,
        Self::TRANSLATION_Y,
        Self::TRANSLATION_Z,
        Self::ROTATION_W,
        Self::ROTATION_X,
        Self::ROTATION_Y,
        Self::ROTATION_Z,
        Self::SCALE_X,
        Self::SCALE_Y,
        Self::SCALE_Z,
    ];

    const fn new(kind: TransformKind, index: u8) -> Self {
        Self { kind, index }
    }

    /// Value the channel has when the bone sits at rest.
    pub fn neutral_value(self) -> f64 {
        match (self.kind, self.index) {
            (TransformKind::Translation, _) => 0.0,
            (TransformKind::Rotation, 0) => 1.0,
            (TransformKind::Rotation, _) => 0.0,
            (TransformKind::Scale, _) => 1.0,
        }
    }

    /// Canonical property name used in target paths.
    pub fn property(self) -> &'static str {
        match self.kind {
            TransformKind::Translation => "Transform.translation",
            TransformKind::Rotation => "Transform.rotation",
            TransformKind::Scale => "Transform.scale",
        }
    }

    /// Target path of this channel on `bone` (e.g. `"spine/Transform.rotation"`).
    pub fn target_path(self, bone: &str) -> String {
        format!("{bone}/{}", self.property())
    }
}

/// Translation or scale curves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Curves {
    pub x: Option<Curve>,
    pub y: Option<Curve>,
    pub z: Option<Curve>,
}

impl Vec3Curves {
    fn full() -> Self {
        Self {
            x: Some(Curve::new()),
            y: Some(Curve::new()),
            z: Some(Curve::new()),
        }
    }
}

/// Rotation quaternion curves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuatCurves {
    pub w: Option<Curve>,
    pub x: Option<Curve>,
    pub y: Option<Curve>,
    pub z: Option<Curve>,
}

impl QuatCurves {
    fn full() -> Self {
        Self {
            w: Some(Curve::new()),
            x: Some(Curve::new()),
            y: Some(Curve::new()),
            z: Some(Curve::new()),
        }
    }
}

/// Baked channels of one bone. A `None` component has been eliminated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneChannels {
    pub bone: String,
    pub translation: Vec3Curves,
    pub rotation: QuatCurves,
    pub scale: Vec3Curves,
}

impl BoneChannels {
    /// All ten channels present and empty.
    pub fn new(bone: impl Into<String>) -> Self {
        Self {
            bone: bone.into(),
            translation: Vec3Curves::full(),
            rotation: QuatCurves::full(),
            scale: Vec3Curves::full(),
        }
    }

    pub fn curve(&self, role: ChannelRole) -> Option<&Curve> {
        let slot = match (role.kind, role.index) {
            (TransformKind::Translation, 0) => &self.translation.x,
            (TransformKind::Translation, 1) => &self.translation.y,
            (TransformKind::Translation, _) => &self.translation.z,
            (TransformKind::Rotation, 0) => &self.rotation.w,
            (TransformKind::Rotation, 1) => &self.rotation.x,
            (TransformKind::Rotation, 2) => &self.rotation.y,
            (TransformKind::Rotation, _) => &self.rotation.z,
            (TransformKind::Scale, 0) => &self.scale.x,
            (TransformKind::Scale, 1) => &self.scale.y,
            (TransformKind::Scale, _) => &self.scale.z,
        };
        slot.as_ref()
    }

    /// Mutable slots in serialized order.
    pub fn slots_mut(&mut self) -> [(ChannelRole, &mut Option<Curve>); 10] {
        let Self {
            translation: t,
            rotation: r,
            scale: s,
            ..
        } = self;
        [
            (ChannelRole::TRANSLATION_X, &mut t.x),
            (ChannelRole::TRANSLATION_Y, &mut t.y),
            (ChannelRole::TRANSLATION_Z, &mut t.z),
            (ChannelRole::ROTATION_W, &mut r.w),
            (ChannelRole::ROTATION_X, &mut r.x),
            (ChannelRole::ROTATION_Y, &mut r.y),
            (ChannelRole::ROTATION_Z, &mut r.z),
            (ChannelRole::SCALE_X, &mut s.x),
            (ChannelRole::SCALE_Y, &mut s.y),
            (ChannelRole::SCALE_Z, &mut s.z),
        ]
    }

    /// Present channels in serialized order.
    pub fn channels(&self) -> impl Iterator<Item = (ChannelRole, &Curve)> + '_ {
        ChannelRole::ALL
            .into_iter()
            .filter_map(move |role| self.curve(role).map(|c| (role, c)))
    }

    pub fn curves_mut(&mut self) -> impl Iterator<Item = &mut Curve> + '_ {
        self.slots_mut()
            .into_iter()
            .filter_map(|(_, slot)| slot.as_mut())
    }

    pub fn channel_count(&self) -> usize {
        self.channels().count()
    }

    /// Append one frame of values (serialized order) to every present channel.
    pub fn push_sample(&mut self, frame: f64, values: [f64; 10]) {
        for ((_, slot), value) in self.slots_mut().into_iter().zip(values) {
            if let Some(curve) = slot {
                curve.push(frame, value);
            }
        }
    }
}

/// Baked output of one source clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedClip {
    pub name: String,
    /// Name of the clip this was baked from.
    pub source: String,
    /// Inclusive integer range; `None` for an empty source range.
    pub frames: Option<(i64, i64)>,
    pub bones: Vec<BoneChannels>,
}

impl BakedClip {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            frames: None,
            bones: Vec::new(),
        }
    }

    pub fn bone(&self, name: &str) -> Option<&BoneChannels> {
        self.bones.iter().find(|b| b.bone == name)
    }

    pub fn channel_count(&self) -> usize {
        self.bones.iter().map(BoneChannels::channel_count).sum()
    }

    pub fn key_count(&self) -> usize {
        self.bones
            .iter()
            .flat_map(|b| b.channels().map(|(_, c)| c.len()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_values_follow_roles() {
        let neutral: Vec<f64> = ChannelRole::ALL.iter().map(|r| r.neutral_value()).collect();
        assert_eq!(neutral, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn push_sample_routes_components_by_name() {
        let mut bone = BoneChannels::new("spine");
        bone.push_sample(3.0, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(bone.rotation.w.as_ref().unwrap().keys[0].value, 4.0);
        assert_eq!(bone.scale.z.as_ref().unwrap().keys[0].value, 10.0);
        let ordered: Vec<f64> = bone.channels().map(|(_, c)| c.keys[0].value).collect();
        assert_eq!(ordered, (1..=10).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn removed_slots_are_skipped() {
        let mut bone = BoneChannels::new("spine");
        bone.translation.y = None;
        bone.push_sample(0.0, [0.0; 10]);
        assert_eq!(bone.channel_count(), 9);
        assert!(bone.curve(ChannelRole::TRANSLATION_Y).is_none());
    }

    #[test]
    fn handles_flatten_on_extremes_and_follow_slopes() {
        let curve = Curve::from_points(&[(0.0, 0.0), (3.0, 3.0), (6.0, 6.0), (9.0, 0.0)]);
        // Rising interior key: slope of the neighbour chord (1.0).
        assert_eq!(curve.keys[1].handle_left, [2.0, 2.0]);
        assert_eq!(curve.keys[1].handle_right, [4.0, 4.0]);
        // Peak: flat.
        assert_eq!(curve.keys[2].handle_left, [5.0, 6.0]);
        assert_eq!(curve.keys[2].handle_right, [7.0, 6.0]);
        // Ends: flat.
        assert_eq!(curve.keys[0].handle_right, [1.0, 0.0]);
    }

    #[test]
    fn target_paths() {
        assert_eq!(ChannelRole::ROTATION_W.target_path("hip"), "hip/Transform.rotation");
        assert_eq!(ChannelRole::SCALE_Y.index, 1);
    }
}
