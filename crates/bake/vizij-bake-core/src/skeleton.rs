//! Bone hierarchy with rest matrices and deform flags.
//!
//! Bones are stored in the order they were supplied and addressed by [`BoneId`].
//! Parents are referenced by name on input and resolved once in [`Skeleton::from_bones`].

use hashbrown::HashMap;
use nalgebra::Matrix4;

use crate::error::BakeError;
use crate::ids::BoneId;

/// Input description of a single bone.
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<String>,
    /// Armature-space rest matrix. `None` means the host had no rest data for the bone.
    pub rest: Option<Matrix4<f64>>,
    /// Bone moves mesh vertices directly.
    pub deforms: bool,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            rest: Some(Matrix4::identity()),
            deforms: false,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_rest(mut self, rest: Matrix4<f64>) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn without_rest(mut self) -> Self {
        self.rest = None;
        self
    }

    pub fn deforming(mut self, deforms: bool) -> Self {
        self.deforms = deforms;
        self
    }
}

/// Validated bone tree (a forest when several roots are present).
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    parents: Vec<Option<BoneId>>,
    children: Vec<Vec<BoneId>>,
    by_name: HashMap<String, BoneId>,
}

impl Skeleton {
    /// Build a skeleton, rejecting duplicate names, unknown parents and cycles.
    pub fn from_bones(bones: Vec<Bone>) -> Result<Self, BakeError> {
        let mut by_name = HashMap::with_capacity(bones.len());
        for (i, bone) in bones.iter().enumerate() {
            if by_name
                .insert(bone.name.clone(), BoneId::from_index(i))
                .is_some()
            {
                return Err(BakeError::InvalidSkeleton {
                    reason: format!("duplicate bone name '{}'", bone.name),
                });
            }
        }

        let mut parents = Vec::with_capacity(bones.len());
        let mut children = vec![Vec::new(); bones.len()];
        for (i, bone) in bones.iter().enumerate() {
            let parent = match &bone.parent {
                None => None,
                Some(name) => {
                    let id = by_name.get(name).copied().ok_or_else(|| {
                        BakeError::InvalidSkeleton {
                            reason: format!("bone '{}' references unknown parent '{name}'", bone.name),
                        }
                    })?;
                    children[id.index()].push(BoneId::from_index(i));
                    Some(id)
                }
            };
            parents.push(parent);
        }

        // A chain longer than the bone count can only come from a cycle.
        for (i, bone) in bones.iter().enumerate() {
            let mut cursor = parents[i];
            let mut steps = 0usize;
            while let Some(p) = cursor {
                steps += 1;
                if steps > bones.len() {
                    return Err(BakeError::InvalidSkeleton {
                        reason: format!("bone '{}' is part of a parent cycle", bone.name),
                    });
                }
                cursor = parents[p.index()];
            }
        }

        Ok(Self {
            bones,
            parents,
            children,
            by_name,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = BoneId> + '_ {
        (0..self.bones.len()).map(BoneId::from_index)
    }

    #[inline]
    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id.index()]
    }

    #[inline]
    pub fn name(&self, id: BoneId) -> &str {
        &self.bones[id.index()].name
    }

    #[inline]
    pub fn parent(&self, id: BoneId) -> Option<BoneId> {
        self.parents[id.index()]
    }

    #[inline]
    pub fn children(&self, id: BoneId) -> &[BoneId] {
        &self.children[id.index()]
    }

    #[inline]
    pub fn rest(&self, id: BoneId) -> Option<&Matrix4<f64>> {
        self.bones[id.index()].rest.as_ref()
    }

    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.by_name.get(name).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = BoneId> + '_ {
        self.ids().filter(|id| self.parent(*id).is_none())
    }

    /// All bones ordered so that every parent precedes its children.
    pub fn parents_first(&self) -> Vec<BoneId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<BoneId> = self.roots().collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Every bone below `id`, depth first.
    pub fn descendants(&self, id: BoneId) -> Vec<BoneId> {
        let mut out = Vec::new();
        let mut stack: Vec<BoneId> = self.children(id).iter().rev().copied().collect();
        while let Some(child) = stack.pop() {
            out.push(child);
            stack.extend(self.children(child).iter().rev().copied());
        }
        out
    }
}
