//! Runtime relevance filter.
//!
//! A bone is needed when it deforms or any bone in its subtree deforms. Bones that
//! fail the predicate are left out of baking entirely.

use crate::ids::BoneId;
use crate::skeleton::Skeleton;

/// True when `bone` or any of its descendants deforms.
pub fn is_needed(skeleton: &Skeleton, bone: BoneId) -> bool {
    skeleton.bone(bone).deforms
        || skeleton
            .descendants(bone)
            .into_iter()
            .any(|d| skeleton.bone(d).deforms)
}

/// Needed bones in skeleton order, computed in a single children-first pass.
pub fn needed_bones(skeleton: &Skeleton) -> Vec<BoneId> {
    let mut needed = vec![false; skeleton.len()];
    for id in skeleton.parents_first().into_iter().rev() {
        if skeleton.bone(id).deforms {
            needed[id.index()] = true;
        }
        if needed[id.index()] {
            if let Some(parent) = skeleton.parent(id) {
                needed[parent.index()] = true;
            }
        }
    }
    skeleton.ids().filter(|id| needed[id.index()]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Bone;

    fn rig() -> Skeleton {
        Skeleton::from_bones(vec![
            Bone::new("root"),
            Bone::new("spine").with_parent("root"),
            Bone::new("hand").with_parent("spine").deforming(true),
            Bone::new("ik_target").with_parent("root"),
            Bone::new("pole"),
        ])
        .unwrap()
    }

    #[test]
    fn deforming_descendant_marks_ancestors() {
        let skel = rig();
        let names: Vec<&str> = needed_bones(&skel).into_iter().map(|id| skel.name(id)).collect();
        assert_eq!(names, vec!["root", "spine", "hand"]);
    }

    #[test]
    fn predicate_matches_batch_pass() {
        let skel = rig();
        let batch = needed_bones(&skel);
        for id in skel.ids() {
            assert_eq!(is_needed(&skel, id), batch.contains(&id), "{}", skel.name(id));
        }
    }

    #[test]
    fn leaf_needed_equals_deforms() {
        let skel = rig();
        for name in ["hand", "ik_target", "pole"] {
            let id = skel.find(name).unwrap();
            assert!(skel.children(id).is_empty());
            assert_eq!(is_needed(&skel, id), skel.bone(id).deforms);
        }
    }
}
