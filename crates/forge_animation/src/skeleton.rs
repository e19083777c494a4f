use glam::Mat4;
use log::warn;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use forge_core::errors::{ForgeError, Result};

use crate::pose::LocalPose;

/// A joint of a [`SkeletonHierarchy`].
///
/// Bones are owned by the hierarchy and reference each other by id. The id is
/// a dense index usable directly into skinning-matrix arrays and vertex
/// bone-index attributes.
#[derive(Debug, Clone)]
pub struct Bone {
    id: usize,
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Inverse of the bone's world transform in the bind pose.
    inverse_bind_matrix: Mat4,
    rest_pose: LocalPose,
}

impl Bone {
    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn inverse_bind_matrix(&self) -> &Mat4 {
        &self.inverse_bind_matrix
    }

    /// Local pose used when no clip drives this bone.
    #[inline]
    #[must_use]
    pub fn rest_pose(&self) -> &LocalPose {
        &self.rest_pose
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Input record for building a hierarchy.
#[derive(Debug, Clone)]
pub struct BoneDesc {
    pub name: String,
    pub parent: Option<usize>,
    pub inverse_bind_matrix: Mat4,
    pub rest_pose: LocalPose,
}

/// Immutable bone tree with bind-pose data.
///
/// Construction validates the topology: every parent id is in range, exactly
/// one root exists and the tree is acyclic. A default-constructed hierarchy is
/// empty and reports a structural error from [`SkeletonHierarchy::root_bone`].
#[derive(Debug, Clone, Default)]
pub struct SkeletonHierarchy {
    id: Uuid,
    name: String,
    bones: Vec<Bone>,
    root: Option<usize>,
    /// Pre-order, parents before children.
    traversal_order: Vec<usize>,
    name_lookup: FxHashMap<String, usize>,
}

impl SkeletonHierarchy {
    pub fn new(name: &str, descs: Vec<BoneDesc>) -> Result<Self> {
        let count = descs.len();

        for (id, desc) in descs.iter().enumerate() {
            if let Some(parent) = desc.parent {
                if parent >= count {
                    return Err(ForgeError::Structural(format!(
                        "bone '{}' ({id}) references missing parent {parent}",
                        desc.name
                    )));
                }
                if parent == id {
                    return Err(ForgeError::Structural(format!(
                        "bone '{}' ({id}) is its own parent",
                        desc.name
                    )));
                }
            }
        }

        let roots: Vec<usize> = descs
            .iter()
            .enumerate()
            .filter(|(_, d)| d.parent.is_none())
            .map(|(i, _)| i)
            .collect();

        let root = match roots.as_slice() {
            [] if count == 0 => None,
            [root] => Some(*root),
            [] => {
                return Err(ForgeError::Structural(
                    "skeleton has no root bone".to_string(),
                ));
            }
            _ => {
                return Err(ForgeError::Structural(format!(
                    "skeleton has {} root bones, expected exactly one",
                    roots.len()
                )));
            }
        };

        let mut bones: Vec<Bone> = descs
            .into_iter()
            .enumerate()
            .map(|(id, d)| Bone {
                id,
                name: d.name,
                parent: d.parent,
                children: Vec::new(),
                inverse_bind_matrix: d.inverse_bind_matrix,
                rest_pose: d.rest_pose,
            })
            .collect();

        for id in 0..count {
            if let Some(parent) = bones[id].parent {
                bones[parent].children.push(id);
            }
        }

        let mut traversal_order = Vec::with_capacity(count);
        if let Some(root) = root {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                traversal_order.push(id);
                stack.extend(bones[id].children.iter().rev());
            }
        }

        // A single root with one parent per bone leaves unreachable bones only
        // when they form a cycle among themselves.
        if traversal_order.len() != count {
            return Err(ForgeError::Structural(format!(
                "skeleton '{name}' contains a cycle ({} of {count} bones reachable from the root)",
                traversal_order.len()
            )));
        }

        let mut name_lookup = FxHashMap::default();
        for bone in &bones {
            if name_lookup.insert(bone.name.clone(), bone.id).is_some() {
                warn!(
                    "Skeleton '{name}': duplicate bone name '{}', lookups resolve to the last one",
                    bone.name
                );
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bones,
            root,
            traversal_order,
            name_lookup,
        })
    }

    /// Builds a hierarchy from parallel arrays; a negative parent index marks the root.
    pub fn from_parent_indices(
        name: &str,
        bone_names: &[String],
        parent_indices: &[i16],
        inverse_bind_matrices: &[Mat4],
    ) -> Result<Self> {
        if bone_names.len() != parent_indices.len()
            || bone_names.len() != inverse_bind_matrices.len()
        {
            return Err(ForgeError::Structural(format!(
                "mismatched skeleton arrays: {} names, {} parents, {} inverse bind matrices",
                bone_names.len(),
                parent_indices.len(),
                inverse_bind_matrices.len()
            )));
        }

        let descs = bone_names
            .iter()
            .zip(parent_indices)
            .zip(inverse_bind_matrices)
            .map(|((name, &parent), ibm)| BoneDesc {
                name: name.clone(),
                parent: usize::try_from(parent).ok(),
                inverse_bind_matrix: *ibm,
                rest_pose: LocalPose::IDENTITY,
            })
            .collect();

        Self::new(name, descs)
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_bone(&self) -> Result<&Bone> {
        self.root.map(|id| &self.bones[id]).ok_or_else(|| {
            ForgeError::Structural(format!("skeleton '{}' has no root bone", self.name))
        })
    }

    pub fn bone(&self, id: usize) -> Result<&Bone> {
        self.bones
            .get(id)
            .ok_or_else(|| ForgeError::out_of_bounds(format!("bone of skeleton '{}'", self.name), id))
    }

    #[must_use]
    pub fn bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.name_lookup.get(name).map(|&id| &self.bones[id])
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter()
    }

    /// All bones, indexed by id.
    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Bone ids ordered so that every parent precedes its children.
    #[inline]
    #[must_use]
    pub fn traversal_order(&self) -> &[usize] {
        &self.traversal_order
    }
}

/// Incremental builder; bones must be added parents first.
#[derive(Debug, Default)]
pub struct SkeletonBuilder {
    name: String,
    descs: Vec<BoneDesc>,
}

impl SkeletonBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            descs: Vec::new(),
        }
    }

    pub fn add_bone(&mut self, name: &str, parent: Option<usize>, inverse_bind_matrix: Mat4) -> usize {
        self.add_bone_with_rest_pose(name, parent, inverse_bind_matrix, LocalPose::IDENTITY)
    }

    pub fn add_bone_with_rest_pose(
        &mut self,
        name: &str,
        parent: Option<usize>,
        inverse_bind_matrix: Mat4,
        rest_pose: LocalPose,
    ) -> usize {
        self.descs.push(BoneDesc {
            name: name.to_string(),
            parent,
            inverse_bind_matrix,
            rest_pose,
        });
        self.descs.len() - 1
    }

    pub fn build(self) -> Result<SkeletonHierarchy> {
        SkeletonHierarchy::new(&self.name, self.descs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &str, parent: Option<usize>) -> BoneDesc {
        BoneDesc {
            name: name.to_string(),
            parent,
            inverse_bind_matrix: Mat4::IDENTITY,
            rest_pose: LocalPose::IDENTITY,
        }
    }

    #[test]
    fn traversal_visits_parents_first() {
        // Children listed before their parents in id order.
        let skeleton = SkeletonHierarchy::new(
            "s",
            vec![desc("hand", Some(2)), desc("root", None), desc("arm", Some(1))],
        )
        .unwrap();

        assert_eq!(skeleton.root_bone().unwrap().id(), 1);
        assert_eq!(skeleton.traversal_order(), &[1, 2, 0]);
        assert_eq!(skeleton.bone(2).unwrap().children(), &[0]);
    }

    #[test]
    fn two_roots_rejected() {
        let err = SkeletonHierarchy::new("s", vec![desc("a", None), desc("b", None)]).unwrap_err();
        assert!(matches!(err, ForgeError::Structural(_)));
    }

    #[test]
    fn cycle_rejected() {
        let err = SkeletonHierarchy::new(
            "s",
            vec![desc("root", None), desc("a", Some(2)), desc("b", Some(1))],
        )
        .unwrap_err();
        assert!(matches!(err, ForgeError::Structural(_)));
    }

    #[test]
    fn empty_hierarchy_has_no_root() {
        let skeleton = SkeletonHierarchy::default();
        assert!(matches!(skeleton.root_bone(), Err(ForgeError::Structural(_))));
    }

    #[test]
    fn parent_indices_negative_is_root() {
        let names = vec!["root".to_string(), "child".to_string()];
        let skeleton = SkeletonHierarchy::from_parent_indices(
            "s",
            &names,
            &[-1, 0],
            &[Mat4::IDENTITY, Mat4::IDENTITY],
        )
        .unwrap();
        assert_eq!(skeleton.bone_by_name("child").unwrap().parent(), Some(0));
    }
}
