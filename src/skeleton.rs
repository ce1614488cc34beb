use glam::{Quat, Vec2, Vec4};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(u32);

impl BoneId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bone#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkeletonId(pub(crate) u32);

impl SkeletonId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SkeletonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skeleton#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub guid: String,
    pub name: String,
    pub parent: Option<BoneId>,
    pub local_position: Vec2,
    pub local_rotation: Quat,
    /// Z-order hint, serialised as the z component of a bone position.
    pub depth: f32,
    pub length: f32,
    pub color: Vec4,
}

impl Bone {
    pub fn new(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            parent: None,
            local_position: Vec2::ZERO,
            local_rotation: Quat::IDENTITY,
            depth: 0.0,
            length: 1.0,
            color: Vec4::ONE,
        }
    }

    pub fn with_parent(mut self, parent: BoneId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_local(mut self, position: Vec2, rotation: Quat) -> Self {
        self.local_position = position;
        self.local_rotation = rotation;
        self
    }

    pub fn with_length(mut self, length: f32) -> Self {
        self.length = length;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub local_position: Vec2,
    pub local_rotation: Quat,
}

/// Arena of bones. Ids are never reused, so a stale id resolves to `None`
/// instead of aliasing a newer bone. Children are kept in a secondary index in
/// attachment order; that order is the iteration order for tree walks.
#[derive(Debug, Default, Clone)]
pub struct BoneGraph {
    slots: Vec<Option<Bone>>,
    children: HashMap<BoneId, Vec<BoneId>>,
    live: usize,
}

impl BoneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, mut bone: Bone) -> BoneId {
        let id = BoneId(self.slots.len() as u32);
        if bone.parent.is_some_and(|parent| !self.contains(parent)) {
            bone.parent = None;
        }
        if let Some(parent) = bone.parent {
            self.children.entry(parent).or_default().push(id);
        }
        self.slots.push(Some(bone));
        self.live += 1;
        id
    }

    pub fn contains(&self, id: BoneId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: BoneId) -> Option<&Bone> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BoneId, &Bone)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|bone| (BoneId(index as u32), bone)))
    }

    pub fn children(&self, id: BoneId) -> &[BoneId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent(&self, id: BoneId) -> Option<BoneId> {
        self.get(id).and_then(|bone| bone.parent)
    }

    /// True when `ancestor` is `id` itself or sits above it in the tree.
    pub fn is_descendant_of(&self, id: BoneId, ancestor: BoneId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Re-parents `id`, keeping its local transform. Refuses (returns false)
    /// when the new parent would close a cycle.
    pub fn set_parent(&mut self, id: BoneId, parent: Option<BoneId>) -> bool {
        if !self.contains(id) {
            return false;
        }
        if let Some(parent) = parent {
            if !self.contains(parent) || self.is_descendant_of(parent, id) {
                return false;
            }
        }
        self.detach_from_parent(id);
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().push(id);
        }
        if let Some(bone) = self.get_mut(id) {
            bone.parent = parent;
        }
        true
    }

    /// Re-parents `id` so its world transform is unchanged.
    pub fn set_parent_keep_world(&mut self, id: BoneId, parent: Option<BoneId>) -> bool {
        let Some((position, rotation)) = self.world_transform(id) else {
            return false;
        };
        if !self.set_parent(id, parent) {
            return false;
        }
        self.set_world_transform(id, position, rotation);
        true
    }

    /// Removes a bone. Its children become roots that keep their local
    /// transform; callers re-home them when that matters.
    pub fn remove(&mut self, id: BoneId) -> Option<Bone> {
        if !self.contains(id) {
            return None;
        }
        self.detach_from_parent(id);
        if let Some(orphans) = self.children.remove(&id) {
            for orphan in orphans {
                if let Some(bone) = self.get_mut(orphan) {
                    bone.parent = None;
                }
            }
        }
        self.live -= 1;
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    fn detach_from_parent(&mut self, id: BoneId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|child| *child != id);
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }
    }

    /// Position and rotation in skeleton space (relative to the skeleton origin).
    pub fn world_transform(&self, id: BoneId) -> Option<(Vec2, Quat)> {
        let bone = self.get(id)?;
        let local = (bone.local_position, bone.local_rotation);
        match bone.parent.and_then(|parent| self.world_transform(parent)) {
            Some((parent_position, parent_rotation)) => {
                let offset = parent_rotation * local.0.extend(0.0);
                Some((parent_position + offset.truncate(), (parent_rotation * local.1).normalize()))
            }
            None => Some(local),
        }
    }

    pub fn world_position(&self, id: BoneId) -> Option<Vec2> {
        self.world_transform(id).map(|(position, _)| position)
    }

    pub fn set_world_transform(&mut self, id: BoneId, position: Vec2, rotation: Quat) {
        let parent_world = self.parent(id).and_then(|parent| self.world_transform(parent));
        let (local_position, local_rotation) = match parent_world {
            Some((parent_position, parent_rotation)) => {
                let inverse = parent_rotation.inverse();
                let local = inverse * (position - parent_position).extend(0.0);
                (local.truncate(), (inverse * rotation).normalize())
            }
            None => (position, rotation),
        };
        if let Some(bone) = self.get_mut(id) {
            bone.local_position = local_position;
            bone.local_rotation = local_rotation;
        }
    }

    /// Ids in `subset` whose parent is absent or outside the subset, in subset order.
    pub fn find_roots(&self, subset: &[BoneId]) -> Vec<BoneId> {
        subset
            .iter()
            .copied()
            .filter(|id| self.contains(*id))
            .filter(|id| match self.parent(*id) {
                Some(parent) => !subset.contains(&parent),
                None => true,
            })
            .collect()
    }
}

/// An ordered set of bones. The order is the canonical index space for weight
/// lookups and for the bind pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub(crate) bones: Vec<BoneId>,
    pub(crate) bind_pose: Vec<BonePose>,
    /// Where the skeleton sits in texture space; bone roots are relative to it.
    pub origin: Vec2,
}

impl Skeleton {
    pub fn new(origin: Vec2) -> Self {
        Self { bones: Vec::new(), bind_pose: Vec::new(), origin }
    }

    pub fn bones(&self) -> &[BoneId] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn contains(&self, id: BoneId) -> bool {
        self.bones.contains(&id)
    }

    pub fn index_of(&self, id: BoneId) -> Option<usize> {
        self.bones.iter().position(|bone| *bone == id)
    }

    pub fn bind_pose(&self) -> &[BonePose] {
        &self.bind_pose
    }
}

/// Produces a name for a copied bone that does not collide with `existing`.
/// A trailing `<separator><digits>` is treated as a previous copy suffix, so
/// copying `Arm_1` next to `Arm` and `Arm_1` yields `Arm_2`.
pub fn auto_name_bone_copy<'a, I>(name: &str, existing: I, separator: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let base = strip_copy_suffix(name, separator);
    let existing: Vec<&str> = existing.into_iter().collect();
    let mut highest = 0_u32;
    for candidate in &existing {
        if let Some(rest) = candidate.strip_prefix(base).and_then(|rest| rest.strip_prefix(separator)) {
            if let Ok(value) = rest.parse::<u32>() {
                highest = highest.max(value);
            }
        }
    }
    let mut next = highest + 1;
    loop {
        let proposed = format!("{base}{separator}{next}");
        if !existing.contains(&proposed.as_str()) {
            return proposed;
        }
        next += 1;
    }
}

fn strip_copy_suffix<'a>(name: &'a str, separator: &str) -> &'a str {
    if separator.is_empty() {
        return name;
    }
    match name.rfind(separator) {
        Some(split) => {
            let digits = &name[split + separator.len()..];
            if split > 0 && !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()) {
                &name[..split]
            } else {
                name
            }
        }
        None => name,
    }
}

/// Evenly spaced, saturated colors for bones that arrive without one.
pub fn palette_color(index: usize, count: usize) -> Vec4 {
    let count = count.max(1) as f32;
    let hue = (index as f32 / count).fract();
    let (r, g, b) = hsv_to_rgb(hue, 0.75, 0.95);
    Vec4::new(r, g, b, 1.0)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> (f32, f32, f32) {
    let sector = hue * 6.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let m = value - chroma;
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    (r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_names_pick_next_free_suffix() {
        let existing = ["Arm", "Arm_1", "Leg"];
        assert_eq!(auto_name_bone_copy("Arm", existing, "_"), "Arm_2");
        assert_eq!(auto_name_bone_copy("Arm_1", existing, "_"), "Arm_2");
        assert_eq!(auto_name_bone_copy("Leg", existing, "_"), "Leg_1");
    }

    #[test]
    fn copy_names_keep_non_numeric_suffixes() {
        let existing = ["upper_arm"];
        assert_eq!(auto_name_bone_copy("upper_arm", existing, "_"), "upper_arm_1");
    }

    #[test]
    fn world_transform_composes_parent_rotation() {
        let mut graph = BoneGraph::new();
        let root = graph.insert(
            Bone::new("r", "root")
                .with_local(Vec2::new(1.0, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        );
        let child = graph.insert(
            Bone::new("c", "child").with_parent(root).with_local(Vec2::new(2.0, 0.0), Quat::IDENTITY),
        );
        let (position, _) = graph.world_transform(child).expect("child world");
        assert!((position - Vec2::new(1.0, 2.0)).length() < 1e-5, "got {position:?}");
    }

    #[test]
    fn set_world_transform_is_inverse_of_world_transform() {
        let mut graph = BoneGraph::new();
        let root =
            graph.insert(Bone::new("r", "root").with_local(Vec2::new(3.0, 1.0), Quat::from_rotation_z(0.7)));
        let child = graph.insert(Bone::new("c", "child").with_parent(root));
        let target_rotation = Quat::from_rotation_z(-0.4);
        graph.set_world_transform(child, Vec2::new(-2.0, 5.0), target_rotation);
        let (position, rotation) = graph.world_transform(child).expect("child world");
        assert!((position - Vec2::new(-2.0, 5.0)).length() < 1e-4);
        assert!(rotation.dot(target_rotation).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let mut graph = BoneGraph::new();
        let a = graph.insert(Bone::new("a", "a"));
        let b = graph.insert(Bone::new("b", "b").with_parent(a));
        assert!(!graph.set_parent(a, Some(b)));
        assert_eq!(graph.parent(a), None);
        assert_eq!(graph.children(a), &[b]);
    }

    #[test]
    fn removing_a_bone_orphans_its_children() {
        let mut graph = BoneGraph::new();
        let a = graph.insert(Bone::new("a", "a"));
        let b = graph.insert(Bone::new("b", "b").with_parent(a));
        assert!(graph.remove(a).is_some());
        assert_eq!(graph.parent(b), None);
        assert!(!graph.contains(a));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn roots_are_relative_to_the_subset() {
        let mut graph = BoneGraph::new();
        let a = graph.insert(Bone::new("a", "a"));
        let b = graph.insert(Bone::new("b", "b").with_parent(a));
        let c = graph.insert(Bone::new("c", "c").with_parent(b));
        assert_eq!(graph.find_roots(&[a, b, c]), vec![a]);
        assert_eq!(graph.find_roots(&[b, c]), vec![b]);
    }
}
