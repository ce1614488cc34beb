use crate::events::{EventBus, RigEvent};
use crate::mesh::SpriteMesh;
use crate::skeleton::{Bone, BoneGraph, BoneId, BonePose, Skeleton, SkeletonId};
use glam::{Quat, Vec2, Vec4};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(u32);

impl SpriteId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sprite#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkinningMode {
    #[default]
    SpriteSheet,
    Character,
}

impl SkinningMode {
    pub fn label(self) -> &'static str {
        match self {
            SkinningMode::SpriteSheet => "Sprite Sheet",
            SkinningMode::Character => "Character",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub position: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self { position, size }
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }
}

#[derive(Debug, Clone)]
pub struct SpriteCache {
    pub name: String,
    /// Rect of the sprite inside its texture.
    pub rect: Rect,
    skeleton: SkeletonId,
    mesh: SpriteMesh,
}

impl SpriteCache {
    pub fn skeleton(&self) -> SkeletonId {
        self.skeleton
    }

    pub fn mesh(&self) -> &SpriteMesh {
        &self.mesh
    }
}

#[derive(Debug, Clone)]
pub struct CharacterPart {
    pub sprite: SpriteId,
    /// Origin of the sprite inside the character.
    pub position: Vec2,
    /// Subset of the character skeleton driving this sprite.
    pub bones: Vec<BoneId>,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct Character {
    pub skeleton: SkeletonId,
    pub dimension: Vec2,
    pub parts: Vec<CharacterPart>,
}

/// The editing document: every bone, skeleton, sprite mesh and the optional
/// character, plus the notification queue describing what changed.
#[derive(Default)]
pub struct SkinningCache {
    bones: BoneGraph,
    skeletons: Vec<Skeleton>,
    sprites: Vec<SpriteCache>,
    character: Option<Character>,
    mode: SkinningMode,
    selected_sprite: Option<SpriteId>,
    bone_selection: Vec<BoneId>,
    events: EventBus,
}

impl SkinningCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sprite(&mut self, name: impl Into<String>, rect: Rect) -> SpriteId {
        let skeleton = self.push_skeleton(Skeleton::new(rect.position));
        let id = SpriteId(self.sprites.len() as u32);
        self.sprites.push(SpriteCache { name: name.into(), rect, skeleton, mesh: SpriteMesh::new() });
        id
    }

    fn push_skeleton(&mut self, skeleton: Skeleton) -> SkeletonId {
        let id = SkeletonId(self.skeletons.len() as u32);
        self.skeletons.push(skeleton);
        id
    }

    /// Turns the document into a character rig with an empty shared skeleton.
    pub fn create_character(&mut self, dimension: Vec2) -> SkeletonId {
        if let Some(character) = &self.character {
            return character.skeleton;
        }
        let skeleton = self.push_skeleton(Skeleton::new(Vec2::ZERO));
        self.character = Some(Character { skeleton, dimension, parts: Vec::new() });
        skeleton
    }

    pub fn add_character_part(&mut self, sprite: SpriteId, position: Vec2, bones: Vec<BoneId>) {
        let character = self.character.as_mut().expect("add_character_part requires a character");
        character.parts.retain(|part| part.sprite != sprite);
        character.parts.push(CharacterPart { sprite, position, bones, visible: true });
    }

    pub fn sprites(&self) -> Vec<SpriteId> {
        (0..self.sprites.len() as u32).map(SpriteId).collect()
    }

    pub fn sprite(&self, id: SpriteId) -> &SpriteCache {
        self.sprites.get(id.index()).expect("sprite id belongs to this document")
    }

    pub fn find_sprite(&self, name: &str) -> Option<SpriteId> {
        self.sprites.iter().position(|sprite| sprite.name == name).map(|index| SpriteId(index as u32))
    }

    pub fn selected_sprite(&self) -> Option<SpriteId> {
        self.selected_sprite
    }

    pub fn select_sprite(&mut self, sprite: Option<SpriteId>) {
        self.selected_sprite = sprite;
    }

    pub fn mode(&self) -> SkinningMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SkinningMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.events.push(RigEvent::SkinningModeChanged { mode });
    }

    pub fn has_character(&self) -> bool {
        self.character.is_some()
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    pub fn character_part(&self, sprite: SpriteId) -> Option<&CharacterPart> {
        let character = self.character.as_ref()?;
        character.parts.iter().find(|part| part.sprite == sprite)
    }

    pub fn set_character_part_bones(&mut self, sprite: SpriteId, bones: Vec<BoneId>) {
        let Some(part) = self
            .character
            .as_mut()
            .and_then(|character| character.parts.iter_mut().find(|part| part.sprite == sprite))
        else {
            return;
        };
        part.bones = bones;
        self.events.push(RigEvent::CharacterPartChanged { sprite });
    }

    /// The skeleton driving `sprite` in the current mode.
    pub fn effective_skeleton(&self, sprite: SpriteId) -> SkeletonId {
        match (&self.character, self.mode) {
            (Some(character), SkinningMode::Character) => character.skeleton,
            _ => self.sprite(sprite).skeleton,
        }
    }

    pub fn skeleton(&self, id: SkeletonId) -> &Skeleton {
        self.skeletons.get(id.index()).expect("skeleton id belongs to this document")
    }

    fn skeleton_mut(&mut self, id: SkeletonId) -> &mut Skeleton {
        self.skeletons.get_mut(id.index()).expect("skeleton id belongs to this document")
    }

    pub fn skeleton_of(&self, bone: BoneId) -> Option<SkeletonId> {
        self.skeletons
            .iter()
            .position(|skeleton| skeleton.contains(bone))
            .map(|index| SkeletonId(index as u32))
    }

    pub fn bones(&self) -> &BoneGraph {
        &self.bones
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        self.bones.get(id).expect("bone id is live")
    }

    /// Skeleton bones with their data, in skeleton order.
    pub fn skeleton_bones(&self, id: SkeletonId) -> impl Iterator<Item = (BoneId, &Bone)> {
        self.skeleton(id).bones().iter().filter_map(|bone| self.bones.get(*bone).map(|data| (*bone, data)))
    }

    /// Allocates a bone that is not yet part of any skeleton.
    pub fn create_bone(&mut self, bone: Bone) -> BoneId {
        self.bones.insert(bone)
    }

    pub fn reparent_bone(&mut self, bone: BoneId, parent: Option<BoneId>) -> bool {
        self.bones.set_parent(bone, parent)
    }

    pub fn reparent_bone_keep_world(&mut self, bone: BoneId, parent: Option<BoneId>) -> bool {
        self.bones.set_parent_keep_world(bone, parent)
    }

    pub(crate) fn set_bone_world_transform(&mut self, bone: BoneId, position: Vec2, rotation: Quat) {
        self.bones.set_world_transform(bone, position, rotation);
    }

    pub(crate) fn bone_mut(&mut self, bone: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(bone)
    }

    pub fn destroy_bone(&mut self, bone: BoneId) {
        for skeleton in &mut self.skeletons {
            if let Some(index) = skeleton.index_of(bone) {
                skeleton.bones.remove(index);
                if index < skeleton.bind_pose.len() {
                    skeleton.bind_pose.remove(index);
                }
            }
        }
        self.bone_selection.retain(|selected| *selected != bone);
        self.bones.remove(bone);
    }

    pub fn add_bone(&mut self, skeleton: SkeletonId, bone: BoneId) {
        let pose = self.pose_of(bone);
        let target = self.skeleton_mut(skeleton);
        if target.contains(bone) {
            return;
        }
        target.bones.push(bone);
        target.bind_pose.push(pose);
    }

    fn pose_of(&self, bone: BoneId) -> BonePose {
        self.bones
            .get(bone)
            .map(|data| BonePose { local_position: data.local_position, local_rotation: data.local_rotation })
            .unwrap_or(BonePose { local_position: Vec2::ZERO, local_rotation: Quat::IDENTITY })
    }

    /// Replaces the bone list of `skeleton`. Bones that were in the skeleton
    /// but are not in `bones` are destroyed; meshes and character parts that
    /// referenced them are re-pointed to a new bone with the same GUID, or
    /// lose the reference.
    pub fn set_bones(&mut self, skeleton: SkeletonId, bones: Vec<BoneId>) {
        let previous = self.skeleton(skeleton).bones.clone();
        let removed: Vec<BoneId> = previous.iter().copied().filter(|bone| !bones.contains(bone)).collect();

        let by_guid: HashMap<&str, BoneId> = bones
            .iter()
            .filter_map(|bone| self.bones.get(*bone).map(|data| (data.guid.as_str(), *bone)))
            .filter(|(guid, _)| !guid.is_empty())
            .collect();
        let replacement: HashMap<BoneId, Option<BoneId>> = removed
            .iter()
            .map(|bone| {
                let target = self.bones.get(*bone).and_then(|data| by_guid.get(data.guid.as_str()).copied());
                (*bone, target)
            })
            .collect();

        let poses: Vec<BonePose> = bones.iter().map(|bone| self.pose_of(*bone)).collect();
        {
            let target = self.skeleton_mut(skeleton);
            target.bones = bones;
            target.bind_pose = poses;
        }
        for bone in &removed {
            self.bone_selection.retain(|selected| selected != bone);
            self.bones.remove(*bone);
        }
        if !replacement.is_empty() {
            self.repoint_references(&replacement);
        }
    }

    fn repoint_references(&mut self, replacement: &HashMap<BoneId, Option<BoneId>>) {
        let resolve = |bone: &BoneId| replacement.get(bone).copied().unwrap_or(Some(*bone));
        let mut changed_meshes = Vec::new();
        for (index, sprite) in self.sprites.iter_mut().enumerate() {
            if !sprite.mesh.bones.iter().any(|bone| replacement.contains_key(bone)) {
                continue;
            }
            let targets: Vec<Option<BoneId>> = sprite.mesh.bones.iter().map(resolve).collect();
            sprite.mesh.retarget_bones(&targets);
            changed_meshes.push(SpriteId(index as u32));
        }
        let mut changed_parts = Vec::new();
        if let Some(character) = &mut self.character {
            for part in &mut character.parts {
                if !part.bones.iter().any(|bone| replacement.contains_key(bone)) {
                    continue;
                }
                let mut rebound: Vec<BoneId> = Vec::with_capacity(part.bones.len());
                for bone in part.bones.iter().filter_map(resolve) {
                    if !rebound.contains(&bone) {
                        rebound.push(bone);
                    }
                }
                part.bones = rebound;
                changed_parts.push(part.sprite);
            }
        }
        for sprite in changed_meshes {
            self.events.push(RigEvent::MeshChanged { sprite });
        }
        for sprite in changed_parts {
            self.events.push(RigEvent::CharacterPartChanged { sprite });
        }
    }

    /// Records the current local transforms as the skeleton's bind pose.
    pub fn set_default_pose(&mut self, skeleton: SkeletonId) {
        let poses: Vec<BonePose> =
            self.skeleton(skeleton).bones.iter().map(|bone| self.pose_of(*bone)).collect();
        self.skeleton_mut(skeleton).bind_pose = poses;
        self.events.push(RigEvent::SkeletonBindPoseChanged { skeleton });
    }

    pub fn set_bone_local_transform(&mut self, bone: BoneId, position: Vec2, rotation: Quat) {
        let Some(data) = self.bones.get_mut(bone) else {
            return;
        };
        data.local_position = position;
        data.local_rotation = rotation;
        if let Some(skeleton) = self.skeleton_of(bone) {
            self.events.push(RigEvent::SkeletonPoseChanged { skeleton });
        }
    }

    pub fn set_bone_color(&mut self, bone: BoneId, color: Vec4) {
        if let Some(data) = self.bones.get_mut(bone) {
            data.color = color;
            self.events.push(RigEvent::BoneColorChanged { bone });
        }
    }

    pub fn rename_bone(&mut self, bone: BoneId, name: impl Into<String>) {
        if let Some(data) = self.bones.get_mut(bone) {
            data.name = name.into();
            self.events.push(RigEvent::BoneNameChanged { bone });
        }
    }

    pub fn notify_topology_changed(&mut self, skeleton: SkeletonId) {
        self.events.push(RigEvent::SkeletonTopologyChanged { skeleton });
    }

    pub fn mesh(&self, sprite: SpriteId) -> &SpriteMesh {
        &self.sprite(sprite).mesh
    }

    pub fn set_mesh(&mut self, sprite: SpriteId, mesh: SpriteMesh) {
        let slot = self.sprites.get_mut(sprite.index()).expect("sprite id belongs to this document");
        slot.mesh = mesh;
        self.events.push(RigEvent::MeshChanged { sprite });
    }

    pub fn bone_selection(&self) -> &[BoneId] {
        &self.bone_selection
    }

    pub fn set_bone_selection(&mut self, bones: Vec<BoneId>) {
        self.bone_selection = bones;
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }
}

/// Working copy of one sprite's mesh. Edits stay local until `update_mesh`
/// writes them back and announces the change.
#[derive(Debug, Default)]
pub struct MeshTool {
    sprite: Option<SpriteId>,
    mesh: Option<SpriteMesh>,
}

impl MeshTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup_sprite(&mut self, cache: &SkinningCache, sprite: Option<SpriteId>) {
        self.sprite = sprite;
        self.mesh = sprite.map(|sprite| cache.mesh(sprite).clone());
    }

    pub fn sprite(&self) -> Option<SpriteId> {
        self.sprite
    }

    pub fn mesh(&self) -> Option<&SpriteMesh> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut SpriteMesh> {
        self.mesh.as_mut()
    }

    pub fn update_mesh(&mut self, cache: &mut SkinningCache) {
        if let (Some(sprite), Some(mesh)) = (self.sprite, self.mesh.as_ref()) {
            cache.set_mesh(sprite, mesh.clone());
        }
    }
}
