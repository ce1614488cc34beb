use super::data::{CopyData, CopySpriteData, SpriteBone, SpriteBoneCopyData, Vec2Data, Vec3Data};
use crate::skeleton::{BoneId, SkeletonId};
use crate::skinning::{SkinningCache, SpriteId};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    All,
    Single(SpriteId),
}

/// What a copy command captures given the current selection: the selected
/// sprite, otherwise everything unless the rig is a single-sprite character.
pub fn select_copy_mode(cache: &SkinningCache) -> Option<CopyMode> {
    if let Some(selected) = cache.selected_sprite() {
        return Some(CopyMode::Single(selected));
    }
    let sprites = cache.sprites();
    if !cache.has_character() || sprites.len() > 1 {
        Some(CopyMode::All)
    } else {
        sprites.first().copied().map(CopyMode::Single)
    }
}

pub fn capture(cache: &SkinningCache, mode: CopyMode, pixels_per_unit: f32) -> CopyData {
    match mode {
        CopyMode::All => copy_all(cache, pixels_per_unit),
        CopyMode::Single(sprite) => copy_single(cache, sprite, pixels_per_unit),
    }
}

pub fn copy_all(cache: &SkinningCache, pixels_per_unit: f32) -> CopyData {
    let character_bones = match cache.character() {
        Some(character) => flatten_skeleton(cache, character.skeleton),
        None => Vec::new(),
    };
    CopyData {
        pixels_per_unit,
        is_character_data: cache.has_character(),
        character_bones,
        copy_data: cache.sprites().into_iter().map(|sprite| sprite_data(cache, sprite)).collect(),
    }
}

pub fn copy_single(cache: &SkinningCache, sprite: SpriteId, pixels_per_unit: f32) -> CopyData {
    CopyData {
        pixels_per_unit,
        is_character_data: false,
        character_bones: Vec::new(),
        copy_data: vec![sprite_data(cache, sprite)],
    }
}

/// Flattens a whole skeleton in skeleton order; parents are skeleton indices.
pub fn flatten_skeleton(cache: &SkinningCache, skeleton: SkeletonId) -> Vec<SpriteBone> {
    let order = cache.skeleton(skeleton).bones();
    cache
        .skeleton_bones(skeleton)
        .map(|(_, bone)| SpriteBone {
            name: bone.name.clone(),
            guid: bone.guid.clone(),
            color: bone.color.into(),
            parent_id: bone
                .parent
                .and_then(|parent| order.iter().position(|candidate| *candidate == parent))
                .map_or(-1, |index| index as i32),
            position: Vec3::new(bone.local_position.x, bone.local_position.y, bone.depth).into(),
            rotation: bone.local_rotation.into(),
            length: bone.length,
        })
        .collect()
}

fn sprite_data(cache: &SkinningCache, sprite: SpriteId) -> CopySpriteData {
    let mesh = cache.mesh(sprite);
    let mut data = CopySpriteData {
        sprite_name: cache.sprite(sprite).name.clone(),
        vertices: mesh.vertices.iter().copied().map(Vec2Data::from).collect(),
        vertex_weights: mesh.vertex_weights.clone(),
        indices: mesh.indices.clone(),
        edges: mesh.edges.clone(),
        bone_weight_guids: Vec::with_capacity(mesh.bones.len()),
        bone_weight_names: Vec::with_capacity(mesh.bones.len()),
        sprite_bones: Vec::new(),
    };
    // Stale influence bones keep their slot with empty identity so the weight
    // index space stays aligned; they fail to resolve on paste.
    for bone in &mesh.bones {
        let (guid, name) = cache
            .bones()
            .get(*bone)
            .map(|bone| (bone.guid.clone(), bone.name.clone()))
            .unwrap_or_default();
        data.bone_weight_guids.push(guid);
        data.bone_weight_names.push(name);
    }

    let subset: Vec<BoneId> = if cache.has_character() {
        cache.character_part(sprite).map(|part| part.bones.clone()).unwrap_or_default()
    } else {
        cache.skeleton(cache.effective_skeleton(sprite)).bones().to_vec()
    };
    let roots = cache.bones().find_roots(&subset);
    if roots.is_empty() {
        return data;
    }

    let mut order_list: Vec<BoneId> = mesh.bones.clone();
    let part_offset = cache.character_part(sprite).map(|part| part.position);
    for root in roots {
        let root_index = data.sprite_bones.len();
        append_bone_recursively(cache, &mut data.sprite_bones, root, -1, &mut order_list);
        if let Some(offset) = part_offset {
            let position = &mut data.sprite_bones[root_index].sprite_bone.position;
            position.x -= offset.x;
            position.y -= offset.y;
        }
    }
    log::debug!(
        "[copy] captured '{}' with {} bones and {} vertices",
        data.sprite_name,
        data.sprite_bones.len(),
        data.vertices.len()
    );
    data
}

fn append_bone_recursively(
    cache: &SkinningCache,
    out: &mut Vec<SpriteBoneCopyData>,
    bone_id: BoneId,
    parent_index: i32,
    order_list: &mut Vec<BoneId>,
) {
    let Some(bone) = cache.bones().get(bone_id) else {
        return;
    };
    let current_index = out.len() as i32;
    let order = match order_list.iter().position(|candidate| *candidate == bone_id) {
        Some(index) => index,
        None => {
            order_list.push(bone_id);
            order_list.len() - 1
        }
    };

    // A root that still hangs off a bone outside the copied subset keeps its
    // placement through the skeleton-space transform.
    let (position, rotation) = if parent_index == -1 && bone.parent.is_some() {
        cache.bones().world_transform(bone_id).unwrap_or((bone.local_position, bone.local_rotation))
    } else {
        (bone.local_position, bone.local_rotation)
    };

    out.push(SpriteBoneCopyData {
        sprite_bone: SpriteBone {
            name: bone.name.clone(),
            guid: bone.guid.clone(),
            color: bone.color.into(),
            parent_id: parent_index,
            position: Vec3Data { x: position.x, y: position.y, z: bone.depth },
            rotation: rotation.into(),
            length: bone.length,
        },
        order: order as i32,
    });
    for &child in cache.bones().children(bone_id) {
        append_bone_recursively(cache, out, child, current_index, order_list);
    }
}
