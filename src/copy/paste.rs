use super::data::{CopyData, CopySpriteData, SpriteBone};
use super::order::bones_in_correct_order;
use super::{CopyPasteError, PasteOptions, PasteReport};
use crate::skeleton::{auto_name_bone_copy, palette_color, Bone, BoneId, SkeletonId};
use crate::skinning::{MeshTool, SkinningCache, SkinningMode, SpriteId};
use crate::{euler_z_degrees, rotation_from_degrees, wrap_degrees};
use glam::{Quat, Vec2, Vec4};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Settings of the receiving side of a paste.
#[derive(Debug, Clone)]
pub struct PasteTarget {
    pub pixels_per_unit: f32,
    pub copy_separator: String,
}

/// Bones attached to a skeleton by a per-sprite paste, plus the renames the
/// merge performed (original name -> new name).
#[derive(Debug, Clone, Default)]
pub struct BoneStorage {
    pub bones: Vec<BoneId>,
    pub renames: BTreeMap<String, String>,
}

/// Applies deserialised copy data to the document. Nothing is mutated when
/// the copy data is empty or the sprite counts do not line up for a mesh paste.
pub fn paste_copy_data(
    cache: &mut SkinningCache,
    mesh_tool: &mut MeshTool,
    data: &CopyData,
    options: PasteOptions,
    target: &PasteTarget,
) -> Result<PasteReport, CopyPasteError> {
    if data.copy_data.is_empty() {
        return Err(CopyPasteError::EmptyCopyData);
    }
    let multiple = data.copy_data.len() > 1;
    let sprites = cache.sprites();
    if multiple && options.mesh && data.copy_data.len() != sprites.len() {
        let copied = data.copy_data.len();
        return Err(CopyPasteError::SpriteCountMismatch { copied, available: sprites.len() });
    }

    let selected = cache.selected_sprite();
    let scale = paste_scale(data.pixels_per_unit, target.pixels_per_unit);
    let mut report = PasteReport::default();
    let mut to_select: Vec<BoneId> = Vec::new();

    let replace_character = options.bones && cache.has_character() && data.is_character_data;
    if replace_character {
        let bones =
            paste_bones_in_character(cache, &data.character_bones, options.flip_x, options.flip_y, scale);
        push_unique(&mut to_select, &bones);
    }

    for entry in &data.copy_data {
        let sprite = match selected {
            Some(selected) if !multiple => Some(selected),
            _ => find_target_sprite(cache, &sprites, &report.pasted_sprites, &entry.sprite_name),
        };
        let Some(sprite) = sprite else {
            log::debug!("[paste] no sprite named '{}'; entry skipped", entry.sprite_name);
            report.skipped_entries.push(entry.sprite_name.clone());
            continue;
        };
        report.pasted_sprites.push(sprite);

        let mut renames = BTreeMap::new();
        if options.bones && !replace_character {
            let ordered = bones_in_correct_order(&entry.sprite_bones);
            if let Some(storage) = paste_bones_in_sprite(
                cache,
                sprite,
                &ordered,
                options.flip_x,
                options.flip_y,
                scale,
                &target.copy_separator,
            ) {
                if cache.has_character() || Some(sprite) == selected {
                    push_unique(&mut to_select, &storage.bones);
                }
                renames = storage.renames;
            }
        }

        if options.mesh {
            let (flip_x, flip_y) = (options.flip_x, options.flip_y);
            paste_mesh_in_sprite(cache, mesh_tool, sprite, entry, flip_x, flip_y, scale, &renames);
        }
        report.renames.extend(renames);
    }

    mesh_tool.setup_sprite(cache, selected);
    to_select.retain(|bone| cache.bones().contains(*bone));
    cache.set_bone_selection(to_select.clone());
    report.selected_bones = to_select;
    Ok(report)
}

/// Target/source pixels-per-unit ratio; 1 when the source did not record one.
pub fn paste_scale(source_pixels_per_unit: f32, target_pixels_per_unit: f32) -> f32 {
    if source_pixels_per_unit > 0.0 && target_pixels_per_unit > 0.0 {
        target_pixels_per_unit / source_pixels_per_unit
    } else {
        1.0
    }
}

fn push_unique(into: &mut Vec<BoneId>, bones: &[BoneId]) {
    for bone in bones {
        if !into.contains(bone) {
            into.push(*bone);
        }
    }
}

/// Matches by name, preferring sprites no earlier entry of this paste used.
fn find_target_sprite(
    cache: &SkinningCache,
    sprites: &[SpriteId],
    used: &[SpriteId],
    name: &str,
) -> Option<SpriteId> {
    if name.is_empty() {
        return None;
    }
    let named = |sprite: &&SpriteId| cache.sprite(**sprite).name == name;
    sprites
        .iter()
        .filter(|sprite| !used.contains(sprite))
        .find(named)
        .or_else(|| sprites.iter().find(named))
        .copied()
}

pub fn flipped_bone_position(position: Vec2, size: Vec2, flip_x: bool, flip_y: bool) -> Vec2 {
    Vec2::new(
        if flip_x { size.x - position.x } else { position.x },
        if flip_y { size.y - position.y } else { position.y },
    )
}

/// Mirrors a Z angle in degrees. X mirroring maps `z <= 180` to `180 - z`
/// and larger angles to `540 - z`; Y mirroring maps `z` to `360 - z`. With
/// both, the X rule runs first.
pub fn flipped_euler_z(degrees: f32, flip_x: bool, flip_y: bool) -> f32 {
    let mut z = wrap_degrees(degrees);
    if flip_x {
        z = if z <= 180.0 { 180.0 - z } else { 540.0 - z };
    }
    if flip_y {
        z = 360.0 - z;
    }
    wrap_degrees(z)
}

pub fn flipped_bone_rotation(rotation: Quat, flip_x: bool, flip_y: bool) -> Quat {
    if !flip_x && !flip_y {
        return rotation;
    }
    rotation_from_degrees(flipped_euler_z(euler_z_degrees(rotation), flip_x, flip_y))
}

/// Allocates live bones for a flattened tree. All bones exist before any is
/// parented, so a parent may come later in the array than its child.
fn create_bones_from_sprite_bones(
    cache: &mut SkinningCache,
    bones: &[SpriteBone],
    scale: f32,
) -> Vec<BoneId> {
    let count = bones.len();
    let ids: Vec<BoneId> = bones
        .iter()
        .enumerate()
        .map(|(index, source)| {
            let guid =
                if source.guid.is_empty() { uuid::Uuid::new_v4().to_string() } else { source.guid.clone() };
            let color: Vec4 = source.color.into();
            let color = if color.w <= 0.0 { palette_color(index, count) } else { color };
            let mut bone = Bone::new(guid, source.name.clone());
            bone.local_position = Vec2::new(source.position.x, source.position.y) * scale;
            bone.local_rotation = source.rotation.into();
            bone.depth = source.position.z;
            bone.length = source.length * scale;
            bone.color = color;
            cache.create_bone(bone)
        })
        .collect();
    for (index, source) in bones.iter().enumerate() {
        let Some(parent) = source.parent_index().and_then(|parent| ids.get(parent).copied()) else {
            continue;
        };
        if !cache.reparent_bone(ids[index], Some(parent)) {
            log::warn!("[paste] bone '{}' would form a cycle; kept as a root", source.name);
        }
    }
    ids
}

/// Moves a freshly built tree into place. Target transforms are computed for
/// every bone first, from the untouched tree; a second pass commits them
/// parents-before-children so no bone sees a half-updated parent.
fn place_bones(
    cache: &mut SkinningCache,
    bones: &[BoneId],
    offset: Vec2,
    size: Vec2,
    flip_x: bool,
    flip_y: bool,
) {
    let targets: HashMap<BoneId, (Vec2, Quat)> = bones
        .iter()
        .filter_map(|bone| {
            let (position, rotation) = cache.bones().world_transform(*bone)?;
            let position = offset + flipped_bone_position(position, size, flip_x, flip_y);
            Some((*bone, (position, flipped_bone_rotation(rotation, flip_x, flip_y))))
        })
        .collect();

    let roots: Vec<BoneId> =
        bones.iter().copied().filter(|bone| cache.bones().parent(*bone).is_none()).collect();
    let mut stack: Vec<BoneId> = roots.into_iter().rev().collect();
    while let Some(bone) = stack.pop() {
        if let Some((position, rotation)) = targets.get(&bone) {
            cache.set_bone_world_transform(bone, *position, *rotation);
        }
        stack.extend(cache.bones().children(bone).iter().rev().copied());
    }
}

/// Replaces the character skeleton with the copied character-level bones.
pub fn paste_bones_in_character(
    cache: &mut SkinningCache,
    bones: &[SpriteBone],
    flip_x: bool,
    flip_y: bool,
    scale: f32,
) -> Vec<BoneId> {
    let Some(character) = cache.character() else {
        return Vec::new();
    };
    let (skeleton, dimension) = (character.skeleton, character.dimension);
    let created = create_bones_from_sprite_bones(cache, bones, scale);
    if flip_x || flip_y {
        place_bones(cache, &created, Vec2::ZERO, dimension, flip_x, flip_y);
    }
    cache.set_bones(skeleton, created.clone());
    cache.notify_topology_changed(skeleton);
    log::debug!("[paste] replaced character skeleton with {} bones", created.len());
    created
}

/// Rebuilds the copied bones of one sprite and attaches them to its effective
/// skeleton: merged into the character skeleton in character mode, replacing
/// the sprite's own skeleton in sprite-sheet mode.
pub fn paste_bones_in_sprite(
    cache: &mut SkinningCache,
    sprite: SpriteId,
    bones: &[SpriteBone],
    flip_x: bool,
    flip_y: bool,
    scale: f32,
    copy_separator: &str,
) -> Option<BoneStorage> {
    let mode = cache.mode();
    if mode == SkinningMode::SpriteSheet && cache.has_character() {
        return None;
    }
    let anchor = match mode {
        SkinningMode::Character => cache.character_part(sprite)?.position,
        SkinningMode::SpriteSheet => cache.sprite(sprite).rect.position,
    };
    let size = cache.sprite(sprite).rect.size;
    let skeleton = cache.effective_skeleton(sprite);
    let origin = cache.skeleton(skeleton).origin;

    let created = create_bones_from_sprite_bones(cache, bones, scale);
    if created.is_empty() {
        return None;
    }
    place_bones(cache, &created, anchor - origin, size, flip_x, flip_y);

    let storage = match mode {
        SkinningMode::SpriteSheet => {
            cache.set_bones(skeleton, created.clone());
            BoneStorage { bones: created, renames: BTreeMap::new() }
        }
        SkinningMode::Character => add_bones_with_unique_names(cache, &created, skeleton, copy_separator),
    };
    cache.set_default_pose(skeleton);
    cache.notify_topology_changed(skeleton);
    Some(storage)
}

/// Merges `new_bones` into `skeleton`. A bone whose GUID is already present is
/// dropped and its children move under the bone that owns that GUID (or the
/// dropped bone's parent when that owner is one of its descendants); a bone
/// whose name is taken gets an automatic copy name and the rename is recorded.
pub fn add_bones_with_unique_names(
    cache: &mut SkinningCache,
    new_bones: &[BoneId],
    skeleton: SkeletonId,
    copy_separator: &str,
) -> BoneStorage {
    let mut owners: HashMap<String, BoneId> = HashMap::new();
    let mut names: HashSet<String> = HashSet::new();
    for (id, bone) in cache.skeleton_bones(skeleton) {
        if !bone.guid.is_empty() {
            owners.insert(bone.guid.clone(), id);
        }
        names.insert(bone.name.clone());
    }

    let mut storage = BoneStorage::default();
    for &bone in new_bones {
        let Some(data) = cache.bones().get(bone) else {
            continue;
        };
        let (guid, name) = (data.guid.clone(), data.name.clone());
        if let Some(&owner) = owners.get(&guid) {
            let fallback = cache.bones().parent(bone);
            for child in cache.bones().children(bone).to_vec() {
                if cache.reparent_bone_keep_world(child, Some(owner)) {
                    continue;
                }
                // The owner sits inside the dropped bone's subtree.
                if !cache.reparent_bone_keep_world(child, fallback) {
                    cache.reparent_bone_keep_world(child, None);
                }
            }
            cache.destroy_bone(bone);
            continue;
        }
        let mut final_name = name.clone();
        if names.contains(&name) {
            final_name = auto_name_bone_copy(&name, names.iter().map(String::as_str), copy_separator);
            log::debug!("[paste] bone '{name}' renamed to '{final_name}'");
            if let Some(data) = cache.bone_mut(bone) {
                data.name = final_name.clone();
            }
            storage.renames.insert(name, final_name.clone());
        }
        owners.insert(guid, bone);
        names.insert(final_name);
        cache.add_bone(skeleton, bone);
        storage.bones.push(bone);
    }
    storage
}

#[allow(clippy::too_many_arguments)]
fn paste_mesh_in_sprite(
    cache: &mut SkinningCache,
    mesh_tool: &mut MeshTool,
    sprite: SpriteId,
    data: &CopySpriteData,
    flip_x: bool,
    flip_y: bool,
    scale: f32,
    renames: &BTreeMap<String, String>,
) {
    mesh_tool.setup_sprite(cache, Some(sprite));
    let size = cache.sprite(sprite).rect.size;
    let skeleton = cache.effective_skeleton(sprite);
    let targets = if has_complete_guids(data) {
        bones_from_guids(cache, skeleton, data)
    } else {
        bones_from_names(cache, skeleton, data, renames)
    };
    let dropped = targets.iter().filter(|target| target.is_none()).count();
    if dropped > 0 {
        log::debug!(
            "[paste] {dropped} influence bones of '{}' did not resolve; their weights are dropped",
            data.sprite_name
        );
    }

    let Some(mesh) = mesh_tool.mesh_mut() else {
        return;
    };
    let rescale = (scale - 1.0).abs() > f32::EPSILON;
    let vertices: Vec<Vec2> = data
        .vertices
        .iter()
        .map(|stored| {
            let original = Vec2::from(*stored);
            let mut position = if rescale { original * scale } else { original };
            if flip_x {
                position.x = size.x - original.x;
            }
            if flip_y {
                position.y = size.y - original.y;
            }
            position
        })
        .collect();
    mesh.set_vertices(vertices, data.vertex_weights.clone());
    mesh.set_indices(data.indices.clone());
    mesh.set_edges(data.edges.clone());
    mesh.retarget_bones(&targets);
    let influence = mesh.bones.clone();

    if cache.has_character() && cache.character_part(sprite).is_some() {
        cache.set_character_part_bones(sprite, influence);
    }
    mesh_tool.update_mesh(cache);
}

fn has_complete_guids(data: &CopySpriteData) -> bool {
    !data.bone_weight_guids.is_empty() && data.bone_weight_guids.iter().all(|guid| !guid.is_empty())
}

fn find_bone_by_guid(cache: &SkinningCache, skeleton: SkeletonId, guid: &str) -> Option<BoneId> {
    cache.skeleton_bones(skeleton).find(|(_, bone)| bone.guid == guid).map(|(id, _)| id)
}

fn find_bone_by_name(cache: &SkinningCache, skeleton: SkeletonId, name: &str) -> Option<BoneId> {
    cache.skeleton_bones(skeleton).find(|(_, bone)| bone.name == name).map(|(id, _)| id)
}

/// One entry per copied influence bone, `None` where nothing matched. Merge
/// renames are deliberately not applied here: a GUID still identifies the
/// renamed bone, so only the name lookup consults them.
fn bones_from_guids(
    cache: &SkinningCache,
    skeleton: SkeletonId,
    data: &CopySpriteData,
) -> Vec<Option<BoneId>> {
    data.bone_weight_guids.iter().map(|guid| find_bone_by_guid(cache, skeleton, guid)).collect()
}

fn bones_from_names(
    cache: &SkinningCache,
    skeleton: SkeletonId,
    data: &CopySpriteData,
    renames: &BTreeMap<String, String>,
) -> Vec<Option<BoneId>> {
    let count = data.bone_weight_guids.len().max(data.bone_weight_names.len());
    (0..count)
        .map(|index| {
            let name = data.bone_weight_names.get(index)?;
            let name = renames.get(name).unwrap_or(name);
            find_bone_by_name(cache, skeleton, name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_x_angles_follow_the_mirror_rule() {
        assert!((flipped_euler_z(30.0, true, false) - 150.0).abs() < 1e-4);
        assert!((flipped_euler_z(180.0, true, false) - 0.0).abs() < 1e-4);
        assert!((flipped_euler_z(270.0, true, false) - 270.0).abs() < 1e-4);
        assert!((flipped_euler_z(200.0, true, false) - 340.0).abs() < 1e-4);
    }

    #[test]
    fn flip_y_and_combined_flips() {
        assert!((flipped_euler_z(30.0, false, true) - 330.0).abs() < 1e-4);
        assert!(flipped_euler_z(0.0, false, true).abs() < 1e-4);
        // X first (30 -> 150), then Y (150 -> 210).
        assert!((flipped_euler_z(30.0, true, true) - 210.0).abs() < 1e-4);
    }

    #[test]
    fn flips_are_involutions() {
        for z in [0.0_f32, 15.0, 90.0, 180.0, 181.0, 269.0, 359.0] {
            for (fx, fy) in [(true, false), (false, true), (true, true)] {
                let back = flipped_euler_z(flipped_euler_z(z, fx, fy), fx, fy);
                let diff = (back - z).abs().min(360.0 - (back - z).abs());
                assert!(diff < 1e-3, "z={z} fx={fx} fy={fy} came back as {back}");
            }
        }
    }

    #[test]
    fn scale_defaults_to_one_without_source_ppu() {
        assert_eq!(paste_scale(0.0, 100.0), 1.0);
        assert_eq!(paste_scale(50.0, 100.0), 2.0);
    }
}
