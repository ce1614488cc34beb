use super::data::{SpriteBone, SpriteBoneCopyData};

/// Rearranges flattened bones from discovery order into mesh influence order.
///
/// Each entry moves to the slot named by its `order`; entries with a negative
/// order keep their own position. `parent_id` is rewritten so it points at the
/// parent's new slot. Orders that are out of range or already taken fall back
/// to the first free slot, so the result always holds every input bone.
pub fn bones_in_correct_order(bones: &[SpriteBoneCopyData]) -> Vec<SpriteBone> {
    let count = bones.len();
    let mut slot_of: Vec<Option<usize>> = vec![None; count];
    let mut taken = vec![false; count];

    for (index, entry) in bones.iter().enumerate() {
        if let Ok(order) = usize::try_from(entry.order) {
            if order < count && !taken[order] {
                slot_of[index] = Some(order);
                taken[order] = true;
            }
        }
    }
    for (index, entry) in bones.iter().enumerate() {
        if entry.order < 0 && slot_of[index].is_none() && !taken[index] {
            slot_of[index] = Some(index);
            taken[index] = true;
        }
    }
    let mut free = (0..count).filter(|slot| !taken[*slot]).collect::<Vec<_>>().into_iter();
    for slot in slot_of.iter_mut().filter(|slot| slot.is_none()) {
        *slot = free.next();
    }

    let mut ordered: Vec<Option<SpriteBone>> = vec![None; count];
    for (index, entry) in bones.iter().enumerate() {
        let Some(slot) = slot_of[index] else {
            continue;
        };
        let mut bone = entry.sprite_bone.clone();
        bone.parent_id = bone
            .parent_index()
            .and_then(|parent| slot_of.get(parent).copied().flatten())
            .map_or(-1, |parent_slot| parent_slot as i32);
        ordered[slot] = Some(bone);
    }
    ordered.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::data::Vec3Data;

    fn entry(name: &str, parent_id: i32, order: i32) -> SpriteBoneCopyData {
        SpriteBoneCopyData {
            sprite_bone: SpriteBone {
                name: name.to_string(),
                guid: format!("{name}-guid"),
                color: Default::default(),
                parent_id,
                position: Vec3Data::default(),
                rotation: Default::default(),
                length: 1.0,
            },
            order,
        }
    }

    #[test]
    fn reorders_into_influence_order_and_rewrites_parents() {
        // Discovery order B0 -> B1 -> B2 (a chain); influence order [B2, B0, B1].
        let discovered = [entry("B0", -1, 1), entry("B1", 0, 2), entry("B2", 1, 0)];
        let ordered = bones_in_correct_order(&discovered);

        let names: Vec<&str> = ordered.iter().map(|bone| bone.name.as_str()).collect();
        assert_eq!(names, ["B2", "B0", "B1"]);
        assert_eq!(ordered[0].parent_id, 2, "B2's parent B1 now lives in slot 2");
        assert_eq!(ordered[1].parent_id, -1);
        assert_eq!(ordered[2].parent_id, 1, "B1's parent B0 now lives in slot 1");
    }

    #[test]
    fn negative_orders_keep_their_position() {
        let discovered = [entry("root", -1, -1), entry("child", 0, 1)];
        let ordered = bones_in_correct_order(&discovered);
        assert_eq!(ordered[0].name, "root");
        assert_eq!(ordered[1].name, "child");
        assert_eq!(ordered[1].parent_id, 0);
    }

    #[test]
    fn sparse_orders_never_lose_bones() {
        let discovered = [entry("a", -1, 0), entry("b", 0, 7), entry("c", 0, 0)];
        let ordered = bones_in_correct_order(&discovered);
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0].name, "a");
        assert!(ordered.iter().all(|bone| bone.parent_id < 3));
    }
}
