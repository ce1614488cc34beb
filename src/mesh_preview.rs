use crate::config::PreviewConfig;
use crate::events::{RigEvent, RigEventListener};
use crate::skinning::SpriteId;
use bitflags::bitflags;
use std::collections::BTreeMap;

bitflags! {
    /// Derived preview data that must be regenerated before the next draw.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PreviewDirty: u8 {
        const MESH     = 1 << 0;
        const SKINNING = 1 << 1;
        const COLORS   = 1 << 2;
    }
}

/// Per-sprite dirty bits for the mesh preview. Bits are only ever cleared by
/// the consumer, after it rebuilt the matching data.
#[derive(Debug, Clone, Default)]
pub struct MeshPreviewCache {
    entries: BTreeMap<SpriteId, PreviewDirty>,
    dirty_on_activate: bool,
}

impl MeshPreviewCache {
    pub fn new(config: &PreviewConfig) -> Self {
        Self { entries: BTreeMap::new(), dirty_on_activate: config.dirty_on_activate }
    }

    /// Registers the sprites of a freshly opened document.
    pub fn activate(&mut self, sprites: impl IntoIterator<Item = SpriteId>) {
        for sprite in sprites {
            self.register(sprite);
        }
        if self.dirty_on_activate {
            self.mark_all(PreviewDirty::MESH);
        }
        log::debug!("[preview] activated with {} sprites", self.entries.len());
    }

    /// Only registered sprites receive document-wide dirtying (`mark_all`).
    /// Sprites added to the document after `activate` go through `sync`.
    pub fn register(&mut self, sprite: SpriteId) {
        self.entries.entry(sprite).or_default();
    }

    /// Registers sprites the cache has not seen yet; they start mesh-dirty
    /// since no preview data exists for them.
    pub fn sync(&mut self, sprites: impl IntoIterator<Item = SpriteId>) {
        for sprite in sprites {
            self.entries.entry(sprite).or_insert(PreviewDirty::MESH);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks `kind` on `sprite`, registering it if it was unknown.
    pub fn mark_dirty(&mut self, sprite: SpriteId, kind: PreviewDirty) {
        *self.entries.entry(sprite).or_default() |= kind;
    }

    /// Marks `kind` on every registered sprite.
    pub fn mark_all(&mut self, kind: PreviewDirty) {
        for bits in self.entries.values_mut() {
            *bits |= kind;
        }
    }

    pub fn dirty(&self, sprite: SpriteId) -> PreviewDirty {
        self.entries.get(&sprite).copied().unwrap_or_default()
    }

    pub fn is_dirty(&self, sprite: SpriteId, kind: PreviewDirty) -> bool {
        self.dirty(sprite).intersects(kind)
    }

    pub fn clear(&mut self, sprite: SpriteId, kind: PreviewDirty) {
        if let Some(bits) = self.entries.get_mut(&sprite) {
            bits.remove(kind);
        }
    }

    /// Returns which of `kind` were dirty and clears them.
    pub fn take(&mut self, sprite: SpriteId, kind: PreviewDirty) -> PreviewDirty {
        match self.entries.get_mut(&sprite) {
            Some(bits) => {
                let taken = *bits & kind;
                bits.remove(kind);
                taken
            }
            None => PreviewDirty::empty(),
        }
    }

    pub fn dirty_sprites(&self) -> Vec<SpriteId> {
        self.entries.iter().filter(|(_, bits)| !bits.is_empty()).map(|(sprite, _)| *sprite).collect()
    }

    pub fn handle_event(&mut self, event: &RigEvent) {
        match event {
            RigEvent::MeshChanged { sprite } => self.mark_dirty(*sprite, PreviewDirty::MESH),
            RigEvent::CharacterPartChanged { sprite } => self.mark_dirty(*sprite, PreviewDirty::SKINNING),
            RigEvent::SkeletonPoseChanged { .. }
            | RigEvent::SkeletonBindPoseChanged { .. }
            | RigEvent::SkeletonTopologyChanged { .. } => self.mark_all(PreviewDirty::SKINNING),
            RigEvent::BoneColorChanged { .. } => self.mark_all(PreviewDirty::COLORS),
            RigEvent::SkinningModeChanged { .. } => self.mark_all(PreviewDirty::MESH),
            RigEvent::CopyPerformed
            | RigEvent::PastePerformed(_)
            | RigEvent::BoneSelectionChanged
            | RigEvent::BoneNameChanged { .. } => {}
        }
    }
}

impl RigEventListener for MeshPreviewCache {
    fn on_event(&mut self, event: &RigEvent) {
        self.handle_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skinning::{Rect, SkinningCache};
    use glam::Vec2;

    fn two_sprites() -> (SkinningCache, SpriteId, SpriteId) {
        let mut cache = SkinningCache::new();
        let a = cache.add_sprite("a", Rect::new(Vec2::ZERO, Vec2::splat(32.0)));
        let b = cache.add_sprite("b", Rect::new(Vec2::new(32.0, 0.0), Vec2::splat(32.0)));
        (cache, a, b)
    }

    #[test]
    fn activation_marks_meshes_when_configured() {
        let (cache, a, b) = two_sprites();
        let mut preview = MeshPreviewCache::new(&PreviewConfig { dirty_on_activate: true });
        preview.activate(cache.sprites());
        assert_eq!(preview.dirty(a), PreviewDirty::MESH);
        assert_eq!(preview.dirty(b), PreviewDirty::MESH);

        let mut quiet = MeshPreviewCache::new(&PreviewConfig { dirty_on_activate: false });
        quiet.activate(cache.sprites());
        assert!(quiet.dirty_sprites().is_empty());
        assert_eq!(quiet.len(), 2);
    }

    #[test]
    fn bits_stay_until_taken() {
        let (cache, a, _) = two_sprites();
        let mut preview = MeshPreviewCache::new(&PreviewConfig { dirty_on_activate: false });
        preview.activate(cache.sprites());
        preview.mark_dirty(a, PreviewDirty::MESH | PreviewDirty::COLORS);
        assert!(preview.is_dirty(a, PreviewDirty::COLORS));
        assert_eq!(preview.take(a, PreviewDirty::MESH), PreviewDirty::MESH);
        assert_eq!(preview.dirty(a), PreviewDirty::COLORS);
        preview.clear(a, PreviewDirty::all());
        assert!(preview.dirty(a).is_empty());
    }

    #[test]
    fn synced_sprites_join_document_wide_dirtying() {
        let (mut cache, a, _) = two_sprites();
        let mut preview = MeshPreviewCache::new(&PreviewConfig { dirty_on_activate: false });
        preview.activate(cache.sprites());
        let late = cache.add_sprite("late", Rect::new(Vec2::new(64.0, 0.0), Vec2::splat(32.0)));

        preview.sync(cache.sprites());
        assert_eq!(preview.dirty(late), PreviewDirty::MESH);
        assert!(preview.dirty(a).is_empty(), "known sprites keep their bits");

        preview.clear(late, PreviewDirty::all());
        preview.handle_event(&RigEvent::SkeletonPoseChanged { skeleton: cache.sprite(a).skeleton() });
        assert_eq!(preview.dirty(late), PreviewDirty::SKINNING);
    }

    #[test]
    fn selection_and_names_do_not_dirty() {
        let (cache, a, _) = two_sprites();
        let mut preview = MeshPreviewCache::new(&PreviewConfig { dirty_on_activate: false });
        preview.activate(cache.sprites());
        preview.handle_event(&RigEvent::BoneSelectionChanged);
        preview.handle_event(&RigEvent::CopyPerformed);
        assert!(preview.dirty(a).is_empty());
    }
}
