//! Copy and paste of rigs: bones, meshes and weights travel through a text
//! copy buffer as JSON.

pub mod capture;
pub mod data;
pub mod order;
pub mod paste;
pub mod store;

use crate::config::RigConfig;
use crate::events::RigEvent;
use crate::skeleton::BoneId;
use crate::skinning::{MeshTool, SkinningCache, SpriteId};
use std::collections::BTreeMap;
use thiserror::Error;

pub use capture::{capture, select_copy_mode, CopyMode};
pub use data::{CopyData, CopySpriteData, CopySummary, SpriteBone, SpriteBoneCopyData};
pub use order::bones_in_correct_order;
pub use paste::{flipped_bone_position, flipped_euler_z, paste_copy_data, paste_scale, PasteTarget};
pub use store::{CopyBufferValidator, CopyBufferStore, FileCopyBuffer, MemoryCopyBuffer};

/// What a paste applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PasteOptions {
    pub bones: bool,
    pub mesh: bool,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl PasteOptions {
    pub fn everything() -> Self {
        Self { bones: true, mesh: true, flip_x: false, flip_y: false }
    }

    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }
}

#[derive(Debug, Error)]
pub enum CopyPasteError {
    #[error("Copy buffer does not contain rig copy data")]
    InvalidCopyData,
    #[error("Copy buffer holds no sprites")]
    EmptyCopyData,
    #[error("Incorrect number of sprites: copied {copied} but the rig has {available}")]
    SpriteCountMismatch { copied: usize, available: usize },
    #[error("Failed to serialise copy data: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteReport {
    pub pasted_sprites: Vec<SpriteId>,
    /// Sprite names from the buffer that matched no sprite.
    pub skipped_entries: Vec<String>,
    pub selected_bones: Vec<BoneId>,
    /// Original bone name -> name it was given to stay unique.
    pub renames: BTreeMap<String, String>,
}

/// Entry point of the copy and paste commands.
pub struct CopyTool {
    store: Box<dyn CopyBufferStore>,
    validator: CopyBufferValidator,
    mesh_tool: MeshTool,
    pixels_per_unit: f32,
    pretty_buffer: bool,
    copy_separator: String,
}

impl CopyTool {
    pub fn new(store: Box<dyn CopyBufferStore>, config: &RigConfig) -> Self {
        Self {
            store,
            validator: CopyBufferValidator::new(),
            mesh_tool: MeshTool::new(),
            pixels_per_unit: config.copy.pixels_per_unit,
            pretty_buffer: config.copy.pretty_buffer,
            copy_separator: config.naming.copy_separator.clone(),
        }
    }

    pub fn store(&self) -> &dyn CopyBufferStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn CopyBufferStore {
        self.store.as_mut()
    }

    pub fn mesh_tool(&self) -> &MeshTool {
        &self.mesh_tool
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.pixels_per_unit
    }

    /// Captures the current selection into the copy buffer. `CopyPerformed`
    /// is announced even when there was nothing to capture.
    pub fn copy(&mut self, cache: &mut SkinningCache) -> Result<Option<CopySummary>, CopyPasteError> {
        let captured = match select_copy_mode(cache) {
            Some(mode) => {
                let data = capture(cache, mode, self.pixels_per_unit);
                let text = data.to_json(self.pretty_buffer)?;
                self.store.set(text);
                let summary = data.summary();
                log::info!(
                    "[copy] {} sprites, {} bones, {} vertices",
                    summary.sprites,
                    summary.sprite_bones + summary.character_bones,
                    summary.vertices
                );
                Some(summary)
            }
            None => {
                log::debug!("[copy] nothing to copy");
                None
            }
        };
        cache.events_mut().push(RigEvent::CopyPerformed);
        Ok(captured)
    }

    /// Whether the buffer currently holds something `paste` would accept.
    pub fn has_valid_copied_data(&mut self) -> bool {
        let text = self.store.get();
        self.validator.is_valid(&text)
    }

    pub fn paste(
        &mut self,
        cache: &mut SkinningCache,
        options: PasteOptions,
    ) -> Result<PasteReport, CopyPasteError> {
        let text = self.store.get();
        if !self.validator.is_valid(&text) {
            return Err(CopyPasteError::InvalidCopyData);
        }
        let data = CopyData::from_json(&text)?;
        let copy_separator = self.copy_separator.clone();
        let target = PasteTarget { pixels_per_unit: self.pixels_per_unit, copy_separator };
        let report = paste_copy_data(cache, &mut self.mesh_tool, &data, options, &target).inspect_err(|err| {
            log::warn!("[paste] {err}");
        })?;
        cache.events_mut().push(RigEvent::BoneSelectionChanged);
        cache.events_mut().push(RigEvent::PastePerformed(options));
        log::info!(
            "[paste] {} sprites pasted, {} skipped, {} bones renamed",
            report.pasted_sprites.len(),
            report.skipped_entries.len(),
            report.renames.len()
        );
        Ok(report)
    }
}
