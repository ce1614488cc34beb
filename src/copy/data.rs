use crate::mesh::{Edge, VertexWeights};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2Data {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuatData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for QuatData {
    fn default() -> Self {
        Self::from(glam::Quat::IDENTITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorData {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// One bone of a flattened tree. `parent_id` indexes the array the bone is
/// stored in; `-1` marks a root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteBone {
    pub name: String,
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub color: ColorData,
    pub parent_id: i32,
    /// x/y: position, z: depth.
    pub position: Vec3Data,
    #[serde(default)]
    pub rotation: QuatData,
    #[serde(default)]
    pub length: f32,
}

impl SpriteBone {
    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent_id).ok()
    }
}

/// A flattened sprite bone plus its slot in the mesh influence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteBoneCopyData {
    pub sprite_bone: SpriteBone,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CopySpriteData {
    pub sprite_name: String,
    #[serde(default)]
    pub vertices: Vec<Vec2Data>,
    #[serde(default)]
    pub vertex_weights: Vec<VertexWeights>,
    #[serde(default)]
    pub indices: Vec<u32>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub bone_weight_guids: Vec<String>,
    #[serde(default)]
    pub bone_weight_names: Vec<String>,
    #[serde(default)]
    pub sprite_bones: Vec<SpriteBoneCopyData>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CopyData {
    pub pixels_per_unit: f32,
    pub is_character_data: bool,
    #[serde(default)]
    pub character_bones: Vec<SpriteBone>,
    pub copy_data: Vec<CopySpriteData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CopySummary {
    pub sprites: usize,
    pub sprite_bones: usize,
    pub character_bones: usize,
    pub vertices: usize,
    pub triangles: usize,
}

impl CopyData {
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Whether `text` decodes into this schema. Never panics on arbitrary input.
    pub fn is_valid_json(text: &str) -> bool {
        !text.trim().is_empty() && Self::from_json(text).is_ok()
    }

    pub fn summary(&self) -> CopySummary {
        CopySummary {
            sprites: self.copy_data.len(),
            sprite_bones: self.copy_data.iter().map(|sprite| sprite.sprite_bones.len()).sum(),
            character_bones: self.character_bones.len(),
            vertices: self.copy_data.iter().map(|sprite| sprite.vertices.len()).sum(),
            triangles: self.copy_data.iter().map(|sprite| sprite.indices.len() / 3).sum(),
        }
    }
}

impl From<glam::Vec2> for Vec2Data {
    fn from(value: glam::Vec2) -> Self {
        Self { x: value.x, y: value.y }
    }
}

impl From<Vec2Data> for glam::Vec2 {
    fn from(value: Vec2Data) -> Self {
        glam::Vec2::new(value.x, value.y)
    }
}

impl From<glam::Vec3> for Vec3Data {
    fn from(value: glam::Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

impl From<Vec3Data> for glam::Vec3 {
    fn from(value: Vec3Data) -> Self {
        glam::Vec3::new(value.x, value.y, value.z)
    }
}

impl From<glam::Quat> for QuatData {
    fn from(value: glam::Quat) -> Self {
        Self { x: value.x, y: value.y, z: value.z, w: value.w }
    }
}

impl From<QuatData> for glam::Quat {
    fn from(value: QuatData) -> Self {
        let quat = glam::Quat::from_xyzw(value.x, value.y, value.z, value.w);
        if quat.length_squared() > 0.0 {
            quat.normalize()
        } else {
            glam::Quat::IDENTITY
        }
    }
}

impl From<glam::Vec4> for ColorData {
    fn from(value: glam::Vec4) -> Self {
        Self { r: value.x, g: value.y, b: value.z, a: value.w }
    }
}

impl From<ColorData> for glam::Vec4 {
    fn from(value: ColorData) -> Self {
        glam::Vec4::new(value.r, value.g, value.b, value.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_text_without_panicking() {
        let rejected =
            ["", "   ", "hello", "{}", "[1,2,3]", r#"{"pixels_per_unit": "x"}"#, r#"{"copy_data": []}"#];
        for text in rejected {
            assert!(!CopyData::is_valid_json(text), "{text:?} should not be a copy buffer");
        }
    }

    #[test]
    fn minimal_buffer_is_valid() {
        let text = r#"{"pixels_per_unit": 100.0, "is_character_data": false, "copy_data": []}"#;
        assert!(CopyData::is_valid_json(text));
        let data = CopyData::from_json(text).expect("parse");
        assert!(data.character_bones.is_empty());
    }
}
