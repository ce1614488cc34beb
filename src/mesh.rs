use crate::skeleton::BoneId;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightChannel {
    pub bone_index: u32,
    pub weight: f32,
}

/// Sparse (bone index, weight) set for one vertex. Indices refer to the owning
/// mesh's influence bone list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexWeights {
    channels: SmallVec<[WeightChannel; 4]>,
}

impl VertexWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(bone_index: u32) -> Self {
        Self::from_pairs([(bone_index, 1.0)])
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, f32)>,
    {
        let mut weights = Self::new();
        for (bone_index, weight) in pairs {
            weights.add(bone_index, weight);
        }
        weights
    }

    /// Adds weight to a bone, merging with an existing channel for that bone.
    pub fn add(&mut self, bone_index: u32, weight: f32) {
        if let Some(channel) = self.channels.iter_mut().find(|channel| channel.bone_index == bone_index) {
            channel.weight += weight;
        } else {
            self.channels.push(WeightChannel { bone_index, weight });
        }
    }

    pub fn channels(&self) -> &[WeightChannel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn total_weight(&self) -> f32 {
        self.channels.iter().map(|channel| channel.weight).sum()
    }

    pub fn weight_of(&self, bone_index: u32) -> f32 {
        self.channels
            .iter()
            .filter(|channel| channel.bone_index == bone_index)
            .map(|channel| channel.weight)
            .sum()
    }

    pub fn max_bone_index(&self) -> Option<u32> {
        self.channels.iter().map(|channel| channel.bone_index).max()
    }

    /// Rewrites every channel through `remap`; channels mapped to `None` are
    /// removed and channels landing on the same bone are merged.
    pub fn remap<F>(&mut self, mut remap: F)
    where
        F: FnMut(u32) -> Option<u32>,
    {
        let previous = std::mem::take(&mut self.channels);
        for channel in previous {
            if let Some(bone_index) = remap(channel.bone_index) {
                self.add(bone_index, channel.weight);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub a: u32,
    pub b: u32,
}

impl Edge {
    pub fn new(a: u32, b: u32) -> Self {
        Self { a, b }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteMesh {
    pub vertices: Vec<Vec2>,
    pub vertex_weights: Vec<VertexWeights>,
    pub indices: Vec<u32>,
    /// Constraint edges kept through re-triangulation.
    pub edges: Vec<Edge>,
    /// Influence bones; the index space of every weight channel.
    pub bones: Vec<BoneId>,
}

impl SpriteMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Replaces geometry and weights together. Missing weight sets are filled
    /// with empty ones and surplus ones are discarded so both stay parallel.
    pub fn set_vertices(&mut self, vertices: Vec<Vec2>, mut weights: Vec<VertexWeights>) {
        weights.resize_with(vertices.len(), VertexWeights::default);
        self.vertices = vertices;
        self.vertex_weights = weights;
    }

    pub fn set_indices(&mut self, indices: Vec<u32>) {
        self.indices = indices;
    }

    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }

    /// Installs a new influence list. `targets[i]` is the bone that the
    /// current weight index `i` should refer to afterwards, or `None` when
    /// that bone no longer exists. The resulting list keeps first
    /// occurrences only, and weights referring to dropped bones are removed.
    pub fn retarget_bones(&mut self, targets: &[Option<BoneId>]) {
        let mut bones: Vec<BoneId> = Vec::with_capacity(targets.len());
        let mut slot_of: HashMap<BoneId, u32> = HashMap::new();
        let index_map: Vec<Option<u32>> = targets
            .iter()
            .map(|target| {
                target.map(|bone| {
                    *slot_of.entry(bone).or_insert_with(|| {
                        bones.push(bone);
                        (bones.len() - 1) as u32
                    })
                })
            })
            .collect();
        for weights in &mut self.vertex_weights {
            weights.remap(|index| index_map.get(index as usize).copied().flatten());
        }
        self.bones = bones;
    }

    /// Vertex/weight counts match and every weight refers to an influence bone.
    pub fn is_consistent(&self) -> bool {
        self.vertices.len() == self.vertex_weights.len()
            && self
                .vertex_weights
                .iter()
                .filter_map(VertexWeights::max_bone_index)
                .all(|index| (index as usize) < self.bones.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Bone, BoneGraph};

    fn bone_ids(count: usize) -> Vec<BoneId> {
        let mut graph = BoneGraph::new();
        (0..count).map(|i| graph.insert(Bone::new(format!("g{i}"), format!("b{i}")))).collect()
    }

    #[test]
    fn retarget_drops_missing_bones_and_shifts_indices() {
        let ids = bone_ids(3);
        let mut mesh = SpriteMesh::new();
        mesh.set_vertices(
            vec![Vec2::ZERO, Vec2::X],
            vec![VertexWeights::from_pairs([(0, 0.5), (1, 0.5)]), VertexWeights::from_pairs([(2, 1.0)])],
        );
        mesh.retarget_bones(&[Some(ids[0]), None, Some(ids[2])]);

        assert_eq!(mesh.bones, vec![ids[0], ids[2]]);
        assert_eq!(mesh.vertex_weights[0].channels(), &[WeightChannel { bone_index: 0, weight: 0.5 }]);
        assert_eq!(mesh.vertex_weights[1].channels(), &[WeightChannel { bone_index: 1, weight: 1.0 }]);
        assert!(mesh.is_consistent());
    }

    #[test]
    fn retarget_merges_duplicate_targets() {
        let ids = bone_ids(1);
        let mut mesh = SpriteMesh::new();
        mesh.set_vertices(vec![Vec2::ZERO], vec![VertexWeights::from_pairs([(0, 0.25), (1, 0.75)])]);
        mesh.retarget_bones(&[Some(ids[0]), Some(ids[0])]);
        assert_eq!(mesh.bones, vec![ids[0]]);
        assert_eq!(mesh.vertex_weights[0].len(), 1);
        assert!((mesh.vertex_weights[0].weight_of(0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn set_vertices_keeps_weights_parallel() {
        let mut mesh = SpriteMesh::new();
        mesh.set_vertices(vec![Vec2::ZERO, Vec2::ONE, Vec2::Y], vec![VertexWeights::single(0)]);
        assert_eq!(mesh.vertex_weights.len(), 3);
        assert!(mesh.vertex_weights[2].is_empty());
    }
}
