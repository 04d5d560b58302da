//! Decoded mesh geometry.

use std::ops::Range;

/// Texture coordinates of one UV set.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UvChannel {
    /// Components per vertex (1 to 4).
    pub dimension: u8,
    pub values: Vec<f32>,
}

/// Vertex attributes and triangulated indices of a mesh.
///
/// Attribute arrays are flat; an attribute the mesh does not carry is empty.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Geometry {
    pub vertex_count: usize,
    /// `xyz` per vertex.
    pub positions: Vec<f32>,
    /// `xyz` per vertex.
    pub normals: Vec<f32>,
    /// `xyzw` per vertex, `w` being the bitangent sign.
    pub tangents: Vec<f32>,
    /// `rgba` per vertex in `0..=1`.
    pub colors: Vec<f32>,
    /// UV0 to UV7.
    pub uvs: [Option<UvChannel>; 8],
    pub bone_weights: Vec<[f32; 4]>,
    pub bone_indices: Vec<[u32; 4]>,
    /// Row-major 4x4 matrices.
    pub bind_poses: Vec<[f32; 16]>,
    /// Triangle-list indices of every submesh, base vertex applied.
    pub indices: Vec<u32>,
    /// Span of each submesh within `indices`.
    pub submesh_ranges: Vec<Range<usize>>,
}

impl Geometry {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn uv(&self, set: usize) -> Option<&UvChannel> {
        self.uvs.get(set).and_then(Option::as_ref)
    }

    /// Indices of one submesh.
    pub fn submesh_indices(&self, submesh: usize) -> Option<&[u32]> {
        self.submesh_ranges
            .get(submesh)
            .and_then(|range| self.indices.get(range.clone()))
    }

    /// Number of triangles across all submeshes.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Reshape `dimension`-wide vertices into `width`-wide ones, truncating or
/// zero-padding each vertex.
pub(crate) fn reshape(values: Vec<f32>, dimension: usize, width: usize) -> Vec<f32> {
    if dimension == width || dimension == 0 {
        return values;
    }
    let mut out = Vec::with_capacity(values.len() / dimension * width);
    for vertex in values.chunks_exact(dimension) {
        let kept = dimension.min(width);
        out.extend_from_slice(&vertex[..kept]);
        out.extend(std::iter::repeat(0.0).take(width - kept));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape() {
        assert_eq!(
            reshape(vec![1.0, 2.0, 3.0, 9.0, 4.0, 5.0, 6.0, 9.0], 4, 3),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(reshape(vec![1.0, 2.0], 2, 3), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_submesh_lookup() {
        let geometry = Geometry {
            indices: vec![0, 1, 2, 2, 1, 3],
            submesh_ranges: vec![0..3, 3..6],
            ..Default::default()
        };
        assert_eq!(geometry.submesh_indices(1), Some(&[2, 1, 3][..]));
        assert_eq!(geometry.submesh_indices(2), None);
        assert_eq!(geometry.triangle_count(), 2);
    }
}
