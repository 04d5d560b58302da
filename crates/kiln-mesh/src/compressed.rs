//! Compressed mesh decoding.
//!
//! Meshes imported with compression store each attribute as a
//! [`PackedBitVector`]. Normals and tangents keep only X and Y plus a sign
//! stream for Z; skin weights are quantized to 1/31 steps.

use kiln_serialized::Value;

use crate::fields::{field, u32_of};
use crate::geometry::{Geometry, UvChannel};
use crate::packed::PackedBitVector;
use crate::{Error, Result};

const UV_INFO_BITS: u32 = 4;
const UV_DIMENSION_MASK: u32 = 3;
const UV_CHANNEL_EXISTS: u32 = 4;
const MAX_UV_CHANNELS: usize = 8;

/// Skin weights are stored in 1/31 steps; a vertex is complete at 31.
const WEIGHT_UNIT: u32 = 31;

/// The packed vectors of a compressed mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompressedMesh {
    pub vertices: PackedBitVector,
    pub uv: PackedBitVector,
    pub bind_poses: Option<PackedBitVector>,
    pub normals: PackedBitVector,
    pub tangents: PackedBitVector,
    pub weights: PackedBitVector,
    pub normal_signs: PackedBitVector,
    pub tangent_signs: PackedBitVector,
    /// Float colours, engines 5.0 and later.
    pub float_colors: Option<PackedBitVector>,
    pub bone_indices: PackedBitVector,
    pub triangles: PackedBitVector,
    /// Packed 32-bit RGBA colours of older engines.
    pub colors: Option<PackedBitVector>,
    /// Four bits per UV set: dimension minus one and a presence bit.
    pub uv_info: u32,
}

impl CompressedMesh {
    pub fn from_value(value: &Value<'_>) -> Result<Self> {
        let packed = |name: &'static str| PackedBitVector::from_value(field(value, name)?, name);
        let optional = |name: &'static str| -> Result<Option<PackedBitVector>> {
            match value.get(name) {
                Some(v) => PackedBitVector::from_value(v, name).map(Some),
                None => Ok(None),
            }
        };

        Ok(Self {
            vertices: packed("m_Vertices")?,
            uv: packed("m_UV")?,
            bind_poses: optional("m_BindPoses")?,
            normals: packed("m_Normals")?,
            tangents: packed("m_Tangents")?,
            weights: packed("m_Weights")?,
            normal_signs: packed("m_NormalSigns")?,
            tangent_signs: packed("m_TangentSigns")?,
            float_colors: optional("m_FloatColors")?,
            bone_indices: packed("m_BoneIndices")?,
            triangles: packed("m_Triangles")?,
            colors: optional("m_Colors")?,
            uv_info: match value.get("m_UVInfo") {
                Some(_) => u32_of(value, "m_UVInfo")?,
                None => 0,
            },
        })
    }

    /// Decode all attributes into `geometry`.
    ///
    /// `vertex_count` comes from the mesh's vertex data and is used when
    /// the compressed positions are absent.
    pub fn decode_into(&self, vertex_count: usize, geometry: &mut Geometry) -> Result<()> {
        let vertex_count = if self.vertices.is_empty() {
            vertex_count
        } else {
            geometry.positions = self.vertices.unpack_floats()?;
            self.vertices.len() / 3
        };
        geometry.vertex_count = vertex_count;

        if !self.uv.is_empty() {
            self.decode_uvs(vertex_count, geometry)?;
        }

        if let Some(bind_poses) = self.bind_poses.as_ref().filter(|b| !b.is_empty()) {
            geometry.bind_poses = bind_poses
                .unpack_floats()?
                .chunks_exact(16)
                .map(|m| {
                    let mut matrix = [0.0; 16];
                    matrix.copy_from_slice(m);
                    matrix
                })
                .collect();
        }

        if !self.normals.is_empty() {
            geometry.normals = decode_normals(&self.normals, &self.normal_signs)?;
        }
        if !self.tangents.is_empty() {
            geometry.tangents = decode_tangents(&self.tangents, &self.tangent_signs)?;
        }

        if let Some(float_colors) = self.float_colors.as_ref().filter(|c| !c.is_empty()) {
            geometry.colors = float_colors.unpack_floats()?;
        } else if let Some(colors) = self.colors.as_ref().filter(|c| !c.is_empty()) {
            geometry.colors = colors
                .unpack_ints()?
                .into_iter()
                .flat_map(|rgba| rgba.to_le_bytes())
                .map(|channel| channel as f32 / 255.0)
                .collect();
        }

        if !self.weights.is_empty() {
            let (weights, indices) = decode_skin(&self.weights, &self.bone_indices)?;
            geometry.bone_weights = weights;
            geometry.bone_indices = indices;
        }

        if !self.triangles.is_empty() {
            geometry.indices = self.triangles.unpack_ints()?;
        }

        Ok(())
    }

    fn decode_uvs(&self, vertex_count: usize, geometry: &mut Geometry) -> Result<()> {
        if self.uv_info == 0 {
            geometry.uvs[0] = Some(UvChannel {
                dimension: 2,
                values: self.uv.unpack_floats_range(0, vertex_count * 2)?,
            });
            if self.uv.len() >= vertex_count * 4 {
                geometry.uvs[1] = Some(UvChannel {
                    dimension: 2,
                    values: self.uv.unpack_floats_range(vertex_count * 2, vertex_count * 2)?,
                });
            }
            return Ok(());
        }

        let mut offset = 0;
        for set in 0..MAX_UV_CHANNELS {
            let bits = (self.uv_info >> (set as u32 * UV_INFO_BITS)) & ((1 << UV_INFO_BITS) - 1);
            if bits & UV_CHANNEL_EXISTS == 0 {
                continue;
            }
            let dimension = 1 + (bits & UV_DIMENSION_MASK) as usize;
            let count = dimension * vertex_count;
            geometry.uvs[set] = Some(UvChannel {
                dimension: dimension as u8,
                values: self.uv.unpack_floats_range(offset, count)?,
            });
            offset += count;
        }
        Ok(())
    }
}

/// Rebuild Z from X, Y and a sign.
///
/// Vectors that quantized outside the unit disc are renormalized in the XY
/// plane instead.
pub fn reconstruct_z(x: f32, y: f32, positive: bool) -> [f32; 3] {
    let zsqr = 1.0 - x * x - y * y;
    let [x, y, z] = if zsqr >= 0.0 {
        [x, y, zsqr.sqrt()]
    } else {
        let len = (x * x + y * y).sqrt();
        [x / len, y / len, 0.0]
    };
    [x, y, if positive { z } else { -z }]
}

fn decode_normals(normals: &PackedBitVector, signs: &PackedBitVector) -> Result<Vec<f32>> {
    let xy = normals.unpack_floats()?;
    let signs = signs.unpack_ints()?;
    let count = xy.len() / 2;
    if signs.len() < count {
        return Err(Error::unexpected("m_NormalSigns", "one sign per normal"));
    }

    let mut out = Vec::with_capacity(count * 3);
    for (pair, &sign) in xy.chunks_exact(2).zip(&signs) {
        out.extend(reconstruct_z(pair[0], pair[1], sign != 0));
    }
    Ok(out)
}

fn decode_tangents(tangents: &PackedBitVector, signs: &PackedBitVector) -> Result<Vec<f32>> {
    let xy = tangents.unpack_floats()?;
    let signs = signs.unpack_ints()?;
    let count = xy.len() / 2;
    if signs.len() < count * 2 {
        return Err(Error::unexpected("m_TangentSigns", "two signs per tangent"));
    }

    let mut out = Vec::with_capacity(count * 4);
    for (pair, sign) in xy.chunks_exact(2).zip(signs.chunks_exact(2)) {
        out.extend(reconstruct_z(pair[0], pair[1], sign[0] != 0));
        out.push(if sign[1] != 0 { 1.0 } else { -1.0 });
    }
    Ok(out)
}

/// Rebuild per-vertex influences from the weight and bone index streams.
///
/// Weights accumulate per vertex until they reach a full unit. A vertex
/// that has three weights short of a unit gets the remainder as its fourth,
/// with one more bone index read for it.
pub fn decode_skin(
    weights: &PackedBitVector,
    bone_indices: &PackedBitVector,
) -> Result<(Vec<[f32; 4]>, Vec<[u32; 4]>)> {
    let weights = weights.unpack_ints()?;
    let indices = bone_indices.unpack_ints()?;
    let mut next_index = indices.iter().copied();
    let mut take_index = || {
        next_index
            .next()
            .ok_or_else(|| Error::unexpected("m_BoneIndices", "bone index per weight"))
    };

    let mut out_weights = Vec::new();
    let mut out_indices = Vec::new();
    let mut weight = [0.0f32; 4];
    let mut bone = [0u32; 4];
    let mut slot = 0;
    let mut sum = 0;

    for &w in &weights {
        weight[slot] = w as f32 / WEIGHT_UNIT as f32;
        bone[slot] = take_index()?;
        slot += 1;
        sum += w;

        if sum >= WEIGHT_UNIT {
            out_weights.push(weight);
            out_indices.push(bone);
        } else if slot == 3 {
            weight[3] = (WEIGHT_UNIT - sum) as f32 / WEIGHT_UNIT as f32;
            bone[3] = take_index()?;
            out_weights.push(weight);
            out_indices.push(bone);
        } else {
            continue;
        }

        weight = [0.0; 4];
        bone = [0; 4];
        slot = 0;
        sum = 0;
    }

    Ok((out_weights, out_indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_reconstruct_z() {
        let [x, y, z] = reconstruct_z(0.6, 0.8, true);
        assert!(close(x, 0.6) && close(y, 0.8) && close(z, 0.0));

        assert_eq!(reconstruct_z(0.0, 0.0, true), [0.0, 0.0, 1.0]);
        assert_eq!(reconstruct_z(0.0, 0.0, false), [0.0, 0.0, -1.0]);

        // Outside the unit disc: renormalized with zero Z.
        let [x, y, z] = reconstruct_z(0.9, 0.9, false);
        assert!(close(x, std::f32::consts::FRAC_1_SQRT_2));
        assert!(close(y, std::f32::consts::FRAC_1_SQRT_2));
        assert_eq!(z, 0.0);
    }

    #[test]
    fn test_skin_state_machine() {
        // Vertex 0: one full weight. Vertex 1: 10 + 21. Vertex 2: three
        // partial weights, the fourth implied with its own bone index.
        let weights = PackedBitVector::pack_ints(&[31, 10, 21, 5, 6, 7], 5);
        let bones = PackedBitVector::pack_ints(&[4, 1, 2, 7, 8, 9, 3], 4);

        let (w, b) = decode_skin(&weights, &bones).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(b, vec![[4, 0, 0, 0], [1, 2, 0, 0], [7, 8, 9, 3]]);

        assert_eq!(w[0], [1.0, 0.0, 0.0, 0.0]);
        assert!(close(w[1][0], 10.0 / 31.0) && close(w[1][1], 21.0 / 31.0));
        assert!(close(w[2][3], 13.0 / 31.0));
        assert!(close(w[2].iter().sum::<f32>(), 1.0));
    }

    #[test]
    fn test_skin_missing_bone_index() {
        let weights = PackedBitVector::pack_ints(&[1, 1, 1], 5);
        let bones = PackedBitVector::pack_ints(&[0, 1, 2], 4);
        assert!(matches!(
            decode_skin(&weights, &bones),
            Err(Error::UnexpectedValue { .. })
        ));
    }

    #[test]
    fn test_decode_compressed_attributes() {
        let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let mesh = CompressedMesh {
            vertices: PackedBitVector::pack_floats(&positions, 1.0, 0.0, 16),
            uv: PackedBitVector::pack_floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], 1.0, 0.0, 8),
            normals: PackedBitVector::pack_floats(&[0.0; 6], 2.0, -1.0, 8),
            normal_signs: PackedBitVector::pack_ints(&[1, 0, 1], 1),
            triangles: PackedBitVector::pack_ints(&[0, 1, 2], 2),
            ..Default::default()
        };

        let mut geometry = Geometry::default();
        mesh.decode_into(0, &mut geometry).unwrap();

        assert_eq!(geometry.vertex_count, 3);
        assert_eq!(geometry.positions.len(), 9);
        assert!(close(geometry.positions[3], 1.0));
        assert_eq!(geometry.uv(0).unwrap().values.len(), 6);
        assert!(geometry.uv(1).is_none());
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        // Normals quantize 0.0 to the nearest step of 2/255.
        assert!(geometry.normals[2] > 0.99);
        assert!(geometry.normals[5] < -0.99);
    }

    #[test]
    fn test_uv_info_selects_sets() {
        // UV0 with two components, UV2 with three.
        let uv_info = (UV_CHANNEL_EXISTS | 1) | ((UV_CHANNEL_EXISTS | 2) << 8);
        let values: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        let mesh = CompressedMesh {
            uv: PackedBitVector::pack_floats(&values, 1.0, 0.0, 16),
            uv_info,
            ..Default::default()
        };

        let mut geometry = Geometry::default();
        mesh.decode_into(2, &mut geometry).unwrap();

        assert_eq!(geometry.uv(0).unwrap().dimension, 2);
        assert!(geometry.uv(1).is_none());
        let uv2 = geometry.uv(2).unwrap();
        assert_eq!(uv2.dimension, 3);
        assert_eq!(uv2.values.len(), 6);
        assert!(close(uv2.values[0], 0.4));
    }
}
