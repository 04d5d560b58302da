//! Mesh objects and geometry extraction.

use kiln_common::{BinaryReader, Endian, UnityVersion};
use kiln_serialized::{ObjectInfo, SerializedFile, Value};
use tracing::{debug, warn};

use crate::compressed::CompressedMesh;
use crate::fields::{
    array_of, bytes_of, f32_of, i32_of, matrix_of, str_of, u32_of, u64_of, vec3_of,
};
use crate::geometry::Geometry;
use crate::resolver::ResourceResolver;
use crate::vertex::VertexData;
use crate::{Error, Result};

/// Engine assumed when a file carries no parseable version string.
const FALLBACK_VERSION: UnityVersion = UnityVersion::new(5, 0, 0);

/// Axis-aligned bounds as centre and half extent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Aabb {
    pub center: [f32; 3],
    pub extent: [f32; 3],
}

impl Aabb {
    fn from_value(value: &Value<'_>) -> Result<Self> {
        Ok(Self {
            center: vec3_of(value, "m_Center")?,
            extent: vec3_of(value, "m_Extent")?,
        })
    }
}

/// Primitive type of a submesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Topology {
    #[default]
    Triangles,
    /// Stored by engines before 4.0 only.
    TriangleStrip,
    Quads,
    Lines,
    LineStrip,
    Points,
    Unknown(i32),
}

impl From<i32> for Topology {
    fn from(raw: i32) -> Self {
        match raw {
            0 => Topology::Triangles,
            1 => Topology::TriangleStrip,
            2 => Topology::Quads,
            3 => Topology::Lines,
            4 => Topology::LineStrip,
            5 => Topology::Points,
            other => Topology::Unknown(other),
        }
    }
}

/// One index range of a mesh.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SubMesh {
    /// Byte offset into the index buffer.
    pub first_byte: u32,
    pub index_count: u32,
    pub topology: Topology,
    /// Added to every index, engines 2017.3 and later.
    pub base_vertex: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub local_aabb: Aabb,
}

impl SubMesh {
    pub fn from_value(value: &Value<'_>) -> Result<Self> {
        let topology = match value.get("topology") {
            Some(_) => Topology::from(i32_of(value, "topology")?),
            // Engines before 4.0 flag strips instead.
            None => match value.get("isTriStrip") {
                Some(_) if u32_of(value, "isTriStrip")? != 0 => Topology::TriangleStrip,
                _ => Topology::Triangles,
            },
        };
        let optional_u32 = |name: &str| match value.get(name) {
            Some(_) => u32_of(value, name),
            None => Ok(0),
        };

        Ok(Self {
            first_byte: u32_of(value, "firstByte")?,
            index_count: u32_of(value, "indexCount")?,
            topology,
            base_vertex: optional_u32("baseVertex")?,
            first_vertex: optional_u32("firstVertex")?,
            vertex_count: optional_u32("vertexCount")?,
            local_aabb: match value.get("localAABB") {
                Some(aabb) => Aabb::from_value(aabb)?,
                None => Aabb::default(),
            },
        })
    }
}

/// Width of index buffer entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum IndexFormat {
    #[default]
    UInt16,
    UInt32,
}

impl IndexFormat {
    pub const fn size(self) -> usize {
        match self {
            IndexFormat::UInt16 => 2,
            IndexFormat::UInt32 => 4,
        }
    }

    /// From `m_IndexFormat` (2017.3+) or `m_Use16BitIndices` (earlier).
    fn from_mesh(value: &Value<'_>) -> Result<Self> {
        if value.get("m_IndexFormat").is_some() {
            return Ok(match i32_of(value, "m_IndexFormat")? {
                0 => IndexFormat::UInt16,
                _ => IndexFormat::UInt32,
            });
        }
        match value.get("m_Use16BitIndices") {
            Some(_) if i32_of(value, "m_Use16BitIndices")? == 0 => Ok(IndexFormat::UInt32),
            _ => Ok(IndexFormat::UInt16),
        }
    }
}

/// Reference to bytes held in a sibling node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StreamingInfo {
    pub offset: u64,
    pub size: u32,
    pub path: String,
}

impl StreamingInfo {
    pub fn from_value(value: &Value<'_>) -> Result<Self> {
        Ok(Self {
            offset: u64_of(value, "offset")?,
            size: u32_of(value, "size")?,
            path: str_of(value, "path")?.to_string(),
        })
    }

    /// Whether this points at actual streamed bytes.
    #[inline]
    pub fn is_streamed(&self) -> bool {
        !self.path.is_empty() && self.size > 0
    }
}

/// A mesh object's fields, before geometry decoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
    pub index_format: IndexFormat,
    pub index_buffer: Vec<u8>,
    pub vertex_data: VertexData,
    pub compressed: Option<CompressedMesh>,
    /// Compression level; zero means the vertex data is authoritative.
    pub mesh_compression: u8,
    pub bind_poses: Vec<[f32; 16]>,
    /// Per-vertex influences stored by engines before 2018.
    pub skin: Vec<([f32; 4], [u32; 4])>,
    pub stream_data: Option<StreamingInfo>,
}

impl Mesh {
    /// Collect the mesh fields from a generically decoded object.
    pub fn from_value(value: &Value<'_>) -> Result<Self> {
        let sub_meshes = array_of(value, "m_SubMeshes")?
            .iter()
            .map(SubMesh::from_value)
            .collect::<Result<_>>()?;

        let vertex_data = match value.get("m_VertexData") {
            Some(v) => VertexData::from_value(v)?,
            None => VertexData::default(),
        };

        let compressed = match value.get("m_CompressedMesh") {
            Some(v) => Some(CompressedMesh::from_value(v)?),
            None => None,
        };

        let mesh_compression = match value.get("m_MeshCompression") {
            Some(v) => v
                .as_u64()
                .and_then(|c| u8::try_from(c).ok())
                .ok_or_else(|| Error::unexpected("m_MeshCompression", "byte"))?,
            None => 0,
        };

        let bind_poses = match value.get("m_BindPose") {
            Some(_) => array_of(value, "m_BindPose")?
                .iter()
                .map(matrix_of)
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };

        let skin = match value.get("m_Skin") {
            Some(_) => array_of(value, "m_Skin")?
                .iter()
                .map(influence_of)
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };

        let stream_data = match value.get("m_StreamData") {
            Some(v) => Some(StreamingInfo::from_value(v)?),
            None => None,
        };

        Ok(Self {
            name: str_of(value, "m_Name")?.to_string(),
            sub_meshes,
            index_format: IndexFormat::from_mesh(value)?,
            index_buffer: bytes_of(value, "m_IndexBuffer")?.into_owned(),
            vertex_data,
            compressed,
            mesh_compression,
            bind_poses,
            skin,
            stream_data,
        })
    }

    /// Whether vertex bytes must be fetched from a sibling node.
    pub fn needs_stream(&self) -> bool {
        self.vertex_data.data.is_empty()
            && self.stream_data.as_ref().is_some_and(StreamingInfo::is_streamed)
    }

    fn uses_compressed(&self) -> bool {
        self.mesh_compression != 0
            && self
                .compressed
                .as_ref()
                .is_some_and(|c| !c.vertices.is_empty())
    }

    /// Decode the index buffer.
    pub fn indices(&self, endian: Endian) -> Result<Vec<u32>> {
        let mut reader = BinaryReader::with_endian(&self.index_buffer, endian);
        let count = self.index_buffer.len() / self.index_format.size();
        (0..count)
            .map(|_| match self.index_format {
                IndexFormat::UInt16 => Ok(reader.read_u16()? as u32),
                IndexFormat::UInt32 => Ok(reader.read_u32()?),
            })
            .collect()
    }

    /// Decode geometry, with `vertex_bytes` standing in for the inline
    /// vertex buffer when it is streamed.
    pub fn geometry(
        &self,
        vertex_bytes: Option<&[u8]>,
        version: &UnityVersion,
        endian: Endian,
    ) -> Result<Geometry> {
        let mut geometry = Geometry::default();
        let mut raw_indices = self.indices(endian)?;

        if self.uses_compressed() {
            if let Some(compressed) = &self.compressed {
                compressed.decode_into(self.vertex_data.vertex_count as usize, &mut geometry)?;
            }
            if !geometry.indices.is_empty() {
                raw_indices = std::mem::take(&mut geometry.indices);
            }
        } else {
            let data = vertex_bytes.unwrap_or(&self.vertex_data.data);
            self.vertex_data
                .decode_into(data, version, endian, &mut geometry)?;
        }

        if geometry.bind_poses.is_empty() {
            geometry.bind_poses = self.bind_poses.clone();
        }
        if geometry.bone_weights.is_empty() && !self.skin.is_empty() {
            (geometry.bone_weights, geometry.bone_indices) = self.skin.iter().copied().unzip();
        }

        let unit = self.index_format.size();
        for sub_mesh in &self.sub_meshes {
            let start = geometry.indices.len();
            let first = sub_mesh.first_byte as usize / unit;
            let span = first
                .checked_add(sub_mesh.index_count as usize)
                .and_then(|end| raw_indices.get(first..end))
                .ok_or_else(|| {
                    Error::unexpected("m_SubMeshes", "submesh within the index buffer")
                })?;
            triangulate(span, sub_mesh, &mut geometry.indices)?;
            geometry.submesh_ranges.push(start..geometry.indices.len());
        }

        Ok(geometry)
    }
}

fn influence_of(value: &Value<'_>) -> Result<([f32; 4], [u32; 4])> {
    let mut weights = [0.0; 4];
    let mut bones = [0u32; 4];
    for i in 0..4 {
        weights[i] = f32_of(value, &format!("weight[{i}]"))?;
        bones[i] = u32_of(value, &format!("boneIndex[{i}]"))?;
    }
    Ok((weights, bones))
}

/// Append `span` as a triangle list.
fn triangulate(span: &[u32], sub_mesh: &SubMesh, out: &mut Vec<u32>) -> Result<()> {
    let base = sub_mesh.base_vertex;
    let largest = span.iter().copied().max().unwrap_or(0);
    if largest.checked_add(base).is_none() {
        return Err(Error::unexpected(
            "baseVertex",
            "base vertex that keeps every index within u32",
        ));
    }

    match sub_mesh.topology {
        Topology::Triangles => {
            out.extend(span.chunks_exact(3).flatten().map(|&i| i + base));
        }
        Topology::TriangleStrip => {
            for (n, w) in span.windows(3).enumerate() {
                let (a, b, c) = (w[0], w[1], w[2]);
                if a == b || a == c || b == c {
                    continue;
                }
                let tri = if n % 2 == 0 { [a, b, c] } else { [b, a, c] };
                out.extend(tri.map(|i| i + base));
            }
        }
        Topology::Quads => {
            for q in span.chunks_exact(4) {
                out.extend([q[0], q[1], q[2], q[0], q[2], q[3]].map(|i| i + base));
            }
        }
        Topology::Lines | Topology::LineStrip | Topology::Points | Topology::Unknown(_) => {
            out.extend(span.iter().map(|&i| i + base));
        }
    }
    Ok(())
}

/// A decoded mesh object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExtractedMesh {
    pub path_id: i64,
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
    pub index_format: IndexFormat,
    pub geometry: Geometry,
    pub stream: Option<StreamingInfo>,
    /// Path of the streamed resource that could not be found; geometry is
    /// empty when set.
    pub missing_resource: Option<String>,
}

impl ExtractedMesh {
    #[inline]
    pub fn has_geometry(&self) -> bool {
        !self.geometry.is_empty()
    }
}

/// Turns mesh objects into geometry.
///
/// Streamed vertex data is looked up through the resolver; without one,
/// streamed meshes come back with empty geometry.
#[derive(Debug, Clone, Default)]
pub struct MeshExtractor<'r> {
    resolver: ResourceResolver<'r>,
}

impl<'r> MeshExtractor<'r> {
    pub fn new(resolver: ResourceResolver<'r>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ResourceResolver<'r> {
        &self.resolver
    }

    /// Extract one mesh object of `file`.
    pub fn extract(&self, file: &SerializedFile<'_>, object: &ObjectInfo) -> Result<ExtractedMesh> {
        let value = file.read(object)?;
        let version = file.parsed_unity_version().unwrap_or(FALLBACK_VERSION);
        self.extract_value(object.path_id, &value, &version, file.endian())
    }

    /// Extract a mesh from an already decoded object.
    pub fn extract_value(
        &self,
        path_id: i64,
        value: &Value<'_>,
        version: &UnityVersion,
        endian: Endian,
    ) -> Result<ExtractedMesh> {
        let mesh = Mesh::from_value(value)?;
        let mut missing_resource = None;

        let streamed = match &mesh.stream_data {
            Some(info) if mesh.needs_stream() => match self.resolver.resolve(info) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.is_recoverable() => {
                    warn!(
                        path_id,
                        name = %mesh.name,
                        path = %info.path,
                        "streamed vertex data not found"
                    );
                    missing_resource = Some(info.path.clone());
                    None
                }
                Err(e) => return Err(e),
            },
            _ => None,
        };

        let geometry = if missing_resource.is_some() {
            Geometry::default()
        } else {
            mesh.geometry(streamed, version, endian)?
        };

        debug!(
            path_id,
            name = %mesh.name,
            vertices = geometry.vertex_count,
            indices = geometry.indices.len(),
            "extracted mesh"
        );

        Ok(ExtractedMesh {
            path_id,
            name: mesh.name,
            sub_meshes: mesh.sub_meshes,
            index_format: mesh.index_format,
            geometry,
            stream: mesh.stream_data,
            missing_resource,
        })
    }
}
