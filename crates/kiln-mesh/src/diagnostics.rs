//! Mesh summaries that do not decode geometry.

use kiln_serialized::Value;

use crate::mesh::StreamingInfo;

/// Counts and flags read straight off a mesh object.
///
/// Missing fields count as zero/absent, so a summary can be produced for
/// any mesh layout the generic reader handles.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MeshDiagnostics {
    pub path_id: i64,
    pub name: String,
    pub vertex_count: u32,
    pub index_buffer_length: usize,
    pub vertex_data_length: usize,
    pub channels_count: usize,
    pub index_format: Option<i32>,
    #[cfg_attr(feature = "serde", serde(rename = "use16BitIndices"))]
    pub use_16_bit_indices: Option<bool>,
    /// Set only when the mesh points at non-empty streamed bytes.
    pub stream: Option<StreamingInfo>,
    /// Has vertices, indices and somewhere to read vertex bytes from.
    pub renderable: bool,
}

impl MeshDiagnostics {
    pub fn from_value(path_id: i64, value: &Value<'_>) -> Self {
        let vertex_data = value.get("m_VertexData");
        let vertex_count = vertex_data
            .and_then(|v| v.get("m_VertexCount"))
            .and_then(Value::as_u32)
            .unwrap_or(0);
        let vertex_data_length = vertex_data
            .and_then(|v| v.get("m_DataSize"))
            .and_then(Value::len)
            .unwrap_or(0);
        let channels_count = vertex_data
            .and_then(|v| v.get("m_Channels"))
            .and_then(Value::len)
            .unwrap_or(0);
        let index_buffer_length = value
            .get("m_IndexBuffer")
            .and_then(Value::len)
            .unwrap_or(0);

        let stream = value
            .get("m_StreamData")
            .and_then(|v| StreamingInfo::from_value(v).ok())
            .filter(StreamingInfo::is_streamed);

        let renderable = vertex_count > 0
            && index_buffer_length > 0
            && (vertex_data_length > 0 || stream.is_some());

        Self {
            path_id,
            name: value
                .get("m_Name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            vertex_count,
            index_buffer_length,
            vertex_data_length,
            channels_count,
            index_format: value.get("m_IndexFormat").and_then(Value::as_i32),
            use_16_bit_indices: value
                .get("m_Use16BitIndices")
                .and_then(Value::as_i64)
                .map(|v| v != 0),
            stream,
            renderable,
        }
    }

    #[inline]
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_serialized::Fields;
    use std::borrow::Cow;

    fn mesh(vertex_bytes: usize, stream_size: u32) -> Value<'static> {
        let mut vertex_data = Fields::new();
        vertex_data.insert("m_VertexCount".into(), Value::UInt32(24));
        vertex_data.insert("m_Channels".into(), Value::Array(vec![Value::Int32(0); 14]));
        vertex_data.insert(
            "m_DataSize".into(),
            Value::Bytes(Cow::Owned(vec![0; vertex_bytes])),
        );

        let mut stream = Fields::new();
        stream.insert("offset".into(), Value::UInt64(0));
        stream.insert("size".into(), Value::UInt32(stream_size));
        stream.insert("path".into(), Value::String(Cow::Borrowed("archive:/CAB-a/CAB-a.resS")));

        let mut fields = Fields::new();
        fields.insert("m_Name".into(), Value::String(Cow::Borrowed("Cube")));
        fields.insert("m_IndexFormat".into(), Value::Int32(0));
        fields.insert("m_IndexBuffer".into(), Value::Bytes(Cow::Owned(vec![0; 72])));
        fields.insert("m_VertexData".into(), Value::Struct(vertex_data));
        fields.insert("m_StreamData".into(), Value::Struct(stream));
        Value::Struct(fields)
    }

    #[test]
    fn test_inline_mesh_is_renderable() {
        let diag = MeshDiagnostics::from_value(3, &mesh(288, 0));
        assert_eq!(diag.name, "Cube");
        assert_eq!(diag.vertex_count, 24);
        assert_eq!(diag.index_buffer_length, 72);
        assert_eq!(diag.vertex_data_length, 288);
        assert_eq!(diag.channels_count, 14);
        assert_eq!(diag.index_format, Some(0));
        assert_eq!(diag.use_16_bit_indices, None);
        assert!(!diag.has_stream());
        assert!(diag.renderable);
    }

    #[test]
    fn test_streamed_mesh_is_renderable() {
        let diag = MeshDiagnostics::from_value(3, &mesh(0, 288));
        assert!(diag.has_stream());
        assert!(diag.renderable);

        let empty = MeshDiagnostics::from_value(3, &mesh(0, 0));
        assert!(!empty.renderable);
    }

    #[test]
    fn test_missing_fields_default() {
        let diag = MeshDiagnostics::from_value(9, &Value::Struct(Fields::new()));
        assert_eq!(diag.vertex_count, 0);
        assert!(!diag.renderable);
        assert!(diag.name.is_empty());
    }
}
