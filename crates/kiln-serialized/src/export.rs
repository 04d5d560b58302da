//! JSON export of decoded objects.
//!
//! Byte runs serialize as `{"__bytes__": "<base64>"}` so dumps stay valid
//! JSON without bloating into number arrays.

use base64::Engine;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::class_id;
use crate::file::SerializedFile;
use crate::value::Value;

impl Serialize for Value<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::UInt8(v) => serializer.serialize_u8(*v),
            Value::UInt16(v) => serializer.serialize_u16(*v),
            Value::UInt32(v) => serializer.serialize_u32(*v),
            Value::UInt64(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    "__bytes__",
                    &base64::engine::general_purpose::STANDARD.encode(bytes),
                )?;
                map.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Struct(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

/// Convert a value into a JSON tree.
pub fn to_json(value: &Value<'_>) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// One object of a tree dump.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDump {
    pub path_id: i64,
    pub class_id: i32,
    /// Root type name of the object's tree, or the class name.
    #[serde(rename = "type")]
    pub type_name: String,
    pub tree: serde_json::Value,
}

/// Decode every object of a file.
///
/// Objects that fail to decode are recorded as `{"__error__": "..."}`
/// rather than aborting the dump.
pub fn dump_objects(file: &SerializedFile<'_>) -> Vec<ObjectDump> {
    file.objects()
        .iter()
        .map(|object| {
            let type_name = file
                .type_tree_of(object)
                .map(|tree| tree.root().type_name.clone())
                .unwrap_or_else(|_| class_id::display_name(object.class_id).into_owned());
            let tree = match file.read(object) {
                Ok(value) => to_json(&value),
                Err(e) => serde_json::json!({ "__error__": e.to_string() }),
            };
            ObjectDump {
                path_id: object.path_id,
                class_id: object.class_id,
                type_name,
                tree,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typetree::FieldNode;
    use crate::value::Fields;
    use crate::{SerializedFileBuilder, SerializedType};
    use std::borrow::Cow;

    #[test]
    fn test_value_json_shape() {
        let mut fields = Fields::new();
        fields.insert("m_Name".into(), Value::String(Cow::Borrowed("Cube")));
        fields.insert("m_Data".into(), Value::Bytes(Cow::Borrowed(b"abc")));
        fields.insert(
            "m_List".into(),
            Value::Array(vec![Value::Int32(1), Value::UInt64(2)]),
        );
        let json = to_json(&Value::Struct(fields));

        assert_eq!(
            json,
            serde_json::json!({
                "m_Name": "Cube",
                "m_Data": { "__bytes__": "YWJj" },
                "m_List": [1, 2]
            })
        );
    }

    #[test]
    fn test_dump_records_errors() {
        let tree = FieldNode::new("TextAsset", "Base")
            .child(FieldNode::string("m_Name"))
            .build()
            .unwrap();
        let mut builder = SerializedFileBuilder::new(19);
        let type_id = builder.add_type(SerializedType::new(49, Some(tree)));
        builder
            .add_object(1, type_id, vec![2, 0, 0, 0, b'o', b'k', 0, 0])
            .add_object(2, type_id, vec![0xFF, 0, 0, 0]);
        let bytes = builder.build();
        let file = SerializedFile::parse(&bytes).unwrap();

        let dump = dump_objects(&file);
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[0].type_name, "TextAsset");
        assert_eq!(dump[0].tree["m_Name"], "ok");
        assert!(dump[1].tree.get("__error__").is_some());

        let text = serde_json::to_string(&dump[0]).unwrap();
        assert!(text.contains("\"pathId\":1"));
        assert!(text.contains("\"type\":\"TextAsset\""));
    }
}
