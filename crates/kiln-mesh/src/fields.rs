//! Typed access to generically decoded mesh fields.

use std::borrow::Cow;

use kiln_serialized::Value;

use crate::{Error, Result};

pub(crate) fn field<'v, 'a>(value: &'v Value<'a>, name: &str) -> Result<&'v Value<'a>> {
    value
        .get(name)
        .ok_or_else(|| Error::unexpected(name, "present field"))
}

pub(crate) fn u32_of(value: &Value<'_>, name: &str) -> Result<u32> {
    field(value, name)?
        .as_u32()
        .ok_or_else(|| Error::unexpected(name, "unsigned integer"))
}

pub(crate) fn u64_of(value: &Value<'_>, name: &str) -> Result<u64> {
    field(value, name)?
        .as_u64()
        .ok_or_else(|| Error::unexpected(name, "unsigned integer"))
}

pub(crate) fn i32_of(value: &Value<'_>, name: &str) -> Result<i32> {
    field(value, name)?
        .as_i32()
        .ok_or_else(|| Error::unexpected(name, "integer"))
}

pub(crate) fn f32_of(value: &Value<'_>, name: &str) -> Result<f32> {
    field(value, name)?
        .as_f32()
        .ok_or_else(|| Error::unexpected(name, "float"))
}

pub(crate) fn str_of<'v>(value: &'v Value<'_>, name: &str) -> Result<&'v str> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| Error::unexpected(name, "string"))
}

pub(crate) fn array_of<'v, 'a>(value: &'v Value<'a>, name: &str) -> Result<&'v [Value<'a>]> {
    field(value, name)?
        .as_array()
        .ok_or_else(|| Error::unexpected(name, "array"))
}

/// Byte runs decode as `Bytes`; trees that declare them element by element
/// decode as arrays of integers.
pub(crate) fn bytes_of<'v>(value: &'v Value<'_>, name: &str) -> Result<Cow<'v, [u8]>> {
    match field(value, name)? {
        Value::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_ref())),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_i64().and_then(|v| u8::try_from(v).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(Cow::Owned)
            .ok_or_else(|| Error::unexpected(name, "byte array")),
        _ => Err(Error::unexpected(name, "byte array")),
    }
}

pub(crate) fn vec3_of(value: &Value<'_>, name: &str) -> Result<[f32; 3]> {
    let v = field(value, name)?;
    Ok([f32_of(v, "x")?, f32_of(v, "y")?, f32_of(v, "z")?])
}

/// A `Matrix4x4f` as sixteen floats in `eRC` field order.
pub(crate) fn matrix_of(value: &Value<'_>) -> Result<[f32; 16]> {
    let fields = value
        .as_struct()
        .ok_or_else(|| Error::unexpected("m_BindPose", "matrix"))?;
    let mut out = [0.0; 16];
    if fields.len() != 16 {
        return Err(Error::unexpected("m_BindPose", "16 matrix elements"));
    }
    for (slot, (name, element)) in out.iter_mut().zip(fields) {
        *slot = element
            .as_f32()
            .ok_or_else(|| Error::unexpected(name.as_str(), "float"))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_serialized::Fields;

    #[test]
    fn test_bytes_from_either_shape() {
        let mut fields = Fields::new();
        fields.insert("a".into(), Value::Bytes(Cow::Borrowed(&[1, 2])));
        fields.insert(
            "b".into(),
            Value::Array(vec![Value::UInt8(3), Value::UInt8(4)]),
        );
        fields.insert("c".into(), Value::Array(vec![Value::Int32(300)]));
        let value = Value::Struct(fields);

        assert_eq!(bytes_of(&value, "a").unwrap().to_vec(), vec![1, 2]);
        assert_eq!(bytes_of(&value, "b").unwrap().to_vec(), vec![3, 4]);
        assert!(matches!(
            bytes_of(&value, "c"),
            Err(Error::UnexpectedValue { .. })
        ));
        assert!(matches!(
            u32_of(&value, "missing"),
            Err(Error::UnexpectedValue { expected: "present field", .. })
        ));
    }
}
