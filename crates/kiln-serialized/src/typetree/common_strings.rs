//! Built-in string table shared by every tabular type tree.
//!
//! A name offset with the top bit set indexes this table instead of the
//! tree's own string pool. Offsets are the ones the engine writes.

/// Top bit marking an offset into the common table.
pub const COMMON_STRING_FLAG: u32 = 0x8000_0000;

static COMMON_STRINGS: &[(u32, &str)] = &[
    (0, "AABB"),
    (5, "AnimationClip"),
    (19, "AnimationCurve"),
    (34, "AnimationState"),
    (49, "Array"),
    (55, "Base"),
    (60, "BitField"),
    (69, "bitset"),
    (76, "bool"),
    (81, "char"),
    (86, "ColorRGBA"),
    (96, "Component"),
    (106, "data"),
    (111, "deque"),
    (117, "double"),
    (124, "dynamic_array"),
    (138, "FastPropertyName"),
    (155, "first"),
    (161, "float"),
    (167, "Font"),
    (172, "GameObject"),
    (183, "Generic Mono"),
    (196, "GradientNEW"),
    (208, "GUID"),
    (213, "GUIStyle"),
    (222, "int"),
    (226, "list"),
    (231, "long long"),
    (241, "map"),
    (245, "Matrix4x4f"),
    (256, "MdFour"),
    (263, "MonoBehaviour"),
    (277, "MonoScript"),
    (288, "m_ByteSize"),
    (299, "m_Curve"),
    (307, "m_EditorClassIdentifier"),
    (331, "m_EditorHideFlags"),
    (349, "m_Enabled"),
    (359, "m_ExtensionPtr"),
    (374, "m_GameObject"),
    (387, "m_Index"),
    (395, "m_IsArray"),
    (405, "m_IsStatic"),
    (416, "m_MetaFlag"),
    (427, "m_Name"),
    (434, "m_ObjectHideFlags"),
    (452, "m_PrefabInternal"),
    (469, "m_PrefabParentObject"),
    (490, "m_Script"),
    (499, "m_StaticEditorFlags"),
    (519, "m_Type"),
    (526, "m_Version"),
    (536, "Object"),
    (543, "pair"),
    (548, "PPtr<Component>"),
    (564, "PPtr<GameObject>"),
    (581, "PPtr<Material>"),
    (596, "PPtr<MonoBehaviour>"),
    (616, "PPtr<MonoScript>"),
    (633, "PPtr<Object>"),
    (646, "PPtr<Prefab>"),
    (659, "PPtr<Sprite>"),
    (672, "PPtr<TextAsset>"),
    (688, "PPtr<Texture>"),
    (701, "PPtr<Texture2D>"),
    (717, "PPtr<Transform>"),
    (733, "Prefab"),
    (740, "Quaternionf"),
    (752, "Rectf"),
    (758, "RectInt"),
    (766, "RectOffset"),
    (777, "second"),
    (784, "set"),
    (788, "short"),
    (794, "size"),
    (799, "SInt16"),
    (806, "SInt32"),
    (813, "SInt64"),
    (820, "SInt8"),
    (826, "staticvector"),
    (839, "string"),
    (846, "TextAsset"),
    (856, "TextMesh"),
    (865, "Texture"),
    (873, "Texture2D"),
    (883, "Transform"),
    (893, "TypelessData"),
    (906, "UInt16"),
    (913, "UInt32"),
    (920, "UInt64"),
    (927, "UInt8"),
    (933, "unsigned int"),
    (946, "unsigned long long"),
    (965, "unsigned short"),
    (980, "vector"),
    (987, "Vector2f"),
    (996, "Vector3f"),
    (1005, "Vector4f"),
    (1014, "m_ScriptingClassIdentifier"),
    (1041, "Gradient"),
    (1050, "Type*"),
    (1056, "int2_storage"),
    (1069, "int3_storage"),
    (1082, "BoundsInt"),
    (1092, "m_CorrespondingSourceObject"),
    (1120, "m_PrefabInstance"),
    (1137, "m_PrefabAsset"),
    (1151, "FileSize"),
    (1160, "Hash128"),
];

/// Iterate `(offset, string)` pairs of the common table.
pub fn entries() -> impl Iterator<Item = (u32, &'static str)> {
    COMMON_STRINGS.iter().copied()
}

/// Resolve an offset (flag already stripped) into the common table.
pub fn lookup(offset: u32) -> Option<&'static str> {
    COMMON_STRINGS
        .binary_search_by_key(&offset, |&(at, _)| at)
        .ok()
        .map(|index| COMMON_STRINGS[index].1)
}

/// Offset of `name` in the common table, if present.
pub fn offset_of(name: &str) -> Option<u32> {
    COMMON_STRINGS
        .iter()
        .find(|(_, s)| *s == name)
        .map(|&(offset, _)| offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_offsets() {
        assert_eq!(lookup(0), Some("AABB"));
        assert_eq!(lookup(49), Some("Array"));
        assert_eq!(lookup(222), Some("int"));
        assert_eq!(lookup(427), Some("m_Name"));
        assert_eq!(lookup(701), Some("PPtr<Texture2D>"));
        assert_eq!(lookup(839), Some("string"));
        assert_eq!(lookup(1160), Some("Hash128"));
    }

    #[test]
    fn test_offset_of_matches_lookup() {
        for (offset, name) in entries() {
            assert_eq!(offset_of(name), Some(offset));
            assert_eq!(lookup(offset), Some(name));
        }
        assert_eq!(entries().count(), 109);
    }

    #[test]
    fn test_unknown_offset() {
        assert_eq!(lookup(1), None);
        assert_eq!(lookup(5000), None);
    }
}
