//! Engine class tags and their names.

use std::borrow::Cow;

pub const OBJECT: i32 = 0;
pub const GAME_OBJECT: i32 = 1;
pub const COMPONENT: i32 = 2;
pub const TRANSFORM: i32 = 4;
pub const MATERIAL: i32 = 21;
pub const MESH_RENDERER: i32 = 23;
pub const TEXTURE_2D: i32 = 28;
pub const MESH_FILTER: i32 = 33;
pub const MESH: i32 = 43;
pub const SHADER: i32 = 48;
pub const TEXT_ASSET: i32 = 49;
pub const ANIMATION_CLIP: i32 = 74;
pub const AUDIO_CLIP: i32 = 83;
pub const MONO_BEHAVIOUR: i32 = 114;
pub const MONO_SCRIPT: i32 = 115;
pub const FONT: i32 = 128;
pub const SKINNED_MESH_RENDERER: i32 = 137;
pub const ASSET_BUNDLE: i32 = 142;
pub const SPRITE: i32 = 213;
pub const PREFAB_INSTANCE: i32 = 1001;

static CLASS_NAMES: &[(i32, &str)] = &[
    (0, "Object"),
    (1, "GameObject"),
    (2, "Component"),
    (3, "LevelGameManager"),
    (4, "Transform"),
    (5, "TimeManager"),
    (6, "GlobalGameManager"),
    (8, "Behaviour"),
    (9, "GameManager"),
    (11, "AudioManager"),
    (13, "InputManager"),
    (18, "EditorExtension"),
    (19, "Physics2DSettings"),
    (20, "Camera"),
    (21, "Material"),
    (23, "MeshRenderer"),
    (25, "Renderer"),
    (27, "Texture"),
    (28, "Texture2D"),
    (29, "OcclusionCullingSettings"),
    (30, "GraphicsSettings"),
    (33, "MeshFilter"),
    (41, "OcclusionPortal"),
    (43, "Mesh"),
    (45, "Skybox"),
    (47, "QualitySettings"),
    (48, "Shader"),
    (49, "TextAsset"),
    (50, "Rigidbody2D"),
    (53, "Collider2D"),
    (54, "Rigidbody"),
    (55, "PhysicsManager"),
    (56, "Collider"),
    (57, "Joint"),
    (58, "CircleCollider2D"),
    (59, "HingeJoint"),
    (60, "PolygonCollider2D"),
    (61, "BoxCollider2D"),
    (62, "PhysicsMaterial2D"),
    (64, "MeshCollider"),
    (65, "BoxCollider"),
    (68, "EdgeCollider2D"),
    (72, "ComputeShader"),
    (74, "AnimationClip"),
    (78, "TagManager"),
    (81, "AudioListener"),
    (82, "AudioSource"),
    (83, "AudioClip"),
    (84, "RenderTexture"),
    (89, "Cubemap"),
    (90, "Avatar"),
    (91, "AnimatorController"),
    (93, "RuntimeAnimatorController"),
    (95, "Animator"),
    (96, "TrailRenderer"),
    (102, "TextMesh"),
    (104, "RenderSettings"),
    (108, "Light"),
    (111, "Animation"),
    (114, "MonoBehaviour"),
    (115, "MonoScript"),
    (117, "Texture3D"),
    (119, "Projector"),
    (120, "LineRenderer"),
    (121, "Flare"),
    (128, "Font"),
    (129, "PlayerSettings"),
    (134, "PhysicMaterial"),
    (135, "SphereCollider"),
    (136, "CapsuleCollider"),
    (137, "SkinnedMeshRenderer"),
    (141, "BuildSettings"),
    (142, "AssetBundle"),
    (143, "CharacterController"),
    (147, "ResourceManager"),
    (150, "PreloadData"),
    (156, "TerrainData"),
    (157, "LightmapSettings"),
    (180, "OffMeshLink"),
    (183, "Cloth"),
    (184, "WorldParticleCollider"),
    (187, "Texture2DArray"),
    (195, "NavMeshAgent"),
    (198, "ParticleSystem"),
    (199, "ParticleSystemRenderer"),
    (205, "LODGroup"),
    (206, "BlendTree"),
    (207, "Motion"),
    (212, "SpriteRenderer"),
    (213, "Sprite"),
    (218, "Terrain"),
    (221, "AnimatorOverrideController"),
    (222, "CanvasRenderer"),
    (223, "Canvas"),
    (224, "RectTransform"),
    (225, "CanvasGroup"),
    (226, "BillboardAsset"),
    (227, "BillboardRenderer"),
    (238, "NavMeshData"),
    (258, "LightProbes"),
    (290, "AssetBundleManifest"),
    (319, "AvatarMask"),
    (320, "PlayableDirector"),
    (328, "VideoPlayer"),
    (329, "VideoClip"),
    (331, "SpriteMask"),
    (363, "OcclusionCullingData"),
    (1001, "PrefabInstance"),
    (687078895, "SpriteAtlas"),
    (1953259897, "TerrainLayer"),
];

/// Name of a class tag, if known.
pub fn class_name(class_id: i32) -> Option<&'static str> {
    CLASS_NAMES
        .binary_search_by_key(&class_id, |&(id, _)| id)
        .ok()
        .map(|i| CLASS_NAMES[i].1)
}

/// Name of a class tag, or the number itself when unknown.
pub fn display_name(class_id: i32) -> Cow<'static, str> {
    match class_name(class_id) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(class_id.to_string()),
    }
}

/// Class tag for a name.
pub fn from_name(name: &str) -> Option<i32> {
    CLASS_NAMES
        .iter()
        .find(|&&(_, n)| n == name)
        .map(|&(id, _)| id)
}
