//! Filesystem-backed loader: textures via `image`, models from glTF JSON.

use std::path::{Path, PathBuf};

use crate::loader::{
    AnimationClip, AssetLoadError, AssetLoader, LoadReply, LoadRequest, LoadedAsset, ModelAsset,
    TextureAsset,
};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_JSON_CHUNK: u32 = 0x4E4F_534A;

/// Loads assets relative to a root directory, either on a worker thread per
/// request or inline on the calling thread.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
    threaded: bool,
}

impl FsLoader {
    /// Loader that finishes each request on a background thread.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            threaded: true,
        }
    }

    /// Loader that finishes each request before `start` returns.
    pub fn blocking(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            threaded: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetLoader for FsLoader {
    fn start(&self, reply: LoadReply) {
        let root = self.root.clone();
        let job = move || {
            let outcome = load(&root, reply.request());
            if let Err(e) = &outcome {
                tracing::warn!("asset load failed: {e}");
            }
            reply.complete(outcome);
        };
        if self.threaded {
            std::thread::spawn(job);
        } else {
            job();
        }
    }
}

fn load(root: &Path, request: &LoadRequest) -> Result<LoadedAsset, AssetLoadError> {
    match request {
        LoadRequest::Texture { path } => load_texture(root, path).map(LoadedAsset::Texture),
        LoadRequest::Model { path } => load_model(root, path).map(LoadedAsset::Model),
    }
}

fn load_texture(root: &Path, path: &str) -> Result<TextureAsset, AssetLoadError> {
    let full = root.join(path);
    let (width, height) = image::image_dimensions(&full).map_err(|e| match e {
        image::ImageError::IoError(io) => AssetLoadError::Io {
            path: path.to_string(),
            reason: io.to_string(),
        },
        other => AssetLoadError::Decode {
            path: path.to_string(),
            reason: other.to_string(),
        },
    })?;
    Ok(TextureAsset {
        path: path.to_string(),
        width,
        height,
    })
}

fn load_model(root: &Path, path: &str) -> Result<ModelAsset, AssetLoadError> {
    let full = root.join(path);
    let bytes = std::fs::read(&full).map_err(|e| AssetLoadError::Io {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    let extension = full
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let json_bytes = match extension.as_deref() {
        Some("gltf") => bytes.as_slice(),
        Some("glb") => glb_json_chunk(&bytes).ok_or_else(|| AssetLoadError::Decode {
            path: path.to_string(),
            reason: "missing or truncated GLB JSON chunk".into(),
        })?,
        _ => return Err(AssetLoadError::Unsupported(path.to_string())),
    };
    parse_gltf_json(path, json_bytes)
}

/// Locate the JSON chunk of a binary glTF container.
fn glb_json_chunk(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 20 || &bytes[0..4] != GLB_MAGIC {
        return None;
    }
    let chunk_len = u32::from_le_bytes(bytes[12..16].try_into().ok()?) as usize;
    let chunk_type = u32::from_le_bytes(bytes[16..20].try_into().ok()?);
    if chunk_type != GLB_JSON_CHUNK {
        return None;
    }
    bytes.get(20..20 + chunk_len)
}

/// Extract node names and animation clips from glTF JSON.
pub fn parse_gltf_json(path: &str, data: &[u8]) -> Result<ModelAsset, AssetLoadError> {
    let json: serde_json::Value =
        serde_json::from_slice(data).map_err(|e| AssetLoadError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    let nodes: Vec<String> = json
        .get("nodes")
        .and_then(|n| n.as_array())
        .map(|nodes| {
            nodes
                .iter()
                .enumerate()
                .map(|(i, node)| {
                    node.get("name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("node_{i}"))
                })
                .collect()
        })
        .unwrap_or_default();

    // Root of the default scene, else the first node.
    let scene_index = json.get("scene").and_then(|s| s.as_u64()).unwrap_or(0) as usize;
    let root_index = json
        .get("scenes")
        .and_then(|s| s.as_array())
        .and_then(|scenes| scenes.get(scene_index))
        .and_then(|scene| scene.get("nodes"))
        .and_then(|n| n.as_array())
        .and_then(|n| n.first())
        .and_then(|n| n.as_u64())
        .unwrap_or(0) as usize;
    let root_node = nodes
        .get(root_index)
        .cloned()
        .ok_or_else(|| AssetLoadError::Decode {
            path: path.to_string(),
            reason: "model has no nodes".into(),
        })?;

    let animation_clips = json
        .get("animations")
        .and_then(|a| a.as_array())
        .map(|animations| {
            animations
                .iter()
                .enumerate()
                .map(|(i, anim)| AnimationClip {
                    name: anim
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("clip_{i}")),
                    channels: anim
                        .get("channels")
                        .and_then(|c| c.as_array())
                        .map_or(0, |c| c.len()),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelAsset {
        path: path.to_string(),
        root_node,
        nodes,
        animation_clips,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadQueue;

    const CHARACTER: &str = r#"{
        "scene": 0,
        "scenes": [{ "nodes": [1] }],
        "nodes": [{ "name": "Hips" }, { "name": "Armature", "children": [0] }],
        "animations": [
            { "name": "Idle", "channels": [{}, {}] },
            { "name": "Walk", "channels": [{}] },
            { "channels": [] }
        ]
    }"#;

    #[test]
    fn parse_gltf_nodes_and_clips() {
        let model = parse_gltf_json("hero.gltf", CHARACTER.as_bytes()).unwrap();
        assert_eq!(model.root_node, "Armature");
        assert_eq!(model.nodes, vec!["Hips", "Armature"]);
        assert_eq!(model.animation_clips.len(), 3);
        assert_eq!(model.animation_clips[0].channels, 2);
        assert_eq!(model.animation_clips[2].name, "clip_2");
    }

    #[test]
    fn model_without_nodes_is_a_decode_error() {
        let err = parse_gltf_json("empty.gltf", b"{}").unwrap_err();
        assert!(matches!(err, AssetLoadError::Decode { .. }));
    }

    #[test]
    fn glb_json_chunk_is_extracted() {
        let json = br#"{"nodes":[{"name":"Root"}]}"#;
        let mut glb = Vec::new();
        glb.extend_from_slice(GLB_MAGIC);
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&((20 + json.len()) as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(&GLB_JSON_CHUNK.to_le_bytes());
        glb.extend_from_slice(json);
        assert_eq!(glb_json_chunk(&glb), Some(&json[..]));
        assert_eq!(glb_json_chunk(b"nope"), None);
    }

    #[test]
    fn blocking_loader_reads_model_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hero.gltf"), CHARACTER).unwrap();

        let loader = FsLoader::blocking(dir.path());
        let mut queue = LoadQueue::new();
        queue
            .request(&loader, LoadRequest::Model { path: "hero.gltf".into() })
            .unwrap();
        let events = queue.drain();
        assert_eq!(events.len(), 1);
        match &events[0].outcome {
            Ok(LoadedAsset::Model(m)) => assert_eq!(m.root_node, "Armature"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn missing_texture_reports_failure_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsLoader::blocking(dir.path());
        let mut queue = LoadQueue::new();
        queue
            .request(&loader, LoadRequest::Texture { path: "missing.png".into() })
            .unwrap();
        let events = queue.drain();
        assert!(events[0].outcome.is_err());
    }

    #[test]
    fn unsupported_model_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hero.fbx"), b"binary").unwrap();
        let err = load_model(dir.path(), "hero.fbx").unwrap_err();
        assert_eq!(err, AssetLoadError::Unsupported("hero.fbx".into()));
    }
}
