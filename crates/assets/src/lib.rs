//! Resource cache and asset loading for the city scene.
//!
//! Geometries and materials are deduplicated by a content-addressed key and
//! handed out as small copyable handles; the renderer looks resources up by
//! handle, never by parameters.
//!
//! # Loading
//! Textures and character models arrive asynchronously. A loader is given a
//! [`LoadReply`] for each request and completes it whenever it likes; the
//! frame loop drains the [`LoadQueue`] once per frame, so completions are
//! only ever observed on the owning thread.

mod cache;
mod fs_loader;
mod loader;
pub mod mesh;

pub use cache::{
    CacheStats, GeometryHandle, GeometryKind, GeometryResource, MaterialHandle, MaterialKind,
    MaterialParams, MaterialResource, ResourceCache, ResourceError, ResourceKey,
};
pub use fs_loader::{FsLoader, parse_gltf_json};
pub use loader::{
    AnimationClip, AssetLoadError, AssetLoader, LoadEvent, LoadQueue, LoadReply, LoadRequest,
    LoadTicket, LoadedAsset, ModelAsset, TextureAsset,
};
pub use mesh::MeshData;
