//! glTF 2.0 document structures
//!
//! Only the parts the engine rewrites are typed. Everything else (nodes,
//! meshes, accessors, samplers, extensions...) is kept in the `extra` maps
//! and written back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// glTF 2.0 root structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gltf {
    pub asset: Asset,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub buffers: Vec<Buffer>,
    #[serde(skip_serializing_if = "Vec::is_empty", default, rename = "bufferViews")]
    pub buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub textures: Vec<Texture>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub animations: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// glTF asset metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// glTF buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// glTF buffer view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferView {
    pub buffer: usize,
    #[serde(skip_serializing_if = "Option::is_none", rename = "byteOffset")]
    pub byte_offset: Option<usize>,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none", rename = "byteStride")]
    pub byte_stride: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BufferView {
    /// Byte range inside the owning buffer, `None` when the end overflows
    pub fn range(&self) -> Option<std::ops::Range<usize>> {
        let start = self.byte_offset.unwrap_or(0);
        start.checked_add(self.byte_length).map(|end| start..end)
    }
}

/// glTF image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "bufferView")]
    pub buffer_view: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// glTF texture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Texture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Texture {
    /// Image indices this texture can sample, including extension-provided sources
    pub fn image_sources(&self) -> Vec<usize> {
        let mut sources: Vec<usize> = self.source.into_iter().collect();
        if let Some(Value::Object(extensions)) = self.extra.get("extensions") {
            for extension in extensions.values() {
                if let Some(source) = extension.get("source").and_then(Value::as_u64) {
                    sources.push(source as usize);
                }
            }
        }
        sources
    }
}

/// glTF material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Material {
    /// Indices of every texture referenced through a `*Texture` info object
    pub fn texture_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for (key, value) in &self.extra {
            collect_texture_indices(key, value, &mut indices);
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

fn collect_texture_indices(key: &str, value: &Value, out: &mut Vec<usize>) {
    match value {
        Value::Object(map) => {
            if key.ends_with("Texture") {
                if let Some(index) = map.get("index").and_then(Value::as_u64) {
                    out.push(index as usize);
                }
            }
            for (child_key, child) in map {
                collect_texture_indices(child_key, child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_texture_indices(key, item, out);
            }
        }
        _ => {}
    }
}
