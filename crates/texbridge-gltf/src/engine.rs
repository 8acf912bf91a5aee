//! glTF scene engine implementation

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use serde_json::Map;
use texbridge_core::{
    EngineStatus, ExportOptions, ImageResource, ImageSaveError, ImageSource, MaterialResource,
    PathMode, SceneEngine,
};
use texbridge_textures::{Encoding, TextureEncoder, TextureError, TextureExtension};
use tracing::{debug, error, info, warn};

use crate::container::{self, decode_data_uri, encode_data_uri, is_data_uri};
use crate::schema::{self, Buffer, BufferView, Gltf};
use crate::{GltfError, GltfResult};

const GENERATOR: &str = concat!("texbridge ", env!("CARGO_PKG_VERSION"));
const OCTET_STREAM: &str = "application/octet-stream";

/// Encoded and decoded data behind one image resource
#[derive(Debug, Default)]
struct ImagePayload {
    bytes: Option<Vec<u8>>,
    mime_type: Option<String>,
    /// Declared encoding, for content the decoder cannot recognise
    declared: Option<Encoding>,
    /// Buffer view still holding `bytes` unchanged
    buffer_view: Option<usize>,
    /// Decoded on first save
    pixels: Option<DynamicImage>,
}

impl ImagePayload {
    fn has_data(&self) -> bool {
        self.bytes.is_some() || self.pixels.is_some()
    }

    fn pixels(&mut self) -> Result<&DynamicImage, ImageSaveError> {
        if self.pixels.is_none() {
            let bytes = self.bytes.as_deref().ok_or(ImageSaveError::NoPixelData)?;
            let decoded = TextureEncoder::decode(bytes, self.declared)
                .map_err(|err| ImageSaveError::Encode(err.to_string()))?;
            self.pixels = Some(decoded);
        }
        self.pixels.as_ref().ok_or(ImageSaveError::NoPixelData)
    }
}

/// Scene engine backed by a glTF 2.0 document
///
/// Imported images occupy the first `images.len()` slots of the enumeration,
/// in document order; images added with [`GltfEngine::add_generated_image`]
/// follow them.
#[derive(Debug, Default)]
pub struct GltfEngine {
    document: Option<Gltf>,
    buffers: Vec<Vec<u8>>,
    base_dir: PathBuf,
    images: Vec<ImageResource>,
    payloads: Vec<ImagePayload>,
    encoder: TextureEncoder,
}

impl GltfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom encoder for saved and exported images
    pub fn with_encoder(encoder: TextureEncoder) -> Self {
        Self {
            encoder,
            ..Self::default()
        }
    }

    /// The loaded document, if any
    pub fn document(&self) -> Option<&Gltf> {
        self.document.as_ref()
    }

    /// Add an in-memory image to the loaded scene, returning its index
    ///
    /// Importing a scene discards previously added images.
    pub fn add_generated_image(&mut self, name: impl Into<String>, pixels: RgbaImage) -> usize {
        let (width, height) = pixels.dimensions();
        self.images
            .push(ImageResource::new(name, ImageSource::Generated).with_size(width, height));
        self.payloads.push(ImagePayload {
            pixels: Some(DynamicImage::ImageRgba8(pixels)),
            ..Default::default()
        });
        self.images.len() - 1
    }

    fn clear(&mut self) {
        self.document = None;
        self.buffers.clear();
        self.base_dir = PathBuf::new();
        self.images.clear();
        self.payloads.clear();
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        resolve_reference(&self.base_dir, reference)
    }

    fn load(&mut self, path: &Path) -> GltfResult<()> {
        let data = fs::read(path)?;
        self.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let (document, bin) = if container::is_glb(&data) {
            let chunks = container::read_glb(&data)?;
            let document: Gltf = serde_json::from_slice(chunks.json)?;
            (document, chunks.bin.map(<[u8]>::to_vec))
        } else {
            (serde_json::from_slice::<Gltf>(&data)?, None)
        };

        self.buffers = self.load_buffers(&document, bin)?;

        for image in &document.images {
            let loaded = self.image_bytes(&document, image)?;
            let (resource, mut payload) = describe_image(image, loaded);
            payload.buffer_view = image.buffer_view;
            debug!(
                image = %resource.name,
                source = %resource.source,
                width = resource.width,
                height = resource.height,
                "Found image"
            );
            self.images.push(resource);
            self.payloads.push(payload);
        }

        self.document = Some(document);
        Ok(())
    }

    fn load_buffers(&self, document: &Gltf, mut bin: Option<Vec<u8>>) -> GltfResult<Vec<Vec<u8>>> {
        document
            .buffers
            .iter()
            .enumerate()
            .map(|(index, buffer)| match &buffer.uri {
                // First buffer uses the GLB binary chunk
                None if index == 0 => {
                    let mut data = match bin.take() {
                        Some(data) => data,
                        None if buffer.byte_length == 0 => Vec::new(),
                        None => return Err(GltfError::MissingBuffer(index)),
                    };
                    data.truncate(buffer.byte_length);
                    Ok(data)
                }
                None => Err(GltfError::MissingBuffer(index)),
                Some(uri) if is_data_uri(uri) => Ok(decode_data_uri(uri)?.data),
                Some(uri) => Ok(fs::read(self.resolve(uri))?),
            })
            .collect()
    }

    /// Encoded bytes and media type of a document image, if reachable
    fn image_bytes(&self, document: &Gltf, image: &schema::Image) -> GltfResult<Option<(Vec<u8>, Option<String>)>> {
        if let Some(view_index) = image.buffer_view {
            let view = document
                .buffer_views
                .get(view_index)
                .ok_or(GltfError::BufferViewOutOfRange { index: view_index })?;
            let buffer = self
                .buffers
                .get(view.buffer)
                .ok_or(GltfError::MissingBuffer(view.buffer))?;
            let bytes = view
                .range()
                .and_then(|range| buffer.get(range))
                .ok_or(GltfError::BufferViewOutOfRange { index: view_index })?;
            return Ok(Some((bytes.to_vec(), image.mime_type.clone())));
        }

        match image.uri.as_deref() {
            Some(uri) if is_data_uri(uri) => {
                let decoded = decode_data_uri(uri)?;
                Ok(Some((decoded.data, image.mime_type.clone().or(decoded.media_type))))
            }
            Some(uri) => match fs::read(self.resolve(uri)) {
                Ok(bytes) => Ok(Some((bytes, image.mime_type.clone()))),
                Err(err) => {
                    warn!(uri = %uri, error = %err, "Image file is not readable");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn export(&self, path: &Path, options: &ExportOptions) -> GltfResult<()> {
        let document = self.document.as_ref().ok_or(GltfError::NoScene)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let binary = match extension.as_deref() {
            Some("glb") => true,
            Some("gltf") => false,
            _ => return Err(GltfError::UnsupportedOutput(path.display().to_string())),
        };

        if options.use_selection {
            debug!("No selection in a glTF scene, exporting everything");
        }

        let out_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut output = document.clone();
        let mut buffers = self.buffers.clone();

        output.asset.generator = Some(GENERATOR.to_string());
        if !options.bake_animation {
            output.animations.clear();
        }

        // Buffer views whose bytes are replaced by re-packed images
        let mut replaced: HashMap<usize, Cow<'_, [u8]>> = HashMap::new();

        for (index, (image, payload)) in self.images.iter().zip(&self.payloads).enumerate() {
            if index >= output.images.len() {
                output.images.push(schema::Image {
                    name: Some(image.name.clone()),
                    ..Default::default()
                });
            }

            let Some((bytes, mime_type)) = self.export_payload(payload)? else {
                warn!(image = %image.name, "No data to export, keeping original reference");
                continue;
            };

            let external = if options.embed_textures || image.source == ImageSource::Packed {
                None
            } else {
                self.external_reference(image, options.path_mode, &out_dir)?
            };

            let (uri, buffer_view) = match external {
                Some(uri) => (Some(uri), None),
                None if binary => match payload.buffer_view {
                    Some(view) => (None, Some(view)),
                    None => {
                        let view = unshared_image_view(document, index)
                            .unwrap_or_else(|| push_buffer_view(&mut output, &mut buffers));
                        replaced.insert(view, bytes);
                        (None, Some(view))
                    }
                },
                None => (Some(encode_data_uri(&mime_type, &bytes)), None),
            };

            let target = &mut output.images[index];
            target.uri = uri;
            target.buffer_view = buffer_view;
            target.mime_type = Some(mime_type);
        }

        let encoded = if binary {
            if !replaced.is_empty() {
                compact_main_buffer(&mut output, &mut buffers, &replaced)?;
            }
            for (index, (buffer, data)) in output.buffers.iter_mut().zip(&buffers).enumerate() {
                buffer.byte_length = data.len();
                buffer.uri = (index > 0).then(|| encode_data_uri(OCTET_STREAM, data));
            }
            let json = serde_json::to_vec(&output)?;
            container::write_glb(&json, buffers.first().map(Vec::as_slice))?
        } else {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scene".to_string());
            for (index, (buffer, data)) in output.buffers.iter_mut().zip(&buffers).enumerate() {
                buffer.byte_length = data.len();
                buffer.uri = Some(if options.embed_textures {
                    encode_data_uri(OCTET_STREAM, data)
                } else {
                    let file_name = match index {
                        0 => format!("{stem}.bin"),
                        _ => format!("{stem}_{index}.bin"),
                    };
                    fs::write(out_dir.join(&file_name), data)?;
                    file_name
                });
            }
            serde_json::to_vec_pretty(&output)?
        };

        fs::write(path, encoded)?;
        Ok(())
    }

    /// Bytes and media type to embed for an image
    fn export_payload<'a>(&self, payload: &'a ImagePayload) -> GltfResult<Option<(Cow<'a, [u8]>, String)>> {
        if let Some(bytes) = &payload.bytes {
            let mime_type = payload
                .mime_type
                .clone()
                .or_else(|| image::guess_format(bytes).ok().map(|format| format.to_mime_type().to_string()))
                .unwrap_or_else(|| OCTET_STREAM.to_string());
            return Ok(Some((Cow::Borrowed(bytes.as_slice()), mime_type)));
        }

        match &payload.pixels {
            Some(pixels) => {
                let bytes = self.encoder.encode(pixels, Encoding::Png)?;
                Ok(Some((Cow::Owned(bytes), Encoding::Png.mime_type().to_string())))
            }
            None => Ok(None),
        }
    }

    /// URI for an image kept outside the exported file
    ///
    /// Returns `None` when the image has no file on disk, in which case it is embedded.
    fn external_reference(&self, image: &ImageResource, mode: PathMode, out_dir: &Path) -> GltfResult<Option<String>> {
        let Some(source) = image
            .filepath
            .as_deref()
            .map(|reference| self.resolve(reference))
            .filter(|path| path.is_file())
        else {
            return Ok(None);
        };
        let Some(file_name) = source.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            return Ok(None);
        };

        let absolute_source = std::path::absolute(&source)?;
        let absolute_out = std::path::absolute(out_dir)?;

        let uri = match mode {
            PathMode::Copy => {
                let destination = absolute_out.join(&file_name);
                if destination != absolute_source {
                    fs::copy(&absolute_source, &destination)?;
                }
                file_name
            }
            PathMode::Strip => file_name,
            PathMode::Absolute => absolute_source.to_string_lossy().into_owned(),
            PathMode::Relative => relative_uri(&absolute_out, &absolute_source),
            PathMode::Auto => match absolute_source.strip_prefix(&absolute_out) {
                Ok(relative) => to_uri(relative),
                Err(_) => absolute_source.to_string_lossy().into_owned(),
            },
        };

        Ok(Some(uri))
    }
}

impl SceneEngine for GltfEngine {
    fn import_scene(&mut self, path: &Path) -> EngineStatus {
        self.clear();

        match self.load(path) {
            Ok(()) => {
                info!(path = %path.display(), images = self.images.len(), "Imported glTF scene");
                EngineStatus::Finished
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "glTF import failed");
                self.clear();
                EngineStatus::cancelled(err.to_string())
            }
        }
    }

    fn images(&self) -> &[ImageResource] {
        &self.images
    }

    fn image_mut(&mut self, index: usize) -> Option<&mut ImageResource> {
        self.images.get_mut(index)
    }

    fn materials(&self) -> Vec<MaterialResource> {
        let Some(document) = &self.document else {
            return Vec::new();
        };

        document
            .materials
            .iter()
            .enumerate()
            .map(|(index, material)| {
                let name = material.name.clone().unwrap_or_else(|| format!("material_{index}"));
                let mut resource = MaterialResource::new(name);
                for texture in material.texture_indices() {
                    let Some(texture) = document.textures.get(texture) else {
                        continue;
                    };
                    for source in texture.image_sources() {
                        if source < document.images.len() && !resource.references_image(source) {
                            resource.image_indices.push(source);
                        }
                    }
                }
                resource
            })
            .collect()
    }

    fn save_image(&mut self, index: usize) -> Result<(), ImageSaveError> {
        let image = self.images.get(index).ok_or(ImageSaveError::NotFound(index))?;
        let target = image.pending_path.clone().ok_or(ImageSaveError::MissingTarget)?;
        let encoding = match image.file_format.as_deref() {
            Some(identifier) => Encoding::from_identifier(identifier)
                .ok_or_else(|| ImageSaveError::UnknownEncoding(identifier.to_string()))?,
            None => Encoding::Png,
        };

        let payload = self.payloads.get_mut(index).ok_or(ImageSaveError::NotFound(index))?;
        let pixels = payload.pixels()?;
        self.encoder
            .write(pixels, &target, encoding)
            .map_err(|err| match err {
                TextureError::Io(io) => ImageSaveError::Io(io),
                other => ImageSaveError::Encode(other.to_string()),
            })?;

        debug!(index, path = %target.display(), encoding = %encoding, "Saved image");
        Ok(())
    }

    fn pack_all_resources(&mut self) -> EngineStatus {
        if self.document.is_none() {
            return EngineStatus::cancelled("no scene loaded");
        }

        let mut packed = 0usize;
        let mut unavailable = Vec::new();

        for (image, payload) in self.images.iter().zip(self.payloads.iter_mut()) {
            if !image.source.is_materializable() {
                continue;
            }

            let on_disk = image
                .filepath
                .as_deref()
                .map(|reference| resolve_reference(&self.base_dir, reference))
                .filter(|path| path.is_file());

            match on_disk {
                Some(path) => match fs::read(&path) {
                    Ok(bytes) => {
                        let declared = image.file_format.as_deref().and_then(Encoding::from_identifier);
                        payload.mime_type = image::guess_format(&bytes)
                            .ok()
                            .map(|format| format.to_mime_type().to_string())
                            .or_else(|| declared.map(|encoding| encoding.mime_type().to_string()));
                        payload.declared = declared;
                        payload.bytes = Some(bytes);
                        payload.buffer_view = None;
                        payload.pixels = None;
                        packed += 1;
                    }
                    Err(err) => {
                        warn!(image = %image.name, path = %path.display(), error = %err, "Cannot pack image");
                        unavailable.push(image.name.clone());
                    }
                },
                None if payload.has_data() => {}
                None => unavailable.push(image.name.clone()),
            }
        }

        debug!(packed, unavailable = unavailable.len(), "Packed resources");

        if unavailable.is_empty() {
            EngineStatus::Finished
        } else {
            EngineStatus::cancelled(format!("no data for images: {}", unavailable.join(", ")))
        }
    }

    fn export_scene(&mut self, path: &Path, options: &ExportOptions) -> EngineStatus {
        match self.export(path, options) {
            Ok(()) => {
                info!(path = %path.display(), images = self.images.len(), "Exported glTF scene");
                EngineStatus::Finished
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "glTF export failed");
                EngineStatus::cancelled(err.to_string())
            }
        }
    }
}

/// Image references are relative to the imported document's directory
fn resolve_reference(base_dir: &Path, reference: &str) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Build the resource and payload for one document image
fn describe_image(image: &schema::Image, loaded: Option<(Vec<u8>, Option<String>)>) -> (ImageResource, ImagePayload) {
    let external_uri = image.uri.clone().filter(|uri| !is_data_uri(uri));
    let name = image
        .name
        .clone()
        .or_else(|| {
            external_uri
                .as_deref()
                .and_then(|uri| Path::new(uri).file_name())
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let (bytes, mime_type) = match loaded {
        Some((bytes, mime_type)) => (Some(bytes), mime_type),
        None => (None, image.mime_type.clone()),
    };

    let declared = mime_type.as_deref().and_then(Encoding::from_mime_type).or_else(|| {
        external_uri
            .as_deref()
            .and_then(|uri| Path::new(uri).extension())
            .and_then(|ext| ext.to_str())
            .and_then(TextureExtension::from_path_extension)
            .map(|ext| ext.encoding())
    });

    let (source, (width, height)) = match bytes.as_deref() {
        Some(bytes) => match TextureEncoder::probe_dimensions(bytes, declared) {
            Some(dimensions) => (ImageSource::File, dimensions),
            None => (ImageSource::Packed, (0, 0)),
        },
        None => (ImageSource::File, (0, 0)),
    };

    let mut resource = ImageResource::new(name, source).with_size(width, height);
    resource.file_format = mime_type
        .as_deref()
        .and_then(Encoding::from_mime_type)
        .map(|encoding| encoding.identifier().to_string());
    resource.filepath = external_uri;

    let payload = ImagePayload {
        bytes,
        mime_type,
        declared,
        ..Default::default()
    };

    (resource, payload)
}

/// Buffer view holding image `index` in the imported document, if no other image uses it
fn unshared_image_view(document: &Gltf, index: usize) -> Option<usize> {
    let view = document.images.get(index)?.buffer_view?;
    let users = document.images.iter().filter(|image| image.buffer_view == Some(view)).count();
    (users == 1).then_some(view)
}

/// Add an empty buffer view on the main buffer, returning its index
fn push_buffer_view(output: &mut Gltf, buffers: &mut Vec<Vec<u8>>) -> usize {
    if buffers.is_empty() {
        buffers.push(Vec::new());
        output.buffers.push(Buffer {
            uri: None,
            byte_length: 0,
            extra: Map::new(),
        });
    }

    output.buffer_views.push(BufferView {
        buffer: 0,
        byte_offset: None,
        byte_length: 0,
        byte_stride: None,
        target: None,
        extra: Map::new(),
    });
    output.buffer_views.len() - 1
}

/// Rebuild the main buffer from its views, with `replaced` views taking new bytes
///
/// Views are laid out in index order on 4-byte boundaries. Bytes no view covers
/// are dropped. Views on other buffers are left alone unless replaced.
fn compact_main_buffer(
    output: &mut Gltf,
    buffers: &mut [Vec<u8>],
    replaced: &HashMap<usize, Cow<'_, [u8]>>,
) -> GltfResult<()> {
    let Some(old) = buffers.first() else {
        return Ok(());
    };

    let mut main = Vec::with_capacity(old.len());
    for (index, view) in output.buffer_views.iter_mut().enumerate() {
        let bytes: &[u8] = match replaced.get(&index) {
            Some(bytes) => bytes,
            None if view.buffer == 0 => view
                .range()
                .and_then(|range| old.get(range))
                .ok_or(GltfError::BufferViewOutOfRange { index })?,
            None => continue,
        };

        main.resize(main.len().next_multiple_of(4), 0);
        view.buffer = 0;
        view.byte_offset = Some(main.len());
        view.byte_length = bytes.len();
        main.extend_from_slice(bytes);
    }

    buffers[0] = main;
    Ok(())
}

fn to_uri(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative URI from `from_dir` to `target`, walking up with `..` as needed
fn relative_uri(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = target.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = std::iter::repeat("..".to_string()).take(from.len() - common).collect();
    parts.extend(to[common..].iter().map(|component| component.as_os_str().to_string_lossy().into_owned()));
    parts.join("/")
}
