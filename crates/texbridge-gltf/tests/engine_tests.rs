//! Integration tests for the glTF scene engine
//!
//! These tests cover:
//! - GLB and glTF import with embedded, data URI and external images
//! - Image saving through the texture encoder
//! - Packing resources written to disk
//! - Export to GLB / glTF and re-import

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{json, Value};
use texbridge_core::{EngineStatus, ExportOptions, ImageSaveError, ImageSource, PathMode, SceneEngine};
use texbridge_gltf::{container, GltfEngine};
use texbridge_textures::{MaterializationOutcome, TextureExtension, TextureMaterializer};

/// One image stored in a fixture's binary chunk
struct FixtureImage {
    name: Option<&'static str>,
    bytes: Vec<u8>,
    mime: &'static str,
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 120, 40, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 60, 30]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    buffer.into_inner()
}

fn tga_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 90, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut buffer, ImageFormat::Tga).unwrap();
    buffer.into_inner()
}

/// Helper to build a GLB whose images live in the BIN chunk
fn build_glb(images: &[FixtureImage]) -> Vec<u8> {
    let mut bin = Vec::new();
    let mut views = Vec::new();
    let mut json_images = Vec::new();

    for (index, image) in images.iter().enumerate() {
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        views.push(json!({ "buffer": 0, "byteOffset": bin.len(), "byteLength": image.bytes.len() }));
        bin.extend_from_slice(&image.bytes);

        let mut entry = json!({ "bufferView": index, "mimeType": image.mime });
        if let Some(name) = image.name {
            entry["name"] = json!(name);
        }
        json_images.push(entry);
    }

    let textures: Vec<Value> = (0..images.len()).map(|index| json!({ "source": index })).collect();
    let document = json!({
        "asset": { "version": "2.0", "generator": "fixture" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Crate" }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": views,
        "images": json_images,
        "textures": textures,
        "materials": [{ "name": "Wood", "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }],
        "animations": [{ "channels": [], "samplers": [] }]
    });

    container::write_glb(&serde_json::to_vec(&document).unwrap(), Some(&bin)).unwrap()
}

fn two_image_glb() -> Vec<u8> {
    build_glb(&[
        FixtureImage { name: Some("Wood Tile.jpg"), bytes: jpeg_bytes(8, 4), mime: "image/jpeg" },
        FixtureImage { name: None, bytes: png_bytes(2, 2), mime: "image/png" },
    ])
}

fn import(path: &Path) -> GltfEngine {
    let mut engine = GltfEngine::new();
    assert_eq!(engine.import_scene(path), EngineStatus::Finished);
    engine
}

fn write_fixture(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

mod import_tests {
    use super::*;

    #[test]
    fn test_import_glb_enumerates_images_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let engine = import(&input);

        let images = engine.images();
        assert_eq!(images.len(), 2);

        assert_eq!(images[0].name, "Wood Tile.jpg");
        assert_eq!(images[0].source, ImageSource::File);
        assert_eq!(images[0].file_format.as_deref(), Some("JPEG"));
        assert_eq!((images[0].width, images[0].height), (8, 4));
        assert_eq!(images[0].filepath, None);

        assert_eq!(images[1].name, "");
        assert_eq!(images[1].file_format.as_deref(), Some("PNG"));
        assert_eq!((images[1].width, images[1].height), (2, 2));
    }

    #[test]
    fn test_undecodable_image_is_packed() {
        let dir = tempfile::tempdir().unwrap();
        let glb = build_glb(&[FixtureImage {
            name: Some("basis"),
            bytes: b"\xABKTX 20\xBB\r\n\x1A\n0000".to_vec(),
            mime: "image/ktx2",
        }]);
        let input = write_fixture(dir.path(), "basis.glb", &glb);
        let engine = import(&input);

        let image = &engine.images()[0];
        assert_eq!(image.source, ImageSource::Packed);
        assert_eq!(image.file_format, None);
        assert!(!image.has_pixels());
    }

    #[test]
    fn test_tga_uses_declared_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let glb = build_glb(&[FixtureImage { name: Some("Decal"), bytes: tga_bytes(4, 4), mime: "image/x-tga" }]);
        let input = write_fixture(dir.path(), "decal.glb", &glb);
        let mut engine = import(&input);

        let image = &engine.images()[0];
        assert_eq!(image.source, ImageSource::File);
        assert_eq!(image.file_format.as_deref(), Some("TARGA"));
        assert_eq!((image.width, image.height), (4, 4));

        let mut materializer = TextureMaterializer::new(dir.path().join("textures"));
        let records = materializer.materialize(&mut engine);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, MaterializationOutcome::Succeeded);
        assert_eq!(records[0].extension, TextureExtension::Tga);
        assert_eq!(records[0].file_name, "Decal.tga");

        let written = fs::read(dir.path().join("textures").join("Decal.tga")).unwrap();
        let decoded = image::load_from_memory_with_format(&written, ImageFormat::Tga).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn test_external_tga_uses_uri_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "decal.tga", &tga_bytes(6, 2));

        let document = json!({ "asset": { "version": "2.0" }, "images": [{ "uri": "decal.tga" }] });
        let input = write_fixture(dir.path(), "scene.gltf", &serde_json::to_vec(&document).unwrap());
        let engine = import(&input);

        let image = &engine.images()[0];
        assert_eq!(image.source, ImageSource::File);
        assert_eq!((image.width, image.height), (6, 2));
    }

    #[test]
    fn test_import_gltf_with_data_uri_and_external_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("maps")).unwrap();
        write_fixture(dir.path(), "maps/rough.png", &png_bytes(3, 5));

        let document = json!({
            "asset": { "version": "2.0" },
            "images": [
                { "name": "albedo", "uri": container::encode_data_uri("image/jpeg", &jpeg_bytes(4, 4)) },
                { "uri": "maps/rough.png" }
            ]
        });
        let input = write_fixture(dir.path(), "scene.gltf", &serde_json::to_vec(&document).unwrap());
        let engine = import(&input);

        let images = engine.images();
        assert_eq!(images[0].name, "albedo");
        assert_eq!(images[0].file_format.as_deref(), Some("JPEG"));
        assert_eq!(images[0].filepath, None);

        assert_eq!(images[1].name, "rough.png");
        assert_eq!(images[1].filepath.as_deref(), Some("maps/rough.png"));
        assert_eq!((images[1].width, images[1].height), (3, 5));
    }

    #[test]
    fn test_missing_external_image_has_no_size() {
        let dir = tempfile::tempdir().unwrap();
        let document = json!({ "asset": { "version": "2.0" }, "images": [{ "uri": "gone.png" }] });
        let input = write_fixture(dir.path(), "scene.gltf", &serde_json::to_vec(&document).unwrap());
        let engine = import(&input);

        let image = &engine.images()[0];
        assert_eq!(image.source, ImageSource::File);
        assert!(!image.has_pixels());
    }

    #[test]
    fn test_import_failures_are_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = GltfEngine::new();

        let status = engine.import_scene(&dir.path().join("missing.glb"));
        assert!(!status.is_finished());

        let garbage = write_fixture(dir.path(), "garbage.glb", b"glTF\x02\0\0\0");
        assert!(!engine.import_scene(&garbage).is_finished());
        assert!(engine.images().is_empty());
        assert!(engine.document().is_none());
    }

    #[test]
    fn test_buffer_view_offset_overflow_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let document = json!({
            "asset": { "version": "2.0" },
            "buffers": [{ "byteLength": 4 }],
            "bufferViews": [{ "buffer": 0, "byteOffset": u64::MAX, "byteLength": 4 }],
            "images": [{ "bufferView": 0, "mimeType": "image/png" }]
        });
        let glb = container::write_glb(&serde_json::to_vec(&document).unwrap(), Some(&[0u8; 4])).unwrap();
        let input = write_fixture(dir.path(), "overflow.glb", &glb);

        let mut engine = GltfEngine::new();
        let status = engine.import_scene(&input);
        assert!(matches!(status, EngineStatus::Cancelled { .. }), "{status:?}");
        assert!(engine.document().is_none());
    }

    #[test]
    fn test_materials_resolve_image_indices() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let engine = import(&input);

        let materials = engine.materials();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].name, "Wood");
        assert_eq!(materials[0].image_indices, vec![0]);
    }
}

mod save_tests {
    use super::*;

    #[test]
    fn test_save_image_uses_requested_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let mut engine = import(&input);

        let target = dir.path().join("wood.bmp");
        let image = engine.image_mut(0).unwrap();
        image.pending_path = Some(target.clone());
        image.file_format = Some("BMP".into());

        engine.save_image(0).unwrap();

        let written = fs::read(&target).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Bmp);
        let decoded = image::load_from_memory(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
    }

    #[test]
    fn test_save_image_errors() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let mut engine = import(&input);

        assert!(matches!(engine.save_image(0), Err(ImageSaveError::MissingTarget)));
        assert!(matches!(engine.save_image(7), Err(ImageSaveError::NotFound(7))));

        let image = engine.image_mut(1).unwrap();
        image.pending_path = Some(dir.path().join("missing").join("out.png"));
        assert!(matches!(engine.save_image(1), Err(ImageSaveError::Io(_))));
    }

    #[test]
    fn test_save_image_without_data() {
        let dir = tempfile::tempdir().unwrap();
        let document = json!({ "asset": { "version": "2.0" }, "images": [{ "uri": "gone.png" }] });
        let input = write_fixture(dir.path(), "scene.gltf", &serde_json::to_vec(&document).unwrap());
        let mut engine = import(&input);

        engine.image_mut(0).unwrap().pending_path = Some(dir.path().join("gone_copy.png"));
        assert!(matches!(engine.save_image(0), Err(ImageSaveError::NoPixelData)));
    }

    #[test]
    fn test_generated_image() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let mut engine = import(&input);

        let index = engine.add_generated_image("Baked AO", RgbaImage::from_pixel(6, 6, Rgba([0, 0, 0, 255])));
        assert_eq!(index, 2);

        let image = &engine.images()[index];
        assert_eq!(image.source, ImageSource::Generated);
        assert_eq!((image.width, image.height), (6, 6));

        let target = dir.path().join("ao.png");
        engine.image_mut(index).unwrap().pending_path = Some(target.clone());
        engine.save_image(index).unwrap();
        assert_eq!(image::open(&target).unwrap().width(), 6);
    }
}

mod export_tests {
    use super::*;

    #[test]
    fn test_pack_and_export_glb_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let mut engine = import(&input);

        // Re-encode the first image the way the materializer does
        let texture = dir.path().join("Wood_Tile.bmp");
        let image = engine.image_mut(0).unwrap();
        image.pending_path = Some(texture.clone());
        image.file_format = Some("BMP".into());
        engine.save_image(0).unwrap();
        engine.image_mut(0).unwrap().filepath = Some(texture.to_string_lossy().into_owned());

        assert_eq!(engine.pack_all_resources(), EngineStatus::Finished);

        let output = dir.path().join("out").join("crate.glb");
        fs::create_dir(output.parent().unwrap()).unwrap();
        assert_eq!(engine.export_scene(&output, &ExportOptions::embed_all()), EngineStatus::Finished);

        let exported = import(&output);
        let images = exported.images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].file_format.as_deref(), Some("BMP"));
        assert_eq!((images[0].width, images[0].height), (8, 4));
        assert_eq!(images[1].file_format.as_deref(), Some("PNG"));
        assert!(images.iter().all(|image| image.filepath.is_none()));

        let document = exported.document().unwrap();
        assert_eq!(document.buffer_views.len(), 2);
        let view_bytes: usize = document.buffer_views.iter().map(|view| view.byte_length).sum();
        assert!(document.buffers[0].byte_length < view_bytes + 4, "stale image bytes left in BIN");
        assert_eq!(document.extra["nodes"][0]["name"], "Crate");
        assert_eq!(document.animations.len(), 1);
        assert!(document.asset.generator.as_deref().unwrap().starts_with("texbridge"));
    }

    #[test]
    fn test_export_gltf_embeds_data_uris() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let mut engine = import(&input);

        let output = dir.path().join("crate.gltf");
        assert!(engine.export_scene(&output, &ExportOptions::embed_all()).is_finished());

        let written: Value = serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
        let images = written["images"].as_array().unwrap();
        assert!(images[0]["uri"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
        assert!(images[0].get("bufferView").is_none());
        assert!(written["buffers"][0]["uri"].as_str().unwrap().starts_with("data:"));

        let exported = import(&output);
        assert_eq!((exported.images()[0].width, exported.images()[0].height), (8, 4));
    }

    #[test]
    fn test_export_without_animation() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let mut engine = import(&input);

        let options = ExportOptions {
            bake_animation: false,
            ..ExportOptions::embed_all()
        };
        let output = dir.path().join("static.glb");
        assert!(engine.export_scene(&output, &options).is_finished());
        assert!(import(&output).document().unwrap().animations.is_empty());
    }

    #[test]
    fn test_export_copy_mode_keeps_external_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("maps")).unwrap();
        write_fixture(dir.path(), "maps/rough.png", &png_bytes(3, 5));
        let document = json!({ "asset": { "version": "2.0" }, "images": [{ "uri": "maps/rough.png" }] });
        let input = write_fixture(dir.path(), "scene.gltf", &serde_json::to_vec(&document).unwrap());
        let mut engine = import(&input);

        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        let options = ExportOptions {
            embed_textures: false,
            path_mode: PathMode::Copy,
            ..ExportOptions::embed_all()
        };
        let output = out_dir.join("scene.gltf");
        assert!(engine.export_scene(&output, &options).is_finished());

        assert!(out_dir.join("rough.png").is_file());
        let written: Value = serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
        assert_eq!(written["images"][0]["uri"], "rough.png");
    }

    #[test]
    fn test_export_relative_mode() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("maps")).unwrap();
        write_fixture(dir.path(), "maps/rough.png", &png_bytes(3, 5));
        let document = json!({ "asset": { "version": "2.0" }, "images": [{ "uri": "maps/rough.png" }] });
        let input = write_fixture(dir.path(), "scene.gltf", &serde_json::to_vec(&document).unwrap());
        let mut engine = import(&input);

        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        let options = ExportOptions {
            embed_textures: false,
            path_mode: PathMode::Relative,
            ..ExportOptions::embed_all()
        };
        let output = out_dir.join("scene.gltf");
        assert!(engine.export_scene(&output, &options).is_finished());

        let written: Value = serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
        assert_eq!(written["images"][0]["uri"], "../maps/rough.png");
        assert!(!out_dir.join("rough.png").exists());
    }

    #[test]
    fn test_pack_reports_missing_data() {
        let dir = tempfile::tempdir().unwrap();
        let document = json!({ "asset": { "version": "2.0" }, "images": [{ "name": "lost", "uri": "gone.png" }] });
        let input = write_fixture(dir.path(), "scene.gltf", &serde_json::to_vec(&document).unwrap());
        let mut engine = import(&input);

        match engine.pack_all_resources() {
            EngineStatus::Cancelled { reason } => assert!(reason.contains("lost")),
            EngineStatus::Finished => panic!("pack should report the missing image"),
        }
    }

    #[test]
    fn test_unsupported_output_extension() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), "crate.glb", &two_image_glb());
        let mut engine = import(&input);

        let output = dir.path().join("crate.fbx");
        let status = engine.export_scene(&output, &ExportOptions::embed_all());
        assert!(!status.is_finished());
        assert!(!output.exists());
    }

    #[test]
    fn test_export_without_scene() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = GltfEngine::new();
        let status = engine.export_scene(&dir.path().join("empty.glb"), &ExportOptions::embed_all());
        assert!(!status.is_finished());
        assert!(!engine.pack_all_resources().is_finished());
    }
}
