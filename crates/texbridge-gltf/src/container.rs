//! GLB container and data URI helpers

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{GltfError, GltfResult};

/// GLB magic number ("glTF" in little-endian)
pub const GLB_MAGIC: u32 = 0x4654_6C67;
/// GLB version 2
pub const GLB_VERSION: u32 = 2;
/// JSON chunk type ("JSON")
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// Binary chunk type ("BIN\0")
pub const CHUNK_BIN: u32 = 0x004E_4942;

const HEADER_LEN: usize = 12;

/// Chunks of a parsed GLB file
#[derive(Debug, Clone, Copy)]
pub struct GlbChunks<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

/// Whether `data` starts with the GLB magic
pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == GLB_MAGIC.to_le_bytes()
}

/// Split a GLB file into its JSON and BIN chunks
pub fn read_glb(data: &[u8]) -> GltfResult<GlbChunks<'_>> {
    if data.len() < HEADER_LEN {
        return Err(GltfError::InvalidGlb("file too short".into()));
    }

    let mut header = Cursor::new(&data[..HEADER_LEN]);
    let magic = header.read_u32::<LittleEndian>()?;
    let version = header.read_u32::<LittleEndian>()?;
    let length = header.read_u32::<LittleEndian>()? as usize;

    if magic != GLB_MAGIC {
        return Err(GltfError::InvalidGlb(format!("bad magic 0x{magic:08X}")));
    }
    if version != GLB_VERSION {
        return Err(GltfError::UnsupportedVersion(version));
    }
    let end = length.min(data.len());

    let mut offset = HEADER_LEN;
    let mut json = None;
    let mut bin = None;

    while offset + 8 <= end {
        let mut chunk_header = Cursor::new(&data[offset..offset + 8]);
        let chunk_length = chunk_header.read_u32::<LittleEndian>()? as usize;
        let chunk_type = chunk_header.read_u32::<LittleEndian>()?;
        offset += 8;

        if offset + chunk_length > end {
            return Err(GltfError::InvalidGlb("chunk extends past end of file".into()));
        }

        let chunk = &data[offset..offset + chunk_length];
        match chunk_type {
            CHUNK_JSON if json.is_none() => json = Some(chunk),
            CHUNK_BIN if bin.is_none() => bin = Some(chunk),
            _ => {}
        }

        // chunks are 4-byte aligned
        offset = (offset + chunk_length + 3) & !3;
    }

    let json = json.ok_or_else(|| GltfError::InvalidGlb("missing JSON chunk".into()))?;
    Ok(GlbChunks { json, bin })
}

/// Assemble a GLB file from a JSON document and an optional binary buffer
///
/// Fails when the file or a chunk does not fit the 32-bit GLB length fields.
pub fn write_glb(json: &[u8], bin: Option<&[u8]>) -> GltfResult<Vec<u8>> {
    let json_padding = (4 - json.len() % 4) % 4;
    let padded_json_len = json.len() + json_padding;

    let bin = bin.filter(|bin| !bin.is_empty());
    let bin_padding = bin.map_or(0, |bin| (4 - bin.len() % 4) % 4);
    let padded_bin_len = bin.map_or(0, |bin| bin.len() + bin_padding);

    let total = HEADER_LEN + 8 + padded_json_len + if bin.is_some() { 8 + padded_bin_len } else { 0 };
    let mut output = Vec::with_capacity(total);

    output.write_u32::<LittleEndian>(GLB_MAGIC)?;
    output.write_u32::<LittleEndian>(GLB_VERSION)?;
    output.write_u32::<LittleEndian>(glb_length(total)?)?;

    output.write_u32::<LittleEndian>(glb_length(padded_json_len)?)?;
    output.write_u32::<LittleEndian>(CHUNK_JSON)?;
    output.extend_from_slice(json);
    output.extend(std::iter::repeat(b' ').take(json_padding));

    if let Some(bin) = bin {
        output.write_u32::<LittleEndian>(glb_length(padded_bin_len)?)?;
        output.write_u32::<LittleEndian>(CHUNK_BIN)?;
        output.extend_from_slice(bin);
        output.extend(std::iter::repeat(0u8).take(bin_padding));
    }

    Ok(output)
}

/// Length as stored in a GLB header or chunk header
fn glb_length(len: usize) -> GltfResult<u32> {
    u32::try_from(len).map_err(|_| GltfError::InvalidGlb(format!("{len} bytes exceeds the 4 GiB GLB limit")))
}

/// Decoded `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub media_type: Option<String>,
    pub data: Vec<u8>,
}

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Decode a base64 `data:[<mediatype>];base64,<data>` URI
pub fn decode_data_uri(uri: &str) -> GltfResult<DataUri> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| GltfError::InvalidDataUri("missing data: scheme".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| GltfError::InvalidDataUri("missing ',' separator".into()))?;

    let media = header
        .strip_suffix(";base64")
        .ok_or_else(|| GltfError::InvalidDataUri("only base64 data URIs are supported".into()))?;

    Ok(DataUri {
        media_type: (!media.is_empty()).then(|| media.to_string()),
        data: STANDARD.decode(payload)?,
    })
}

/// Encode bytes as a base64 `data:` URI
pub fn encode_data_uri(media_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(data))
}
