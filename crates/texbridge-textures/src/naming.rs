//! Texture name sanitization and per-job collision resolution

use std::collections::HashSet;

fn is_safe_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

/// Map an arbitrary resource name to a filesystem-safe base name
///
/// Every character outside `[A-Za-z0-9_-]` becomes `_`. When nothing of the
/// original name survives (empty input, or every character replaced) the
/// caller's `fallback` is returned instead.
pub fn sanitize(raw: &str, fallback: &str) -> String {
    if !raw.chars().any(is_safe_char) {
        return fallback.to_string();
    }

    raw.chars()
        .map(|ch| if is_safe_char(ch) { ch } else { '_' })
        .collect()
}

/// Drop a trailing `.ext` from the last path component of `name`
///
/// Leading dots of the component are kept, so `.hidden` stays intact.
pub fn strip_extension(name: &str) -> &str {
    let component_start = name.rfind('/').map_or(0, |pos| pos + 1);
    let component = &name[component_start..];
    let leading_dots = component.len() - component.trim_start_matches('.').len();

    match component[leading_dots..].rfind('.') {
        Some(dot) => &name[..component_start + leading_dots + dot],
        None => name,
    }
}

/// Positional placeholder used when a name has nothing usable in it
pub fn fallback_name(index: usize) -> String {
    format!("texture_{index}")
}

/// Safe base name for the image at `index` in enumeration order
pub fn base_name_for(name: &str, index: usize) -> String {
    sanitize(strip_extension(name), &fallback_name(index))
}

/// Filenames already assigned within one materialization batch
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    assigned: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.assigned.contains(file_name)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Register and return the first free name among `base.ext`, `base_1.ext`, `base_2.ext`, ...
    ///
    /// Names compare case-sensitively: `Image.png` and `image.png` are distinct,
    /// which collides on case-insensitive filesystems.
    pub fn claim(&mut self, base: &str, extension: &str) -> String {
        let mut file_name = format!("{base}.{extension}");
        let mut suffix = 1;
        while self.assigned.contains(&file_name) {
            file_name = format!("{base}_{suffix}.{extension}");
            suffix += 1;
        }
        self.assigned.insert(file_name.clone());
        file_name
    }
}
