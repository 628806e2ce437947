//! Format key to plugin registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::traits::TranscodePlugin;

/// Normalises a format key to its canonical form: lowercase with a leading dot.
///
/// `"FLV"`, `"flv"` and `".flv"` all map to `".flv"`.
pub fn normalize_format(key: &str) -> String {
    let key = key.trim().to_ascii_lowercase();
    if key.starts_with('.') {
        key
    } else {
        format!(".{}", key)
    }
}

/// Derives the format key of a path from the text after the last dot of its
/// file name.
///
/// A dot-file such as `".flv"` is its own key. Returns `None` when the name
/// has no dot or ends with one (`"a."`).
pub fn format_key(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(normalize_format(ext))
}

/// Maps format keys to the plugin that executes them.
///
/// At most one plugin per key; registering again replaces the binding.
#[derive(Default)]
pub struct PluginRegistry {
    formats: Vec<String>,
    plugins: HashMap<String, Arc<dyn TranscodePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `plugin` to `format`, replacing any previous binding.
    pub fn register(&mut self, format: &str, plugin: Arc<dyn TranscodePlugin>) {
        let key = normalize_format(format);
        if self.plugins.insert(key.clone(), plugin).is_none() {
            self.formats.push(key);
        }
    }

    /// Known format keys in first-registration order.
    pub fn formats(&self) -> Vec<String> {
        self.formats.clone()
    }

    pub fn lookup(&self, format: &str) -> Option<Arc<dyn TranscodePlugin>> {
        self.plugins.get(&normalize_format(format)).cloned()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("formats", &self.formats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlugin;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format("flv"), ".flv");
        assert_eq!(normalize_format(".FLV"), ".flv");
        assert_eq!(normalize_format(" mp4 "), ".mp4");
    }

    #[test]
    fn test_format_key() {
        let key = |p: &str| format_key(&PathBuf::from(p));
        assert_eq!(key("/videos/a.flv").as_deref(), Some(".flv"));
        assert_eq!(key("A.MP4").as_deref(), Some(".mp4"));
        assert_eq!(key("clip.tar.flv").as_deref(), Some(".flv"));
        assert_eq!(key("/videos/noext"), None);
        assert_eq!(key("/videos.d/noext"), None);
        assert_eq!(key("trailing."), None);
    }

    #[test]
    fn test_format_key_dot_file() {
        assert_eq!(format_key(&PathBuf::from(".flv")).as_deref(), Some(".flv"));
        assert_eq!(
            format_key(&PathBuf::from("/videos/.hidden")).as_deref(),
            Some(".hidden")
        );
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PluginRegistry::new();
        assert!(registry.is_empty());

        registry.register(".flv", Arc::new(MockPlugin::new("flv")));
        registry.register("avi", Arc::new(MockPlugin::new("avi")));

        assert_eq!(registry.formats(), vec![".flv", ".avi"]);
        assert_eq!(registry.lookup(".flv").unwrap().kind(), "flv");
        assert_eq!(registry.lookup("AVI").unwrap().kind(), "avi");
        assert!(registry.lookup(".mkv").is_none());
    }

    #[test]
    fn test_register_replaces_binding() {
        let mut registry = PluginRegistry::new();
        registry.register(".flv", Arc::new(MockPlugin::new("first")));
        registry.register(".flv", Arc::new(MockPlugin::new("second")));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.formats(), vec![".flv"]);
        assert_eq!(registry.lookup(".flv").unwrap().kind(), "second");
    }
}
