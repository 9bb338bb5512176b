//! Serializers between plain mappings and text.
//!
//! Every codec speaks [`Map`], the same ordered mapping sections are built
//! from ([`Section::from_map`](crate::Section::from_map)) and dumped to
//! ([`Section::as_dict`](crate::Section::as_dict)). Expressions survive the
//! trip: the text dialect writes them as source, JSON and TOML as a
//! single-key `{"__expr__": "<source>"}` table.
//!
//! Codecs live in an explicit [`CodecRegistry`]; nothing is registered
//! behind the caller's back.
//!
//! ```
//! use sectional::{map, CodecRegistry};
//!
//! let codecs = CodecRegistry::with_builtin();
//! let json = codecs.get("json").unwrap();
//! let text = json.to_string(&map! { "a" => 1 }).unwrap();
//! assert_eq!(json.from_string(&text).unwrap(), map! { "a" => 1 });
//! ```

pub mod json;
pub mod text;
pub mod toml;

use std::path::Path;

use tracing::debug;

use crate::error::SectionalError;
use crate::value::Map;

pub use self::json::JsonCodec;
pub use self::text::TextCodec;
pub use self::toml::TomlCodec;

/// Key of the single-entry table JSON and TOML use for an expression.
pub const EXPR_KEY: &str = "__expr__";
/// Key of the single-entry object JSON uses for a tuple.
pub const TUPLE_KEY: &str = "__tuple__";

pub trait Codec {
    /// Registry tag, e.g. `"json"`.
    fn name(&self) -> &'static str;

    /// File extensions (without the dot) this codec is picked for.
    fn extensions(&self) -> &'static [&'static str];

    fn to_string(&self, map: &Map) -> Result<String, SectionalError>;

    fn from_string(&self, source: &str) -> Result<Map, SectionalError>;

    fn to_file(&self, map: &Map, path: &Path) -> Result<(), SectionalError> {
        let content = self.to_string(map)?;
        std::fs::write(path, content).map_err(|e| SectionalError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), codec = self.name(), "written");
        Ok(())
    }

    fn from_file(&self, path: &Path) -> Result<Map, SectionalError> {
        let content = std::fs::read_to_string(path).map_err(|e| SectionalError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let map = self.from_string(&content)?;
        debug!(path = %path.display(), codec = self.name(), keys = map.len(), "parsed");
        Ok(map)
    }
}

/// Named codecs, looked up by tag or by file extension.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        CodecRegistry { codecs: Vec::new() }
    }

    /// The text dialect, JSON and TOML.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TextCodec);
        registry.register(JsonCodec);
        registry.register(TomlCodec);
        registry
    }

    /// Add `codec`, replacing any codec with the same name.
    pub fn register(&mut self, codec: impl Codec + 'static) {
        self.codecs.retain(|c| c.name() != codec.name());
        self.codecs.push(Box::new(codec));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&dyn Codec, SectionalError> {
        self.codecs
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
            .ok_or_else(|| SectionalError::UnknownCodec(name.to_string()))
    }

    /// The codec claiming `path`'s extension, falling back to the text dialect.
    pub fn for_path(&self, path: &Path) -> Result<&dyn Codec, SectionalError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match self
            .codecs
            .iter()
            .find(|c| c.extensions().iter().any(|e| *e == extension))
        {
            Some(codec) => Ok(codec.as_ref()),
            None => self.get(text::NAME),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
