use tracing::debug;

use crate::codec::CodecRegistry;
use crate::config::Config;
use crate::error::SectionalError;
use crate::file::{self, CONFIG_PATH_VAR, SCHEMA_PATH_VAR};
use crate::merge::deep_merge;
use crate::ops::{self, ToolResult};
use crate::persist;
use crate::schema::SchemaSection;
use crate::types::{SearchPath, ToolAction};
use crate::value::Map;

/// Entry point for loading configuration files.
pub struct Sectional;

impl Sectional {
    pub fn loader() -> Loader {
        Loader::new()
    }
}

/// Builder for discovering, merging and validating configuration files.
///
/// - **Discovery**: [`search_paths()`](Self::search_paths) says where to look;
///   every file found is deep-merged, later paths overriding earlier ones.
/// - **Schema**: [`schema()`](Self::schema) or
///   [`schema_file()`](Self::schema_file) enables validation.
/// - **Persistence**: [`persist_path()`](Self::persist_path) says where
///   `set`/`unset` write.
pub struct Loader {
    app_name: Option<String>,
    file_name: Option<String>,
    search_paths: Option<Vec<SearchPath>>,
    schema: Option<SchemaSection>,
    schema_file: Option<String>,
    defaults: Option<Map>,
    use_defaults: bool,
    persist_path: Option<SearchPath>,
    codecs: CodecRegistry,
}

impl Loader {
    fn new() -> Self {
        Self {
            app_name: None,
            file_name: None,
            search_paths: None,
            schema: None,
            schema_file: None,
            defaults: None,
            use_defaults: true,
            persist_path: None,
            codecs: CodecRegistry::with_builtin(),
        }
    }

    /// Set the application name. This derives sensible defaults:
    /// - `file_name` → `"{app_name}.toml"`
    /// - `search_paths` → `[Platform, Env(SECTIONAL_CONFIG_PATH)]`
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Override the config file name (default: `"{app_name}.toml"`). Its
    /// extension picks the codec.
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Replace the default search paths entirely.
    ///
    /// Paths are listed in **priority-ascending** order: the last entry has
    /// the highest priority.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path without replacing the defaults.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        self.search_paths
            .get_or_insert_with(default_search_paths)
            .push(path);
        self
    }

    /// Validate against `schema`. Takes precedence over a schema file.
    pub fn schema(mut self, schema: SchemaSection) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Look for a schema file with this name along the search paths and
    /// the directories in `SECTIONAL_SCHEMA_PATH`. The highest-priority
    /// file found is used; none found means no validation.
    pub fn schema_file(mut self, name: &str) -> Self {
        self.schema_file = Some(name.to_string());
        self
    }

    /// Values the configuration falls back to.
    pub fn defaults(mut self, defaults: Map) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Keep defaults in an overlay (the default). When disabled, seeded
    /// defaults are layered under the files and validation fills missing
    /// values into the configuration itself.
    pub fn use_defaults(mut self, enabled: bool) -> Self {
        self.use_defaults = enabled;
        self
    }

    /// Set the persistence path for `set`/`unset`.
    ///
    /// Independent of the search paths used for reading. If not set,
    /// `set` returns [`SectionalError::NoPersistPath`].
    pub fn persist_path(mut self, path: SearchPath) -> Self {
        self.persist_path = Some(path);
        self
    }

    /// Replace the codec registry used to read files.
    pub fn codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Resolve the effective app name, or error if not set.
    fn effective_app_name(&self) -> Result<&str, SectionalError> {
        self.app_name
            .as_deref()
            .ok_or(SectionalError::AppNameRequired)
    }

    /// Resolve the effective file name.
    fn effective_file_name(&self) -> Result<String, SectionalError> {
        if let Some(name) = &self.file_name {
            return Ok(name.clone());
        }
        let app = self.effective_app_name()?;
        Ok(format!("{app}.toml"))
    }

    /// Resolve the effective search paths.
    fn effective_search_paths(&self) -> Vec<SearchPath> {
        match &self.search_paths {
            Some(paths) => paths.clone(),
            None => default_search_paths(),
        }
    }

    /// The search paths with the schema variable appended.
    fn effective_schema_paths(&self) -> Vec<SearchPath> {
        let mut paths = self.effective_search_paths();
        paths.push(SearchPath::Env(SCHEMA_PATH_VAR));
        paths
    }

    /// Read and deep-merge every config file found.
    fn load_files(&self) -> Result<Map, SectionalError> {
        let app_name = self.effective_app_name()?;
        let file_name = self.effective_file_name()?;
        let files =
            file::load_config_files(&self.effective_search_paths(), &file_name, app_name)?;

        let mut merged = Map::new();
        for (path, content) in files {
            let codec = self.codecs.for_path(&path)?;
            let map = codec.from_string(&content)?;
            debug!(path = %path.display(), codec = codec.name(), keys = map.len(), "loaded config file");
            merged = deep_merge(merged, map);
        }
        Ok(merged)
    }

    fn load_schema(&self) -> Result<Option<SchemaSection>, SectionalError> {
        if let Some(schema) = &self.schema {
            return Ok(Some(schema.clone()));
        }
        let Some(name) = &self.schema_file else {
            return Ok(None);
        };
        let app_name = self.effective_app_name()?;
        let dirs = file::expand_search_paths(&self.effective_schema_paths(), app_name);
        match file::load_first_match(&dirs, name)? {
            Some((path, content)) => {
                let codec = self.codecs.for_path(&path)?;
                let schema = SchemaSection::from_map(codec.from_string(&content)?)?;
                debug!(path = %path.display(), "loaded schema");
                Ok(Some(schema))
            }
            None => {
                debug!(schema = %name, "no schema file found");
                Ok(None)
            }
        }
    }

    /// Build the unvalidated configuration and find the schema.
    fn resolve(&self) -> Result<(Config, Option<SchemaSection>), SectionalError> {
        let files = self.load_files()?;
        let config = if self.use_defaults {
            let config = Config::from_map(files)?;
            if let Some(defaults) = &self.defaults {
                config.set_defaults(defaults.clone())?;
            }
            config
        } else {
            let config = Config::without_defaults();
            let base = self.defaults.clone().unwrap_or_default();
            config.update(deep_merge(base, files))?;
            config
        };
        Ok((config, self.load_schema()?))
    }

    /// Load, merge and validate the configuration.
    ///
    /// Every failure is collected; a non-empty report is returned as
    /// [`SectionalError::InvalidConfig`].
    pub fn load(&self) -> Result<Config, SectionalError> {
        let (config, schema) = self.resolve()?;
        if let Some(schema) = schema {
            let validation = schema.validate(&config, false)?;
            if !validation.is_empty() {
                return Err(SectionalError::InvalidConfig(validation));
            }
        }
        Ok(config)
    }

    /// Handle a `ToolAction` and print the result to stdout.
    pub fn handle_and_print(&self, action: &ToolAction) -> Result<(), SectionalError> {
        let result = self.handle(action)?;
        println!("{result}");
        Ok(())
    }

    /// Handle a `ToolAction` (show / get / validate / set / unset).
    pub fn handle(&self, action: &ToolAction) -> Result<ToolResult, SectionalError> {
        match action {
            ToolAction::Show => {
                let config = self.load()?;
                ops::list_values(&config)
            }
            ToolAction::Get { key } => {
                let config = self.load()?;
                ops::get_value(&config, key)
            }
            ToolAction::Validate => {
                let (config, schema) = self.resolve()?;
                let schema = schema.ok_or(SectionalError::NoSchema)?;
                ops::validate(&schema, &config)
            }
            ToolAction::Set { key, value } => {
                let path = self.effective_persist_file(key)?;
                persist::persist_value(&path, key, value)
            }
            ToolAction::Unset { key } => {
                let path = self.effective_persist_file(key)?;
                persist::unset_value(&path, key)
            }
        }
    }

    /// The TOML file `set`/`unset` edit.
    fn effective_persist_file(&self, key: &str) -> Result<std::path::PathBuf, SectionalError> {
        let app_name = self.effective_app_name()?;
        let file_name = self.effective_file_name()?;
        let persist = self
            .persist_path
            .as_ref()
            .ok_or(SectionalError::NoPersistPath)?;
        let path = file::resolve_persist_path(persist, &file_name, app_name)?;
        if self.codecs.for_path(&path)?.name() != "toml" {
            return Err(SectionalError::InvalidValue {
                key: key.into(),
                reason: format!("{} is not a TOML file", path.display()),
            });
        }
        Ok(path)
    }
}

fn default_search_paths() -> Vec<SearchPath> {
    vec![SearchPath::Platform, SearchPath::Env(CONFIG_PATH_VAR)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{SAMPLE_CONFIG, SAMPLE_SCHEMA, sample_schema};
    use crate::map;
    use crate::value::Value;
    use std::fs;
    use tempfile::TempDir;

    fn in_dir(dir: &TempDir) -> Loader {
        Sectional::loader()
            .app_name("myapp")
            .search_paths(vec![SearchPath::Path(dir.path().to_path_buf())])
    }

    #[test]
    fn app_name_sets_defaults() {
        let loader = Sectional::loader().app_name("myapp");
        assert_eq!(loader.effective_file_name().unwrap(), "myapp.toml");
        assert_eq!(
            loader.effective_search_paths(),
            vec![SearchPath::Platform, SearchPath::Env(CONFIG_PATH_VAR)]
        );
        assert_eq!(
            loader.effective_schema_paths().last(),
            Some(&SearchPath::Env(SCHEMA_PATH_VAR))
        );
    }

    #[test]
    fn override_file_name() {
        let loader = Sectional::loader().app_name("myapp").file_name("custom.cfg");
        assert_eq!(loader.effective_file_name().unwrap(), "custom.cfg");
    }

    #[test]
    fn search_paths_replace_and_append() {
        let loader = Sectional::loader()
            .app_name("myapp")
            .search_paths(vec![SearchPath::Cwd])
            .add_search_path(SearchPath::Home(".myapp"));
        assert_eq!(
            loader.effective_search_paths(),
            vec![SearchPath::Cwd, SearchPath::Home(".myapp")]
        );

        let loader = Sectional::loader().add_search_path(SearchPath::Cwd);
        assert_eq!(
            loader.effective_search_paths(),
            vec![
                SearchPath::Platform,
                SearchPath::Env(CONFIG_PATH_VAR),
                SearchPath::Cwd
            ]
        );
    }

    #[test]
    fn missing_app_name_errors() {
        assert!(matches!(
            Sectional::loader().load(),
            Err(SectionalError::AppNameRequired)
        ));
    }

    #[test]
    fn load_merges_files_in_priority_order() {
        let low = TempDir::new().unwrap();
        let high = TempDir::new().unwrap();
        fs::write(
            low.path().join("myapp.toml"),
            "name = \"low\"\nport = 1\n[limits]\nlow = 1\nhigh = 2\n",
        )
        .unwrap();
        fs::write(high.path().join("myapp.toml"), "name = \"high\"\n[limits]\nhigh = 9\n").unwrap();

        let config = Sectional::loader()
            .app_name("myapp")
            .search_paths(vec![
                SearchPath::Path(low.path().to_path_buf()),
                SearchPath::Path(high.path().to_path_buf()),
            ])
            .load()
            .unwrap();
        assert_eq!(config.get("name").unwrap(), Value::from("high"));
        assert_eq!(config.get("port").unwrap(), Value::Int(1));
        let limits = config.get_section("limits").unwrap();
        assert_eq!(limits.get("low").unwrap(), Value::Int(1));
        assert_eq!(limits.get("high").unwrap(), Value::Int(9));
    }

    #[test]
    fn load_without_files_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = in_dir(&dir).load().unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn text_file_validated_with_defaults_in_overlay() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.cfg"), SAMPLE_CONFIG).unwrap();

        let config = in_dir(&dir)
            .file_name("myapp.cfg")
            .schema(sample_schema())
            .load()
            .unwrap();
        assert_eq!(config.get("port").unwrap(), Value::Int(9000));
        assert_eq!(config.get("ratio").unwrap(), Value::Float(0.5));
        let limits = config.get_section("limits").unwrap();
        assert_eq!(limits.get("high").unwrap(), Value::Int(15));
        assert_eq!(limits.get("stray").unwrap(), Value::Bool(true));

        let stored = config.as_dict(false, false).unwrap();
        assert!(!stored.contains_key("ratio"));
        assert!(config.defaults().unwrap().has_key("ratio"));
    }

    #[test]
    fn invalid_files_report_every_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "port = 0\nextra = 1\n").unwrap();

        match in_dir(&dir).schema(sample_schema()).load() {
            Err(SectionalError::InvalidConfig(validation)) => {
                assert!(validation.error("name").is_some());
                assert!(validation.error("port").is_some());
                assert!(validation.error("extra").is_some());
            }
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn schema_file_is_discovered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "name = \"\"\n").unwrap();
        fs::write(dir.path().join("schema.cfg"), SAMPLE_SCHEMA).unwrap();

        let loader = in_dir(&dir).schema_file("schema.cfg");
        assert_eq!(loader.load_schema().unwrap(), Some(sample_schema()));
        match loader.load() {
            Err(SectionalError::InvalidConfig(validation)) => {
                assert_eq!(validation.errors().len(), 1);
                assert!(validation.error("name").is_some());
            }
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn missing_schema_file_skips_validation() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "port = 0\n").unwrap();
        let config = in_dir(&dir).schema_file("schema.cfg").load().unwrap();
        assert_eq!(config.get("port").unwrap(), Value::Int(0));
    }

    #[test]
    fn seeded_defaults_sit_under_the_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "port = 1\n").unwrap();
        let defaults = map! { "port" => 2, "host" => "localhost" };

        let config = in_dir(&dir).defaults(defaults.clone()).load().unwrap();
        assert_eq!(config.get("port").unwrap(), Value::Int(1));
        assert_eq!(config.get("host").unwrap(), Value::from("localhost"));
        assert!(!config.as_dict(false, false).unwrap().contains_key("host"));

        let config = in_dir(&dir)
            .defaults(defaults)
            .use_defaults(false)
            .load()
            .unwrap();
        assert!(config.defaults().is_none());
        assert_eq!(
            config.as_dict(false, false).unwrap(),
            map! { "port" => 1, "host" => "localhost" }
        );
    }

    #[test]
    fn without_overlay_validation_fills_the_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "name = \"api\"\n").unwrap();
        let config = in_dir(&dir)
            .schema(sample_schema())
            .use_defaults(false)
            .load()
            .unwrap();
        let stored = config.as_dict(false, false).unwrap();
        assert_eq!(stored.get("port"), Some(&Value::Int(8080)));
        assert_eq!(stored.get("tags"), Some(&Value::List(vec!["web".into()])));
    }

    #[test]
    fn handle_show_and_get() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "name = \"api\"\n[limits]\nlow = 2\n").unwrap();
        let loader = in_dir(&dir).schema(sample_schema());

        match loader.handle(&ToolAction::Show).unwrap() {
            ToolResult::Listing { entries } => {
                assert!(entries.contains(&("port".into(), "8080".into())));
                assert!(entries.contains(&("limits.high".into(), "12".into())));
            }
            other => panic!("Expected Listing, got {other:?}"),
        }
        assert_eq!(
            loader
                .handle(&ToolAction::Get {
                    key: "mode".into()
                })
                .unwrap(),
            ToolResult::KeyValue {
                key: "mode".into(),
                value: "'fast'".into()
            }
        );
    }

    #[test]
    fn handle_validate() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "port = 99999\n").unwrap();

        assert!(matches!(
            in_dir(&dir).handle(&ToolAction::Validate),
            Err(SectionalError::NoSchema)
        ));
        match in_dir(&dir)
            .schema(sample_schema())
            .handle(&ToolAction::Validate)
            .unwrap()
        {
            ToolResult::Invalid(validation) => assert_eq!(validation.errors().len(), 2),
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn handle_set_requires_persist_path() {
        let dir = TempDir::new().unwrap();
        let result = in_dir(&dir).handle(&ToolAction::Set {
            key: "port".into(),
            value: "3000".into(),
        });
        assert!(matches!(result, Err(SectionalError::NoPersistPath)));
    }

    #[test]
    fn handle_set_then_unset() {
        let dir = TempDir::new().unwrap();
        let loader = in_dir(&dir).persist_path(SearchPath::Path(dir.path().to_path_buf()));

        loader
            .handle(&ToolAction::Set {
                key: "limits.low".into(),
                value: "7".into(),
            })
            .unwrap();
        let config = loader.load().unwrap();
        assert_eq!(
            config.get_section("limits").unwrap().get("low").unwrap(),
            Value::Int(7)
        );

        let result = loader
            .handle(&ToolAction::Unset {
                key: "limits.low".into(),
            })
            .unwrap();
        assert_eq!(
            result,
            ToolResult::ValueUnset {
                key: "limits.low".into()
            }
        );
        let config = loader.load().unwrap();
        assert!(!config.get_section("limits").unwrap().has_key("low"));
    }

    #[test]
    fn handle_set_refuses_non_toml_files() {
        let dir = TempDir::new().unwrap();
        let result = in_dir(&dir)
            .file_name("myapp.cfg")
            .persist_path(SearchPath::Path(dir.path().to_path_buf()))
            .handle(&ToolAction::Set {
                key: "port".into(),
                value: "1".into(),
            });
        assert!(matches!(result, Err(SectionalError::InvalidValue { .. })));
    }

    #[test]
    fn parse_errors_propagate() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("myapp.toml"), "port = \n").unwrap();
        assert!(matches!(
            in_dir(&dir).load(),
            Err(SectionalError::Parse { .. })
        ));
    }
}
