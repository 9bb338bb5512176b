//! Framework-agnostic vocabulary of the loader.
//!
//! [`SearchPath`] says where configuration and schema files are looked for;
//! lists of them are **priority-ascending**, the last entry wins when files
//! are merged. [`ToolAction`] is what a command line (or anything else)
//! asks the loader to do.

use std::path::PathBuf;

/// Where to search for files.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".myapp")`.
    Home(&'static str),
    /// Current working directory.
    Cwd,
    /// An explicit directory.
    Path(PathBuf),
    /// Every directory listed in a colon-separated environment variable,
    /// in the order given. Unset or empty variables contribute nothing.
    Env(&'static str),
}

/// An operation on the loaded configuration, independent of any CLI framework.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    /// Every resolved value, defaults included.
    Show,
    /// One resolved value by dotted key.
    Get { key: String },
    /// Validate against the schema and report every failure.
    Validate,
    /// Persist a value to the TOML file at the persist path.
    Set { key: String, value: String },
    /// Remove a value from the TOML file at the persist path.
    Unset { key: String },
}
