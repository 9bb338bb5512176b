//! Hierarchical configuration with deferred values and a declarative schema.
//!
//! A [`Section`] is a tree of named parameters and sub-sections. Parameters
//! may hold deferred [`Expr`]essions that are evaluated every time they are
//! read, so a value can be derived from others anywhere in the tree through
//! the `ROOT` and `SECTION` [`macros`]:
//!
//! ```
//! use sectional::{map, macros::root, Config, Value};
//!
//! let config = Config::from_map(map! {
//!     "workers" => 4,
//!     "pool" => map! { "size" => root().item("workers") * 2 },
//! })
//! .unwrap();
//! assert_eq!(config.get_section("pool").unwrap().get("size").unwrap(), Value::Int(8));
//!
//! config.set("workers", 8).unwrap();
//! assert_eq!(config.get_section("pool").unwrap().get("size").unwrap(), Value::Int(16));
//! ```
//!
//! # Defaults overlay
//!
//! A [`Config`] is a root section with macros enabled and an optional
//! [`DefaultsSection`] behind it. Reads fall back to the overlay for keys the
//! configuration does not hold; writes never touch it. Deferred defaults are
//! evaluated against the configuration that reads them, so one defaults tree
//! can serve several configurations.
//!
//! # Validation
//!
//! A [`SchemaSection`] maps keys to [`Validator`]s (`Int`, `Float`, `Str`,
//! `Bool`, `Any` and typed lists/tuples such as `StrList`) and to nested
//! schemas. Validation walks a section in place: it fills missing defaults,
//! writes coerced values back, applies the node's [`Unexpected`] policy to
//! undeclared keys and returns a sparse [`Validation`] tree holding only what
//! failed.
//!
//! ```
//! use sectional::{map, Config, SchemaSection, Validator, Value};
//!
//! let mut schema = SchemaSection::new();
//! schema
//!     .add_option("port", Validator::new("Int", map! { "min" => 1, "default" => 8080 }).unwrap())
//!     .unwrap();
//!
//! let config = Config::new();
//! assert!(schema.validate(&config, false).unwrap().is_empty());
//! assert_eq!(config.get("port").unwrap(), Value::Int(8080));
//!
//! config.set("port", 0).unwrap();
//! let validation = schema.validate(&config, false).unwrap();
//! assert!(validation.error("port").is_some());
//! ```
//!
//! Schemas have a text form (`port = Int(min=1, default=8080)`) read and
//! written by [`SchemaSection::from_text`] and [`SchemaSection::dump`].
//!
//! # Files
//!
//! [`Codec`]s translate plain [`Map`]s to and from text: an indented dialect
//! matching [`Section::dump`], JSON and TOML. Expressions survive all three.
//! The [`Sectional::loader()`] builder discovers config files along
//! [`SearchPath`]s (including the `SECTIONAL_CONFIG_PATH` and
//! `SECTIONAL_SCHEMA_PATH` variables), deep-merges them, validates the result
//! and handles [`ToolAction`]s such as `get` and `set`.
//!
//! ```ignore
//! let config = Sectional::loader()
//!     .app_name("myapp")
//!     .schema_file("myapp.schema")
//!     .load()?;
//! ```
//!
//! For [clap](https://docs.rs/clap) users, the `cli` module (behind the
//! `clap` Cargo feature, on by default) provides [`ToolArgs`] to embed a
//! `config show|get|validate|set|unset` subcommand group.
//!
//! # Error handling
//!
//! Fallible operations return [`SectionalError`]; expression evaluation
//! failures are [`EvalError`]s wrapped in it. Validation failures are
//! [`OptionValidationError`]s, collected into a [`Validation`] or raised
//! one at a time.

pub mod check;
pub mod codec;
pub mod config;
pub mod error;
pub mod expr;
pub mod macros;
pub mod option;
pub mod schema;
pub mod section;
pub mod store;
pub mod types;
pub mod validation;
pub mod validator;
pub mod value;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod file;
pub(crate) mod merge;
mod ops;
mod persist;

#[cfg(test)]
mod fixtures;

pub use builder::{Loader, Sectional};
#[cfg(feature = "clap")]
pub use cli::{ToolArgs, ToolSubcommand};
pub use codec::{Codec, CodecRegistry};
pub use config::{Config, DefaultsSection, ReferenceScope};
pub use error::{EvalError, SectionalError};
pub use expr::Expr;
pub use file::{CONFIG_PATH_VAR, SCHEMA_PATH_VAR};
pub use merge::deep_merge;
pub use ops::ToolResult;
pub use option::ConfigOption;
pub use schema::{SchemaSection, Unexpected};
pub use section::Section;
pub use types::{SearchPath, ToolAction};
pub use validation::{OptionValidationError, Validation};
pub use validator::Validator;
pub use value::{Function, Map, Value, ValueType};
