//! Clap adapter.
//!
//! Compiled only with the `clap` Cargo feature (on by default). [`ToolArgs`]
//! and [`ToolSubcommand`] embed into an application's own clap derive to
//! give it `show|get|validate|set|unset` subcommands.
//!
//! The only bridge to the rest of the crate is [`ToolArgs::into_action()`],
//! which converts parsed arguments into a [`ToolAction`](crate::ToolAction)
//! for [`Loader::handle()`](crate::Loader::handle). Other CLI parsers can
//! build `ToolAction` values directly.

use clap::{Args, Subcommand};

use crate::types::ToolAction;

/// Clap-derived args for the `config` subcommand group.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(subcommand)]
///     command: Commands,
/// }
///
/// #[derive(Subcommand)]
/// enum Commands {
///     Config(ToolArgs),
/// }
/// ```
#[derive(Debug, Args)]
pub struct ToolArgs {
    #[command(subcommand)]
    pub action: Option<ToolSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum ToolSubcommand {
    /// Show every resolved configuration value, defaults included.
    Show,
    /// Show the resolved value of one key.
    Get {
        /// Dotted key path (e.g. "limits.high").
        key: String,
    },
    /// Validate the configuration against the schema and list every failure.
    Validate,
    /// Persist a value to the config file.
    Set {
        /// Dotted key path (e.g. "limits.high").
        key: String,
        /// Value to set: a literal such as `3`, `'text'` or `[1, 2]`, or a bare string.
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Remove a value from the config file.
    Unset {
        /// Dotted key path (e.g. "limits.high").
        key: String,
    },
}

impl ToolArgs {
    /// Convert clap-parsed args into a framework-agnostic `ToolAction`.
    ///
    /// Bare `config` (no subcommand) and explicit `config show` both map to
    /// `ToolAction::Show`.
    pub fn into_action(self) -> ToolAction {
        match self.action {
            None | Some(ToolSubcommand::Show) => ToolAction::Show,
            Some(ToolSubcommand::Get { key }) => ToolAction::Get { key },
            Some(ToolSubcommand::Validate) => ToolAction::Validate,
            Some(ToolSubcommand::Set { key, value }) => ToolAction::Set { key, value },
            Some(ToolSubcommand::Unset { key }) => ToolAction::Unset { key },
        }
    }
}
