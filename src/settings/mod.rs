//! Settings come from a TOML profile under `settings/`, selected by
//! `--settings` or by build profile.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
