//! Configuration system for mneme.
//!
//! Provides TOML-based configuration with:
//! - An `[llm]` section for the text oracle backend (main + fast model, retry policy)
//! - A `[memory]` section for store locations, capacities and retrieval limits
//! - A `[logging]` section for the binary's log files
//! - Config file layering (user config dir + project-local `mneme.toml`)
//! - API key resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ResolvedSecret, SecretSource, require_api_key, resolve_api_key};
pub use types::*;
