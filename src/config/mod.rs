//! Layered configuration.
//!
//! Tiers are merged field by field, later tiers winning:
//! 1. **Defaults** - built in
//! 2. **Project** - `./taskboard/config.yaml`
//! 3. **User** - `~/.taskboard/config.yaml`
//! 4. **Environment** - `TASKBOARD_*` variables
//!
//! `TASKBOARD_CONFIG_PATH` (or `--config`) names a single file that replaces
//! tiers 2 and 3.
//!
//! ## Environment Variables
//! - `TASKBOARD_STORE_URL` - backend base URL
//! - `TASKBOARD_STORE_KEY` - public API key
//! - `TASKBOARD_ACCESS_TOKEN` - signed-in user's token
//! - `TASKBOARD_SCHEMA` - database schema
//! - `TASKBOARD_UI_PORT` - dashboard API port

mod loader;
mod merge;
mod types;

pub use loader::{
    ConfigLoader, ConfigPaths, ConfigTier, ENV_ACCESS_TOKEN, ENV_CONFIG_PATH, ENV_SCHEMA,
    ENV_STORE_KEY, ENV_STORE_URL, ENV_UI_PORT,
};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
