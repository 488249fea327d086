// src/infra/paths.rs — Config path resolution
//
// DOCCHAT_HOME overrides everything; otherwise config lives in ~/.docchat/.

use std::path::PathBuf;

fn docchat_home() -> Option<PathBuf> {
    std::env::var_os("DOCCHAT_HOME").map(PathBuf::from)
}

/// Configuration directory: $DOCCHAT_HOME/ or ~/.docchat/
pub fn config_dir() -> PathBuf {
    if let Some(home) = docchat_home() {
        return home;
    }
    match directories::BaseDirs::new() {
        Some(base) => base.home_dir().join(".docchat"),
        None => PathBuf::from(".docchat"),
    }
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
