//! Loading node config documents from disk.

use std::path::Path;

use odonet_proto::NodeConfig;

use crate::error::ServerError;

/// Read and parse the config document at `path`.
pub fn load_config(path: &Path) -> Result<NodeConfig, ServerError> {
    let bytes =
        std::fs::read(path).map_err(|source| ServerError::ConfigRead { path: path.to_path_buf(), source })?;
    NodeConfig::from_json(&bytes).map_err(|source| ServerError::ConfigParse { path: path.to_path_buf(), source })
}
