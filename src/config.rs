//! On-disk configuration: a YAML file holding the map of chain configurations
//! and the name of the default chain, stored at `<home>/config.yaml` where
//! `<home>` defaults to `$HOME/.<appname>`.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{chain::ChainClientConfig, error::ConfigError};

pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(rename = "default-chain", default)]
    pub default_chain: String,
    #[serde(default)]
    pub chains: BTreeMap<String, ChainClientConfig>,
}

impl Config {
    /// The default home directory, `$HOME/.<appname>`
    pub fn default_home(app_name: &str) -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::FileIO("could not determine home directory".to_string()))?;

        Ok(home.join(format!(".{app_name}")))
    }

    /// Reads and validates the config file under the given home directory
    pub fn load(home: &Path) -> Result<Config, ConfigError> {
        let path = home.join(CONFIG_FILE_NAME);
        let contents = fs::read_to_string(&path)
            .map_err(|e| ConfigError::FileIO(format!("{}: {e}", path.display())))?;
        let config: Config = serde_yaml::from_str(&contents)?;

        for chain in config.chains.values() {
            chain.validate()?;
        }

        Ok(config)
    }

    /// Writes the config file, creating the home directory if needed
    pub fn save(&self, home: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(home)
            .map_err(|e| ConfigError::FileIO(format!("{}: {e}", home.display())))?;

        let path = home.join(CONFIG_FILE_NAME);
        let contents = serde_yaml::to_string(self)?;
        fs::write(&path, contents)
            .map_err(|e| ConfigError::FileIO(format!("{}: {e}", path.display())))
    }

    /// Looks up a chain by name
    pub fn chain(&self, name: &str) -> Result<&ChainClientConfig, ConfigError> {
        self.chains
            .get(name)
            .ok_or_else(|| ConfigError::UnknownChain(name.to_string()))
    }

    /// The configured default chain
    pub fn default_chain_config(&self) -> Result<&ChainClientConfig, ConfigError> {
        self.chain(&self.default_chain)
    }
}
