use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::NmfeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub scripts_dir: PathBuf,
    pub env_name: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    String::from("scn")
}

fn home_dir() -> PathBuf {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    PathBuf::from(env::var(var).unwrap_or_else(|_| String::from(".")))
}

fn env_name() -> String {
    env::var("NMFE_ENV").unwrap_or_else(|_| String::from("default"))
}

impl Default for Config {
    fn default() -> Self {
        let env_name = env_name();
        let base_dir = home_dir().join(".nmfe").join(&env_name);

        let scripts_dir = if let Ok(custom_dir) = env::var("NMFE_SCRIPTS_DIR") {
            PathBuf::from(custom_dir)
        } else {
            // A local scenes directory wins over the per-environment one.
            let local_scenes = Path::new("./scenes");
            if local_scenes.is_dir() {
                local_scenes.to_path_buf()
            } else {
                base_dir.join("scenes")
            }
        };

        Config {
            scripts_dir,
            env_name,
            extension: default_extension(),
        }
    }
}

impl Config {
    /// Loads the config for the current environment, falling back to defaults
    /// when no file exists yet.
    pub fn load() -> Result<Self, NmfeError> {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, NmfeError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| NmfeError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
    }

    pub fn get_config_path() -> PathBuf {
        home_dir().join(".nmfe").join(env_name()).join("config.json")
    }

    /// Resolves a script argument: an existing path is used as is, otherwise
    /// the name is looked up in the scripts directory with the configured
    /// extension added when missing.
    pub fn resolve_script(&self, name: &str) -> PathBuf {
        let direct = Path::new(name);
        if direct.is_file() {
            return direct.to_path_buf();
        }

        let mut path = self.scripts_dir.join(name);
        if path.extension().is_none() {
            path.set_extension(&self.extension);
        }
        path
    }
}
