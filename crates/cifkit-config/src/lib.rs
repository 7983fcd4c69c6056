use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid dictionary search pattern {pattern}: {source}")]
    PatternError {
        pattern: String,
        source: glob::PatternError,
    },
}

/// Output settings, the `[writer]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub line_width: usize,
    pub canonical_order: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            line_width: 132,
            canonical_order: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories searched for dictionary files, in order
    pub dictionary_dirs: Vec<PathBuf>,
    /// Dictionary used when a command does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_dictionary: Option<String>,
    /// Reject values that violate the dictionary instead of warning
    pub strict: bool,
    pub writer: WriterConfig,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the dictionary directories
        config.dictionary_dirs = config
            .dictionary_dirs
            .into_iter()
            .map(|dir| Self::expand_path(&dir).unwrap_or(dir))
            .collect();

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/cifkit");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Resolve a dictionary name to a file in one of the dictionary
    /// directories. `name` may be a file name or a glob pattern; a bare name
    /// also matches `<name>.dic`. The first directory with a match wins and
    /// matches within a directory are taken in sorted order.
    pub fn find_dictionary(&self, name: &str) -> Result<Option<PathBuf>, ConfigError> {
        for dir in &self.dictionary_dirs {
            for candidate in [name.to_string(), format!("{name}.dic")] {
                let pattern = dir.join(&candidate).to_string_lossy().into_owned();
                let paths = glob::glob(&pattern).map_err(|source| ConfigError::PatternError {
                    pattern: pattern.clone(),
                    source,
                })?;

                let mut found: Vec<PathBuf> = paths
                    .filter_map(Result::ok)
                    .filter(|p| p.is_file())
                    .collect();
                found.sort();
                if let Some(path) = found.into_iter().next() {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }

    /// The default dictionary resolved against the dictionary directories.
    pub fn default_dictionary_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.default_dictionary {
            Some(name) => self.find_dictionary(name),
            None => Ok(None),
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::write(path, "data_x\n").unwrap();
    }

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/cifkit/config.toml"));
    }

    #[test]
    fn test_defaults_for_missing_keys() {
        let config: Config = toml::from_str("strict = true\n").unwrap();

        assert!(config.strict);
        assert!(config.dictionary_dirs.is_empty());
        assert_eq!(config.default_dictionary, None);
        assert_eq!(config.writer, WriterConfig::default());
    }

    #[test]
    fn test_writer_table() {
        let config: Config = toml::from_str(
            r#"
[writer]
line_width = 80
"#,
        )
        .unwrap();

        assert_eq!(config.writer.line_width, 80);
        assert!(config.writer.canonical_order);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/dictionaries");
        let expanded = Config::expand_path(&path).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("dictionaries"));
    }

    #[test]
    fn test_expand_path_with_absolute_path() {
        let path = PathBuf::from("/usr/share/dictionaries");
        assert_eq!(Config::expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_dictionary_dirs_are_expanded_on_load() {
        unsafe {
            env::set_var("CIFKIT_TEST_DICTS", "/custom/dicts");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_file,
            "dictionary_dirs = [\"$CIFKIT_TEST_DICTS/mmcif\", \"/plain\"]\n",
        )
        .unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();
        assert_eq!(
            config.dictionary_dirs,
            vec![PathBuf::from("/custom/dicts/mmcif"), PathBuf::from("/plain")]
        );

        unsafe {
            env::remove_var("CIFKIT_TEST_DICTS");
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        assert!(Config::load_from_path(&non_existent_config).unwrap().is_none());
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "strict = \"maybe\"\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let config = Config {
            dictionary_dirs: vec![PathBuf::from("/tmp/dicts")],
            default_dictionary: Some("mmcif_pdbx".to_string()),
            strict: true,
            writer: WriterConfig {
                line_width: 100,
                canonical_order: false,
            },
        };

        config.save_to_path(&config_file).unwrap();
        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_find_dictionary() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(&first.path().join("other.dic"));
        touch(&second.path().join("mmcif_pdbx.dic"));
        touch(&second.path().join("mmcif_ma.dic"));

        let config = Config {
            dictionary_dirs: vec![first.path().to_path_buf(), second.path().to_path_buf()],
            ..Config::default()
        };

        assert_eq!(
            config.find_dictionary("mmcif_pdbx").unwrap(),
            Some(second.path().join("mmcif_pdbx.dic"))
        );
        assert_eq!(
            config.find_dictionary("other.dic").unwrap(),
            Some(first.path().join("other.dic"))
        );
        assert_eq!(
            config.find_dictionary("mmcif_*").unwrap(),
            Some(second.path().join("mmcif_ma.dic"))
        );
        assert_eq!(config.find_dictionary("missing").unwrap(), None);
    }

    #[test]
    fn test_default_dictionary_path() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("mmcif_pdbx.dic"));

        let mut config = Config {
            dictionary_dirs: vec![dir.path().to_path_buf()],
            ..Config::default()
        };
        assert_eq!(config.default_dictionary_path().unwrap(), None);

        config.default_dictionary = Some("mmcif_pdbx".to_string());
        assert_eq!(
            config.default_dictionary_path().unwrap(),
            Some(dir.path().join("mmcif_pdbx.dic"))
        );
    }
}
