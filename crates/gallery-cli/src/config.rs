use std::env;
use std::path::PathBuf;

use gallery_engine::DEFAULT_THUMBNAIL_SIZE;

pub const DIR_ENV: &str = "PROMPT_GALLERY_DIR";
pub const THUMBNAIL_SIZE_ENV: &str = "PROMPT_GALLERY_THUMBNAIL_SIZE";

const MIN_THUMBNAIL_SIZE: u32 = 16;
const MAX_THUMBNAIL_SIZE: u32 = 4096;

/// Environment defaults. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub default_dir: Option<PathBuf>,
    pub thumbnail_size: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            default_dir: lookup(DIR_ENV).map(PathBuf::from),
            thumbnail_size: lookup(THUMBNAIL_SIZE_ENV)
                .and_then(|value| value.parse::<u32>().ok())
                .map(clamp_thumbnail_size)
                .unwrap_or(DEFAULT_THUMBNAIL_SIZE),
        }
    }

    pub fn directory(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.default_dir.clone())
    }

    pub fn thumbnail_size(&self, flag: Option<u32>) -> u32 {
        flag.map(clamp_thumbnail_size)
            .unwrap_or(self.thumbnail_size)
    }
}

pub fn clamp_thumbnail_size(size: u32) -> u32 {
    size.clamp(MIN_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]);
        assert_eq!(config.default_dir, None);
        assert_eq!(config.thumbnail_size, 256);
    }

    #[test]
    fn blank_and_invalid_values_fall_back() {
        let config = config(&[(DIR_ENV, "   "), (THUMBNAIL_SIZE_ENV, "huge")]);
        assert_eq!(config.default_dir, None);
        assert_eq!(config.thumbnail_size, 256);
    }

    #[test]
    fn size_is_clamped() {
        assert_eq!(config(&[(THUMBNAIL_SIZE_ENV, "2")]).thumbnail_size, 16);
        assert_eq!(config(&[(THUMBNAIL_SIZE_ENV, "99999")]).thumbnail_size, 4096);
        assert_eq!(config(&[(THUMBNAIL_SIZE_ENV, " 128 ")]).thumbnail_size, 128);
    }

    #[test]
    fn flags_override_environment() {
        let config = config(&[(DIR_ENV, "/srv/images"), (THUMBNAIL_SIZE_ENV, "512")]);
        assert_eq!(
            config.directory(Some(PathBuf::from("/tmp/x"))),
            Some(PathBuf::from("/tmp/x"))
        );
        assert_eq!(config.directory(None), Some(PathBuf::from("/srv/images")));
        assert_eq!(config.thumbnail_size(Some(64)), 64);
        assert_eq!(config.thumbnail_size(Some(1)), 16);
        assert_eq!(config.thumbnail_size(None), 512);
    }
}
