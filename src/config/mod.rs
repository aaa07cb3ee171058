use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Optional YAML config; every field mirrors a CLI flag and CLI values win.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub wordlist: Option<String>,
    pub threads: Option<usize>,
    pub timeout: Option<u64>,
    pub port: Option<u16>,
    pub extensions: Option<String>,
    pub recursion: Option<usize>,
    pub spider: Option<bool>,
    pub insecure: Option<bool>,
    pub status_codes: Option<String>,
    pub exclude_size: Option<u64>,
    pub rate: Option<u32>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".gembuster").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_yaml_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "url: gemini://example.org\nthreads: 25\nstatus_codes: \"2,3,44\"\nspider: false"
        )
        .unwrap();
        let cfg = load_config(&file.path().to_path_buf(), false).unwrap();
        assert_eq!(cfg.url.as_deref(), Some("gemini://example.org"));
        assert_eq!(cfg.threads, Some(25));
        assert_eq!(cfg.status_codes.as_deref(), Some("2,3,44"));
        assert_eq!(cfg.spider, Some(false));
    }

    #[test]
    fn missing_config_is_default_when_allowed() {
        let path = PathBuf::from("/definitely/not/here/config.yml");
        assert!(load_config(&path, false).is_err());
        let cfg = load_config(&path, true).unwrap();
        assert!(cfg.url.is_none());
    }
}
