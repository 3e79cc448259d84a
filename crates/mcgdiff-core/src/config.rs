use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tool registry: tag -> compiler executable.
    pub tools: BTreeMap<String, String>,
    /// File extensions that mark a candidate assembly.
    pub extensions: Vec<String>,
    /// Glob patterns on the file name; matches are never scanned.
    pub exclude_patterns: Vec<String>,
    /// Classification threads, 0 lets rayon pick.
    pub scan_threads: usize,
    pub core_assembly: String,
    pub framework_assemblies: Vec<String>,
    pub test_directories: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tools: BTreeMap::new(),
            extensions: vec!["dll".to_string(), "exe".to_string()],
            exclude_patterns: vec!["*.ni.*".to_string()],
            scan_threads: 0,
            core_assembly: "mscorlib.dll".to_string(),
            framework_assemblies: Vec::new(),
            test_directories: vec!["Interop".to_string(), "JIT".to_string()],
        }
    }
}

/// Load `Config.toml` (optional) layered under `MCGDIFF__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_from("Config")
}

pub fn load_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("MCGDIFF")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("NoSuchConfig");
        let config = load_from(missing.to_str().unwrap()).unwrap();
        assert_eq!(config.extensions, vec!["dll", "exe"]);
        assert_eq!(config.exclude_patterns, vec!["*.ni.*"]);
        assert_eq!(config.core_assembly, "mscorlib.dll");
        assert_eq!(config.test_directories, vec!["Interop", "JIT"]);
        assert!(config.tools.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("Config.toml");
        fs::write(
            &path,
            r#"
scan_threads = 4
framework_assemblies = ["System.Runtime.dll", "System.Linq.dll"]

[tools]
nightly = "/opt/jit/nightly/crossgen"
"#,
        )
        .unwrap();

        let name = tmp.path().join("Config");
        let config = load_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.scan_threads, 4);
        assert_eq!(config.framework_assemblies.len(), 2);
        assert_eq!(
            config.tools.get("nightly").map(String::as_str),
            Some("/opt/jit/nightly/crossgen")
        );
        assert_eq!(config.extensions, vec!["dll", "exe"]);
    }
}
