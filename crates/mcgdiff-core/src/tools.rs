use crate::config::AppConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps a tool name (a registry tag) to a compiler executable.
pub trait ToolResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf>;
}

impl<F> ToolResolver for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self(name)
    }
}

/// Tag lookup over the `[tools]` table of the configuration.
#[derive(Debug, Clone, Default)]
pub struct RegistryResolver {
    tools: BTreeMap<String, PathBuf>,
}

impl RegistryResolver {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tools: config
                .tools
                .iter()
                .map(|(tag, path)| (tag.clone(), PathBuf::from(path)))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.tools.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolResolver for RegistryResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.tools.get(name).cloned()
    }
}

/// An existing file is taken literally, otherwise the name is looked up as a
/// tag. Unknown names come back unchanged so validation can report them.
pub fn resolve_tool(arg: &str, resolver: &dyn ToolResolver) -> PathBuf {
    let literal = Path::new(arg);
    if literal.is_file() {
        return literal.to_path_buf();
    }
    resolver.resolve(arg).unwrap_or_else(|| literal.to_path_buf())
}
