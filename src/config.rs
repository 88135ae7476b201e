use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CallseqError, Result};

/// Smallest and largest traversal depth a diagram may request
pub const MIN_DEPTH: u32 = 1;
pub const MAX_DEPTH: u32 = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace layout
    pub workspace: WorkspaceConfig,

    /// Which calls are kept in the diagram
    pub filters: FilterConfig,

    /// Diagram shape and labelling
    pub diagram: DiagramConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace roots; namespaces are computed relative to these
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Gitignore-style globs; calls into matching files are dropped
    pub ignore_globs: Vec<String>,

    /// Drop calls whose target lives outside every workspace root
    pub restrict_to_workspace: bool,

    /// Drop calls into virtual environments and interpreter installs
    pub ignore_third_party: bool,

    /// Interpreter/environment paths, separated by ',' or ';'
    pub environment_paths: String,

    /// Directory names that always mark third-party code
    pub third_party_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Maximum call depth below the entry function
    pub max_depth: u32,

    /// Render `name()` instead of the literal argument text
    pub omit_arguments: bool,

    /// Use the callee's declared parameters instead of call-site arguments
    pub prefer_signature: bool,

    /// Label on return arrows; empty renders as a single space
    pub return_label: String,

    /// Leave hierarchical sequence numbers out of labels
    pub omit_sequence_numbers: bool,

    /// Target label width before soft wrapping
    pub wrap_width: usize,

    /// How far a wrap point may move to land on a break character
    pub wrap_soft_limit: usize,

    /// Receiver names that mean "the same object as the caller"
    pub self_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (plantuml, json)
    pub format: String,

    /// Directory diagrams are written into
    pub directory: PathBuf,

    /// Directory holding a custom `sequence.puml.tera`
    pub template_dir: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignore_globs: vec![],
            restrict_to_workspace: true,
            ignore_third_party: true,
            environment_paths: String::new(),
            third_party_dirs: vec![".venv".to_string(), "venv".to_string()],
        }
    }
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            omit_arguments: false,
            prefer_signature: false,
            return_label: String::new(),
            omit_sequence_numbers: false,
            wrap_width: 40,
            wrap_soft_limit: 10,
            self_tokens: vec!["self".to_string()],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "plantuml".to_string(),
            directory: PathBuf::from("diagrams"),
            template_dir: None,
        }
    }
}

impl DiagramConfig {
    /// Configured depth, clamped into the supported range
    pub fn effective_max_depth(&self) -> u32 {
        self.max_depth.clamp(MIN_DEPTH, MAX_DEPTH)
    }

    /// Label for return arrows; renderers choke on an empty label
    pub fn return_label(&self) -> &str {
        if self.return_label.is_empty() {
            " "
        } else {
            &self.return_label
        }
    }
}

impl FilterConfig {
    /// Split `environment_paths` on commas and semicolons
    pub fn environment_path_list(&self) -> Vec<PathBuf> {
        self.environment_paths
            .split([',', ';'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| CallseqError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CallseqError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["callseq.toml", "Callseq.toml", ".callseq.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_depth_is_clamped() {
        let mut diagram = DiagramConfig::default();
        diagram.max_depth = 0;
        assert_eq!(diagram.effective_max_depth(), 1);
        diagram.max_depth = 100;
        assert_eq!(diagram.effective_max_depth(), 32);
        diagram.max_depth = 5;
        assert_eq!(diagram.effective_max_depth(), 5);
    }

    #[test]
    fn test_empty_return_label_becomes_space() {
        let mut diagram = DiagramConfig::default();
        assert_eq!(diagram.return_label(), " ");
        diagram.return_label = "ok".to_string();
        assert_eq!(diagram.return_label(), "ok");
    }

    #[test]
    fn test_environment_paths_split() {
        let filters = FilterConfig {
            environment_paths: "/opt/py, /usr/lib/python3;;C:\\Python".to_string(),
            ..FilterConfig::default()
        };
        assert_eq!(
            filters.environment_path_list(),
            vec![
                PathBuf::from("/opt/py"),
                PathBuf::from("/usr/lib/python3"),
                PathBuf::from("C:\\Python"),
            ]
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[diagram]
max_depth = 7

[filters]
ignore_globs = ["vendor/**"]
"#,
        )
        .unwrap();

        assert_eq!(config.diagram.max_depth, 7);
        assert_eq!(config.diagram.wrap_width, 40);
        assert_eq!(config.filters.ignore_globs, vec!["vendor/**".to_string()]);
        assert!(config.filters.restrict_to_workspace);
        assert_eq!(config.output.format, "plantuml");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callseq.toml");

        let mut config = Config::default();
        config.diagram.omit_arguments = true;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.diagram.omit_arguments);
        assert_eq!(loaded.filters.third_party_dirs, vec![".venv", "venv"]);
    }
}
