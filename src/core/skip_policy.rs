//! Rules deciding which call sites stay out of the diagram
//!
//! Rules are evaluated in a fixed order and the first match wins. The policy
//! holds no mutable state, so it can be shared across tasks freely.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::FilterConfig;
use crate::error::{CallseqError, Result};
use super::call_site::CallSite;
use super::host::SymbolKind;

/// Why a call site was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAFunctionCall,
    IgnoredGlob,
    OutsideWorkspace,
    ExternalModule,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NotAFunctionCall => "is not a function call",
            SkipReason::IgnoredGlob => "involves ignored globals",
            SkipReason::OutsideWorkspace => "goes out of workspace",
            SkipReason::ExternalModule => "goes to external module",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct SkipPolicy {
    ignore: Gitignore,
    workspace_roots: Vec<PathBuf>,
    restrict_to_workspace: bool,
    ignore_third_party: bool,
    third_party_dirs: Vec<String>,
    environment_paths: Vec<PathBuf>,
}

impl SkipPolicy {
    pub fn new(filters: &FilterConfig, workspace_roots: &[PathBuf]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new("");
        for glob in &filters.ignore_globs {
            builder
                .add_line(None, glob)
                .map_err(|e| CallseqError::Config(format!("Invalid ignore glob '{}': {}", glob, e)))?;
        }
        let ignore = builder
            .build()
            .map_err(|e| CallseqError::Config(e.to_string()))?;

        Ok(Self {
            ignore,
            workspace_roots: workspace_roots.to_vec(),
            restrict_to_workspace: filters.restrict_to_workspace,
            ignore_third_party: filters.ignore_third_party,
            third_party_dirs: filters.third_party_dirs.clone(),
            environment_paths: filters.environment_path_list(),
        })
    }

    /// First matching rule for a call site, or `None` to keep it
    pub fn evaluate(&self, call: &CallSite) -> Option<SkipReason> {
        let target = &call.target;

        if !target.kind.is_callable()
            || (target.kind != SymbolKind::Property && !call.is_function_call)
        {
            return Some(SkipReason::NotAFunctionCall);
        }
        if self.is_ignored(&target.uri) {
            return Some(SkipReason::IgnoredGlob);
        }
        if self.restrict_to_workspace && !self.is_in_workspace(&target.uri) {
            return Some(SkipReason::OutsideWorkspace);
        }
        if self.ignore_third_party && self.is_third_party(&target.uri) {
            return Some(SkipReason::ExternalModule);
        }

        None
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let relative = self
            .workspace_roots
            .iter()
            .filter_map(|root| path.strip_prefix(root).ok());

        std::iter::once(path)
            .chain(relative)
            .any(|candidate| self.matches_glob(candidate))
    }

    /// Check the file and each of its parent directories
    fn matches_glob(&self, path: &Path) -> bool {
        path.ancestors()
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .enumerate()
            .any(|(depth, ancestor)| self.ignore.matched(ancestor, depth > 0).is_ignore())
    }

    fn is_in_workspace(&self, path: &Path) -> bool {
        self.workspace_roots.iter().any(|root| path.starts_with(root))
    }

    fn is_third_party(&self, path: &Path) -> bool {
        let in_env_dir = path.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            self.third_party_dirs.iter().any(|dir| *dir == name)
        });

        in_env_dir || self.environment_paths.iter().any(|env| path.starts_with(env))
    }
}
