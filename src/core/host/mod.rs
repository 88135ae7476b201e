//! Capabilities the diagram core consumes from its host
//!
//! The host owns symbol resolution: it knows where functions are declared,
//! which functions a function calls, and the source text behind every file.
//! The core never parses a language itself beyond raw-text heuristics.

mod python;

pub use python::PythonWorkspace;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use super::source::{Position, Range, SourceDocument};

/// Kind of symbol a call-hierarchy item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Method,
    Property,
    Class,
    Variable,
    Module,
    Other,
}

impl SymbolKind {
    /// Kinds that execute code when referenced
    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method | SymbolKind::Property)
    }
}

/// A function-like declaration the call hierarchy can start from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallHierarchyItem {
    pub name: String,
    pub kind: SymbolKind,
    pub uri: PathBuf,
    /// Whole declaration
    pub range: Range,
    /// The declared name only
    pub selection_range: Range,
    pub detail: Option<String>,
}

impl CallHierarchyItem {
    /// `uri:line:name`, used in log lines
    pub fn describe(&self) -> String {
        format!(
            "{}:{}:{}",
            self.uri.display(),
            self.selection_range.start.line + 1,
            self.name
        )
    }
}

/// All calls from one caller to one callee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingCall {
    pub to: CallHierarchyItem,
    /// Position of the callee's name at every call site
    pub from_ranges: Vec<Range>,
}

/// Symbol and text provider backing a diagram request
#[async_trait]
pub trait CallHierarchyHost: Send + Sync {
    /// Function-like items declared at a position
    async fn prepare_call_hierarchy(
        &self,
        uri: &Path,
        position: Position,
    ) -> Result<Vec<CallHierarchyItem>>;

    /// Calls made by `item`, grouped by callee
    async fn outgoing_calls(&self, item: &CallHierarchyItem) -> Result<Vec<OutgoingCall>>;

    /// Name of the nearest enclosing class/type of a declaration
    async fn declaration_container_name(
        &self,
        uri: &Path,
        position: Position,
    ) -> Result<Option<String>>;

    /// Full text of a file
    async fn source_text(&self, uri: &Path) -> Result<Arc<SourceDocument>>;
}
