//! Call hierarchy over a Python workspace, backed by tree-sitter
//!
//! The workspace is indexed once when opened: every `.py` file under the
//! roots is parsed and each function body's name references are recorded.
//! Name resolution is a heuristic by design of the host, not a type checker:
//! receivers like `self` resolve against the enclosing class, a class name
//! resolves against that class, and anything else prefers the caller's own
//! file before the first definition in path order.

use async_trait::async_trait;
use ignore::WalkBuilder;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use tree_sitter::{Node, Parser, Point};

use crate::core::source::{Position, Range, SourceDocument};
use crate::error::{CallseqError, Result};
use super::{CallHierarchyHost, CallHierarchyItem, OutgoingCall, SymbolKind};

/// Receivers that refer to the enclosing class
const RECEIVER_NAMES: &[&str] = &["self", "cls"];

/// A name used inside a function body
#[derive(Debug, Clone)]
struct Reference {
    name: String,
    /// Dotted receiver text, when the name is accessed through one
    qualifier: Option<String>,
    range: Range,
}

#[derive(Debug, Clone)]
struct Definition {
    item: CallHierarchyItem,
    /// Class whose body declares this function directly
    class_name: Option<String>,
    references: Vec<Reference>,
}

pub struct PythonWorkspace {
    definitions: Vec<Definition>,
    by_name: HashMap<String, Vec<usize>>,
    class_names: HashSet<String>,
    documents: RwLock<HashMap<PathBuf, Arc<SourceDocument>>>,
    class_line: Regex,
}

impl PythonWorkspace {
    /// Index every Python file below `roots`, honouring `.gitignore`
    pub fn open(roots: &[PathBuf]) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
            .map_err(|e| CallseqError::Parser(format!("Failed to set Python language: {}", e)))?;

        let mut files = Vec::new();
        for root in roots {
            let walker = WalkBuilder::new(root)
                .hidden(false)
                .git_ignore(true)
                .filter_entry(|entry| entry.file_name() != ".git")
                .build();

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                        continue;
                    }
                };
                let path = entry.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "py") {
                    files.push(path.to_path_buf());
                }
            }
        }
        files.sort();
        files.dedup();

        let mut documents = HashMap::new();
        let mut definitions = Vec::new();
        for path in files {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            match scan_module(&mut parser, &path, &text) {
                Ok(found) => {
                    debug!("{}: {} functions", path.display(), found.len());
                    definitions.extend(found);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
            documents.insert(path.clone(), Arc::new(SourceDocument::new(path, &text)));
        }

        info!(
            "Indexed {} functions in {} Python files",
            definitions.len(),
            documents.len()
        );
        Self::from_parts(definitions, documents)
    }

    fn from_parts(
        mut definitions: Vec<Definition>,
        documents: HashMap<PathBuf, Arc<SourceDocument>>,
    ) -> Result<Self> {
        definitions.sort_by(|a, b| {
            (&a.item.uri, a.item.range.start).cmp(&(&b.item.uri, b.item.range.start))
        });

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut class_names = HashSet::new();
        for (index, definition) in definitions.iter().enumerate() {
            by_name
                .entry(definition.item.name.clone())
                .or_default()
                .push(index);
            if let Some(class_name) = &definition.class_name {
                class_names.insert(class_name.clone());
            }
        }

        let class_line = Regex::new(r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)")
            .map_err(|e| CallseqError::Parser(e.to_string()))?;

        Ok(Self {
            definitions,
            by_name,
            class_names,
            documents: RwLock::new(documents),
            class_line,
        })
    }

    #[cfg(test)]
    pub fn function_count(&self) -> usize {
        self.definitions.len()
    }

    fn find(&self, item: &CallHierarchyItem) -> Option<&Definition> {
        self.definitions.iter().find(|definition| {
            definition.item.uri == item.uri
                && definition.item.selection_range.start == item.selection_range.start
        })
    }

    /// Index of the definition a reference most likely points at
    fn resolve(&self, caller: &Definition, reference: &Reference) -> Option<usize> {
        let candidates = self.by_name.get(&reference.name)?.iter().copied();
        let same_file_first = |&index: &usize| self.definitions[index].item.uri != caller.item.uri;

        match reference.qualifier.as_deref() {
            Some(receiver) if RECEIVER_NAMES.contains(&receiver) => {
                let class_name = caller.class_name.as_deref()?;
                candidates
                    .filter(|&index| self.definitions[index].class_name.as_deref() == Some(class_name))
                    .min_by_key(same_file_first)
            }
            Some(class_name) if self.class_names.contains(class_name) => candidates
                .filter(|&index| self.definitions[index].class_name.as_deref() == Some(class_name))
                .min_by_key(same_file_first),
            _ => candidates.min_by_key(same_file_first),
        }
    }

    /// Walk upward for the nearest less-indented `class` line
    fn container_from_text(&self, document: &SourceDocument, line: u32) -> Option<String> {
        let mut indent = indentation(&document.line_text(line));
        if indent == 0 {
            return None;
        }

        for above in (0..line).rev() {
            let text = document.line_text(above);
            let trimmed = text.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let level = indentation(&text);
            if level >= indent {
                continue;
            }
            if let Some(captures) = self.class_line.captures(&text) {
                return Some(captures[1].to_string());
            }
            if trimmed.starts_with("def ") || trimmed.starts_with("async def ") {
                return None;
            }

            indent = level;
            if indent == 0 {
                break;
            }
        }
        None
    }
}

#[async_trait]
impl CallHierarchyHost for PythonWorkspace {
    async fn prepare_call_hierarchy(
        &self,
        uri: &Path,
        position: Position,
    ) -> Result<Vec<CallHierarchyItem>> {
        // innermost function whose lines cover the position
        let item = self
            .definitions
            .iter()
            .filter(|definition| {
                definition.item.uri == uri
                    && definition.item.range.start.line <= position.line
                    && position.line <= definition.item.range.end.line
            })
            .max_by_key(|definition| definition.item.range.start)
            .map(|definition| definition.item.clone());

        Ok(item.into_iter().collect())
    }

    async fn outgoing_calls(&self, item: &CallHierarchyItem) -> Result<Vec<OutgoingCall>> {
        let caller = self.find(item).ok_or_else(|| CallseqError::NodeAnalysis {
            node: item.describe(),
            reason: "not an indexed Python function".to_string(),
        })?;

        let mut grouped: Vec<OutgoingCall> = Vec::new();
        let mut slots: HashMap<usize, usize> = HashMap::new();

        for reference in &caller.references {
            let Some(target) = self.resolve(caller, reference) else {
                continue;
            };
            match slots.get(&target) {
                Some(&slot) => grouped[slot].from_ranges.push(reference.range),
                None => {
                    slots.insert(target, grouped.len());
                    grouped.push(OutgoingCall {
                        to: self.definitions[target].item.clone(),
                        from_ranges: vec![reference.range],
                    });
                }
            }
        }

        Ok(grouped)
    }

    async fn declaration_container_name(
        &self,
        uri: &Path,
        position: Position,
    ) -> Result<Option<String>> {
        let document = self.source_text(uri).await?;
        Ok(self.container_from_text(&document, position.line))
    }

    async fn source_text(&self, uri: &Path) -> Result<Arc<SourceDocument>> {
        let cached = self.documents.read().await.get(uri).cloned();
        if let Some(document) = cached {
            return Ok(document);
        }

        let text = tokio::fs::read_to_string(uri).await?;
        let document = Arc::new(SourceDocument::new(uri, &text));
        self.documents
            .write()
            .await
            .insert(uri.to_path_buf(), document.clone());
        Ok(document)
    }
}

fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn scan_module(parser: &mut Parser, path: &Path, source: &str) -> Result<Vec<Definition>> {
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CallseqError::Parser(format!("Failed to parse {}", path.display())))?;

    let mut scan = ModuleScan {
        path,
        source,
        lines: source.split('\n').collect(),
        definitions: Vec::new(),
    };
    scan.visit_block(tree.root_node(), None, false);
    Ok(scan.definitions)
}

/// Collects definitions from one parsed module
struct ModuleScan<'a> {
    path: &'a Path,
    source: &'a str,
    lines: Vec<&'a str>,
    definitions: Vec<Definition>,
}

impl<'a> ModuleScan<'a> {
    fn visit_block(&mut self, node: Node, class_name: Option<&str>, in_class_body: bool) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_statement(child, class_name, in_class_body, false);
        }
    }

    fn visit_statement(
        &mut self,
        node: Node,
        class_name: Option<&str>,
        in_class_body: bool,
        is_property: bool,
    ) {
        match node.kind() {
            "class_definition" => {
                let name = node.child_by_field_name("name").map(|n| self.text(n));
                if let (Some(name), Some(body)) = (name, node.child_by_field_name("body")) {
                    self.visit_block(body, Some(name), true);
                }
            }
            "function_definition" => {
                self.visit_function(node, class_name, in_class_body, is_property);
            }
            "decorated_definition" => {
                let is_property = self.has_property_decorator(node);
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.visit_statement(definition, class_name, in_class_body, is_property);
                }
            }
            _ => {
                // compound statements (if/try/with) may still hold definitions
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    self.visit_statement(child, class_name, in_class_body, false);
                }
            }
        }
    }

    fn visit_function(
        &mut self,
        node: Node,
        class_name: Option<&str>,
        in_class_body: bool,
        is_property: bool,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };

        let kind = if is_property {
            SymbolKind::Property
        } else if in_class_body {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };
        let owner = if in_class_body { class_name } else { None };

        let mut references = Vec::new();
        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.collect_references(child, &mut references);
            }
        }
        references.sort_by_key(|reference| reference.range.start);
        references.dedup_by_key(|reference| reference.range.start);

        self.definitions.push(Definition {
            item: CallHierarchyItem {
                name: self.text(name_node).to_string(),
                kind,
                uri: self.path.to_path_buf(),
                range: self.range(node),
                selection_range: self.range(name_node),
                detail: owner.map(str::to_string),
            },
            class_name: owner.map(str::to_string),
            references,
        });

        // nested functions are plain functions, whatever encloses them
        if let Some(body) = body {
            self.visit_block(body, None, false);
        }
    }

    /// Name references in a body, without entering nested definitions
    fn collect_references(&self, node: Node, references: &mut Vec<Reference>) {
        match node.kind() {
            "function_definition" | "class_definition" => return,
            "call" => {
                if let Some(function) = node.child_by_field_name("function") {
                    self.push_reference(function, references);
                }
            }
            "attribute" => self.push_reference(node, references),
            "identifier" => {
                let passed_as_value = node.parent().is_some_and(|parent| {
                    matches!(
                        parent.kind(),
                        "argument_list" | "assignment" | "return_statement" | "keyword_argument"
                    )
                });
                if passed_as_value {
                    self.push_reference(node, references);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_references(child, references);
        }
    }

    fn push_reference(&self, node: Node, references: &mut Vec<Reference>) {
        match node.kind() {
            "identifier" => references.push(Reference {
                name: self.text(node).to_string(),
                qualifier: None,
                range: self.range(node),
            }),
            "attribute" => {
                let Some(attribute) = node.child_by_field_name("attribute") else {
                    return;
                };
                let qualifier = node
                    .child_by_field_name("object")
                    .filter(|object| matches!(object.kind(), "identifier" | "attribute"))
                    .map(|object| self.text(object).to_string());
                references.push(Reference {
                    name: self.text(attribute).to_string(),
                    qualifier,
                    range: self.range(attribute),
                });
            }
            _ => {}
        }
    }

    fn has_property_decorator(&self, node: Node) -> bool {
        let mut cursor = node.walk();
        let found = node
            .children(&mut cursor)
            .filter(|child| child.kind() == "decorator")
            .any(|decorator| {
                self.text(decorator)
                    .trim_start_matches('@')
                    .trim()
                    .ends_with("property")
            });
        found
    }

    fn text(&self, node: Node) -> &'a str {
        &self.source[node.byte_range()]
    }

    fn range(&self, node: Node) -> Range {
        Range::new(
            self.position(node.start_position()),
            self.position(node.end_position()),
        )
    }

    /// tree-sitter columns are byte offsets; positions count characters
    fn position(&self, point: Point) -> Position {
        let character = self
            .lines
            .get(point.row)
            .and_then(|line| line.get(..point.column))
            .map_or(point.column, |prefix| prefix.chars().count());
        Position::new(point.row as u32, character as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    const A_PY: &str = "from app.b import B


class A:
    def __init__(self):
        self.b = B()

    def run(self):
        self.b.fetch(1)
        self.helper()

    def helper(self):
        log(\"done\")

    @property
    def size(self):
        return 1


def log(message):
    print(message)
";

    const B_PY: &str = "class B:
    def fetch(self, key):
        return key
";

    fn workspace(files: &[(&str, &str)]) -> (TempDir, PythonWorkspace) {
        let temp = TempDir::new().unwrap();
        for (name, text) in files {
            temp.child(name).write_str(text).unwrap();
        }
        let workspace = PythonWorkspace::open(&[temp.path().to_path_buf()]).unwrap();
        (temp, workspace)
    }

    async fn item_at(workspace: &PythonWorkspace, uri: &Path, line: u32) -> CallHierarchyItem {
        let items = workspace
            .prepare_call_hierarchy(uri, Position::new(line, 0))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        items.into_iter().next().unwrap()
    }

    #[tokio::test]
    async fn test_indexes_functions_and_kinds() {
        let (temp, workspace) = workspace(&[("app/a.py", A_PY), ("app/b.py", B_PY), ("notes.txt", "x")]);
        assert_eq!(workspace.function_count(), 6);

        let a = temp.path().join("app/a.py");
        let run = item_at(&workspace, &a, 8).await;
        assert_eq!(run.name, "run");
        assert_eq!(run.kind, SymbolKind::Method);
        assert_eq!(run.selection_range.start, Position::new(7, 8));

        assert_eq!(item_at(&workspace, &a, 16).await.kind, SymbolKind::Property);
        assert_eq!(item_at(&workspace, &a, 20).await.kind, SymbolKind::Function);

        let outside = workspace
            .prepare_call_hierarchy(&a, Position::new(0, 0))
            .await
            .unwrap();
        assert!(outside.is_empty());
    }

    #[tokio::test]
    async fn test_outgoing_calls_resolve_receivers() {
        let (temp, workspace) = workspace(&[("app/a.py", A_PY), ("app/b.py", B_PY)]);
        let a = temp.path().join("app/a.py");

        let run = item_at(&workspace, &a, 7).await;
        let calls = workspace.outgoing_calls(&run).await.unwrap();
        let targets: Vec<(&str, u32, u32)> = calls
            .iter()
            .map(|call| (call.to.name.as_str(), call.from_ranges[0].start.line, call.from_ranges[0].start.character))
            .collect();
        assert_eq!(targets, vec![("fetch", 8, 15), ("helper", 9, 13)]);
        assert_eq!(calls[0].to.uri, temp.path().join("app/b.py"));

        let helper = item_at(&workspace, &a, 11).await;
        let calls = workspace.outgoing_calls(&helper).await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to.name, "log");
        assert_eq!(calls[0].to.kind, SymbolKind::Function);
    }

    #[tokio::test]
    async fn test_calls_grouped_by_target() {
        let (temp, workspace) = workspace(&[(
            "m.py",
            "def save():\n    pass\n\ndef main():\n    save()\n    other = save\n    save()\n",
        )]);
        let main = item_at(&workspace, &temp.path().join("m.py"), 3).await;
        let calls = workspace.outgoing_calls(&main).await.unwrap();

        assert_eq!(calls.len(), 1);
        let lines: Vec<u32> = calls[0].from_ranges.iter().map(|r| r.start.line).collect();
        assert_eq!(lines, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_nested_definitions_are_separate() {
        let (temp, workspace) = workspace(&[(
            "m.py",
            "def hidden():\n    pass\n\ndef visible():\n    pass\n\ndef outer():\n    def inner():\n        hidden()\n    visible()\n",
        )]);
        let path = temp.path().join("m.py");

        let outer = item_at(&workspace, &path, 6).await;
        let calls = workspace.outgoing_calls(&outer).await.unwrap();
        let names: Vec<&str> = calls.iter().map(|c| c.to.name.as_str()).collect();
        assert_eq!(names, vec!["visible"]);

        let inner = item_at(&workspace, &path, 8).await;
        assert_eq!(inner.name, "inner");
        assert_eq!(workspace.outgoing_calls(&inner).await.unwrap()[0].to.name, "hidden");
    }

    #[tokio::test]
    async fn test_positions_count_characters() {
        let (temp, workspace) = workspace(&[(
            "m.py",
            "def hello():\n    pass\n\ndef greet():\n    s = 'é'; hello()\n",
        )]);
        let greet = item_at(&workspace, &temp.path().join("m.py"), 3).await;
        let calls = workspace.outgoing_calls(&greet).await.unwrap();
        assert_eq!(calls[0].from_ranges[0].start, Position::new(4, 13));
    }

    #[tokio::test]
    async fn test_declaration_container_name() {
        let (temp, workspace) = workspace(&[("app/a.py", A_PY)]);
        let a = temp.path().join("app/a.py");

        let container = workspace
            .declaration_container_name(&a, Position::new(15, 8))
            .await
            .unwrap();
        assert_eq!(container.as_deref(), Some("A"));

        let module_level = workspace
            .declaration_container_name(&a, Position::new(19, 4))
            .await
            .unwrap();
        assert_eq!(module_level, None);
    }

    #[tokio::test]
    async fn test_source_text_falls_back_to_disk() {
        let (temp, workspace) = workspace(&[("app/a.py", A_PY)]);
        temp.child("README.md").write_str("hello\nworld\n").unwrap();

        let cached = workspace.source_text(&temp.path().join("app/a.py")).await.unwrap();
        assert_eq!(cached.line_text(3), "class A:");

        let fresh = workspace.source_text(&temp.path().join("README.md")).await.unwrap();
        assert_eq!(fresh.line_text(1), "world");

        let missing = workspace.source_text(&temp.path().join("nope.py")).await;
        assert!(matches!(missing, Err(CallseqError::Io(_))));
    }

    #[tokio::test]
    async fn test_unknown_item_is_an_analysis_error() {
        let (temp, workspace) = workspace(&[("app/b.py", B_PY)]);
        let mut item = item_at(&workspace, &temp.path().join("app/b.py"), 1).await;
        item.selection_range.start = Position::new(40, 0);

        let result = workspace.outgoing_calls(&item).await;
        assert!(matches!(result, Err(CallseqError::NodeAnalysis { .. })));
    }
}
