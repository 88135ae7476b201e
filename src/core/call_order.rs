//! Chronological ordering of a function's outgoing calls
//!
//! Hosts report calls grouped by callee. Diagrams need them per occurrence,
//! in evaluation order: textual order, except that a call written inside
//! another call's argument list runs before that outer call.

use tracing::debug;

use super::call_site::{CallSite, CallSiteAnalyzer};
use super::host::OutgoingCall;
use super::source::SourceDocument;

pub struct CallOrderReconstructor {
    analyzer: CallSiteAnalyzer,
}

impl CallOrderReconstructor {
    pub fn new(analyzer: CallSiteAnalyzer) -> Self {
        Self { analyzer }
    }

    /// One call site per source range, analyzed against the caller's text
    pub fn flatten(&self, caller_text: &SourceDocument, grouped: Vec<OutgoingCall>) -> Vec<CallSite> {
        grouped
            .into_iter()
            .flat_map(|call| {
                let target = call.to;
                call.from_ranges
                    .into_iter()
                    .map(move |range| (target.clone(), range))
            })
            .map(|(target, range)| {
                let analysis = self.analyzer.analyze(caller_text, range);
                CallSite::new(target, range, analysis)
            })
            .collect()
    }

    /// Flatten and put into evaluation order
    pub fn order(&self, caller_text: &SourceDocument, grouped: Vec<OutgoingCall>) -> Vec<CallSite> {
        let calls = self.flatten(caller_text, grouped);
        debug!(
            "Ordering {} call sites in {}",
            calls.len(),
            caller_text.uri().display()
        );
        evaluation_order(calls)
    }
}

/// Sort by position, then emit each call only after every call nested in its
/// argument list. Equivalent to comparing "A nested in B ⇒ A first, otherwise
/// by start position", but never inconsistent on malformed ranges.
pub fn evaluation_order(mut calls: Vec<CallSite>) -> Vec<CallSite> {
    calls.sort_by_key(|call| call.source_range.start);

    let mut ordered = Vec::with_capacity(calls.len());
    let mut pending: Vec<CallSite> = Vec::new();

    for call in calls {
        while pending.last().is_some_and(|outer| !call.is_nested_in(outer)) {
            if let Some(finished) = pending.pop() {
                ordered.push(finished);
            }
        }
        pending.push(call);
    }

    while let Some(finished) = pending.pop() {
        ordered.push(finished);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::{CallHierarchyItem, SymbolKind};
    use crate::core::source::{Position, Range};
    use std::path::PathBuf;

    fn target(name: &str) -> CallHierarchyItem {
        let range = Range::new(Position::new(0, 0), Position::new(0, 1));
        CallHierarchyItem {
            name: name.to_string(),
            kind: SymbolKind::Function,
            uri: PathBuf::from("lib.py"),
            range,
            selection_range: range,
            detail: None,
        }
    }

    /// Every whole-word occurrence of `name` in the document
    fn ranges_of(doc: &SourceDocument, name: &str) -> Vec<Range> {
        let mut ranges = Vec::new();
        for line in 0..doc.line_count() as u32 {
            let text = doc.line_text(line);
            let mut from = 0;
            while let Some(found) = text[from..].find(name) {
                let byte = from + found;
                let start = text[..byte].chars().count() as u32;
                let len = name.chars().count() as u32;
                ranges.push(Range::new(Position::new(line, start), Position::new(line, start + len)));
                from = byte + name.len();
            }
        }
        ranges
    }

    fn grouped(doc: &SourceDocument, names: &[&str]) -> Vec<OutgoingCall> {
        names
            .iter()
            .map(|name| OutgoingCall {
                to: target(name),
                from_ranges: ranges_of(doc, name),
            })
            .collect()
    }

    fn order_names(source: &str, names: &[&str]) -> Vec<String> {
        let doc = SourceDocument::new("main.py", source);
        let reconstructor = CallOrderReconstructor::new(CallSiteAnalyzer::default());
        reconstructor
            .order(&doc, grouped(&doc, names))
            .into_iter()
            .map(|call| call.target.name)
            .collect()
    }

    #[test]
    fn test_flatten_expands_each_range() {
        let doc = SourceDocument::new("main.py", "load()\nsave()\nload()\n");
        let reconstructor = CallOrderReconstructor::new(CallSiteAnalyzer::default());
        let calls = reconstructor.flatten(&doc, grouped(&doc, &["load", "save"]));

        assert_eq!(calls.len(), 3);
        assert_eq!(calls.iter().filter(|c| c.target.name == "load").count(), 2);
    }

    #[test]
    fn test_textual_order_across_groups() {
        // grouped by callee: `save` group first, but `load` is called first
        let names = order_names("load()\nsave()\nload()\n", &["save", "load"]);
        assert_eq!(names, vec!["load", "save", "load"]);
    }

    #[test]
    fn test_nested_argument_runs_first() {
        let names = order_names("outer(inner(x))\n", &["outer", "inner"]);
        assert_eq!(names, vec!["inner", "outer"]);
    }

    #[test]
    fn test_deeply_nested_and_siblings() {
        let names = order_names(
            "first()\nouter(mid(leaf()), other())\nlast()\n",
            &["first", "outer", "mid", "leaf", "other", "last"],
        );
        assert_eq!(names, vec!["first", "leaf", "mid", "other", "outer", "last"]);
    }

    #[test]
    fn test_multiline_argument_list() {
        let names = order_names(
            "submit(\n    build(a),\n    b,\n)\nnotify()\n",
            &["notify", "submit", "build"],
        );
        assert_eq!(names, vec!["build", "submit", "notify"]);
    }

    #[test]
    fn test_unclosed_arguments_do_not_panic() {
        let names = order_names("broken(a, helper(\nafter()", &["broken", "helper", "after"]);
        assert_eq!(names.len(), 3);
        assert_eq!(names.last().map(String::as_str), Some("broken"));
    }
}
