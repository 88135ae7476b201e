//! Call-site analysis over raw source text
//!
//! Works from positions and characters only: whether a referenced name is
//! actually invoked, which object it is invoked on, and the balanced
//! argument text that follows it.

use serde::{Deserialize, Serialize};

use super::host::CallHierarchyItem;
use super::source::{Position, Range, SourceDocument};

/// The object a call is made on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvokedObject {
    /// Bare call, resolved against the callee's module
    Module,
    /// Call through a self-reference; same object as the caller
    SameAsCaller,
    /// Dotted qualifier such as `repo` or `a.b`
    Named(String),
}

/// Balanced-parenthesis text following a call name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpan {
    /// Text between the parentheses, exclusive
    pub text: String,
    /// From just after `(` to the matching `)`
    pub range: Range,
    /// False when the document ended before the parenthesis closed
    pub closed: bool,
}

/// What the analyzer learns about a single reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteAnalysis {
    pub is_function_call: bool,
    pub invoked_object: InvokedObject,
    pub arguments: Option<ArgumentSpan>,
}

/// One concrete invocation of a callee inside a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub target: CallHierarchyItem,
    pub source_range: Range,
    pub is_function_call: bool,
    pub invoked_object: InvokedObject,
    pub argument_text: String,
    pub argument_range: Option<Range>,
}

impl CallSite {
    pub fn new(target: CallHierarchyItem, source_range: Range, analysis: CallSiteAnalysis) -> Self {
        let (argument_text, argument_range) = match analysis.arguments {
            Some(span) => (span.text, Some(span.range)),
            None => (String::new(), None),
        };

        Self {
            target,
            source_range,
            is_function_call: analysis.is_function_call,
            invoked_object: analysis.invoked_object,
            argument_text,
            argument_range,
        }
    }

    /// Whether this call is evaluated as part of `outer`'s argument list
    pub fn is_nested_in(&self, outer: &CallSite) -> bool {
        outer
            .argument_range
            .is_some_and(|args| args.contains_range(&self.source_range))
    }
}

/// Heuristic analyzer for call sites in raw source text
#[derive(Debug, Clone)]
pub struct CallSiteAnalyzer {
    self_tokens: Vec<String>,
}

impl CallSiteAnalyzer {
    pub fn new(self_tokens: Vec<String>) -> Self {
        Self { self_tokens }
    }

    pub fn analyze(&self, document: &SourceDocument, name_range: Range) -> CallSiteAnalysis {
        let is_function_call = Self::is_function_call(document, name_range);
        if !is_function_call {
            return CallSiteAnalysis {
                is_function_call,
                invoked_object: InvokedObject::Module,
                arguments: None,
            };
        }

        CallSiteAnalysis {
            is_function_call,
            invoked_object: self.invoked_object(document, name_range),
            arguments: Self::extract_arguments(document, name_range),
        }
    }

    /// A name is invoked when `(` follows it, possibly after whitespace and
    /// line breaks.
    pub fn is_function_call(document: &SourceDocument, name_range: Range) -> bool {
        if document.char_at(name_range.end) == Some('(') {
            return true;
        }

        document
            .chars_from(name_range.end)
            .find(|(_, c)| !c.is_whitespace())
            .is_some_and(|(_, c)| c == '(')
    }

    /// Dotted qualifier immediately before the name, normalized for
    /// self-references.
    pub fn invoked_object(&self, document: &SourceDocument, name_range: Range) -> InvokedObject {
        let start = name_range.start;
        if document.char_before(start) != Some('.') {
            return InvokedObject::Module;
        }

        let Some(line) = document.line(start.line) else {
            return InvokedObject::Module;
        };
        let dot = (start.character as usize).saturating_sub(1);
        let run_start = line[..dot]
            .iter()
            .rposition(|&c| !is_qualifier_char(c))
            .map_or(0, |i| i + 1);
        let qualifier: String = line[run_start..dot].iter().collect();
        let qualifier = qualifier.trim_matches('.');

        self.normalize_qualifier(qualifier)
    }

    fn normalize_qualifier(&self, qualifier: &str) -> InvokedObject {
        if qualifier.is_empty() {
            return InvokedObject::Module;
        }

        for token in &self.self_tokens {
            if qualifier == token {
                return InvokedObject::SameAsCaller;
            }
            if let Some(rest) = qualifier
                .strip_prefix(token.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
            {
                return InvokedObject::Named(rest.to_string());
            }
        }

        InvokedObject::Named(qualifier.to_string())
    }

    /// Balanced argument text after the name. Returns `None` when something
    /// other than whitespace precedes the opening parenthesis. An unclosed
    /// parenthesis yields whatever was collected up to the end of the document.
    pub fn extract_arguments(document: &SourceDocument, name_range: Range) -> Option<ArgumentSpan> {
        let mut chars = document.chars_from(name_range.end);

        let open = loop {
            let (position, c) = chars.next()?;
            match c {
                '(' => break position,
                c if c.is_whitespace() => continue,
                _ => return None,
            }
        };

        let start = Position::new(open.line, open.character + 1);
        let mut depth = 1usize;
        let mut text = String::new();
        let mut last = start;

        for (position, c) in chars {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(ArgumentSpan {
                            text,
                            range: Range::new(start, position),
                            closed: true,
                        });
                    }
                }
                _ => {}
            }
            text.push(c);
            last = position;
        }

        // trailing '\n' belongs to the synthetic end of the last line
        if text.ends_with('\n') {
            text.pop();
        }
        Some(ArgumentSpan {
            text,
            range: Range::new(start, last),
            closed: false,
        })
    }
}

impl Default for CallSiteAnalyzer {
    fn default() -> Self {
        Self::new(vec!["self".to_string()])
    }
}

fn is_qualifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}
