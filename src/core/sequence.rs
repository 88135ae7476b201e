//! The sequence model produced by one diagram request

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;
use super::participants::{Participant, ParticipantRegistry};
use super::renderer::PlantUmlRenderer;

/// Dotted path of 1-based ordinals, e.g. `2.1.3`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(Vec<u32>);

impl SequenceNumber {
    /// Number of the `ordinal`-th call below `self`; the empty parent is the root
    pub fn child(&self, ordinal: u32) -> Self {
        let mut parts = self.0.clone();
        parts.push(ordinal);
        Self(parts)
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Whether `self` lies strictly below `ancestor` in the call tree
    #[cfg(test)]
    pub fn extends(&self, ancestor: &SequenceNumber) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl Ord for SequenceNumber {
    /// Component-wise numeric comparison, so `2.10` sorts after `2.9`
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for SequenceNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Call,
    Return,
    /// Annotation on the target lifeline, e.g. a depth cut-off
    Note,
}

/// One diagram statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMessage {
    /// Participant id
    pub from: String,
    /// Participant id
    pub to: String,
    pub label: String,
    pub sequence_number: SequenceNumber,
    pub kind: MessageKind,
}

/// The function a diagram starts from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub class_name: Option<String>,
    pub uri: PathBuf,
    /// Path relative to the workspace root
    pub relative_path: String,
}

#[derive(Debug, Clone)]
pub struct SequenceModel {
    pub entry_point: EntryPoint,
    pub participants: ParticipantRegistry,
    pub messages: Vec<SequenceMessage>,
}

#[derive(Serialize)]
struct SequenceExport<'a> {
    generated_at: String,
    entry_point: &'a EntryPoint,
    participants: &'a [Participant],
    messages: &'a [SequenceMessage],
}

impl SequenceModel {
    pub fn new(entry_point: EntryPoint) -> Self {
        Self {
            entry_point,
            participants: ParticipantRegistry::new(),
            messages: Vec::new(),
        }
    }

    /// Render with the default PlantUML layout
    pub fn serialize(&self) -> Result<String> {
        self.serialize_with(&PlantUmlRenderer::new()?)
    }

    /// Render through a configured renderer (custom templates, numbering)
    pub fn serialize_with(&self, renderer: &PlantUmlRenderer) -> Result<String> {
        renderer.render(self)
    }

    /// JSON export of the structured model
    pub fn to_json(&self) -> Result<String> {
        let export = SequenceExport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            entry_point: &self.entry_point,
            participants: self.participants.all(),
            messages: &self.messages,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// `<entry>_<Class>_<relative_path>` with path separators flattened
    pub fn suggested_file_name(&self, extension: &str) -> String {
        let mut parts = vec![self.entry_point.name.clone()];
        if let Some(class_name) = &self.entry_point.class_name {
            parts.push(class_name.clone());
        }
        if !self.entry_point.relative_path.is_empty() {
            parts.push(
                self.entry_point
                    .relative_path
                    .replace(['/', '\\', '.'], "_"),
            );
        }
        format!("{}.{}", parts.join("_"), extension)
    }

    pub fn call_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.kind == MessageKind::Call)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(parts: &[u32]) -> SequenceNumber {
        parts
            .iter()
            .fold(SequenceNumber::root(), |acc, &part| acc.child(part))
    }

    #[test]
    fn test_sequence_number_display() {
        assert_eq!(number(&[2, 1, 3]).to_string(), "2.1.3");
        assert_eq!(number(&[1]).to_string(), "1");
        assert_eq!(SequenceNumber::root().to_string(), "");
    }

    #[test]
    fn test_sequence_number_ordering_is_numeric() {
        assert!(number(&[2, 9]) < number(&[2, 10]));
        assert!(number(&[2]) < number(&[2, 1]));
        assert!(number(&[2, 1, 5]) < number(&[3]));
        assert!(number(&[10]) > number(&[9, 9, 9]));
    }

    #[test]
    fn test_extends() {
        assert!(number(&[2, 1]).extends(&number(&[2])));
        assert!(!number(&[2]).extends(&number(&[2])));
        assert!(!number(&[3, 1]).extends(&number(&[2])));
    }

    #[test]
    fn test_suggested_file_name() {
        let model = SequenceModel::new(EntryPoint {
            name: "run".to_string(),
            class_name: Some("Worker".to_string()),
            uri: PathBuf::from("/proj/app/jobs/worker.py"),
            relative_path: "app/jobs/worker.py".to_string(),
        });
        assert_eq!(model.suggested_file_name("puml"), "run_Worker_app_jobs_worker_py.puml");
    }

    #[test]
    fn test_json_export() {
        let mut model = SequenceModel::new(EntryPoint {
            name: "main".to_string(),
            class_name: None,
            uri: PathBuf::from("main.py"),
            relative_path: "main.py".to_string(),
        });
        model.messages.push(SequenceMessage {
            from: "p1".to_string(),
            to: "p2".to_string(),
            label: "go()".to_string(),
            sequence_number: number(&[1]),
            kind: MessageKind::Call,
        });

        let json: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(json["entry_point"]["name"], "main");
        assert_eq!(json["messages"][0]["kind"], "call");
        assert_eq!(json["messages"][0]["sequence_number"], serde_json::json!([1]));
        assert!(json["generated_at"].is_string());
    }
}
