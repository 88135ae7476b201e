//! PlantUML rendering of a sequence model
//!
//! The layout lives in a Tera template so it can be swapped without touching
//! the traversal. Message lines are assembled here; the template only places
//! them.

use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};
use tracing::debug;

use crate::error::Result;
use super::sequence::{MessageKind, SequenceMessage, SequenceModel};

const TEMPLATE_NAME: &str = "sequence.puml";
const TEMPLATE_FILE: &str = "sequence.puml.tera";

const DEFAULT_TEMPLATE: &str = r#"@startuml
{% if title %}title {{ title }}
{% endif %}{% for participant in participants %}participant "{{ participant.display }}" as {{ participant.id }}
{% endfor %}
{% for line in messages %}{{ line }}
{% endfor %}@enduml
"#;

#[derive(Serialize)]
struct ParticipantView<'a> {
    id: &'a str,
    display: String,
}

pub struct PlantUmlRenderer {
    tera: Tera,
    omit_sequence_numbers: bool,
}

impl PlantUmlRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, DEFAULT_TEMPLATE)?;
        Ok(Self {
            tera,
            omit_sequence_numbers: false,
        })
    }

    /// Use `sequence.puml.tera` from `dir` when present
    pub fn with_template_dir(mut self, dir: &Path) -> Result<Self> {
        let path = dir.join(TEMPLATE_FILE);
        if path.exists() {
            debug!("Using custom template {}", path.display());
            self.tera.add_template_file(&path, Some(TEMPLATE_NAME))?;
        }
        Ok(self)
    }

    pub fn omit_sequence_numbers(mut self, omit: bool) -> Self {
        self.omit_sequence_numbers = omit;
        self
    }

    pub fn render(&self, model: &SequenceModel) -> Result<String> {
        let participants: Vec<ParticipantView> = model
            .participants
            .all()
            .iter()
            .map(|p| ParticipantView {
                id: &p.id,
                display: escape(&p.display_name),
            })
            .collect();

        let messages: Vec<String> = model
            .messages
            .iter()
            .flat_map(|message| self.message_lines(message))
            .collect();

        let title = match &model.entry_point.class_name {
            Some(class_name) => format!("{}.{}", class_name, model.entry_point.name),
            None => model.entry_point.name.clone(),
        };

        let mut context = Context::new();
        context.insert("title", &title);
        context.insert("participants", &participants);
        context.insert("messages", &messages);

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }

    fn message_lines(&self, message: &SequenceMessage) -> Vec<String> {
        let label = if self.omit_sequence_numbers || message.sequence_number.is_root() {
            message.label.clone()
        } else {
            format!("{} {}", message.sequence_number, message.label)
        };

        match message.kind {
            MessageKind::Call => vec![
                format!("{} -> {} : {}", message.from, message.to, label),
                format!("activate {}", message.to),
            ],
            MessageKind::Return => vec![
                format!("{} --> {} : {}", message.from, message.to, label),
                format!("deactivate {}", message.from),
            ],
            MessageKind::Note => vec![format!("note right of {} : {}", message.to, message.label)],
        }
    }
}

/// Participant names sit inside double quotes; newlines become `\n`
fn escape(text: &str) -> String {
    text.replace('"', "'").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::participants::ParticipantKey;
    use crate::core::sequence::{EntryPoint, SequenceNumber};
    use std::path::PathBuf;

    fn sample_model() -> SequenceModel {
        let mut model = SequenceModel::new(EntryPoint {
            name: "run".to_string(),
            class_name: Some("A".to_string()),
            uri: PathBuf::from("/proj/app/a.py"),
            relative_path: "app/a.py".to_string(),
        });
        model.participants.register(ParticipantKey::new("app/a", "A", "run"));
        model.participants.register(ParticipantKey::new("app/b", "B", "b"));
        model.participants.finalize();

        let one = SequenceNumber::root().child(1);
        model.messages.push(SequenceMessage {
            from: "p1".to_string(),
            to: "p2".to_string(),
            label: "fetch(1)".to_string(),
            sequence_number: one.clone(),
            kind: MessageKind::Call,
        });
        model.messages.push(SequenceMessage {
            from: "p2".to_string(),
            to: "p1".to_string(),
            label: " ".to_string(),
            sequence_number: one,
            kind: MessageKind::Return,
        });
        model
    }

    #[test]
    fn test_render_layout() {
        let output = PlantUmlRenderer::new().unwrap().render(&sample_model()).unwrap();
        let expected = "@startuml\n\
                        title A.run\n\
                        participant \"run: A\\na\" as p1\n\
                        participant \"b: B\\nb\" as p2\n\
                        \n\
                        p1 -> p2 : 1 fetch(1)\n\
                        activate p2\n\
                        p2 --> p1 : 1  \n\
                        deactivate p2\n\
                        @enduml\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_omit_sequence_numbers() {
        let output = PlantUmlRenderer::new()
            .unwrap()
            .omit_sequence_numbers(true)
            .render(&sample_model())
            .unwrap();
        assert!(output.contains("p1 -> p2 : fetch(1)\n"));
    }

    #[test]
    fn test_note_line() {
        let mut model = sample_model();
        model.messages.insert(
            1,
            SequenceMessage {
                from: "p2".to_string(),
                to: "p2".to_string(),
                label: "further calls omitted".to_string(),
                sequence_number: SequenceNumber::root().child(1),
                kind: MessageKind::Note,
            },
        );
        let output = PlantUmlRenderer::new().unwrap().render(&model).unwrap();
        assert!(output.contains("activate p2\nnote right of p2 : further calls omitted\n"));
    }

    #[test]
    fn test_custom_template_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(TEMPLATE_FILE),
            "{% for line in messages %}{{ line }};{% endfor %}",
        )
        .unwrap();

        let output = PlantUmlRenderer::new()
            .unwrap()
            .with_template_dir(dir.path())
            .unwrap()
            .render(&sample_model())
            .unwrap();
        assert!(output.starts_with("p1 -> p2 : 1 fetch(1);activate p2;"));
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let model = sample_model();
        assert_eq!(model.serialize().unwrap(), model.serialize().unwrap());
    }
}
