use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::CallseqError;
use super::call_site::CallSiteAnalyzer;
use super::host::{CallHierarchyHost, PythonWorkspace};
use super::renderer::PlantUmlRenderer;
use super::sequence::SequenceModel;
use super::skip_policy::SkipPolicy;
use super::source::Position;
use super::traversal::{CancelFlag, GraphTraversalEngine, TraversalOptions};
use super::writer::DiagramWriter;

/// Name `init` writes the default configuration under
const CONFIG_FILE: &str = "callseq.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    PlantUml,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> std::result::Result<Self, CallseqError> {
        match value.to_ascii_lowercase().as_str() {
            "plantuml" | "puml" => Ok(OutputFormat::PlantUml),
            "json" => Ok(OutputFormat::Json),
            other => Err(CallseqError::Config(format!("Unsupported output format: {}", other))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::PlantUml => "puml",
            OutputFormat::Json => "json",
        }
    }
}

/// One `generate` invocation. Line and column are 1-based, as editors show them.
#[derive(Debug, Clone)]
pub struct DiagramRequest {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub max_depth: Option<u32>,
    pub stdout: bool,
}

impl DiagramRequest {
    fn position(&self) -> Position {
        Position::new(self.line.saturating_sub(1), self.column.saturating_sub(1))
    }
}

/// Orchestrates diagram requests
pub struct Engine {
    config: Config,
    cancel: CancelFlag,
}

impl Engine {
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle that aborts in-flight traversals when cancelled
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Write a default configuration file
    pub async fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = match path {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        std::fs::create_dir_all(&target_dir)
            .with_context(|| format!("Failed to create {}", target_dir.display()))?;

        let config_path = target_dir.join(CONFIG_FILE);
        if config_path.exists() {
            warn!("{} already exists, leaving it untouched", config_path.display());
            return Ok(());
        }

        Config::default().save(&config_path)?;
        info!("Wrote default configuration to {}", config_path.display());
        Ok(())
    }

    pub async fn generate(&mut self, request: DiagramRequest) -> Result<()> {
        if let Some(max_depth) = request.max_depth {
            self.config.diagram.max_depth = max_depth;
        }
        let format = OutputFormat::parse(
            request.format.as_deref().unwrap_or(&self.config.output.format),
        )?;

        let model = self.build_model(&request.file, request.position()).await?;
        let contents = self.render(&model, format)?;

        if request.stdout {
            print!("{}", contents);
            return Ok(());
        }

        let directory = request
            .output
            .unwrap_or_else(|| self.config.output.directory.clone());
        let path = DiagramWriter::new(directory)
            .write(&model.suggested_file_name(format.extension()), &contents)?;
        info!("Wrote diagram to {}", path.display());
        Ok(())
    }

    /// Print the participants a diagram from this entry would contain
    pub async fn participants(&self, file: &Path, line: u32) -> Result<()> {
        let position = Position::new(line.saturating_sub(1), 0);
        let model = self.build_model(file, position).await?;

        for participant in model.participants.all() {
            println!(
                "{}\t{}",
                participant.id,
                participant.display_name.replace('\n', "\t")
            );
        }
        Ok(())
    }

    /// Index the workspace and build the model for the function at `position`
    pub async fn build_model(&self, file: &Path, position: Position) -> Result<SequenceModel> {
        let roots = self.workspace_roots()?;
        let file = std::fs::canonicalize(file)
            .with_context(|| format!("Failed to resolve {}", file.display()))?;

        info!("Indexing {} workspace root(s)", roots.len());
        let host = PythonWorkspace::open(&roots)?;

        self.build_model_with(Arc::new(host), roots, &file, position)
            .await
    }

    /// Build a model against an already constructed host
    pub async fn build_model_with(
        &self,
        host: Arc<dyn CallHierarchyHost>,
        roots: Vec<PathBuf>,
        file: &Path,
        position: Position,
    ) -> Result<SequenceModel> {
        let entry = host
            .prepare_call_hierarchy(file, position)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CallseqError::EntryResolution {
                uri: file.to_path_buf(),
                line: position.line,
                character: position.character,
            })?;
        debug!("Entry resolved to {}", entry.describe());

        let policy = SkipPolicy::new(&self.config.filters, &roots)?;
        let analyzer = CallSiteAnalyzer::new(self.config.diagram.self_tokens.clone());
        let traversal = GraphTraversalEngine::new(
            host,
            policy,
            analyzer,
            TraversalOptions::from(&self.config.diagram),
            roots,
        )
        .with_cancel_flag(self.cancel.clone());

        Ok(traversal.generate(&entry).await?)
    }

    pub fn render(&self, model: &SequenceModel, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::PlantUml => {
                let omit_numbers = self.config.diagram.omit_sequence_numbers;
                let template_dir = self.config.output.template_dir.as_deref();
                if !omit_numbers && template_dir.is_none() {
                    return Ok(model.serialize()?);
                }

                let mut renderer = PlantUmlRenderer::new()?.omit_sequence_numbers(omit_numbers);
                if let Some(dir) = template_dir {
                    renderer = renderer.with_template_dir(dir)?;
                }
                Ok(model.serialize_with(&renderer)?)
            }
            OutputFormat::Json => Ok(model.to_json()?),
        }
    }

    fn workspace_roots(&self) -> Result<Vec<PathBuf>> {
        self.config
            .workspace
            .roots
            .iter()
            .map(|root| {
                std::fs::canonicalize(root)
                    .with_context(|| format!("Workspace root {} not found", root.display()))
            })
            .collect()
    }
}
