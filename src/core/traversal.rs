//! Depth-first walk from an entry function to a sequence model
//!
//! Each node visit enumerates the node's calls in evaluation order, drops the
//! ones the skip policy rejects, and emits `call`, nested messages, `return`
//! for every remaining call. Functions reached from several call sites are
//! visited once per call site; only participants are shared.

use futures::future::{join_all, BoxFuture};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DiagramConfig;
use crate::error::{CallseqError, Result};
use super::call_order::CallOrderReconstructor;
use super::call_site::{CallSite, CallSiteAnalyzer, InvokedObject};
use super::host::{CallHierarchyHost, CallHierarchyItem};
use super::participants::{ParticipantKey, ParticipantRegistry};
use super::sequence::{EntryPoint, MessageKind, SequenceMessage, SequenceModel, SequenceNumber};
use super::skip_policy::SkipPolicy;
use super::text_wrapper::TextWrapper;

pub const TRUNCATION_NOTE: &str = "further calls omitted (max depth reached)";

/// Shared cancellation signal, checked once per node visit
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Labelling and depth settings for one traversal
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub max_depth: u32,
    pub omit_arguments: bool,
    pub prefer_signature: bool,
    pub return_label: String,
    pub wrapper: TextWrapper,
}

impl From<&DiagramConfig> for TraversalOptions {
    fn from(config: &DiagramConfig) -> Self {
        Self {
            max_depth: config.effective_max_depth(),
            omit_arguments: config.omit_arguments,
            prefer_signature: config.prefer_signature,
            return_label: config.return_label().to_string(),
            wrapper: TextWrapper::new(config.wrap_width, config.wrap_soft_limit),
        }
    }
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self::from(&DiagramConfig::default())
    }
}

/// Result of visiting one node
enum NodeOutcome {
    Messages(Vec<SequenceMessage>),
    /// Node has calls, but lies below the depth limit
    Truncated,
}

/// Where a node sits in the walk
struct Frame {
    item: CallHierarchyItem,
    /// Object name this node is being called as
    object_name: String,
    parent_number: SequenceNumber,
    depth: u32,
}

pub struct GraphTraversalEngine {
    host: Arc<dyn CallHierarchyHost>,
    policy: SkipPolicy,
    reconstructor: CallOrderReconstructor,
    options: TraversalOptions,
    workspace_roots: Vec<PathBuf>,
    cancel: CancelFlag,
}

impl GraphTraversalEngine {
    pub fn new(
        host: Arc<dyn CallHierarchyHost>,
        policy: SkipPolicy,
        analyzer: CallSiteAnalyzer,
        options: TraversalOptions,
        workspace_roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            host,
            policy,
            reconstructor: CallOrderReconstructor::new(analyzer),
            options,
            workspace_roots,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk the graph below `entry` and build the finished model
    pub async fn generate(&self, entry: &CallHierarchyItem) -> Result<SequenceModel> {
        info!(
            "Generating sequence diagram for {} (max depth: {})",
            entry.describe(),
            self.options.max_depth
        );

        let class_name = self.container_name(entry).await;
        let mut model = SequenceModel::new(EntryPoint {
            name: entry.name.clone(),
            class_name,
            uri: entry.uri.clone(),
            relative_path: self.relative_path(&entry.uri),
        });

        let root = Frame {
            item: entry.clone(),
            object_name: entry.name.clone(),
            parent_number: SequenceNumber::root(),
            depth: 1,
        };

        model.messages = match self.visit(root, &mut model.participants).await? {
            NodeOutcome::Messages(messages) => messages,
            NodeOutcome::Truncated => Vec::new(),
        };
        model.participants.finalize();

        info!(
            "Built diagram with {} participants and {} calls",
            model.participants.len(),
            model.call_count()
        );
        Ok(model)
    }

    fn visit<'s>(
        &'s self,
        frame: Frame,
        registry: &'s mut ParticipantRegistry,
    ) -> BoxFuture<'s, Result<NodeOutcome>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(CallseqError::Cancelled);
            }

            let calls = self.enumerate(&frame.item).await;

            if frame.depth > self.options.max_depth {
                return Ok(if calls.is_empty() {
                    NodeOutcome::Messages(Vec::new())
                } else {
                    NodeOutcome::Truncated
                });
            }
            if calls.is_empty() {
                return Ok(NodeOutcome::Messages(Vec::new()));
            }

            let caller_key = self.participant_key(&frame.item, &frame.object_name).await;
            let labels = join_all(calls.iter().map(|call| self.label(call))).await;
            let mut messages = Vec::new();

            for (index, (call, label)) in calls.into_iter().zip(labels).enumerate() {
                let number = frame.parent_number.child(index as u32 + 1);
                let caller_id = registry.register(caller_key.clone()).id.clone();

                let callee_object = match &call.invoked_object {
                    InvokedObject::SameAsCaller => frame.object_name.clone(),
                    InvokedObject::Named(name) => name.clone(),
                    InvokedObject::Module => String::new(),
                };
                let callee_key = self.participant_key(&call.target, &callee_object).await;
                let callee_id = registry.register(callee_key).id.clone();

                debug!("{} {} -> {}: {}", number, caller_id, callee_id, label);
                messages.push(SequenceMessage {
                    from: caller_id.clone(),
                    to: callee_id.clone(),
                    label,
                    sequence_number: number.clone(),
                    kind: MessageKind::Call,
                });

                let child = Frame {
                    item: call.target,
                    object_name: callee_object,
                    parent_number: number.clone(),
                    depth: frame.depth + 1,
                };
                match self.visit(child, &mut *registry).await? {
                    NodeOutcome::Messages(nested) => messages.extend(nested),
                    NodeOutcome::Truncated => messages.push(SequenceMessage {
                        from: callee_id.clone(),
                        to: callee_id.clone(),
                        label: TRUNCATION_NOTE.to_string(),
                        sequence_number: number.clone(),
                        kind: MessageKind::Note,
                    }),
                }

                messages.push(SequenceMessage {
                    from: callee_id,
                    to: caller_id,
                    label: self.options.return_label.clone(),
                    sequence_number: number,
                    kind: MessageKind::Return,
                });
            }

            Ok(NodeOutcome::Messages(messages))
        })
    }

    /// Outgoing calls of a node, ordered and filtered. Host failures make the
    /// node a leaf.
    async fn enumerate(&self, item: &CallHierarchyItem) -> Vec<CallSite> {
        let grouped = match self.host.outgoing_calls(item).await {
            Ok(grouped) => grouped,
            Err(e) => {
                warn!("Treating {} as a leaf: {}", item.describe(), e);
                return Vec::new();
            }
        };
        if grouped.is_empty() {
            return Vec::new();
        }

        let text = match self.host.source_text(&item.uri).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Treating {} as a leaf: {}", item.describe(), e);
                return Vec::new();
            }
        };

        self.reconstructor
            .order(&text, grouped)
            .into_iter()
            .filter(|call| match self.policy.evaluate(call) {
                Some(reason) => {
                    debug!(
                        "Skipping call from {} to {}: {}",
                        item.name,
                        call.target.describe(),
                        reason
                    );
                    false
                }
                None => true,
            })
            .collect()
    }

    async fn label(&self, call: &CallSite) -> String {
        if !call.is_function_call {
            return call.target.name.clone();
        }

        let arguments = if self.options.omit_arguments {
            String::new()
        } else if self.options.prefer_signature {
            self.signature(&call.target).await
        } else {
            call.argument_text.clone()
        };

        let text = format!("{}({})", call.target.name, collapse_whitespace(&arguments));
        self.options.wrapper.wrap(&text)
    }

    /// Declared parameter text of a callee, empty when unavailable
    async fn signature(&self, target: &CallHierarchyItem) -> String {
        match self.host.source_text(&target.uri).await {
            Ok(text) => CallSiteAnalyzer::extract_arguments(&text, target.selection_range)
                .map(|span| span.text)
                .unwrap_or_default(),
            Err(e) => {
                debug!("No signature for {}: {}", target.describe(), e);
                String::new()
            }
        }
    }

    async fn participant_key(&self, item: &CallHierarchyItem, object_name: &str) -> ParticipantKey {
        let class_name = match self.container_name(item).await {
            Some(class_name) => class_name,
            None => module_name(&item.uri),
        };
        ParticipantKey::new(self.namespace(&item.uri), class_name, object_name)
    }

    async fn container_name(&self, item: &CallHierarchyItem) -> Option<String> {
        match self
            .host
            .declaration_container_name(&item.uri, item.selection_range.start)
            .await
        {
            Ok(name) => name,
            Err(e) => {
                debug!("No container for {}: {}", item.describe(), e);
                None
            }
        }
    }

    /// Module path of a file relative to the workspace, '/' separated
    fn namespace(&self, uri: &Path) -> String {
        let path = uri.with_extension("");
        let relative = self
            .workspace_roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path.as_path());
        join_components(relative)
    }

    fn relative_path(&self, uri: &Path) -> String {
        let relative = self
            .workspace_roots
            .iter()
            .find_map(|root| uri.strip_prefix(root).ok())
            .unwrap_or(uri);
        join_components(relative)
    }
}

fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn module_name(uri: &Path) -> String {
    uri.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
