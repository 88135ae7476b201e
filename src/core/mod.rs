mod call_order;
mod call_site;
mod engine;
mod host;
mod participants;
mod renderer;
mod sequence;
mod skip_policy;
mod source;
mod text_wrapper;
mod traversal;
mod writer;

pub use engine::{DiagramRequest, Engine};
