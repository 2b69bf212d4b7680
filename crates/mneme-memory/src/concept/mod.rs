//! The concept graph: one node per concept name, linked to source memories.

mod manager;
mod node;

pub use manager::{ConceptManager, concept_key};
pub use node::{ConceptNode, UNKNOWN_TYPE, value_text};
