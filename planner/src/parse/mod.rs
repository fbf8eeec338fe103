//! Grammars that turn collaborator text into task lists.
//!
//! All parsers are pure `&str -> Vec<Task>` functions. Malformed input never
//! produces an error; each grammar degrades to the best partial structure it
//! can extract.

pub mod dependencies;
pub mod flat;
pub mod hierarchical;

pub use dependencies::{apply_dependency_annotations, render_task_index};
pub use flat::{chain_sequential, parse_flat};
pub use hierarchical::parse_hierarchical;
