//! Side-effecting collaborators: config file, prompt templates, child
//! processes and the progress channel.

pub mod collaborator;
pub mod config;
pub mod events;
pub mod process;
pub mod prompt;
