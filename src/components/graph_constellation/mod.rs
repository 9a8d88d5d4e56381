//! Staged force-directed graph animator drawn on a canvas.

mod component;
mod config;
mod interaction;
mod layout;
mod plan;
mod render;
mod sequencer;
mod session;
mod state;
mod types;

pub use component::GraphConstellation;
pub use config::{AnimationMode, DisplaySettings};
pub use types::GraphDocument;
