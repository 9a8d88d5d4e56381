//! Connector lines between draggable shapes: routing, smart connection and
//! segment editing.

mod component;
mod editor;
mod geometry;
mod path;

pub use component::MapEditorLines;
