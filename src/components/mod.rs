pub mod graph_constellation;
pub mod map_editor;
