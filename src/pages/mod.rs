pub mod home;
pub mod map_editor;
pub mod not_found;
