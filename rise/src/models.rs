pub mod animation_options;
pub mod mode;
pub mod version;
