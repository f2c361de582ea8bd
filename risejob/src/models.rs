pub mod about;
pub mod actions;
pub mod controller_setting;
pub mod error;
pub mod job;
pub mod prediction;
pub mod render_run;
