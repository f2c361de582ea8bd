pub mod cli_app;
pub mod controller;
pub mod worker;
pub mod working_dir;
