// contract the job controller uses to talk to the renderer
pub mod engine;

// stand-in renderer used when the native library is not linked
pub mod dry_run;

// plain data shared between the renderer and the controller
pub mod models;

pub use dry_run::{DryRun, DryRunEngine};
pub use engine::{Engine, EngineError, Progress, RenderEnd};
pub use models::{animation_options::AnimationOptions, mode::Mode, version::EngineVersion};
