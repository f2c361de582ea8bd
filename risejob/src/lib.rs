/*
Developer blog:
- The job controller started life as a window with six buttons. The buttons are gone, the rules behind
    them stay in JobController and Actions, and the console shell is only one way to drive them.
- Runs without the native renderer for now. DryRunEngine pretends to rasterize so pause, resume and stop
    can be exercised end to end. Swapping in a real engine only needs an `Engine` impl.
- Settings live in the user config directory, the command line overrides whatever is in there.

[F] - pick the engine at startup once a native binding exists
*/
use clap::Parser;
use dotenvy::dotenv;
use models::controller_setting::ControllerSetting;
use rise::DryRunEngine;
use services::{cli_app::CliApp, controller::JobController};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod models;
pub mod services;

#[derive(Parser, Debug)]
#[command(version, about = "Load, predict and render R.I.S.E. scenes from the console")]
struct Cli {
    /// Settings file to use instead of the one in the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rendering units between two looks at pause and stop requests
    #[arg(long)]
    checkpoint_interval: Option<u32>,

    /// Let stop cancel a paused render without resuming it first
    #[arg(long)]
    allow_stop_while_paused: bool,

    /// Scene to load at startup
    scene: Option<PathBuf>,
}

impl Cli {
    fn setting(&self) -> ControllerSetting {
        let mut setting = ControllerSetting::load(self.config.as_deref());
        if let Some(interval) = self.checkpoint_interval {
            setting.checkpoint_interval = interval;
        }
        if self.allow_stop_while_paused {
            setting.allow_stop_while_paused = true;
        }
        setting
    }
}

pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    // the console owns stdout, logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let setting = cli.setting();
    info!("Starting with {:?}", &setting);

    let engine = DryRunEngine::new(setting.dry_run.clone());
    let mut controller = JobController::new(engine, setting);

    if let Some(scene) = &cli.scene {
        match controller.load_scene(scene) {
            Ok(()) => println!("Loaded {}", scene.display()),
            Err(e) => warn!("{e}"),
        }
    }

    CliApp::new(controller).run().await
}
