use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use relaunch::{
    App, AppError, AppSettings, AutoConfirm, StartupAction, TerminalPrompt, UpdatePrompt,
};
use relaunch_core::{Version, exit_for_update};
use relaunch_platform::AppPaths;
use relaunch_platform::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "relaunch", version, about)]
struct Cli {
    /// Install an available update without asking
    #[arg(short, long)]
    yes: bool,

    /// Report whether an update is available, then exit
    #[arg(long, conflicts_with = "yes")]
    check_only: bool,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("relaunch: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let paths = AppPaths::new()?;
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(|| paths.settings_file());
    let (settings, load_error) = match AppSettings::load_from(&settings_path) {
        Ok(settings) => (settings, None),
        Err(err) => (AppSettings::default(), Some(err)),
    };
    init_logging(
        &paths.log_file(),
        settings.debug_logging,
        settings.max_log_size_bytes,
    );

    if let Some(err) = load_error {
        warn!("{err}; using default settings");
    } else if cli.settings.is_none()
        && !settings_path.exists()
        && let Err(err) = settings.save()
    {
        warn!("Failed to write default settings: {err}");
    }

    let current_version = Version::parse(env!("CARGO_PKG_VERSION"))?;
    info!("relaunch {current_version} starting");
    println!("relaunch {current_version}");

    let exe = std::env::current_exe()
        .map_err(|err| AppError::io("failed to locate running executable", err))?;
    let install_dir = exe
        .parent()
        .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf);

    if !settings.check_on_start && !cli.check_only && !cli.yes {
        info!("Update check on start-up is disabled");
        return Ok(());
    }

    let check_only = report_only(cli, std::io::stdin().is_terminal());
    if check_only && !cli.check_only {
        info!("No terminal attached, updates will be reported but not installed");
    }

    let prompt: Box<dyn UpdatePrompt> = if cli.yes {
        Box::new(AutoConfirm::stdout())
    } else {
        Box::new(TerminalPrompt::stdio())
    };
    let mut app = App::new(
        settings,
        current_version,
        install_dir,
        paths.staging_root(),
        prompt,
    );

    if app.startup_update(check_only).await? == StartupAction::ExitForUpdate {
        exit_for_update();
    }

    info!("relaunch {} running", app.current_version());
    Ok(())
}

/// Without `--yes` an update needs an answer from a terminal; with nobody
/// to ask (for example right after a relaunch, whose streams are detached)
/// the check only reports.
fn report_only(cli: &Cli, interactive: bool) -> bool {
    cli.check_only || (!cli.yes && !interactive)
}
