mod cli;
mod config;
mod paths;
mod probe;
mod props;
mod pump;
mod run;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let paths = AppPaths::discover(cli.config.as_deref())?;
    match cli.command {
        Command::Probe(args) => {
            let file = run::load_config(&paths)?;
            let settings = run::probe_settings(&args, &file.probe)?;
            probe::run(&settings)
        }
        Command::Pump(args) => {
            let file = run::load_config(&paths)?;
            let settings = run::pump_settings(&args, &file.pump)?;
            let report = pump::run(&settings)?;
            pump::print_report(&report);
            Ok(())
        }
        Command::Props(args) => props::run(&args),
        Command::Where => run_where(&paths),
    }
}

fn run_where(paths: &AppPaths) -> Result<()> {
    println!("Configuration:");
    println!("  dir:    {}", paths.config_dir().display());
    println!(
        "  file:   {} ({})",
        paths.config_file().display(),
        if paths.config_file().is_file() {
            "present"
        } else {
            "missing"
        }
    );
    Ok(())
}
