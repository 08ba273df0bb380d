use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use vocore::app::run_loopback;
use vocore::cli::{Cli, Commands, ConfigAction};
use vocore::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    vocore::logging::init(cli.verbose);
    tracing::debug!(version = %vocore::version_string(), "vocore starting");

    match cli.command {
        Commands::Loopback {
            input,
            output,
            frame_ms,
            device_aec,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(ms) = frame_ms {
                config.audio.frame_duration_ms = ms;
            }
            if device_aec {
                config.audio.device_aec = true;
            }
            config.validate()?;

            eprintln!("Running {} through the audio loopback...", input.display());
            let report = run_loopback(&config, &input, &output)
                .with_context(|| format!("loopback of {} failed", input.display()))?;
            println!("packets sent:    {}", report.packets_sent);
            println!("packets decoded: {}", report.packets_decoded);
            if report.packets_dropped > 0 {
                println!("packets dropped: {}", report.packets_dropped);
            }
            println!(
                "wrote {} samples to {}",
                report.output_samples,
                output.display()
            );
        }
        Commands::Config { action } => handle_config_command(action, cli.config.as_deref())?,
    }

    Ok(())
}

/// Load configuration from custom path or default location, then apply env overrides.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
