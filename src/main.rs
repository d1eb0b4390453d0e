// src/main.rs - apply a Z offset to a sliced job before it is written
use clap::Parser;
use std::path::{Path, PathBuf};

use zoffset_rs::config::{self, Config};
use zoffset_rs::file_manager::FileManager;
use zoffset_rs::settings::{self, SettingCategory, SettingSchema};
use zoffset_rs::{OffsetMode, filter_gcode};

#[derive(Debug, Parser)]
#[command(name = "zoffset", version, about = "Apply a Z offset to sliced G-code")]
struct Cli {
    /// G-code file, or a JSON job (`{"plates": {...}}`)
    #[arg(required_unless_present = "print_settings")]
    input: Option<PathBuf>,

    /// Where to write the result (defaults to the input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, default_value = "zoffset.toml")]
    config: PathBuf,

    /// Offset in mm, overrides the config file
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<f64>,

    /// Rewrite every vertical move instead of shifting the origin once
    #[arg(long, conflicts_with = "localized")]
    extensive: bool,

    /// Rewrite the first vertical move and reset the origin with G92
    #[arg(long)]
    localized: bool,

    /// Firmware flavor, used to pick the mode when none is given
    #[arg(long)]
    flavor: Option<String>,

    /// Print the setting definitions as JSON and exit
    #[arg(long)]
    print_settings: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(offset) = self.offset {
            config.z_offset.offset = offset;
        }
        if self.extensive {
            config.z_offset.extensive = Some(true);
        } else if self.localized {
            config.z_offset.extensive = Some(false);
        }
        if let Some(flavor) = &self.flavor {
            config.machine.gcode_flavor = Some(flavor.clone());
        }
    }
}

fn load_or_default(path: &Path) -> Result<Config, config::ConfigError> {
    if path.exists() {
        tracing::info!("Loading configuration from: {}", path.display());
        config::load_config(&path.to_string_lossy())
    } else {
        tracing::info!("No configuration at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if cli.print_settings {
        let mut schema = SettingSchema {
            categories: vec![SettingCategory::new(
                settings::PLATFORM_ADHESION_CATEGORY,
                "Build Plate Adhesion",
            )],
        };
        settings::register_z_offset_settings(&mut schema);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let Some(input) = cli.input.clone() else {
        return Err("no input file given".into());
    };

    let mut config = load_or_default(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    for warning in config.offset_warnings() {
        tracing::warn!("{}", warning);
    }

    let resolved = config.settings();
    tracing::info!(
        "Z offset: {} mm, {} processing",
        resolved.offset,
        match resolved.mode {
            OffsetMode::Localized => "localized",
            OffsetMode::Extensive => "extensive",
        }
    );

    let files = FileManager::default();
    let mut job = files.read_job(&input).await?;
    let summary = filter_gcode(Some(&resolved), &mut job);

    match (&cli.output, summary.changed()) {
        (Some(output), _) => files.write_job(output, &job).await?,
        (None, true) => files.write_job(&input, &job).await?,
        (None, false) => tracing::info!("Nothing changed, {} left as is", input.display()),
    }

    if summary.malformed_lines > 0 {
        tracing::warn!("{} line(s) had an unreadable Z coordinate", summary.malformed_lines);
    }
    Ok(())
}
