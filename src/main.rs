use std::path::PathBuf;

use clap::Parser;

use gain_voltage::calibration;
use gain_voltage::config::Config;
use gain_voltage::Result;

#[derive(Parser)]
#[command(name = "gain-voltage")]
#[command(about = "Fit power-law gain versus voltage calibrations for each detector channel")]
struct Args {
    /// Whitespace separated table of `channel voltage gain gain_uncertainty` rows
    input: PathBuf,

    /// TOML file overriding the default settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the report, archive and figure data are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Skip writing per-channel figure data
    #[arg(long)]
    no_plot_data: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let (calibration, outputs) =
        calibration::run(&args.input, &args.output_dir, &config, !args.no_plot_data)?;

    let fitted = calibration.report.fits().count();
    log::info!(
        "{fitted} of {} channels fitted, report at {}",
        config.num_channels,
        outputs.report.display()
    );
    Ok(())
}
