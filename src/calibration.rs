use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Error;
use crate::fit::{FitResult, Fitter};
use crate::measurement::{read_table, Measurement};
use crate::plot::{Archive, PlotData};
use crate::report::{ChannelOutcome, Report};
use crate::selection::{partition, validate, ChannelDataset};
use crate::transform::{transform, TransformedDataset};
use crate::Result;

/// Results of a calibration run
pub struct Calibration {
    /// One outcome per channel, in channel order
    pub report: Report,
    /// Figure data for each successfully fitted channel, in channel order
    pub plots: Vec<PlotData>,
}

/// Calibrate every channel in `table`
///
/// Channels are processed independently: a channel that cannot be fitted is recorded in the
/// report and never stops the remaining channels.
pub fn calibrate(table: &[Measurement], config: &Config) -> Calibration {
    let fitter = Fitter::new(&config.fit);
    let mut report = Report::new(&config.report);
    let mut plots = vec![];

    for dataset in partition(table, config.num_channels) {
        let channel = dataset.channel;
        let outcome = match process(&dataset, &fitter, config) {
            Ok((fit, data)) => {
                let outcome = ChannelOutcome::from_fit(fit);
                match outcome {
                    ChannelOutcome::Fitted(ref fit) => plots.push(PlotData::new(&data, fit, config)),
                    _ => log::warn!("{}", Error::DegenerateFit { channel }),
                }
                outcome
            }
            Err(error) => {
                log::warn!("{error}. SKIPPING");
                ChannelOutcome::from(error)
            }
        };
        report.insert(channel, outcome);
    }

    Calibration { report, plots }
}

fn process(
    dataset: &ChannelDataset,
    fitter: &Fitter<'_>,
    config: &Config,
) -> ::std::result::Result<(FitResult, TransformedDataset), Error> {
    let channel = dataset.channel;
    validate(dataset, &config.fit)?;

    let outside = dataset
        .measurements
        .iter()
        .filter(|m| !config.fit.fit_domain.contains(m.voltage))
        .count();
    if outside > 0 {
        log::debug!("channel {channel}: {outside} points lie outside the fit domain");
    }

    let data = transform(dataset, &config.fit);
    log::info!("Fitting channel {channel}");
    let fit = fitter.fit(&data).map_err(|e| Error::Minimiser {
        channel,
        reason: e.to_string(),
    })?;
    Ok((fit, data))
}

/// Where the outputs of a run are written
pub struct Outputs {
    pub report: PathBuf,
    pub archive: PathBuf,
    pub plots: Vec<PathBuf>,
}

/// Read the table at `input`, calibrate it, and write the outputs into `output_directory`
///
/// Output names are derived from the stem of `input`: `<stem>_gainvsvoltage.txt` for the report,
/// `<stem>_gainvsvoltage.toml` for the archive and `<stem>_<channel>_gainvsvoltage.csv` for the
/// figure data of each fitted channel.
///
/// # Errors
/// Returns an error, before anything is written, if the input cannot be read or parsed. Returns
/// an error if any output file cannot be written.
pub fn run(
    input: &Path,
    output_directory: &Path,
    config: &Config,
    write_plot_data: bool,
) -> Result<(Calibration, Outputs)> {
    let name = input
        .file_stem()
        .ok_or_else(|| format!("cannot derive an output name from {}", input.display()))?
        .to_string_lossy()
        .into_owned();

    let table = read_table(input)?;
    log::info!("read {} measurements from {}", table.len(), input.display());

    let calibration = calibrate(&table, config);

    fs::create_dir_all(output_directory)?;
    let outputs = Outputs {
        report: output_directory.join(format!("{name}_gainvsvoltage.txt")),
        archive: output_directory.join(format!("{name}_gainvsvoltage.toml")),
        plots: if write_plot_data {
            calibration
                .plots
                .iter()
                .map(|plot| output_directory.join(format!("{name}_{}_gainvsvoltage.csv", plot.channel)))
                .collect()
        } else {
            vec![]
        },
    };

    calibration
        .report
        .write(BufWriter::new(File::create(&outputs.report)?))?;
    log::info!("wrote report to {}", outputs.report.display());

    let archive = Archive::from_report(&calibration.report, config.fit.gain_scale);
    fs::write(&outputs.archive, archive.to_toml()?)?;
    log::info!("wrote archive to {}", outputs.archive.display());

    for (plot, path) in calibration.plots.iter().zip(&outputs.plots) {
        plot.write_csv(BufWriter::new(File::create(path)?))?;
        log::debug!("wrote figure data for channel {} to {}", plot.channel, path.display());
    }

    Ok((calibration, outputs))
}
