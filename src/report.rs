use std::collections::BTreeMap;
use std::io;

use crate::config::ReportConfig;
use crate::error::Error;
use crate::fit::FitResult;
use crate::measurement::ChannelId;
use crate::Result;

const NUM_COLUMNS: usize = 7;
const PLACEHOLDER: [&str; NUM_COLUMNS] = ["--"; NUM_COLUMNS];
/// Every channel block starts with this many placeholder rows
const LEADING_PLACEHOLDERS: usize = 2;

/// What happened to a single channel
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelOutcome {
    Fitted(FitResult),
    /// The fit ran but some reported quantity is not finite
    Degenerate(FitResult),
    /// The channel did not hold a supported number of points
    Skipped { size: usize },
    /// The minimiser returned an error
    Failed { reason: String },
}

impl ChannelOutcome {
    /// Classify a completed fit
    pub fn from_fit(fit: FitResult) -> Self {
        if fit.is_finite() {
            Self::Fitted(fit)
        } else {
            Self::Degenerate(fit)
        }
    }

    /// The fit parameters, if the fit ran to completion
    pub const fn fit(&self) -> Option<&FitResult> {
        match self {
            Self::Fitted(fit) | Self::Degenerate(fit) => Some(fit),
            Self::Skipped { .. } | Self::Failed { .. } => None,
        }
    }
}

impl From<Error> for ChannelOutcome {
    fn from(error: Error) -> Self {
        match error {
            Error::UnsupportedDatasetSize { size, .. } => Self::Skipped { size },
            other => Self::Failed {
                reason: other.to_string(),
            },
        }
    }
}

/// Per-channel results, kept in ascending channel order independent of insertion order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    outcomes: BTreeMap<ChannelId, ChannelOutcome>,
    pad_skipped_channels: bool,
}

impl Report {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            outcomes: BTreeMap::new(),
            pad_skipped_channels: config.pad_skipped_channels,
        }
    }

    /// Record the outcome for `channel`, replacing any earlier one
    pub fn insert(&mut self, channel: ChannelId, outcome: ChannelOutcome) {
        self.outcomes.insert(channel, outcome);
    }

    pub fn get(&self, channel: ChannelId) -> Option<&ChannelOutcome> {
        self.outcomes.get(&channel)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&ChannelId, &ChannelOutcome)> {
        self.outcomes.iter()
    }

    /// Results of every channel whose fit ran, degenerate or not, in channel order
    pub fn fits(&self) -> impl Iterator<Item = &FitResult> {
        self.outcomes.values().filter_map(ChannelOutcome::fit)
    }

    /// The text rows of the report, channel by channel
    pub fn rows(&self) -> Vec<Vec<String>> {
        let placeholder = || PLACEHOLDER.iter().map(|&s| s.to_owned()).collect::<Vec<_>>();

        let mut rows = vec![];
        for outcome in self.outcomes.values() {
            rows.extend((0..LEADING_PLACEHOLDERS).map(|_| placeholder()));
            match outcome {
                ChannelOutcome::Fitted(fit) | ChannelOutcome::Degenerate(fit) => {
                    rows.push(data_row(fit));
                }
                ChannelOutcome::Skipped { .. } => {
                    if self.pad_skipped_channels {
                        rows.push(placeholder());
                    }
                }
                ChannelOutcome::Failed { .. } => rows.push(placeholder()),
            }
        }
        rows
    }

    /// Serialise the report as comma separated rows, without a header
    ///
    /// # Errors
    /// Returns an error if writing to `writer` fails.
    pub fn write<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        for row in self.rows() {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the report cannot be serialised.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = vec![];
        self.write(&mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn data_row(fit: &FitResult) -> Vec<String> {
    vec![
        fit.constant.to_string(),
        fit.constant_stderr.to_string(),
        fit.exponent.to_string(),
        fit.exponent_stderr.to_string(),
        fit.chi_square.to_string(),
        fit.ndf.to_string(),
        fit.p_value.to_string(),
    ]
}
