use itertools::Itertools;

use crate::config::FitConfig;
use crate::error::Error;
use crate::measurement::{ChannelId, Measurement};

/// All measurements taken on one channel, in input order
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelDataset {
    pub channel: ChannelId,
    pub measurements: Vec<Measurement>,
}

impl ChannelDataset {
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// Partition `table` into one dataset per channel in `1..=num_channels`
///
/// Datasets are returned in ascending channel order and keep the relative order of the rows in
/// `table`. A channel with no rows yields an empty dataset. Rows for channels outside the range
/// are ignored.
pub fn partition(table: &[Measurement], num_channels: u32) -> Vec<ChannelDataset> {
    let mut by_channel = table
        .iter()
        .copied()
        .into_group_map_by(|measurement| measurement.channel);

    for (channel, rows) in by_channel
        .iter()
        .filter(|(channel, _)| channel.0 > num_channels)
        .sorted_by_key(|(channel, _)| **channel)
    {
        log::debug!(
            "ignoring {} rows for channel {channel}, outside 1..={num_channels}",
            rows.len()
        );
    }

    (1..=num_channels)
        .map(ChannelId)
        .map(|channel| ChannelDataset {
            channel,
            measurements: by_channel.remove(&channel).unwrap_or_default(),
        })
        .collect()
}

/// Check that a channel holds one of the supported calibration-set sizes
///
/// # Errors
/// Returns [`Error::UnsupportedDatasetSize`] when the dataset cannot be fitted.
pub fn validate(dataset: &ChannelDataset, config: &FitConfig) -> Result<(), Error> {
    if config.accepts(dataset.len()) {
        Ok(())
    } else {
        Err(Error::UnsupportedDatasetSize {
            channel: dataset.channel,
            size: dataset.len(),
        })
    }
}
