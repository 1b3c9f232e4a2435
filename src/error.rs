use thiserror::Error;

use crate::measurement::ChannelId;

/// Failures raised while reading measurements or calibrating a channel.
///
/// Only [`Error::MalformedInput`] is fatal to a run. The remaining variants are local to a single
/// channel and are recorded in the report rather than propagated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("malformed input on line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },
    #[error("improper number of data points for channel {channel}: found {size}")]
    UnsupportedDatasetSize { channel: ChannelId, size: usize },
    #[error("fit for channel {channel} returned non-finite values")]
    DegenerateFit { channel: ChannelId },
    #[error("minimiser failed for channel {channel}: {reason}")]
    Minimiser { channel: ChannelId, reason: String },
}
