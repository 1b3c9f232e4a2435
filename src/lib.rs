#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod calibration;
pub mod config;
pub mod error;
pub mod fit;
pub(crate) mod math;
pub mod measurement;
pub(crate) mod minimisation;
pub mod plot;
pub mod report;
pub mod selection;
pub mod transform;

pub type Result<T> = ::std::result::Result<T, Box<dyn ::std::error::Error>>;
