#![doc = include_str!("../README.md")]

mod api;
pub mod crypto;
mod error;
mod meter;
mod prelude;
pub mod roc;

pub use self::{
    api::{AmiPeriod, Api, Tokens},
    api::models::{BillRecord, BillSummary, IntervalReading, MeterListEntry},
    error::{Error, FetchError},
    meter::{DataKind, ElectricMeter, MeterKind},
};
