//! Electric meter registry.

use std::{collections::BTreeMap, fmt};

use enumset::EnumSetType;

use crate::{
    api::models::{BillRecord, BillSummary, IntervalReading, MeterListEntry},
    error::Error,
    prelude::*,
};

/// One of the independently-refreshed data kinds of a meter.
#[derive(EnumSetType, Debug)]
pub enum DataKind {
    IntervalReadings,
    CurrentBill,
    BillHistory,
}

impl fmt::Display for DataKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntervalReadings => formatter.write_str("interval readings"),
            Self::CurrentBill => formatter.write_str("current bill"),
            Self::BillHistory => formatter.write_str("bill history"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MeterKind {
    Ami,
    Unknown,
}

/// Decoded result of one (meter, data kind) fetch, ready for write-back.
#[derive(Debug)]
pub(crate) enum FetchPayload {
    Readings(BTreeMap<String, IntervalReading>),
    Bill(BillSummary),
    Records(BTreeMap<String, BillRecord>),
}

/// One electric meter bound to the member's account.
///
/// The three data fields are populated independently by refresh operations and
/// may be mutually stale: no cross-field consistency is promised.
#[derive(Debug)]
pub struct ElectricMeter {
    entry: MeterListEntry,
    readings: Option<BTreeMap<String, IntervalReading>>,
    bill: Option<BillSummary>,
    bill_records: Option<BTreeMap<String, BillRecord>>,
}

impl ElectricMeter {
    const fn new(entry: MeterListEntry) -> Self {
        Self { entry, readings: None, bill: None, bill_records: None }
    }

    /// Build the registry from the vendor's meter list.
    ///
    /// Only AMI-enabled meters are taken. When `electric_numbers` is given,
    /// the list is further narrowed to those numbers, and every requested
    /// number must actually match, otherwise the caller asked for meters that
    /// do not exist or are not AMI-enabled, which is a configuration error
    /// rather than a transport one.
    pub fn from_electric_meter_list(
        entries: Vec<MeterListEntry>,
        electric_numbers: Option<&[String]>,
    ) -> Result<BTreeMap<String, Self>> {
        let meters: BTreeMap<String, Self> = entries
            .into_iter()
            .filter(|entry| entry.ami == "true")
            .filter(|entry| {
                electric_numbers.is_none_or(|numbers| numbers.contains(&entry.number))
            })
            .map(|entry| (entry.number.clone(), Self::new(entry)))
            .collect();
        if let Some(numbers) = electric_numbers {
            let missing: Vec<String> = numbers
                .iter()
                .filter(|number| !meters.contains_key(*number))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(Error::Configuration { missing });
            }
        }
        Ok(meters)
    }

    pub(crate) fn apply(&mut self, payload: FetchPayload) {
        match payload {
            FetchPayload::Readings(readings) => self.readings = Some(readings),
            FetchPayload::Bill(bill) => self.bill = Some(bill),
            FetchPayload::Records(records) => self.bill_records = Some(records),
        }
    }

    #[must_use]
    pub fn number(&self) -> &str {
        &self.entry.number
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.entry.user_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// The nickname set in the Taipower app, if any.
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        (!self.entry.nickname.is_empty()).then_some(self.entry.nickname.as_str())
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.entry.address
    }

    #[must_use]
    pub fn kind(&self) -> MeterKind {
        if self.entry.ami == "true" { MeterKind::Ami } else { MeterKind::Unknown }
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        !matches!(self.entry.verified_level.as_str(), "0" | "-1")
    }

    /// Interval readings keyed by their start time, once refreshed.
    #[must_use]
    pub const fn readings(&self) -> Option<&BTreeMap<String, IntervalReading>> {
        self.readings.as_ref()
    }

    /// The current billing cycle, once refreshed.
    #[must_use]
    pub const fn bill(&self) -> Option<&BillSummary> {
        self.bill.as_ref()
    }

    /// Historical bills keyed by Gregorian `YYYY/MM`, once refreshed.
    #[must_use]
    pub const fn bill_records(&self) -> Option<&BTreeMap<String, BillRecord>> {
        self.bill_records.as_ref()
    }
}
