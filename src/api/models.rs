//! View structs over the vendor's JSON payloads.
//!
//! Field names mirror the wire format, including the `isMssingData` typo,
//! which is part of the API contract. ROC-calendar dates are stored raw and
//! converted by the accessors.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

use crate::roc::{self, RocDateError};

/// One entry of the member's electric meter list (`data.electricList`).
#[derive(Clone, Debug, Deserialize)]
pub struct MeterListEntry {
    /// The wild returns this both as a number and as a string.
    #[serde(rename = "userID", deserialize_with = "deserialize_user_id")]
    pub(crate) user_id: String,

    #[serde(rename = "electricNumber")]
    pub(crate) number: String,

    #[serde(rename = "electricName")]
    pub(crate) name: String,

    /// Empty when not set in the app.
    #[serde(rename = "nickname")]
    pub(crate) nickname: String,

    #[serde(rename = "electricAddr")]
    pub(crate) address: String,

    /// `"true"` for AMI-enabled meters.
    #[serde(rename = "ami")]
    pub(crate) ami: String,

    /// `"0"` and `"-1"` mean the number is not verified.
    #[serde(rename = "verifiedLevel")]
    pub(crate) verified_level: String,
}

fn deserialize_user_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => {
            let other = other.to_string();
            Err(de::Error::invalid_type(
                de::Unexpected::Other(&other),
                &"a string or an integer",
            ))
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct MemberResponse {
    pub data: MemberData,
}

#[derive(Deserialize)]
pub(crate) struct MemberData {
    #[serde(rename = "electricList")]
    pub electric_list: Vec<MeterListEntry>,
}

/// One time-bucketed AMI usage record.
#[derive(Clone, Debug, Deserialize)]
pub struct IntervalReading {
    /// `yyyymmddhhmmss`.
    #[serde(rename = "startTime")]
    start_time: String,

    /// `yyyymmddhhmmss`.
    #[serde(rename = "endTime")]
    end_time: String,

    #[serde(rename = "isMssingData")]
    is_missing_data: i64,

    #[serde(rename = "offPeakKwh")]
    off_peak_kwh: Option<f64>,

    #[serde(rename = "halfPeakKwh")]
    half_peak_kwh: Option<f64>,

    #[serde(rename = "satPeakKwh")]
    saturday_peak_kwh: Option<f64>,

    #[serde(rename = "peakTimeKwh")]
    peak_kwh: Option<f64>,

    #[serde(rename = "totalKwh")]
    total_kwh: Option<f64>,

    /// The quarter-hourly shape reports the total under `kwh` instead.
    #[serde(rename = "kwh")]
    kwh: Option<f64>,
}

impl IntervalReading {
    /// Key the readings by their start time.
    pub(crate) fn into_map(readings: Vec<Self>) -> BTreeMap<String, Self> {
        readings.into_iter().map(|reading| (reading.start_time.clone(), reading)).collect()
    }

    #[must_use]
    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> &str {
        &self.end_time
    }

    /// Whether the record is missing (unrecorded) on the vendor side.
    #[must_use]
    pub const fn is_missing_data(&self) -> bool {
        self.is_missing_data == 1
    }

    #[must_use]
    pub const fn off_peak_kwh(&self) -> Option<f64> {
        self.off_peak_kwh
    }

    #[must_use]
    pub const fn half_peak_kwh(&self) -> Option<f64> {
        self.half_peak_kwh
    }

    #[must_use]
    pub const fn saturday_peak_kwh(&self) -> Option<f64> {
        self.saturday_peak_kwh
    }

    #[must_use]
    pub const fn peak_kwh(&self) -> Option<f64> {
        self.peak_kwh
    }

    #[must_use]
    pub fn total_kwh(&self) -> Option<f64> {
        self.total_kwh.or(self.kwh)
    }
}

#[derive(Deserialize)]
pub(crate) struct AmiResponse {
    pub data: AmiData,
}

#[derive(Deserialize)]
pub(crate) struct AmiData {
    pub data: Vec<IntervalReading>,
}

/// The current billing cycle (`api/home/bills`).
#[derive(Clone, Debug, Deserialize)]
pub struct BillSummary {
    /// Compact ROC date, e.g. `"1110121"`.
    #[serde(rename = "startDate")]
    start_date: String,

    /// Compact ROC date, e.g. `"1110323"`.
    #[serde(rename = "endDate")]
    end_date: String,

    #[serde(rename = "currentAmount")]
    current_amount: i64,

    /// Whether the `kwh` field is metered for this cycle.
    #[serde(rename = "kwhData")]
    has_kwh_data: bool,

    #[serde(rename = "kwh")]
    kwh: i64,

    #[serde(rename = "theLast2Kwh")]
    last_cycle_kwh: i64,

    #[serde(rename = "lastKwh")]
    last_year_kwh: i64,
}

impl BillSummary {
    /// Cycle start date as Gregorian `YYYY/MM/DD`.
    pub fn bill_start_date(&self) -> Result<String, RocDateError> {
        roc::compact_to_slashed(&self.start_date)
    }

    /// Cycle end date as Gregorian `YYYY/MM/DD`.
    pub fn bill_end_date(&self) -> Result<String, RocDateError> {
        roc::compact_to_slashed(&self.end_date)
    }

    #[must_use]
    pub const fn current_amount(&self) -> i64 {
        self.current_amount
    }

    /// Metered usage of the current cycle, when available.
    #[must_use]
    pub const fn kwh(&self) -> Option<i64> {
        if self.has_kwh_data { Some(self.kwh) } else { None }
    }

    /// Usage of the previous cycle.
    #[must_use]
    pub const fn last_cycle_kwh(&self) -> i64 {
        self.last_cycle_kwh
    }

    /// Usage of the same cycle one year ago.
    #[must_use]
    pub const fn last_year_kwh(&self) -> i64 {
        self.last_year_kwh
    }
}

#[derive(Deserialize)]
pub(crate) struct BillResponse {
    pub data: BillSummary,
}

/// One historical billing cycle (`api/mybill/records`).
#[derive(Clone, Debug, Deserialize)]
pub struct BillRecord {
    /// ROC `yyy/mm` issue date.
    #[serde(rename = "issueYM")]
    issue_year_month: String,

    /// ROC `yyy/mm/dd~yyy/mm/dd` cycle period.
    #[serde(rename = "billFromAndToDate")]
    period: String,

    #[serde(rename = "totalKwh")]
    total_kwh: i64,

    /// Amount with thousands separators, e.g. `"4,329"`.
    #[serde(rename = "totalCharge")]
    total_charge: String,

    #[serde(rename = "billFormula")]
    formula: String,

    /// `"C"` means the bill has been paid.
    #[serde(rename = "hasPaid")]
    has_paid: String,
}

impl BillRecord {
    /// Key the records by their Gregorian `YYYY/MM` issue date.
    pub(crate) fn into_map(records: Vec<Self>) -> Result<BTreeMap<String, Self>, RocDateError> {
        records
            .into_iter()
            .map(|record| Ok((record.issue_key()?, record)))
            .collect()
    }

    /// Gregorian `YYYY/MM` issue date.
    pub fn issue_key(&self) -> Result<String, RocDateError> {
        roc::to_gregorian(&self.issue_year_month)
    }

    #[must_use]
    pub fn period(&self) -> &str {
        &self.period
    }

    #[must_use]
    pub const fn kwh(&self) -> i64 {
        self.total_kwh
    }

    /// Billed amount with the thousands separators stripped.
    pub fn charge(&self) -> Result<i64, std::num::ParseIntError> {
        self.total_charge.replace(',', "").parse()
    }

    #[must_use]
    pub fn formula(&self) -> &str {
        &self.formula
    }

    #[must_use]
    pub fn paid(&self) -> bool {
        self.has_paid == "C"
    }
}

#[derive(Deserialize)]
pub(crate) struct RecordsResponse {
    pub data: Vec<BillRecord>,
}

/// `oauth/token` response.
#[derive(Deserialize)]
pub(crate) struct TokenGrant {
    pub access_token: String,

    /// The refresh-token grant does not necessarily rotate it.
    pub refresh_token: Option<String>,

    pub token_type: String,

    /// Seconds until the access token expires.
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    // language=JSON
    const METER_ENTRY: &str = r#"
        {
            "userID": 123456,
            "electricNumber": "00xxxxxxxx",
            "electricName": "ABC",
            "nickname": "a nick name",
            "verifiedLevel": "0",
            "ami": "true",
            "electricAddr": "Taipei City",
            "billCycle": "01",
            "updateDatetime": "2022-04-01T05:50:21.810+0000"
        }
    "#;

    #[test]
    fn test_deserialize_meter_entry_ok() -> Result<(), serde_json::Error> {
        let entry: MeterListEntry = serde_json::from_str(METER_ENTRY)?;
        assert_eq!(entry.user_id, "123456");
        assert_eq!(entry.number, "00xxxxxxxx");
        assert_eq!(entry.ami, "true");
        Ok(())
    }

    #[test]
    fn test_deserialize_meter_entry_string_user_id_ok() -> Result<(), serde_json::Error> {
        let entry: MeterListEntry =
            serde_json::from_str(&METER_ENTRY.replace("123456", r#""123456""#))?;
        assert_eq!(entry.user_id, "123456");
        Ok(())
    }

    #[test]
    fn test_deserialize_interval_reading_ok() -> Result<(), serde_json::Error> {
        // language=JSON
        let reading: IntervalReading = serde_json::from_str(
            r#"
            {
                "startTime": "20220403000000",
                "endTime": "20220404000000",
                "isMssingData": 0,
                "offPeakKwh": 25.2,
                "halfPeakKwh": 0.0,
                "satPeakKwh": 0.0,
                "peakTimeKwh": 0.0,
                "totalKwh": 23.2,
                "mult": 1
            }
            "#,
        )?;
        assert_eq!(reading.start_time(), "20220403000000");
        assert!(!reading.is_missing_data());
        assert_eq!(reading.off_peak_kwh(), Some(25.2));
        assert_eq!(reading.total_kwh(), Some(23.2));
        Ok(())
    }

    /// The quarter-hourly shape has no per-tariff bands and reports the total
    /// under `kwh`.
    #[test]
    fn test_interval_reading_total_kwh_fallback_ok() -> Result<(), serde_json::Error> {
        // language=JSON
        let reading: IntervalReading = serde_json::from_str(
            r#"{"startTime": "20220403000000", "endTime": "20220403001500", "isMssingData": 1, "kwh": 0.4}"#,
        )?;
        assert!(reading.is_missing_data());
        assert_eq!(reading.total_kwh(), Some(0.4));
        assert_eq!(reading.off_peak_kwh(), None);
        Ok(())
    }

    // language=JSON
    const BILL: &str = r#"
        {
            "kwhData": true,
            "status": "zt",
            "totalAmount": 4695,
            "kwh": 1383,
            "comparisonOfLastYear": "+51%",
            "lastKwh": 918,
            "theLast2Kwh": 1776,
            "startDate": "1110121",
            "endDate": "1110323",
            "endDateText": "111/03/23",
            "payDueDate": "1110426",
            "currentAmount": 3765,
            "hasPaid": "B"
        }
    "#;

    #[test]
    fn test_bill_summary_ok() -> Result<(), Box<dyn std::error::Error>> {
        let bill: BillSummary = serde_json::from_str(BILL)?;
        assert_eq!(bill.bill_start_date()?, "2022/01/21");
        assert_eq!(bill.bill_end_date()?, "2022/03/23");
        assert_eq!(bill.current_amount(), 3765);
        assert_eq!(bill.kwh(), Some(1383));
        assert_eq!(bill.last_cycle_kwh(), 1776);
        assert_eq!(bill.last_year_kwh(), 918);
        Ok(())
    }

    #[test]
    fn test_bill_summary_unmetered_kwh_ok() -> Result<(), serde_json::Error> {
        let bill: BillSummary = serde_json::from_str(&BILL.replace(r#""kwhData": true"#, r#""kwhData": false"#))?;
        assert_eq!(bill.kwh(), None);
        Ok(())
    }

    // language=JSON
    const BILL_RECORD: &str = r#"
        {
            "issueYM": "109/08",
            "billFromAndToDate": "109/05/27~109/07/26",
            "totalKwh": 1374,
            "collDate": "1090825",
            "totalCharge": "4,329",
            "billFormula": "1.63x240(56/61)+2.38x420(56/61)",
            "payMethod": "免費",
            "hasPaid": "C",
            "curReadMtrDate": "1090727"
        }
    "#;

    #[test]
    fn test_bill_record_ok() -> Result<(), Box<dyn std::error::Error>> {
        let record: BillRecord = serde_json::from_str(BILL_RECORD)?;
        assert_eq!(record.issue_key()?, "2020/08");
        assert_eq!(record.charge()?, 4329);
        assert_eq!(record.kwh(), 1374);
        assert_eq!(record.period(), "109/05/27~109/07/26");
        assert!(record.paid());
        Ok(())
    }

    #[test]
    fn test_bill_records_into_map_ok() -> Result<(), Box<dyn std::error::Error>> {
        let record: BillRecord = serde_json::from_str(BILL_RECORD)?;
        let records = BillRecord::into_map(vec![record])?;
        assert!(records.contains_key("2020/08"));
        Ok(())
    }

    #[test]
    fn test_interval_readings_into_map_ok() -> Result<(), serde_json::Error> {
        // language=JSON
        let response: AmiResponse = serde_json::from_str(
            r#"
            {
                "success": true,
                "code": 1,
                "message": "123",
                "data": {
                    "custNo": null,
                    "mult": 1,
                    "data": [{
                        "startTime": "20220403000000",
                        "endTime": "20220404000000",
                        "isMssingData": 0,
                        "totalKwh": 23.2
                    }]
                }
            }
            "#,
        )?;
        let readings = IntervalReading::into_map(response.data.data);
        assert!(readings.contains_key("20220403000000"));
        Ok(())
    }

    #[test]
    fn test_token_grant_ok() -> Result<(), serde_json::Error> {
        // language=JSON
        let grant: TokenGrant = serde_json::from_str(
            r#"
            {
                "access_token": "acc",
                "token_type": "bearer",
                "refresh_token": "ref",
                "expires_in": 86400,
                "scope": "tpec"
            }
            "#,
        )?;
        assert_eq!(grant.access_token, "acc");
        assert_eq!(grant.refresh_token.as_deref(), Some("ref"));
        assert_eq!(grant.token_type, "bearer");
        assert_eq!(grant.expires_in, 86400);
        Ok(())
    }
}
