//! Republic-of-China calendar dates.
//!
//! The vendor reports most dates in the ROC calendar, whose year is offset by
//! 1911 from the Gregorian one. Dates come in several textual shapes
//! (`yyy/mm/dd`, `yyymmdd`, `yyy/mm`); the first three characters are always
//! the ROC year and the remainder is kept verbatim.

use thiserror::Error;

const YEAR_OFFSET: u32 = 1911;

#[derive(Debug, Error)]
pub enum RocDateError {
    #[error("ROC date `{0}` is too short")]
    TooShort(String),

    #[error("ROC date `{0}` does not start with a numeric year")]
    BadYear(String),
}

/// Reinterpret the leading 3-character ROC year as `1911 + year` and keep the
/// rest of the text as is.
///
/// `"111/03/05"` becomes `"2022/03/05"` and `"1100406"` becomes `"20210406"`.
pub fn to_gregorian(roc: &str) -> Result<String, RocDateError> {
    let (year, rest) =
        roc.split_at_checked(3).ok_or_else(|| RocDateError::TooShort(roc.to_owned()))?;
    let year: u32 =
        year.parse().map_err(|_| RocDateError::BadYear(roc.to_owned()))?;
    Ok(format!("{}{rest}", YEAR_OFFSET + year))
}

/// Convert a compact 7-digit ROC date (`yyymmdd`) into slashed Gregorian
/// `YYYY/MM/DD`.
pub fn compact_to_slashed(roc: &str) -> Result<String, RocDateError> {
    if roc.len() != 7 {
        return Err(RocDateError::TooShort(roc.to_owned()));
    }
    if !roc.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(RocDateError::BadYear(roc.to_owned()));
    }
    let gregorian = to_gregorian(roc)?;
    Ok(format!("{}/{}/{}", &gregorian[..4], &gregorian[4..6], &gregorian[6..8]))
}
