//! Vendor endpoint descriptors.
//!
//! One const descriptor per operation instead of a type per endpoint: a
//! descriptor only carries the path and the authorization kind, the payload is
//! built at the call site.

use chrono::NaiveDateTime;

/// Authorization header kind of an endpoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Auth {
    /// The fixed app credential; used by the login endpoint.
    Basic,

    /// The session's access token.
    Bearer,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct Endpoint {
    pub path: &'static str,
    pub auth: Auth,
}

/// `oauth/token` takes a form-encoded body, unlike everything else.
pub(crate) const TOKEN: Endpoint = Endpoint { path: "oauth/token", auth: Auth::Basic };

pub(crate) const MEMBER: Endpoint = Endpoint { path: "member/getData", auth: Auth::Bearer };

pub(crate) const BILLS: Endpoint = Endpoint { path: "api/home/bills", auth: Auth::Bearer };

pub(crate) const BILL_RECORDS: Endpoint =
    Endpoint { path: "api/mybill/records", auth: Auth::Bearer };

/// Time granularity of the interval readings.
///
/// Each granularity is a separate vendor endpoint and wants a differently
/// formatted date parameter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AmiPeriod {
    /// Quarter-hourly buckets.
    Quarter,

    /// Hourly buckets.
    Hour,

    /// Daily buckets.
    #[default]
    Daily,

    /// Monthly buckets.
    Monthly,
}

impl AmiPeriod {
    pub(crate) const fn endpoint(self) -> Endpoint {
        let path = match self {
            // The vendor indeed spells it `quater`.
            Self::Quarter => "api/ami/quater",
            Self::Hour => "api/ami/hour",
            Self::Daily => "api/ami/daily",
            Self::Monthly => "api/ami/monthly",
        };
        Endpoint { path, auth: Auth::Bearer }
    }

    /// Payload key and formatted value selecting the target date.
    pub(crate) fn date_parameter(self, at: NaiveDateTime) -> (&'static str, String) {
        match self {
            Self::Quarter | Self::Hour => ("date", at.format("%Y%m%d").to_string()),
            Self::Daily => ("yearMonth", at.format("%Y%m").to_string()),
            Self::Monthly => ("year", at.format("%Y").to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_parameter_ok() {
        let at = NaiveDateTime::parse_from_str("2022-04-03 12:34:56", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(AmiPeriod::Quarter.date_parameter(at), ("date", "20220403".to_owned()));
        assert_eq!(AmiPeriod::Hour.date_parameter(at), ("date", "20220403".to_owned()));
        assert_eq!(AmiPeriod::Daily.date_parameter(at), ("yearMonth", "202204".to_owned()));
        assert_eq!(AmiPeriod::Monthly.date_parameter(at), ("year", "2022".to_owned()));
    }

    #[test]
    fn test_ami_endpoints_ok() {
        assert_eq!(AmiPeriod::Quarter.endpoint().path, "api/ami/quater");
        assert_eq!(AmiPeriod::Daily.endpoint().path, "api/ami/daily");
        assert_eq!(AmiPeriod::default(), AmiPeriod::Daily);
    }
}
