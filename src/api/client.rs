use std::time::Duration;

use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue},
};

/// The app identifies itself as a generic browser.
const USER_AGENT: &str = "Mozilla/5.0 ( compatible )";

/// Build a client with the fixed headers every endpoint expects.
///
/// A batch refresh builds one client and shares its connection pool across all
/// tasks; one-off entry points build a short-lived client of their own.
pub(crate) fn try_new() -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(Duration::from_secs(10))
        .build()
}
