//! Taipower consumer API client.

mod client;
mod endpoint;
pub(crate) mod models;
mod response;

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use enumset::EnumSet;
use futures::future::join_all;
use reqwest::{Client, RequestBuilder, header::AUTHORIZATION};
use serde::Serialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

pub use self::endpoint::AmiPeriod;
use self::{
    endpoint::{Auth, Endpoint},
    models::{
        AmiResponse,
        BillRecord,
        BillResponse,
        BillSummary,
        IntervalReading,
        MemberResponse,
        TokenGrant,
    },
};
use crate::{
    crypto,
    error::FetchError,
    meter::{DataKind, ElectricMeter, FetchPayload},
    prelude::*,
};

const API_HOST: &str = "mapp-2019.taipower.com.tw";

/// Fixed app credential for the basic-auth-gated endpoints.
const BASIC_AUTH: &str = "dHBlYy13U1pvLTVDNjZTZG84ZzM6X1UyVlpZd05kWi1hTW9ILV9fZlctZ3ROR0lwVmgydy4=";

const APP_VERSION: &str = "3.0.6";

/// Reauthenticate this long before the access token expires.
///
/// Deliberately generous: a refresh batch is expensive to retry, so it must
/// never start on a token that runs out mid-batch.
const REAUTH_MARGIN: TimeDelta = TimeDelta::seconds(300);

/// The session's token pair.
///
/// Written only by (re)authentication, read by every request's
/// header-construction step.
#[derive(Clone, Debug)]
pub struct Tokens {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Whether the access token expires within the given margin.
    #[must_use]
    pub fn expires_within(&self, margin: TimeDelta, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= margin
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

fn url(endpoint: Endpoint) -> String {
    format!("https://{API_HOST}/{path}", path = endpoint.path)
}

/// Taipower API session: owns the token pair and the meter registry.
pub struct Api {
    account: String,
    password: String,
    electric_numbers: Option<Vec<String>>,
    period: AmiPeriod,
    device_id: Uuid,
    tokens: Option<Tokens>,
    meters: BTreeMap<String, ElectricMeter>,
}

impl Api {
    /// Build a client for the account (phone number) and password.
    ///
    /// The device identifier sent with the password grant is generated here,
    /// once per instance.
    #[must_use]
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            electric_numbers: None,
            period: AmiPeriod::default(),
            device_id: Uuid::new_v4(),
            tokens: None,
            meters: BTreeMap::new(),
        }
    }

    /// Restrict the registry to the given electric numbers.
    ///
    /// Each of them must turn out to be an AMI-enabled meter of the account,
    /// otherwise [`Api::login`] fails with a configuration error.
    #[must_use]
    pub fn with_electric_numbers(mut self, electric_numbers: Vec<String>) -> Self {
        self.electric_numbers = Some(electric_numbers);
        self
    }

    /// Select the granularity of fetched interval readings.
    #[must_use]
    pub const fn with_period(mut self, period: AmiPeriod) -> Self {
        self.period = period;
        self
    }

    /// The registered electric meters, keyed by electric number.
    #[must_use]
    pub const fn meters(&self) -> &BTreeMap<String, ElectricMeter> {
        &self.meters
    }

    #[must_use]
    pub const fn tokens(&self) -> Option<&Tokens> {
        self.tokens.as_ref()
    }

    /// Sign in and build the meter registry.
    ///
    /// Ends with one opportunistic full refresh whose failure is logged and
    /// swallowed: login succeeds as soon as the registry is built.
    #[instrument(skip_all)]
    pub async fn login(&mut self) -> Result {
        let client = client::try_new()?;
        self.reauth_with(&client, false).await?;
        let body = self.post_empty(&client, endpoint::MEMBER).await.map_err(Error::MemberList)?;
        let response: MemberResponse =
            serde_json::from_value(body).map_err(|error| Error::MemberList(error.into()))?;
        self.meters = ElectricMeter::from_electric_meter_list(
            response.data.electric_list,
            self.electric_numbers.as_deref(),
        )?;
        info!(n_meters = self.meters.len(), "retrieved electric meters");
        if let Err(error) = self.refresh_status(None, EnumSet::all()).await {
            debug!(%error, "opportunistic refresh failed");
        }
        Ok(())
    }

    /// Obtain a new token pair.
    ///
    /// With `use_refresh_token` set and a session at hand, this submits the
    /// stored refresh token; otherwise it falls back to the password grant.
    pub async fn reauth(&mut self, use_refresh_token: bool) -> Result {
        let client = client::try_new()?;
        self.reauth_with(&client, use_refresh_token).await
    }

    #[instrument(skip_all, fields(use_refresh_token = use_refresh_token))]
    async fn reauth_with(&mut self, client: &Client, use_refresh_token: bool) -> Result {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum GrantRequest<'a> {
            Refresh {
                refresh_token: &'a str,
                grant_type: &'static str,
            },
            Password {
                username: &'a str,
                password: String,
                grant_type: &'static str,
                scope: &'static str,
                device_id: String,
                #[serde(rename = "appVersion")]
                app_version: &'static str,
            },
        }

        let (request, previous_refresh_token) = match &self.tokens {
            Some(tokens) if use_refresh_token => (
                GrantRequest::Refresh {
                    refresh_token: &tokens.refresh_token,
                    grant_type: "refresh_token",
                },
                Some(tokens.refresh_token.clone()),
            ),
            _ => (
                GrantRequest::Password {
                    username: &self.account,
                    password: crypto::encrypt(&self.password)?,
                    grant_type: "password",
                    scope: "tpec",
                    device_id: self.device_id.to_string(),
                    app_version: APP_VERSION,
                },
                None,
            ),
        };

        let body = self
            .execute(client.post(url(endpoint::TOKEN)).form(&request), endpoint::TOKEN.auth)
            .await
            .map_err(|error| Error::Authentication(error.to_string()))?;
        let grant: TokenGrant =
            serde_json::from_value(body).map_err(|error| Error::Authentication(error.to_string()))?;
        if grant.token_type != "bearer" {
            return Err(Error::Authentication(format!(
                "unexpected token type `{token_type}`",
                token_type = grant.token_type,
            )));
        }

        // The refresh grant does not rotate the refresh token.
        let refresh_token = match previous_refresh_token {
            Some(previous) => previous,
            None => grant.refresh_token.ok_or_else(|| {
                Error::Authentication("the grant is missing a refresh token".to_owned())
            })?,
        };
        let expires_at = Utc::now() + TimeDelta::seconds(grant.expires_in);
        info!(%expires_at, "authenticated");
        self.tokens =
            Some(Tokens { access_token: grant.access_token, refresh_token, expires_at });
        Ok(())
    }

    /// Reauthenticate when the access token is about to expire.
    ///
    /// Runs before every batch, so that the whole batch is covered by one
    /// valid token. This is a full password login, not a token refresh.
    async fn ensure_fresh(&mut self, client: &Client) -> Result {
        let stale = self
            .tokens
            .as_ref()
            .is_none_or(|tokens| tokens.expires_within(REAUTH_MARGIN, Utc::now()));
        if stale {
            info!("access token is stale, reauthenticating");
            self.reauth_with(client, false).await?;
        }
        Ok(())
    }

    /// Fetch interval readings of one meter around the given moment
    /// (defaulting to now), keyed by start time.
    pub async fn get_readings(
        &self,
        electric_number: &str,
        at: Option<NaiveDateTime>,
    ) -> Result<BTreeMap<String, IntervalReading>> {
        let client = client::try_new()?;
        self.fetch_readings(&client, electric_number, at.unwrap_or_else(|| Local::now().naive_local()))
            .await
    }

    /// Fetch the current bill of one meter.
    pub async fn get_bill(&self, electric_number: &str) -> Result<BillSummary> {
        let client = client::try_new()?;
        self.fetch_bill(&client, electric_number).await
    }

    /// Fetch the historical bills of one meter, keyed by Gregorian `YYYY/MM`
    /// issue date.
    pub async fn get_bill_records(
        &self,
        electric_number: &str,
    ) -> Result<BTreeMap<String, BillRecord>> {
        let client = client::try_new()?;
        self.fetch_bill_records(&client, electric_number).await
    }

    /// Refresh the requested data kinds of the registered meters: all of
    /// them, or just the named one.
    ///
    /// All fetches of one batch run concurrently over a shared connection
    /// pool. A failing task never cancels the others: every task runs to
    /// completion, successes are committed to the registry unconditionally,
    /// and the collected failures are reported as one aggregate error.
    #[instrument(skip_all, fields(electric_number = electric_number))]
    pub async fn refresh_status(
        &mut self,
        electric_number: Option<&str>,
        kinds: EnumSet<DataKind>,
    ) -> Result {
        let client = client::try_new()?;
        self.ensure_fresh(&client).await?;

        let numbers: Vec<String> = self
            .meters
            .keys()
            .filter(|number| electric_number.is_none_or(|requested| requested == number.as_str()))
            .cloned()
            .collect();
        let mut tasks = Vec::with_capacity(numbers.len() * kinds.len());
        for number in &numbers {
            for kind in kinds {
                tasks.push(self.fetch(&client, number.clone(), kind));
            }
        }
        info!(n_tasks = tasks.len(), "refreshing…");

        let outcomes = join_all(tasks).await;
        let errors = commit(&mut self.meters, outcomes);
        if errors.is_empty() { Ok(()) } else { Err(Error::BatchRefresh { errors }) }
    }

    async fn fetch(
        &self,
        client: &Client,
        number: String,
        kind: DataKind,
    ) -> (String, DataKind, Result<FetchPayload>) {
        let result = match kind {
            DataKind::IntervalReadings => self
                .fetch_readings(client, &number, Local::now().naive_local())
                .await
                .map(FetchPayload::Readings),
            DataKind::CurrentBill => {
                self.fetch_bill(client, &number).await.map(FetchPayload::Bill)
            }
            DataKind::BillHistory => {
                self.fetch_bill_records(client, &number).await.map(FetchPayload::Records)
            }
        };
        (number, kind, result)
    }

    #[instrument(skip_all, fields(electric_number = electric_number, at = %at))]
    async fn fetch_readings(
        &self,
        client: &Client,
        electric_number: &str,
        at: NaiveDateTime,
    ) -> Result<BTreeMap<String, IntervalReading>> {
        const KIND: DataKind = DataKind::IntervalReadings;

        let (date_key, date_value) = self.period.date_parameter(at);
        let mut body = Map::new();
        body.insert("custNo".to_owned(), Value::String(electric_number.to_owned()));
        body.insert(date_key.to_owned(), Value::String(date_value));
        let body = self
            .post_json(client, self.period.endpoint(), &Value::Object(body))
            .await
            .map_err(|source| Error::fetch(KIND, source))?;
        let response: AmiResponse =
            serde_json::from_value(body).map_err(|source| Error::fetch(KIND, source))?;
        Ok(IntervalReading::into_map(response.data.data))
    }

    #[instrument(skip_all, fields(electric_number = electric_number))]
    async fn fetch_bill(&self, client: &Client, electric_number: &str) -> Result<BillSummary> {
        const KIND: DataKind = DataKind::CurrentBill;

        let body = json!({
            "phoneNo": self.account,
            "deviceId": "",
            "customNo": electric_number,
        });
        let body = self
            .post_json(client, endpoint::BILLS, &body)
            .await
            .map_err(|source| Error::fetch(KIND, source))?;
        let response: BillResponse =
            serde_json::from_value(body).map_err(|source| Error::fetch(KIND, source))?;
        Ok(response.data)
    }

    #[instrument(skip_all, fields(electric_number = electric_number))]
    async fn fetch_bill_records(
        &self,
        client: &Client,
        electric_number: &str,
    ) -> Result<BTreeMap<String, BillRecord>> {
        const KIND: DataKind = DataKind::BillHistory;

        let body = json!({ "customNo": electric_number });
        let body = self
            .post_json(client, endpoint::BILL_RECORDS, &body)
            .await
            .map_err(|source| Error::fetch(KIND, source))?;
        let response: models::RecordsResponse =
            serde_json::from_value(body).map_err(|source| Error::fetch(KIND, source))?;
        BillRecord::into_map(response.data).map_err(|source| Error::fetch(KIND, source))
    }

    async fn post_json(
        &self,
        client: &Client,
        endpoint: Endpoint,
        body: &Value,
    ) -> Result<Value, FetchError> {
        self.execute(client.post(url(endpoint)).json(body), endpoint.auth).await
    }

    async fn post_empty(&self, client: &Client, endpoint: Endpoint) -> Result<Value, FetchError> {
        self.execute(client.post(url(endpoint)), endpoint.auth).await
    }

    async fn execute(&self, request: RequestBuilder, auth: Auth) -> Result<Value, FetchError> {
        let response = request.header(AUTHORIZATION, self.authorization(auth)?).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        debug!(%status, %body, "response received");
        let label = response::status_label(status, &body);
        if label == response::STATUS_OK { Ok(body) } else { Err(FetchError::Status(label)) }
    }

    fn authorization(&self, auth: Auth) -> Result<String, FetchError> {
        match auth {
            Auth::Basic => Ok(format!("Basic {BASIC_AUTH}")),
            Auth::Bearer => {
                let tokens = self.tokens.as_ref().ok_or(FetchError::NotAuthenticated)?;
                Ok(format!("Bearer {access_token}", access_token = tokens.access_token))
            }
        }
    }
}

/// Write successful task results back onto their meters and collect the
/// failures.
///
/// Successes are committed regardless of other tasks' failures in the same
/// batch; each task targets its own (meter, data kind) pair.
fn commit(
    meters: &mut BTreeMap<String, ElectricMeter>,
    outcomes: Vec<(String, DataKind, Result<FetchPayload>)>,
) -> Vec<Error> {
    let mut errors = Vec::new();
    for (number, kind, result) in outcomes {
        match result {
            Ok(payload) => {
                if let Some(meter) = meters.get_mut(&number) {
                    meter.apply(payload);
                }
            }
            Err(error) => {
                warn!(%number, %kind, %error, "refresh task failed");
                errors.push(error);
            }
        }
    }
    errors
}
