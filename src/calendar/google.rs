//! Google Calendar provider over the OAuth 2.0 token endpoint and the
//! Calendar v3 REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CalendarProvider, EventDraft};
use crate::types::{CalendarCredentials, CalendarEvent, Task};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const EVENTS_ENDPOINT: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const SCOPES: &str =
    "https://www.googleapis.com/auth/calendar https://www.googleapis.com/auth/calendar.events";

/// Events returned per listing.
const LIST_MAX_RESULTS: u32 = 10;

/// OAuth client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleCalendarConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// IANA time zone attached to created events.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

fn default_time_zone() -> String {
    "America/New_York".to_string()
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

/// Google Calendar client.
pub struct GoogleCalendar {
    config: GoogleCalendarConfig,
    http: Client,
}

impl GoogleCalendar {
    pub fn new(config: GoogleCalendarConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    pub fn config(&self) -> &GoogleCalendarConfig {
        &self.config
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    fn auth_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
             &access_type=offline&prompt=consent&state={}",
            AUTH_ENDPOINT,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<CalendarCredentials> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let token: TokenResponse = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .context("token request failed")?
            .error_for_status()
            .context("token endpoint rejected the code")?
            .json()
            .await
            .context("malformed token response")?;

        debug!("Exchanged authorization code for calendar tokens");

        Ok(CalendarCredentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| (Utc::now() + Duration::seconds(secs)).timestamp_millis()),
            scope: token.scope,
            token_type: token.token_type,
        })
    }

    async fn create_event_from_task(
        &self,
        credentials: &CalendarCredentials,
        task: &Task,
    ) -> Result<CalendarEvent> {
        let draft = EventDraft::from_task(task, &self.config.time_zone, Utc::now());

        let event: CalendarEvent = self
            .http
            .post(EVENTS_ENDPOINT)
            .bearer_auth(&credentials.access_token)
            .json(&draft)
            .send()
            .await
            .context("event insert request failed")?
            .error_for_status()
            .context("calendar rejected the event")?
            .json()
            .await
            .context("malformed event response")?;

        Ok(event)
    }

    async fn list_events(
        &self,
        credentials: &CalendarCredentials,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let time_min = time_min.to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = time_max.to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = LIST_MAX_RESULTS.to_string();
        let query = [
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
            ("maxResults", max_results.as_str()),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
        ];

        let list: EventList = self
            .http
            .get(EVENTS_ENDPOINT)
            .bearer_auth(&credentials.access_token)
            .query(&query)
            .send()
            .await
            .context("event list request failed")?
            .error_for_status()
            .context("calendar rejected the listing")?
            .json()
            .await
            .context("malformed event list")?;

        Ok(list.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleCalendar {
        GoogleCalendar::new(GoogleCalendarConfig {
            client_id: "client id".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:3000/calendar/auth/google/callback".into(),
            time_zone: default_time_zone(),
        })
    }

    #[test]
    fn auth_url_carries_state_and_offline_access() {
        let url = provider().auth_url("user-42");
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("state=user-42"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000"));
    }

    #[test]
    fn event_list_tolerates_missing_items() {
        let list: EventList = serde_json::from_str("{}").unwrap();
        assert!(list.items.is_empty());
    }
}
