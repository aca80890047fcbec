use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{EventDateTime, RemoteEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const PRIMARY_CALENDAR_ID: &str = "primary";

/// The four operations this app needs from the calendar service, always
/// against the account's primary calendar.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn list_events(
        &self,
        access_token: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<RemoteEvent>, InfraError>;

    async fn create_event(
        &self,
        access_token: &str,
        event: &RemoteEvent,
    ) -> Result<String, InfraError>;

    async fn update_event_times(
        &self,
        access_token: &str,
        event_id: &str,
        start: &EventDateTime,
        end: &EventDateTime,
    ) -> Result<(), InfraError>;

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestCalendarGateway {
    client: Client,
}

impl ReqwestCalendarGateway {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidInput(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("calendar api error: http {}", status.as_u16())
        } else {
            format!("calendar api error: http {}; body={body}", status.as_u16())
        };
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            InfraError::Auth(message)
        } else {
            InfraError::Calendar(message)
        }
    }

    fn events_endpoint() -> Result<Url, InfraError> {
        let mut url = Url::parse(CALENDAR_API_BASE)
            .map_err(|error| InfraError::Calendar(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Calendar("calendar api base URL cannot be a base".to_string())
            })?;
            segments.push("calendars");
            segments.push(PRIMARY_CALENDAR_ID);
            segments.push("events");
        }
        Ok(url)
    }

    fn event_endpoint(event_id: &str) -> Result<Url, InfraError> {
        let mut url = Self::events_endpoint()?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Calendar("calendar events URL cannot be a base".to_string())
            })?;
            segments.push(event_id);
        }
        Ok(url)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<RemoteEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct EventTimesPatch<'a> {
    start: &'a EventDateTime,
    end: &'a EventDateTime,
}

#[async_trait]
impl CalendarGateway for ReqwestCalendarGateway {
    async fn list_events(
        &self,
        access_token: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<RemoteEvent>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = Self::events_endpoint()?;
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut request = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "2500"),
                ])
                .query(&[
                    ("timeMin", time_min.to_rfc3339()),
                    ("timeMax", time_max.to_rfc3339()),
                ]);

            if let Some(page_token) = page_token.as_deref() {
                request = request.query(&[("pageToken", page_token)]);
            }

            let response = request.send().await.map_err(|error| {
                InfraError::Calendar(format!("network error while listing events: {error}"))
            })?;

            let status = response.status();
            let body = response.text().await.map_err(|error| {
                InfraError::Calendar(format!("failed reading events list response: {error}"))
            })?;

            if !status.is_success() {
                return Err(Self::http_error(status, &body));
            }

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::Calendar(format!("invalid events list payload: {error}; body={body}"))
            })?;

            events.extend(parsed.items.take().unwrap_or_default());

            if let Some(next_page_token) = parsed.next_page_token.take() {
                page_token = Some(next_page_token);
                continue;
            }
            break;
        }

        Ok(events)
    }

    async fn create_event(
        &self,
        access_token: &str,
        event: &RemoteEvent,
    ) -> Result<String, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = Self::events_endpoint()?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while creating event: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Calendar(format!("failed reading event create response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let parsed: RemoteEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Calendar(format!("invalid event create payload: {error}; body={body}"))
        })?;
        parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::Calendar("event create response did not include id".to_string())
            })
    }

    async fn update_event_times(
        &self,
        access_token: &str,
        event_id: &str,
        start: &EventDateTime,
        end: &EventDateTime,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(event_id, "event id")?;

        let endpoint = Self::event_endpoint(event_id)?;
        let response = self
            .client
            .patch(endpoint)
            .bearer_auth(access_token)
            .json(&EventTimesPatch { start, end })
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while moving event: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Calendar(format!("failed reading event update response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(event_id, "event id")?;

        let endpoint = Self::event_endpoint(event_id)?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while deleting event: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Calendar(format!("failed reading event delete response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}
