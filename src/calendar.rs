use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use url::Url;

use crate::error::{AuthError, Error, FetchError};
use crate::models::{CalendarSection, DayGroup, EventView};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const ALL_DAY: &str = "All day";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    summary: Option<String>,
    location: Option<String>,
    start: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventStart {
    /// Start as reported by the calendar, offset included.
    Timed(DateTime<FixedOffset>),
    AllDay(NaiveDate),
}

impl EventStart {
    pub fn date(&self) -> NaiveDate {
        match self {
            EventStart::Timed(dt) => dt.date_naive(),
            EventStart::AllDay(d) => *d,
        }
    }

    pub fn time_label(&self) -> String {
        match self {
            EventStart::Timed(dt) => dt.format("%H:%M").to_string(),
            EventStart::AllDay(_) => ALL_DAY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: Option<String>,
    pub location: Option<String>,
    pub start: EventStart,
}

impl CalendarEvent {
    fn from_api(api: ApiEvent, calendar_id: &str) -> Result<Self, FetchError> {
        let bad_start = |value: String| FetchError::BadStart {
            calendar_id: calendar_id.to_string(),
            value,
        };

        let start = match api.start {
            Some(ApiEventTime {
                date_time: Some(dt), ..
            }) => EventStart::Timed(DateTime::parse_from_rfc3339(&dt).map_err(|_| bad_start(dt))?),
            Some(ApiEventTime { date: Some(d), .. }) => EventStart::AllDay(
                NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|_| bad_start(d))?,
            ),
            _ => return Err(bad_start(String::new())),
        };

        Ok(Self {
            summary: api.summary,
            location: api.location,
            start,
        })
    }
}

/// `[Monday 00:00, next Monday 00:00)` in UTC for the week containing `reference`.
/// This is the reference date's own week, even on a Sunday; it never rolls forward to the next Monday.
pub fn week_window(reference: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let monday = reference - Days::new(u64::from(reference.weekday().num_days_from_monday()));
    let start = monday.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::weeks(1))
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Label like `Monday 3rd June`.
pub fn day_label(date: NaiveDate) -> String {
    format!(
        "{} {}{} {}",
        date.format("%A"),
        date.day(),
        ordinal_suffix(date.day()),
        date.format("%B")
    )
}

/// Group events by the day they start on.
///
/// Groups come out in the order their day is first seen, which matches
/// chronological order only because the API already sorts by start time.
pub fn group_by_day(events: &[CalendarEvent]) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();

    for event in events {
        let date = event.start.date();
        let view = EventView {
            name: event.summary.clone().unwrap_or_default(),
            location: event.location.clone().unwrap_or_default(),
            when: event.start.time_label(),
        };

        match groups.iter_mut().find(|g| g.date == date) {
            Some(group) => group.events.push(view),
            None => groups.push(DayGroup {
                date,
                day: day_label(date),
                events: vec![view],
            }),
        }
    }

    groups
}

pub struct CalendarClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl CalendarClient {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_url(access_token, CALENDAR_API_BASE)
    }

    pub fn with_base_url(access_token: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn events_url(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::BadUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::BadUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("timeMin", &time_min.to_rfc3339())
                .append_pair("timeMax", &time_max.to_rfc3339())
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        Ok(url)
    }

    async fn list_events_page(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<EventListResponse, Error> {
        let url = self.events_url(calendar_id, time_min, time_max, page_token)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::Rejected(status).into());
        }

        let body = response.text().await.map_err(FetchError::from)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                calendar_id: calendar_id.to_string(),
                status,
                body,
            }
            .into());
        }

        serde_json::from_str(&body).map_err(|source| {
            FetchError::Malformed {
                calendar_id: calendar_id.to_string(),
                source,
            }
            .into()
        })
    }

    /// All single-instance events starting in `[time_min, time_max)`, ordered by start time.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, Error> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(calendar_id, time_min, time_max, page_token.as_deref())
                .await?;
            debug!("Calendar {}: page with {} events", calendar_id, page.items.len());

            for item in page.items {
                events.push(CalendarEvent::from_api(item, calendar_id)?);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }

    /// Fetch the week containing `reference` and group it into a titled section.
    pub async fn week_section(
        &self,
        calendar_id: &str,
        title: &str,
        reference: NaiveDate,
    ) -> Result<CalendarSection, Error> {
        let (time_min, time_max) = week_window(reference);
        info!(
            "Fetching {} ({}) from {} to {}",
            title, calendar_id, time_min, time_max
        );

        let events = self.list_events(calendar_id, time_min, time_max).await?;
        let days = group_by_day(&events);
        info!("{}: {} events over {} days", title, events.len(), days.len());

        Ok(CalendarSection {
            title: title.to_string(),
            days,
        })
    }
}
