//! Weather capability backed by Open-Meteo (geocoding + forecast).

use crate::config::{AgentSettings, WeatherConfig};
use crate::phrasing::Phraser;
use crate::ui::{self, fmt_day, fmt_num, fmt_temp};
use async_trait::async_trait;
use conduit_common::{
    Capability, CapabilityName, ConduitError, NodeUpdate, RenderNode, RequestSession, Result,
};
use conduit_llm::LlmClient;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

const HOURLY_ROWS: usize = 12;

pub const LOCATION_NEEDED: &str =
    "Which location should I use (e.g., 'Seattle, WA')? You can also say 'hourly' or '7-day'.";

pub const SERVICE_UNAVAILABLE: &str =
    "Weather service is temporarily unavailable. Please try again.";

static LOCATION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:in|for)\s+").unwrap());

static TIME_QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:today|tomorrow|this week|next week|hourly|forecast|next \d+ hours?)\b.*$")
        .unwrap()
});

static TRAILING_CONNECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:in|for|on|at|the)$").unwrap());

static DAY_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*-?\s*days?\b").unwrap());

static REGION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([A-Za-z]{2})\s*$").unwrap());

static REGION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:,\s*[A-Za-z]{2}\s*$)|(?:\s+[A-Za-z]{2}\s*$)").unwrap());

// ============================================================================
// Data
// ============================================================================

/// A resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentWeather {
    pub time: Option<String>,
    pub temperature: Option<f64>,
    pub windspeed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub precipitation_probability: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub windspeed_10m: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailySeries {
    pub time: Vec<String>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub precipitation_probability_max: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: GeoLocation,
    pub current: CurrentWeather,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TodaySummary {
    pub as_of: Option<String>,
    pub temp_c: Option<f64>,
    pub wind_kph: Option<f64>,
    pub high_c: Option<f64>,
    pub low_c: Option<f64>,
    pub precip_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRow {
    pub time: String,
    pub temp_c: Option<f64>,
    pub precip_pct: Option<f64>,
    pub precip_mm: Option<f64>,
    pub wind_kph: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyRow {
    pub date: String,
    pub high_c: Option<f64>,
    pub low_c: Option<f64>,
    pub precip_pct: Option<f64>,
}

fn at(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

impl Forecast {
    pub fn today(&self) -> TodaySummary {
        TodaySummary {
            as_of: self.current.time.clone(),
            temp_c: self.current.temperature,
            wind_kph: self.current.windspeed,
            high_c: at(&self.daily.temperature_2m_max, 0),
            low_c: at(&self.daily.temperature_2m_min, 0),
            precip_pct: at(&self.daily.precipitation_probability_max, 0),
        }
    }

    /// Up to `hours` rows starting at the current hour when it is present in
    /// the series, else at the first entry.
    pub fn hourly_rows(&self, hours: usize) -> Vec<HourlyRow> {
        let h = &self.hourly;
        let start = self
            .current
            .time
            .as_ref()
            .and_then(|now| h.time.iter().position(|t| t == now))
            .unwrap_or(0);
        h.time
            .iter()
            .enumerate()
            .skip(start)
            .take(hours)
            .map(|(i, time)| HourlyRow {
                time: time.clone(),
                temp_c: at(&h.temperature_2m, i),
                precip_pct: at(&h.precipitation_probability, i),
                precip_mm: at(&h.precipitation, i),
                wind_kph: at(&h.windspeed_10m, i),
            })
            .collect()
    }

    pub fn daily_rows(&self, days: usize) -> Vec<DailyRow> {
        let d = &self.daily;
        d.time
            .iter()
            .enumerate()
            .take(days)
            .map(|(i, date)| DailyRow {
                date: date.clone(),
                high_c: at(&d.temperature_2m_max, i),
                low_c: at(&d.temperature_2m_min, i),
                precip_pct: at(&d.precipitation_probability_max, i),
            })
            .collect()
    }
}

// ============================================================================
// Request interpretation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherView {
    Today,
    Hourly,
    Daily(usize),
}

pub fn choose_view(text: &str) -> WeatherView {
    let t = text.to_lowercase();

    if let Some(n) = DAY_COUNT
        .captures(&t)
        .and_then(|c| c[1].parse::<usize>().ok())
    {
        if (3..=10).contains(&n) {
            return WeatherView::Daily(n);
        }
    }

    let any = |needles: &[&str]| needles.iter().any(|n| t.contains(n));
    if any(&["hour", "next 12", "next 24"]) {
        WeatherView::Hourly
    } else if any(&["ten day"]) {
        WeatherView::Daily(10)
    } else if any(&["week"]) {
        WeatherView::Daily(7)
    } else if any(&["three day"]) {
        WeatherView::Daily(3)
    } else if any(&["tomorrow", "next few days", "forecast"]) {
        WeatherView::Daily(7)
    } else {
        WeatherView::Today
    }
}

/// Place named after "in" or "for", without trailing time qualifiers.
pub fn extract_location(text: &str) -> Option<String> {
    LOCATION_PREFIX.find_iter(text).find_map(|m| {
        let tail = &text[m.end()..];
        let end = tail
            .find(|c: char| matches!(c, '\n' | '\r' | '?' | ','))
            .unwrap_or(tail.len());
        let candidate = TIME_QUALIFIER.replace(&tail[..end], "");
        let candidate = candidate.trim_end_matches(|c: char| c.is_whitespace() || c == '.' || c == '!');
        let candidate = TRAILING_CONNECTOR.replace(candidate, "");
        let candidate = candidate.trim();
        (!candidate.is_empty()).then(|| candidate.to_string())
    })
}

/// Progressively simpler spellings of a place for the geocoder, plus a
/// country filter when the input ends in a two-letter region code.
pub fn geocode_candidates(raw: &str) -> (Vec<String>, Option<&'static str>) {
    let raw = raw.trim();
    let mut candidates: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        let s = s.trim();
        if !s.is_empty() && !candidates.iter().any(|c| c == s) {
            candidates.push(s.to_string());
        }
    };

    push(raw);
    if let Some((before, _)) = raw.split_once(',') {
        push(before);
    }
    if let Some(m) = REGION_SUFFIX.captures(raw).and_then(|c| c.get(1)) {
        let shortened = raw[..m.start()].trim().trim_end_matches(',');
        push(shortened);
        if let Some((before, _)) = shortened.split_once(',') {
            push(before);
        }
    }
    let lower = raw.to_lowercase();
    for suffix in [" usa", " us"] {
        if lower.ends_with(suffix) {
            push(&raw[..raw.len() - suffix.len()]);
        }
    }

    let country = REGION_CODE.is_match(raw).then_some("US");
    (candidates, country)
}

// ============================================================================
// Backend
// ============================================================================

#[async_trait]
pub trait WeatherBackend: Send + Sync {
    /// `Ok(None)` when nothing matches the query.
    async fn geocode(&self, query: &str) -> Result<Option<GeoLocation>>;
    async fn forecast(&self, location: &GeoLocation) -> Result<Forecast>;
}

#[derive(Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Deserialize)]
struct GeocodingResult {
    name: Option<String>,
    latitude: f64,
    longitude: f64,
    timezone: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ForecastResponse {
    timezone: Option<String>,
    current_weather: CurrentWeather,
    hourly: HourlySeries,
    daily: DailySeries,
}

#[derive(Clone)]
pub struct OpenMeteoBackend {
    config: WeatherConfig,
    client: Client,
}

impl OpenMeteoBackend {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConduitError::Config(format!("Failed to build weather client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| ConduitError::CapabilityUnavailable(format!("weather request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConduitError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ConduitError::CapabilityUnavailable(format!("unreadable weather response: {e}")))
    }
}

#[async_trait]
impl WeatherBackend for OpenMeteoBackend {
    async fn geocode(&self, query: &str) -> Result<Option<GeoLocation>> {
        let (candidates, country) = geocode_candidates(query);
        for name in candidates {
            let mut params = vec![
                ("name", name.clone()),
                ("count", "1".to_string()),
                ("language", "en".to_string()),
                ("format", "json".to_string()),
            ];
            if let Some(code) = country {
                params.push(("country_code", code.to_string()));
            }
            let response: GeocodingResponse =
                self.get_json(&self.config.geocoding_url, &params).await?;
            if let Some(first) = response.results.into_iter().next() {
                debug!(query = %name, "Geocoded location");
                return Ok(Some(GeoLocation {
                    name: first.name.unwrap_or(name),
                    latitude: first.latitude,
                    longitude: first.longitude,
                    timezone: first.timezone.unwrap_or_else(|| "auto".to_string()),
                }));
            }
        }
        Ok(None)
    }

    async fn forecast(&self, location: &GeoLocation) -> Result<Forecast> {
        let params = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("current_weather", "true".to_string()),
            (
                "hourly",
                "temperature_2m,precipitation_probability,precipitation,weathercode,windspeed_10m"
                    .to_string(),
            ),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,precipitation_probability_max,weathercode"
                    .to_string(),
            ),
            ("timezone", "auto".to_string()),
        ];
        let response: ForecastResponse = self.get_json(&self.config.forecast_url, &params).await?;
        let mut location = location.clone();
        if let Some(tz) = response.timezone {
            location.timezone = tz;
        }
        Ok(Forecast {
            location,
            current: response.current_weather,
            hourly: response.hourly,
            daily: response.daily,
        })
    }
}

// ============================================================================
// Capability
// ============================================================================

pub struct WeatherAgent {
    backend: Arc<dyn WeatherBackend>,
    phraser: Phraser,
}

fn card_update(text: String, subtitle: &str, kv_label: &str) -> NodeUpdate {
    let card = ui::weather_card(subtitle, vec![(kv_label.to_string(), text.clone())], None, None);
    NodeUpdate::text(text).with_a2ui(card)
}

fn kv(pairs: &[(&str, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(label, value)| (label.to_string(), value.clone()))
        .collect()
}

impl WeatherAgent {
    pub fn new(backend: Arc<dyn WeatherBackend>, phraser: Phraser) -> Self {
        Self { backend, phraser }
    }

    pub fn from_config(
        config: &WeatherConfig,
        llm: Option<Arc<dyn LlmClient>>,
        settings: &AgentSettings,
    ) -> Result<Self> {
        Ok(Self::new(
            Arc::new(OpenMeteoBackend::new(config.clone())?),
            Phraser::new(llm, settings),
        ))
    }

    async fn hourly(&self, session: &RequestSession, forecast: &Forecast) -> Result<NodeUpdate> {
        let name = &forecast.location.name;
        let rows = forecast.hourly_rows(HOURLY_ROWS);
        let today = forecast.today();

        let narrative = format!(
            "Next 12 hours in {name}\nNow: {} • Precip: {} • Wind: {}",
            fmt_temp(today.temp_c),
            fmt_num(today.precip_pct, "%"),
            fmt_num(today.wind_kph, " km/h"),
        );
        let table_rows: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.time.clone(),
                    fmt_temp(r.temp_c),
                    fmt_num(r.precip_pct, "%"),
                    fmt_num(r.precip_mm, ""),
                    fmt_num(r.wind_kph, ""),
                ]
            })
            .collect();
        let prompt = format!(
            "Write 1-2 short sentences summarizing this hourly weather forecast for a user. \
             Do not add facts not present.\n\nLocation: {name}\nHourly rows:\n{}",
            table_rows
                .iter()
                .map(|r| r.join(" | "))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let narrative = self.phraser.phrase(session, prompt, narrative).await?;

        let table = RenderNode::table(
            Some("Hourly".to_string()),
            ["Time", "Temp", "Precip", "Precip (mm)", "Wind (km/h)"]
                .map(String::from)
                .to_vec(),
            table_rows,
        );
        let card = ui::weather_card(
            &format!("{name} • Next 12 hours"),
            kv(&[
                ("As of", today.as_of.clone().unwrap_or_default()),
                ("Now", fmt_temp(today.temp_c)),
                (
                    "High / Low",
                    format!("{} / {}", fmt_temp(today.high_c), fmt_temp(today.low_c)),
                ),
                ("Precip chance", fmt_num(today.precip_pct, "%")),
                ("Wind", fmt_num(today.wind_kph, " km/h")),
            ]),
            None,
            Some(table),
        );
        Ok(NodeUpdate::text(narrative).with_a2ui(card))
    }

    async fn daily(
        &self,
        session: &RequestSession,
        forecast: &Forecast,
        days: usize,
    ) -> Result<NodeUpdate> {
        let name = &forecast.location.name;
        let rows = forecast.daily_rows(days);

        let preview: Vec<String> = rows
            .iter()
            .take(3)
            .map(|r| {
                format!(
                    "- {}: {} / {} • precip {}",
                    fmt_day(&r.date),
                    fmt_temp(r.high_c),
                    fmt_temp(r.low_c),
                    fmt_num(r.precip_pct, "%")
                )
            })
            .collect();
        let mut narrative = format!("{days}-day forecast for {name}\n");
        if !preview.is_empty() {
            narrative.push_str("Next 3 days:\n");
            narrative.push_str(&preview.join("\n"));
        }

        let table_rows: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    fmt_temp(r.high_c),
                    fmt_temp(r.low_c),
                    fmt_num(r.precip_pct, "%"),
                ]
            })
            .collect();
        let prompt = format!(
            "Write a short, human-friendly weather summary based ONLY on the data provided. \
             2-4 sentences max. Mention the overall rain risk, any warming or cooling trend, \
             and the warmest high and coldest low with their days. Do not invent conditions.\n\n\
             Location: {name}\nDays (date | high | low | precip):\n{}",
            table_rows
                .iter()
                .map(|r| r.join(" | "))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let narrative = self.phraser.phrase(session, prompt, narrative).await?;

        let table = RenderNode::table(
            Some("Daily".to_string()),
            ["Date", "High", "Low", "Precip"].map(String::from).to_vec(),
            table_rows,
        );
        let card = ui::weather_card(
            &format!("{name} • {days}-day forecast"),
            kv(&[("Timezone", forecast.location.timezone.clone())]),
            None,
            Some(table),
        );
        Ok(NodeUpdate::text(narrative).with_a2ui(card))
    }

    async fn today(&self, session: &RequestSession, forecast: &Forecast) -> Result<NodeUpdate> {
        let name = &forecast.location.name;
        let today = forecast.today();

        let narrative = format!(
            "Today in {name}\nNow: {}\nHigh / Low: {} / {}\nPrecip: {} • Wind: {}",
            fmt_temp(today.temp_c),
            fmt_temp(today.high_c),
            fmt_temp(today.low_c),
            fmt_num(today.precip_pct, "%"),
            fmt_num(today.wind_kph, " km/h"),
        );
        let prompt = format!(
            "Write 1-2 short sentences summarizing today's weather from these values. \
             Do not add facts not present.\n\nLocation: {name}\nValues:\n{narrative}"
        );
        let narrative = self.phraser.phrase(session, prompt, narrative).await?;

        let card = ui::weather_card(
            &format!("{name} • Today"),
            kv(&[
                ("As of", today.as_of.clone().unwrap_or_default()),
                ("Now", fmt_temp(today.temp_c)),
                ("High", fmt_temp(today.high_c)),
                ("Low", fmt_temp(today.low_c)),
                ("Precip chance", fmt_num(today.precip_pct, "%")),
                ("Wind", fmt_num(today.wind_kph, " km/h")),
            ]),
            None,
            None,
        );
        Ok(NodeUpdate::text(narrative).with_a2ui(card))
    }
}

#[async_trait]
impl Capability for WeatherAgent {
    fn name(&self) -> CapabilityName {
        CapabilityName::WeatherAgent
    }

    fn description(&self) -> &str {
        "Current conditions and hourly or daily forecasts for a named place"
    }

    async fn run(&self, session: &RequestSession) -> Result<NodeUpdate> {
        let text = session.request().message();
        let view = choose_view(text);

        let Some(place) = extract_location(text) else {
            return Ok(card_update(LOCATION_NEEDED.to_string(), "Location needed", "Next"));
        };

        session
            .progress(NodeUpdate::text(format!("Looking up {place}…")))
            .await?;

        let location = match session.bounded(self.backend.geocode(&place)).await? {
            Ok(Some(location)) => location,
            Ok(None) => {
                let text = format!(
                    "I couldn't find a location matching '{place}'. \
                     Try a more specific place name (e.g., 'Austin, TX')."
                );
                return Ok(card_update(text, "Location not found", "Error"));
            }
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Geocoding unavailable");
                return Ok(card_update(SERVICE_UNAVAILABLE.to_string(), &place, "Error"));
            }
        };

        let forecast = match session.bounded(self.backend.forecast(&location)).await? {
            Ok(forecast) => forecast,
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Forecast unavailable");
                return Ok(card_update(
                    SERVICE_UNAVAILABLE.to_string(),
                    &location.name,
                    "Error",
                ));
            }
        };

        debug!(session_id = %session.id(), location = %location.name, ?view, "Rendering forecast");
        match view {
            WeatherView::Hourly => self.hourly(session, &forecast).await,
            WeatherView::Daily(days) => self.daily(session, &forecast, days).await,
            WeatherView::Today => self.today(session, &forecast).await,
        }
    }
}
