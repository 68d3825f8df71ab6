//! Builders for the a2ui payloads the capabilities attach to their output,
//! plus the number and temperature formatting the weather views share.

use chrono::NaiveDate;
use conduit_common::{A2uiPayload, Link, RenderNode};

/// Heading, body text and an optional list of source links.
pub fn panel(title: &str, text: &str, sources: &[String]) -> A2uiPayload {
    let mut children = vec![RenderNode::heading(2, title), RenderNode::text(text)];
    let links: Vec<Link> = sources
        .iter()
        .filter(|href| !href.is_empty())
        .map(|href| Link {
            text: href.clone(),
            href: href.clone(),
        })
        .collect();
    if !links.is_empty() {
        children.push(RenderNode::links(links));
    }
    A2uiPayload::new(RenderNode::container(children))
}

/// A single weather card: optional intro, a key-value block, optional table.
pub fn weather_card(
    subtitle: &str,
    kv: Vec<(String, String)>,
    intro: Option<String>,
    table: Option<RenderNode>,
) -> A2uiPayload {
    let mut children = Vec::new();
    if let Some(intro) = intro {
        children.push(RenderNode::text(intro));
    }
    children.push(RenderNode::kv(kv));
    children.extend(table);
    A2uiPayload::new(RenderNode::container(vec![RenderNode::card(
        "Weather",
        Some(subtitle.to_string()),
        children,
    )]))
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// `50.0°F (10.0°C)`, or an empty string when the value is missing.
pub fn fmt_temp(c: Option<f64>) -> String {
    match c {
        Some(c) => format!("{:.1}°F ({:.1}°C)", celsius_to_fahrenheit(c), c),
        None => String::new(),
    }
}

/// Whole numbers without decimals, anything else to one decimal place.
pub fn fmt_num(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}{suffix}", v as i64),
        Some(v) => format!("{v:.1}{suffix}"),
        None => String::new(),
    }
}

/// `2026-02-01` becomes `Sun Feb 1`. Unparseable input is returned as-is.
pub fn fmt_day(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%a %b %-d").to_string())
        .unwrap_or_else(|_| date.to_string())
}
