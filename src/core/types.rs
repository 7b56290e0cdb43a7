//! Domain types shared by the sync pipeline
//!
//! Wire-facing types derive serde with aliases for both the snake_case
//! server payloads and the camelCase client models, so the same type
//! decodes stream frames, REST history and the on-device cache.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Highest urgency score the server assigns
pub const MAX_URGENCY_SCORE: u8 = 10;

/// Author used when a history DTO omits the field
pub const DEFAULT_AUTHOR: &str = "AlphaSignal";

// =============================================================================
// Frames
// =============================================================================

/// Characters of a payload kept when it is logged
pub const FRAME_PREVIEW_CHARS: usize = 256;

/// One unit of data delivered over a stream connection (UTF-8 text payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    payload: String,
}

impl RawFrame {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// Payload cut to `FRAME_PREVIEW_CHARS` characters for log fields
    pub fn preview(&self) -> String {
        match self.payload.char_indices().nth(FRAME_PREVIEW_CHARS) {
            Some((cut, _)) => format!("{}...({} bytes)", &self.payload[..cut], self.payload.len()),
            None => self.payload.clone(),
        }
    }
}

// =============================================================================
// Intelligence
// =============================================================================

/// A single intelligence item. Identity is `id`; immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: i64,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(default = "default_author")]
    pub author: String,

    #[serde(alias = "urgencyScore")]
    pub urgency_score: u8,

    #[serde(alias = "sentiment_label", deserialize_with = "deserialize_localized")]
    pub sentiment: String,

    #[serde(deserialize_with = "deserialize_localized")]
    pub summary: String,

    #[serde(default, deserialize_with = "deserialize_localized")]
    pub content: String,

    #[serde(default, alias = "gold_price_snapshot", alias = "priceSnapshot")]
    pub price_snapshot: Option<f64>,
}

impl DomainRecord {
    /// Urgency must sit in `0..=10`
    pub fn has_valid_urgency(&self) -> bool {
        self.urgency_score <= MAX_URGENCY_SCORE
    }
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

// =============================================================================
// Valuation
// =============================================================================

/// Contribution of one holding to the fund estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentImpact {
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub weight: f64,
    #[serde(alias = "changePct")]
    pub change_pct: f64,
    pub impact: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    pub score: i32,
    #[serde(default, alias = "isSuspectedRebalance")]
    pub is_suspected_rebalance: Option<bool>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Latest live estimate for one instrument; each new one replaces the last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    #[serde(alias = "fund_code", alias = "instrumentCode")]
    pub instrument_code: String,

    #[serde(default, alias = "fund_name", alias = "instrumentName")]
    pub instrument_name: Option<String>,

    #[serde(alias = "estimated_growth", alias = "estimatedGrowthPct")]
    pub estimated_growth_pct: f64,

    #[serde(alias = "total_weight", alias = "totalWeightPct")]
    pub total_weight_pct: f64,

    #[serde(default)]
    pub components: Vec<ComponentImpact>,

    #[serde(default)]
    pub confidence: Option<Confidence>,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// One daily growth observation used for threshold calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub growth: Option<f64>,
}

/// An instrument a valuation actor is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    #[serde(default)]
    pub name: String,
}

impl Instrument {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Name shown to the user, falling back to the code
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.code
        } else {
            &self.name
        }
    }
}

/// Connection state published by every feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    #[default]
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Live => write!(f, "live"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

// =============================================================================
// Lenient field decoding
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum LocalizedText {
    Plain(String),
    Translations(BTreeMap<String, String>),
}

impl LocalizedText {
    fn resolve(self) -> String {
        match self {
            LocalizedText::Plain(text) => text,
            LocalizedText::Translations(mut map) => map
                .remove("zh")
                .or_else(|| map.remove("en"))
                .or_else(|| map.into_values().next())
                .unwrap_or_default(),
        }
    }
}

fn deserialize_localized<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<LocalizedText>::deserialize(deserializer)?;
    Ok(text.map(LocalizedText::resolve).unwrap_or_default())
}

/// Parse the timestamp shapes the backend emits: RFC 3339, space-separated
/// with offset, or naive (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp '{}'", raw)))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(&raw).map(|dt| dt.date_naive()))
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_frame_preview_truncates_long_payloads() {
        assert_eq!(RawFrame::new("short").preview(), "short");

        let long = "价".repeat(FRAME_PREVIEW_CHARS + 10);
        let preview = RawFrame::new(long.clone()).preview();
        assert!(preview.starts_with(&"价".repeat(FRAME_PREVIEW_CHARS)));
        assert!(preview.ends_with(&format!("...({} bytes)", long.len())));
        assert!(preview.chars().count() < FRAME_PREVIEW_CHARS + 20);
    }

    #[test]
    fn test_record_decodes_snake_case_payload() {
        let json = r#"{
            "id": 7,
            "timestamp": "2026-02-03T08:30:00Z",
            "author": "Desk",
            "urgency_score": 8,
            "sentiment": "Bearish",
            "summary": "Rates up",
            "content": "Long form",
            "gold_price_snapshot": 2034.5
        }"#;
        let record: DomainRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.urgency_score, 8);
        assert_eq!(record.price_snapshot, Some(2034.5));
        assert_eq!(record.timestamp.hour(), 8);
    }

    #[test]
    fn test_record_localized_fields_prefer_zh_then_en() {
        let json = r#"{
            "id": 1,
            "timestamp": "2026-02-03 08:30:00",
            "urgency_score": 3,
            "sentiment": {"en": "Neutral"},
            "summary": {"en": "Hello", "zh": "你好"},
            "content": null
        }"#;
        let record: DomainRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.summary, "你好");
        assert_eq!(record.sentiment, "Neutral");
        assert_eq!(record.content, "");
        assert_eq!(record.author, DEFAULT_AUTHOR);
        assert_eq!(record.price_snapshot, None);
    }

    #[test]
    fn test_record_accepts_mobile_dto_shape() {
        let json = r#"{
            "id": 9,
            "timestamp": "2026-02-03T08:30:00+08:00",
            "summary": "Brief",
            "urgency_score": 5,
            "sentiment_label": "Hawkish"
        }"#;
        let record: DomainRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sentiment, "Hawkish");
        assert_eq!(record.timestamp.hour(), 0);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2026-01-01T00:00:00Z").is_some());
        assert!(parse_timestamp("2026-01-01 00:00:00.123456+00:00").is_some());
        assert!(parse_timestamp("2026-01-01 00:00:00").is_some());
        assert!(parse_timestamp("2026-01-01T00:00:00.5").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_invalid_urgency_detected() {
        let json = r#"{"id": 1, "timestamp": "2026-01-01T00:00:00Z", "urgency_score": 11,
                       "sentiment": "x", "summary": "y"}"#;
        let record: DomainRecord = serde_json::from_str(json).unwrap();
        assert!(!record.has_valid_urgency());
    }

    #[test]
    fn test_snapshot_decodes_server_payload() {
        let json = r#"{
            "fund_code": "161725",
            "fund_name": "Liquor Index",
            "estimated_growth": -1.23,
            "total_weight": 92.5,
            "components": [
                {"code": "600519", "name": "Moutai", "weight": 14.2,
                 "change_pct": -2.0, "impact": -0.28}
            ],
            "confidence": {"level": "medium", "score": 71,
                           "is_suspected_rebalance": true, "reasons": ["stale holdings"]},
            "timestamp": "2026-02-03T06:00:00Z"
        }"#;
        let snapshot: ValuationSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.instrument_code, "161725");
        assert_eq!(snapshot.instrument_name.as_deref(), Some("Liquor Index"));
        assert_eq!(snapshot.components.len(), 1);
        let confidence = snapshot.confidence.unwrap();
        assert_eq!(confidence.level, ConfidenceLevel::Medium);
        assert_eq!(confidence.is_suspected_rebalance, Some(true));
    }

    #[test]
    fn test_history_point_date_forms() {
        let a: HistoryPoint =
            serde_json::from_str(r#"{"date": "2026-01-05", "growth": 0.4}"#).unwrap();
        let b: HistoryPoint =
            serde_json::from_str(r#"{"date": "2026-01-05T00:00:00Z", "growth": null}"#).unwrap();
        assert_eq!(a.date, b.date);
        assert_eq!(b.growth, None);
    }

    #[test]
    fn test_instrument_display_name_falls_back_to_code() {
        assert_eq!(Instrument::new("000001", "").display_name(), "000001");
        assert_eq!(Instrument::new("000001", "Growth").display_name(), "Growth");
    }
}
