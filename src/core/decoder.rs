//! Frame decoders
//!
//! Turn raw stream frames into typed events. A frame that fails schema
//! validation is logged and discarded; it never terminates the stream.

use serde::Deserialize;
use serde_json::Value;

use super::types::{DomainRecord, RawFrame, ValuationSnapshot};

/// Stateless frame-to-event decoding
pub trait FrameDecoder: Send + Sync {
    type Output;

    /// Decode one frame, or `None` when it carries nothing usable
    fn decode(&self, frame: &RawFrame) -> Option<Self::Output>;
}

/// Envelope of an intelligence stream frame
#[derive(Debug, Deserialize)]
struct IntelligenceEnvelope {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    latest_id: Option<i64>,
}

/// Decodes `{ type?, data?: DomainRecord[] }` batches
#[derive(Debug, Clone, Default)]
pub struct IntelligenceDecoder;

impl IntelligenceDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for IntelligenceDecoder {
    type Output = Vec<DomainRecord>;

    fn decode(&self, frame: &RawFrame) -> Option<Vec<DomainRecord>> {
        let envelope: IntelligenceEnvelope = match serde_json::from_str(frame.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    frame = %frame.preview(),
                    "Discarding malformed intelligence frame"
                );
                return None;
            }
        };

        match envelope.kind.as_deref() {
            Some("connected") => {
                tracing::info!(message = ?envelope.message, "Intelligence stream handshake");
            }
            Some("error") => {
                tracing::warn!(
                    message = ?envelope.message,
                    "Intelligence stream reported an error"
                );
            }
            _ => {}
        }

        let items = envelope.data.unwrap_or_default();
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<DomainRecord>(item) {
                Ok(record) if record.has_valid_urgency() => records.push(record),
                Ok(record) => {
                    tracing::warn!(
                        id = record.id,
                        urgency = record.urgency_score,
                        "Dropping record with out-of-range urgency"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed record inside batch");
                }
            }
        }

        if !records.is_empty() {
            tracing::debug!(
                received = records.len(),
                announced = ?envelope.count,
                latest_id = ?envelope.latest_id,
                "Intelligence batch decoded"
            );
        }

        Some(records)
    }
}

/// Decodes serialized valuation snapshots for one instrument
#[derive(Debug, Clone)]
pub struct ValuationDecoder {
    instrument_code: String,
}

impl ValuationDecoder {
    pub fn new(instrument_code: impl Into<String>) -> Self {
        Self {
            instrument_code: instrument_code.into(),
        }
    }
}

impl FrameDecoder for ValuationDecoder {
    type Output = ValuationSnapshot;

    fn decode(&self, frame: &RawFrame) -> Option<ValuationSnapshot> {
        let snapshot: ValuationSnapshot = match serde_json::from_str(frame.as_str()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    instrument = %self.instrument_code,
                    error = %e,
                    "Discarding malformed valuation frame"
                );
                return None;
            }
        };

        if snapshot.instrument_code != self.instrument_code {
            tracing::warn!(
                instrument = %self.instrument_code,
                received = %snapshot.instrument_code,
                "Discarding valuation frame for another instrument"
            );
            return None;
        }

        if !snapshot.estimated_growth_pct.is_finite() {
            tracing::warn!(instrument = %self.instrument_code, "Discarding non-finite valuation");
            return None;
        }

        Some(snapshot)
    }
}
