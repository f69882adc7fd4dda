//! # Report Assembler
//! Pure merge of snapshot quality flags, indicators and the parsed narrative.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::{IndicatorSet, RSI_PERIOD};
use crate::narrative::MarketNarrative;
use crate::sources::orchestrator::Snapshot;
use crate::sources::types::{MarketBreadth, SourceStatus};

/// Data-quality key for the indicator-derived fields.
pub const TECHNICALS_KEY: &str = "technicals";

/// Raw values kept for audit alongside the narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawData {
    pub indicators: IndicatorSet,
    pub breadth: MarketBreadth,
    pub price_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub narrative: MarketNarrative,
    pub data_quality: BTreeMap<String, bool>,
    pub generated_at: DateTime<Utc>,
    pub model: String,
    pub raw_data: RawData,
}

/// One flag per snapshot slot (`true` iff status is `Ok`) plus `technicals`,
/// which is `true` when RSI came from a full window of real closes.
pub fn data_quality(snap: &Snapshot) -> BTreeMap<String, bool> {
    let mut out: BTreeMap<String, bool> = snap
        .statuses()
        .iter()
        .map(|(name, st)| (name.to_string(), *st == SourceStatus::Ok))
        .collect();
    let technicals = snap.price_history.is_ok() && snap.price_history.data.len() > RSI_PERIOD;
    out.insert(TECHNICALS_KEY.to_string(), technicals);
    out
}

pub fn assemble(
    snap: &Snapshot,
    indicators: IndicatorSet,
    narrative: MarketNarrative,
    model: &str,
    generated_at: DateTime<Utc>,
) -> Report {
    Report {
        narrative,
        data_quality: data_quality(snap),
        generated_at,
        model: model.to_string(),
        raw_data: RawData {
            indicators,
            breadth: snap.breadth.data,
            price_points: snap.price_history.data.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::KeyLevels;
    use crate::sources::orchestrator::SLOT_NAMES;
    use crate::sources::types::{PriceSeries, SourceResult};

    fn narrative() -> MarketNarrative {
        MarketNarrative {
            market_mood: "neutral".into(),
            mood_score: 50.0,
            summary: "s".into(),
            sector_outlook: vec![],
            risk_factors: vec![],
            opportunities: vec![],
            strategy_notes: vec![],
            key_levels: KeyLevels::default(),
        }
    }

    #[test]
    fn flags_cover_every_slot_and_technicals() {
        let q = data_quality(&Snapshot::default());
        assert_eq!(q.len(), SLOT_NAMES.len() + 1);
        assert!(q.values().all(|v| !v));
    }

    #[test]
    fn short_history_is_not_technical_quality() {
        let mut snap = Snapshot::default();
        snap.price_history = SourceResult::fetched(PriceSeries::from_closes(vec![1.0; 10]));
        let q = data_quality(&snap);
        assert_eq!(q["priceHistory"], true);
        assert_eq!(q[TECHNICALS_KEY], false);
    }

    #[test]
    fn assemble_copies_raw_values() {
        let ts = DateTime::parse_from_rfc3339("2026-10-17T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let r = assemble(&Snapshot::default(), IndicatorSet::default(), narrative(), "m", ts);
        assert_eq!(r.generated_at, ts);
        assert_eq!(r.model, "m");
        assert_eq!(r.raw_data.price_points, 0);
        assert_eq!(r.raw_data.breadth, MarketBreadth::default());
    }
}
