//! # Report Pipeline
//! Drives one report request through its stages:
//! `INIT -> FETCHING -> SYNTHESIZING -> AWAITING_NARRATIVE -> PARSING -> COMPLETE`.
//! Only the narrative call and the parse step can end in `FAILED`; source
//! failures are absorbed while fetching.

use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};

use crate::error::ReportError;
use crate::indicators::compute_indicators;
use crate::narrative::{parse_narrative, DynNarrativeClient};
use crate::prompt::build_prompt;
use crate::report::{assemble, Report};
use crate::sources::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Fetching,
    Synthesizing,
    AwaitingNarrative,
    Parsing,
    Complete,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Fetching => "fetching",
            Stage::Synthesizing => "synthesizing",
            Stage::AwaitingNarrative => "awaiting_narrative",
            Stage::Parsing => "parsing",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        }
    }
}

pub struct ReportPipeline {
    orchestrator: Orchestrator,
    narrative: DynNarrativeClient,
}

impl ReportPipeline {
    pub fn new(orchestrator: Orchestrator, narrative: DynNarrativeClient) -> Self {
        Self {
            orchestrator,
            narrative,
        }
    }

    pub fn model(&self) -> &str {
        self.narrative.model()
    }

    pub async fn generate(&self) -> Result<Report, ReportError> {
        let t0 = Instant::now();
        let mut stage = Stage::Init;
        let res = self.run(&mut stage).await;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("report_generation_ms").record(ms);

        match &res {
            Ok(report) => {
                counter!("report_generated_total").increment(1);
                tracing::info!(
                    target: "pipeline",
                    elapsed_ms = ms as u64,
                    model = %report.model,
                    "report complete"
                );
            }
            Err(e) => {
                // `stage` still names the step that failed
                counter!("report_failed_total", "stage" => stage.as_str()).increment(1);
                tracing::warn!(
                    target: "pipeline",
                    failed_at = stage.as_str(),
                    code = e.code(),
                    error = %e,
                    "report failed"
                );
                advance(&mut stage, Stage::Failed);
            }
        }
        res
    }

    async fn run(&self, stage: &mut Stage) -> Result<Report, ReportError> {
        advance(stage, Stage::Fetching);
        let snapshot = self.orchestrator.snapshot().await;

        advance(stage, Stage::Synthesizing);
        let indicators = compute_indicators(snapshot.price_history.data.closes());
        let request = build_prompt(&snapshot, &indicators);

        advance(stage, Stage::AwaitingNarrative);
        let response = self.narrative.complete(&request).await?;

        advance(stage, Stage::Parsing);
        let narrative = parse_narrative(&response.content)?;

        advance(stage, Stage::Complete);
        Ok(assemble(
            &snapshot,
            indicators,
            narrative,
            &response.model,
            Utc::now(),
        ))
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(target: "pipeline", from = stage.as_str(), to = next.as_str(), "stage");
    *stage = next;
}
