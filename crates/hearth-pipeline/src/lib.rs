//! Per-event pipeline stage timing.
//!
//! A [`PipelineTracker`] travels with one signal event through the ingest
//! pipeline. Each call to [`PipelineTracker::stage`] marks the start of a
//! named stage; the stage closes when the next one begins or when the
//! timeline is finalized. The finished [`PipelineTimeline`] is an ephemeral
//! observability record — broadcast to subscribers, never persisted.
//!
//! The tracker is infallible by construction: no operation on it can fail or
//! panic, so tracking can never affect business processing. A timeline with
//! zero stages is valid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// Classification of a pipeline stage for observability display.
///
/// Drives grouping/coloring in consumers, never business logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageCategory {
    Signal,
    Db,
    Broadcast,
    Automation,
    Mqtt,
    Webhook,
    Zigbee,
    Other,
}

/// One timed phase of processing a single event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStage {
    pub name: String,
    pub category: StageCategory,
    /// Milliseconds from pipeline start to this stage's start.
    pub start_offset_ms: u64,
    pub duration_ms: u64,
}

/// The completed trace for one event's trip through the pipeline.
///
/// Invariants: stages are ordered by `start_offset_ms`, and `total_ms` is at
/// least `max(start_offset_ms + duration_ms)` over all stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTimeline {
    pub id: Uuid,
    pub device_id: String,
    pub automation_name: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub total_ms: u64,
    pub stages: Vec<PipelineStage>,
}

struct OpenStage {
    name: String,
    category: StageCategory,
    start_offset_ms: u64,
}

/// Records named stage starts for one event as it passes through the pipeline.
pub struct PipelineTracker {
    device_id: String,
    automation_name: Option<String>,
    started_utc: DateTime<Utc>,
    started: Instant,
    open: Vec<OpenStage>,
}

impl PipelineTracker {
    /// Starts tracking one event's pipeline run.
    pub fn begin(device_id: impl Into<String>, automation_name: Option<String>) -> Self {
        Self {
            device_id: device_id.into(),
            automation_name,
            started_utc: Utc::now(),
            started: Instant::now(),
            open: Vec::new(),
        }
    }

    /// Records the automation that acted on this event.
    ///
    /// First caller wins; later calls are ignored so the timeline names the
    /// automation that actually fired first.
    pub fn note_automation(&mut self, name: &str) {
        if self.automation_name.is_none() {
            self.automation_name = Some(name.to_string());
        }
    }

    /// Marks the start of a named stage.
    ///
    /// The previous stage (if any) implicitly closes at this stage's start.
    pub fn stage(&mut self, name: impl Into<String>, category: StageCategory) {
        let start_offset_ms = self.elapsed_ms();
        self.open.push(OpenStage {
            name: name.into(),
            category,
            start_offset_ms,
        });
    }

    /// Finalizes the timeline, closing the last open stage at the total.
    pub fn finish(self) -> PipelineTimeline {
        let total_ms = self.elapsed_ms();

        let mut stages = Vec::with_capacity(self.open.len());
        let mut iter = self.open.into_iter().peekable();
        while let Some(open) = iter.next() {
            let end_ms = iter
                .peek()
                .map(|next| next.start_offset_ms)
                .unwrap_or(total_ms);
            stages.push(PipelineStage {
                name: open.name,
                category: open.category,
                start_offset_ms: open.start_offset_ms,
                // saturating: Instant is monotonic, but keep the invariant
                // airtight even if offsets were ever equal after truncation.
                duration_ms: end_ms.saturating_sub(open.start_offset_ms),
            });
        }

        PipelineTimeline {
            id: Uuid::new_v4(),
            device_id: self.device_id,
            automation_name: self.automation_name,
            timestamp_utc: self.started_utc,
            total_ms,
            stages,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn assert_consistent(timeline: &PipelineTimeline) {
        let mut previous_start = 0u64;
        for stage in &timeline.stages {
            assert!(
                stage.start_offset_ms >= previous_start,
                "stages must be ordered by start offset"
            );
            previous_start = stage.start_offset_ms;
            assert!(
                timeline.total_ms >= stage.start_offset_ms + stage.duration_ms,
                "total must cover every stage"
            );
        }
    }

    #[test]
    fn empty_timeline_is_valid() {
        let timeline = PipelineTracker::begin("kitchen-therm", None).finish();
        assert!(timeline.stages.is_empty());
        assert_eq!(timeline.device_id, "kitchen-therm");
        assert_consistent(&timeline);
    }

    #[test]
    fn stages_close_implicitly_in_order() {
        let mut tracker = PipelineTracker::begin("frontroom/button1", None);
        tracker.stage("Parse", StageCategory::Signal);
        std::thread::sleep(Duration::from_millis(5));
        tracker.stage("Database", StageCategory::Db);
        std::thread::sleep(Duration::from_millis(5));
        tracker.stage("Broadcast", StageCategory::Broadcast);
        let timeline = tracker.finish();

        assert_eq!(timeline.stages.len(), 3);
        assert_eq!(timeline.stages[0].name, "Parse");
        assert_eq!(timeline.stages[1].name, "Database");
        assert_eq!(timeline.stages[2].name, "Broadcast");

        // Parse closed when Database began.
        assert_eq!(
            timeline.stages[0].start_offset_ms + timeline.stages[0].duration_ms,
            timeline.stages[1].start_offset_ms
        );
        assert_consistent(&timeline);
    }

    #[test]
    fn last_stage_closes_at_total() {
        let mut tracker = PipelineTracker::begin("d", None);
        tracker.stage("Webhook", StageCategory::Webhook);
        std::thread::sleep(Duration::from_millis(3));
        let timeline = tracker.finish();

        let last = timeline.stages.last().expect("one stage");
        assert_eq!(last.start_offset_ms + last.duration_ms, timeline.total_ms);
        assert_consistent(&timeline);
    }

    #[test]
    fn automation_name_is_carried() {
        let timeline =
            PipelineTracker::begin("d", Some("heat-alert".to_string())).finish();
        assert_eq!(timeline.automation_name.as_deref(), Some("heat-alert"));
    }

    #[test]
    fn first_noted_automation_wins() {
        let mut tracker = PipelineTracker::begin("d", None);
        tracker.note_automation("heat-alert");
        tracker.note_automation("cold-alert");
        let timeline = tracker.finish();
        assert_eq!(timeline.automation_name.as_deref(), Some("heat-alert"));
    }

    #[test]
    fn timeline_serializes_camel_case_with_lowercase_categories() {
        let mut tracker = PipelineTracker::begin("d", None);
        tracker.stage("Parse", StageCategory::Signal);
        let timeline = tracker.finish();

        let json = serde_json::to_value(&timeline).expect("serialize");
        assert!(json.get("totalMs").is_some());
        assert!(json.get("deviceId").is_some());
        assert_eq!(json["stages"][0]["category"], "signal");
        assert!(json["stages"][0].get("startOffsetMs").is_some());
    }
}
