//! Point-in-time engine snapshots
//!
//! A [`Snapshot`] is assembled in two steps: [`SnapshotParts::capture`] copies
//! values out of the session under the lock, then [`SnapshotParts::render`]
//! builds the plot series (including band filtering) after the lock is
//! released.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use super::session::SessionState;
use crate::analysis::{build_signal_views, BandMetrics, SignalView};
use crate::protocol::PROTO_VER;
use crate::types::{ChannelFrame, Counters, EngineState, EventLine, PlotRow, SampleRecord};

/// Number of parse errors included in a snapshot
pub const SNAPSHOT_PARSE_ERRORS: usize = 20;

/// Default number of plotted samples
pub const DEFAULT_MAX_POINTS: usize = 1_500;

/// Default number of event lines
pub const DEFAULT_EVENT_LIMIT: usize = 60;

/// Consistent copy of engine state for UIs and exporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub running: bool,
    pub connected: bool,
    pub simulate: bool,
    pub port_name: String,
    pub state: EngineState,
    pub status_message: String,
    pub sample_rate_hz: u32,
    pub proto_ver_expected: u8,
    pub counters: Counters,
    /// Parse errors currently held in the bounded log
    pub parse_error_count: usize,
    /// Most recent parse errors, oldest first
    pub parse_errors: Vec<String>,
    /// Serialized as `{}` until the first sample arrives
    #[serde(with = "latest_sample_map")]
    pub latest_sample: Option<SampleRecord>,
    pub latest_metrics: BandMetrics,
    /// Raw view of the trailing history
    pub plot_points: Vec<PlotRow>,
    /// All six views of the trailing history
    pub signal_plot_points: BTreeMap<SignalView, Vec<PlotRow>>,
    pub events: Vec<EventLine>,
}

mod latest_sample_map {
    use super::*;
    use serde::ser::SerializeMap;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Latest {
        Sample(SampleRecord),
        Empty {},
    }

    pub fn serialize<S: Serializer>(
        sample: &Option<SampleRecord>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match sample {
            Some(record) => record.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<SampleRecord>, D::Error> {
        Ok(match Option::<Latest>::deserialize(deserializer)? {
            Some(Latest::Sample(record)) => Some(record),
            Some(Latest::Empty {}) | None => None,
        })
    }
}

/// Values copied out under the session lock
pub(crate) struct SnapshotParts {
    snapshot: Snapshot,
    tail: Vec<SampleRecord>,
}

impl SnapshotParts {
    /// Copy everything a snapshot needs. Cheap; runs under the lock.
    pub fn capture(
        session: &SessionState,
        sample_rate_hz: u32,
        max_points: usize,
        event_limit: usize,
    ) -> Self {
        let snapshot = Snapshot {
            running: session.running,
            connected: session.connected,
            simulate: session.simulate,
            port_name: session.port_name.clone(),
            state: session.state.clone(),
            status_message: session.status_message.clone(),
            sample_rate_hz,
            proto_ver_expected: PROTO_VER,
            counters: session.counters,
            parse_error_count: session.parse_errors.len(),
            parse_errors: session.parse_errors.tail_vec(SNAPSHOT_PARSE_ERRORS),
            latest_sample: session.latest_sample,
            latest_metrics: session.latest_metrics.clone(),
            plot_points: Vec::new(),
            signal_plot_points: BTreeMap::new(),
            events: session.events.tail_vec(event_limit),
        };
        Self {
            snapshot,
            tail: session.history.tail_vec(max_points),
        }
    }

    /// Build the plot series. Runs after the lock is released.
    pub fn render(self) -> Snapshot {
        let Self { mut snapshot, tail } = self;
        let sample_rate = f64::from(snapshot.sample_rate_hz.max(1));
        let base_index = tail.first().map(|r| r.sample_index).unwrap_or(0);
        let x: Vec<f64> = tail
            .iter()
            .map(|r| (i64::from(r.sample_index) - i64::from(base_index)) as f64 / sample_rate)
            .collect();
        let matrix: Vec<ChannelFrame> = tail.iter().map(SampleRecord::channels_uv).collect();

        snapshot.signal_plot_points = build_signal_views(&matrix, sample_rate)
            .into_iter()
            .map(|(view, rows)| {
                let points = x
                    .iter()
                    .zip(rows.iter())
                    .map(|(&t, values)| PlotRow::new(t, values))
                    .collect();
                (view, points)
            })
            .collect();
        snapshot.plot_points = snapshot
            .signal_plot_points
            .get(&SignalView::Raw)
            .cloned()
            .unwrap_or_default();
        snapshot
    }
}
