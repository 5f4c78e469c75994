//! Snapshot metrics computed from `SessionState`.
//!
//! `compute_metrics(&SessionState) -> MetricsSnapshot` samples the current
//! session for time-series analysis. No state mutation. The CSV helpers are the
//! only IO in this crate.

use std::io::Write;

use serde::Serialize;

use crate::{SessionState, TrainStatus};

/// Current schema version. Bump when fields are added/removed/reordered.
const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    pub now_ms: u64,
    pub session: u32,
    pub metrics_version: u32,

    // Trains
    pub active_trains: u32,
    pub approaching: u32,
    pub requesting: u32,
    pub assigned: u32,
    pub queued_requests: u32,
    pub names_available: u32,

    // Platforms
    pub platforms_total: u32,
    pub platforms_occupied: u32,

    // Countdown (0 when idle)
    pub countdown_active: bool,
    pub countdown_seconds_left: u32,

    // Outcomes
    pub trains_managed: u32,
    pub collisions_avoided: u32,
    pub near_misses: u32,
    pub score: u64,
    pub game_over: bool,
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

pub fn compute_metrics(state: &SessionState) -> MetricsSnapshot {
    let by_status = |status: TrainStatus| {
        count_u32(state.trains.iter().filter(|t| t.status == status).count())
    };

    MetricsSnapshot {
        tick: state.meta.tick,
        now_ms: state.meta.now_ms,
        session: state.meta.session,
        metrics_version: METRICS_VERSION,
        active_trains: count_u32(state.trains.len()),
        approaching: by_status(TrainStatus::Approaching),
        requesting: by_status(TrainStatus::Requesting),
        assigned: by_status(TrainStatus::Assigned),
        queued_requests: count_u32(state.request_queue.len()),
        names_available: count_u32(state.names.available()),
        platforms_total: count_u32(state.platforms.len()),
        platforms_occupied: count_u32(state.platforms.occupied_count()),
        countdown_active: state.countdown.is_some(),
        countdown_seconds_left: state.countdown_seconds().unwrap_or(0),
        trains_managed: state.stats.trains_managed,
        collisions_avoided: state.stats.collisions_avoided,
        near_misses: state.stats.near_misses,
        score: state.score,
        game_over: state.is_over(),
    }
}

/// Write the CSV header row for metrics.
pub fn write_metrics_header(writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "tick,now_ms,session,metrics_version,\
         active_trains,approaching,requesting,assigned,queued_requests,names_available,\
         platforms_total,platforms_occupied,\
         countdown_active,countdown_seconds_left,\
         trains_managed,collisions_avoided,near_misses,score,game_over"
    )
}

/// Append a single metrics snapshot as a CSV row.
pub fn append_metrics_row(
    writer: &mut impl Write,
    snapshot: &MetricsSnapshot,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        snapshot.tick,
        snapshot.now_ms,
        snapshot.session,
        snapshot.metrics_version,
        snapshot.active_trains,
        snapshot.approaching,
        snapshot.requesting,
        snapshot.assigned,
        snapshot.queued_requests,
        snapshot.names_available,
        snapshot.platforms_total,
        snapshot.platforms_occupied,
        snapshot.countdown_active,
        snapshot.countdown_seconds_left,
        snapshot.trains_managed,
        snapshot.collisions_avoided,
        snapshot.near_misses,
        snapshot.score,
        snapshot.game_over,
    )
}

/// Buffered metrics CSV writer for one run directory (`metrics.csv`).
pub struct MetricsFileWriter {
    writer: std::io::BufWriter<std::fs::File>,
}

impl MetricsFileWriter {
    /// Create the file and write the header row.
    pub fn new(run_dir: &std::path::Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(run_dir.join("metrics.csv"))?;
        let mut writer = std::io::BufWriter::new(file);
        write_metrics_header(&mut writer)?;
        Ok(Self { writer })
    }

    pub fn write_row(&mut self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        append_metrics_row(&mut self.writer, snapshot)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, base_state};

    #[test]
    fn fresh_session_metrics() {
        let content = base_content();
        let state = base_state(&content);
        let snapshot = compute_metrics(&state);
        assert_eq!(snapshot.active_trains, 0);
        assert_eq!(snapshot.platforms_total, 4);
        assert_eq!(snapshot.platforms_occupied, 0);
        assert!(!snapshot.countdown_active);
        assert!(!snapshot.game_over);
        assert_eq!(snapshot.names_available, content.names.len() as u32);
    }

    #[test]
    fn header_and_row_have_same_column_count() {
        let content = base_content();
        let state = base_state(&content);
        let mut buf = Vec::new();
        write_metrics_header(&mut buf).unwrap();
        append_metrics_row(&mut buf, &compute_metrics(&state)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0].split(',').count(),
            lines[1].split(',').count(),
            "header/row column mismatch"
        );
    }
}
