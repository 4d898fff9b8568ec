//! Scatter planning for distribution transparency
//!
//! This module provides `scatter_plan()` which describes what the scatter
//! phase would move for a given partition: which worker gets which range,
//! how many bytes travel over a channel and how much of it is duplicated
//! halo, without touching any signal data.
//!
//! # Example
//!
//! ```
//! use shardcorr::scatter_plan::{scatter_plan, Route};
//! use shardcorr::partition;
//!
//! let p = partition(1024, 4, 8).unwrap();
//! let plan = scatter_plan(&p, 0);
//!
//! assert_eq!(plan.entries()[0].route, Route::Local);
//! assert_eq!(plan.summary().channel_transfers, 3);
//! println!("{}", plan);
//! ```

use std::fmt;
use std::ops::Range;

use crate::shards::Partition;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// How a worker obtains its segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Borrowed directly from the coordinator's signal
    Local,
    /// Copied and sent as a segment transfer
    Channel,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Local => write!(f, "local"),
            Route::Channel => write!(f, "channel"),
        }
    }
}

/// One worker's row in the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub worker: usize,
    /// Range of the Signal+Halo buffer delivered to the worker
    pub buffer: Range<usize>,
    /// Samples of the buffer that come from the halo rather than the signal proper
    pub halo_samples: usize,
    pub bytes: usize,
    pub route: Route,
}

/// Totals across all entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub channel_transfers: usize,
    pub channel_bytes: usize,
    pub local_bytes: usize,
    /// Bytes sent more than once because segments overlap through their halos
    pub overlap_bytes: usize,
    /// Samples at the end of the signal no worker receives
    pub truncated_samples: usize,
}

/// A complete scatter plan
#[derive(Debug, Clone)]
pub struct ScatterPlan {
    entries: Vec<PlanEntry>,
    summary: PlanSummary,
}

impl ScatterPlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn summary(&self) -> &PlanSummary {
        &self.summary
    }

    /// Entries using a given route
    pub fn entries_by_route(&self, route: Route) -> Vec<&PlanEntry> {
        self.entries.iter().filter(|e| e.route == route).collect()
    }
}

impl fmt::Display for ScatterPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scatter Plan")?;
        writeln!(f, "============")?;
        writeln!(f)?;

        writeln!(f, "Summary:")?;
        writeln!(
            f,
            "  Channel: {} transfers ({} bytes)",
            self.summary.channel_transfers, self.summary.channel_bytes
        )?;
        writeln!(f, "  Local:   {} bytes", self.summary.local_bytes)?;
        writeln!(f, "  Overlap: {} bytes", self.summary.overlap_bytes)?;
        if self.summary.truncated_samples > 0 {
            writeln!(
                f,
                "  Truncated: {} samples never assigned",
                self.summary.truncated_samples
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Workers:")?;
        writeln!(
            f,
            "{:<6} {:<24} {:<8} {:<12} Route",
            "Rank", "Buffer", "Halo", "Bytes"
        )?;
        writeln!(f, "{:-<60}", "")?;

        for entry in &self.entries {
            let buffer = format!("{}..{}", entry.buffer.start, entry.buffer.end);
            writeln!(
                f,
                "{:<6} {:<24} {:<8} {:<12} {}",
                entry.worker, buffer, entry.halo_samples, entry.bytes, entry.route
            )?;
        }

        Ok(())
    }
}

/// Describe the scatter phase of `partition` as driven by `coordinator`
pub fn scatter_plan(partition: &Partition, coordinator: usize) -> ScatterPlan {
    let signal_len = partition.signal_len();
    let mut summary = PlanSummary {
        truncated_samples: partition.truncated(),
        ..Default::default()
    };

    let entries: Vec<PlanEntry> = partition
        .iter()
        .map(|bounds| {
            let buffer = bounds.buffer_range();
            let halo_samples = buffer.end.saturating_sub(signal_len);
            let bytes = bounds.buffer_len() * SAMPLE_BYTES;
            let route = if bounds.worker == coordinator {
                Route::Local
            } else {
                Route::Channel
            };

            match route {
                Route::Local => summary.local_bytes += bytes,
                Route::Channel => {
                    summary.channel_transfers += 1;
                    summary.channel_bytes += bytes;
                }
            }
            summary.overlap_bytes += bounds.halo * SAMPLE_BYTES;

            PlanEntry {
                worker: bounds.worker,
                buffer,
                halo_samples,
                bytes,
                route,
            }
        })
        .collect();

    ScatterPlan { entries, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shards::partition;

    #[test]
    fn test_coordinator_is_local() {
        let p = partition(1024, 4, 8).unwrap();
        let plan = scatter_plan(&p, 0);

        assert_eq!(plan.entries_by_route(Route::Local).len(), 1);
        assert_eq!(plan.entries_by_route(Route::Channel).len(), 3);
        assert_eq!(plan.entries()[0].route, Route::Local);
    }

    #[test]
    fn test_summary_bytes() {
        let p = partition(1024, 4, 8).unwrap();
        let plan = scatter_plan(&p, 0);
        let summary = plan.summary();

        assert_eq!(summary.local_bytes, 264 * 4);
        assert_eq!(summary.channel_bytes, 3 * 264 * 4);
        assert_eq!(summary.overlap_bytes, 4 * 8 * 4);
        assert_eq!(summary.truncated_samples, 0);
    }

    #[test]
    fn test_only_last_worker_reads_halo() {
        let p = partition(1024, 4, 8).unwrap();
        let plan = scatter_plan(&p, 0);

        let halos: Vec<_> = plan.entries().iter().map(|e| e.halo_samples).collect();
        assert_eq!(halos, vec![0, 0, 0, 8]);
    }

    #[test]
    fn test_truncated_tail_is_reported() {
        let p = partition(10, 3, 2).unwrap();
        let plan = scatter_plan(&p, 0);

        assert_eq!(plan.summary().truncated_samples, 1);
        // The shift window still reads the dropped sample 9, then one halo sample
        assert_eq!(plan.entries()[2].buffer, 6..11);
        assert_eq!(plan.entries()[2].halo_samples, 1);
        assert!(format!("{}", plan).contains("Truncated: 1"));
    }

    #[test]
    fn test_plan_display() {
        let p = partition(64, 2, 4).unwrap();
        let display = format!("{}", scatter_plan(&p, 0));

        assert!(display.contains("Scatter Plan"));
        assert!(display.contains("channel"));
        assert!(display.contains("32..68"));
    }
}
