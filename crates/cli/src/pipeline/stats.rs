//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::StampMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total frames stamped and handed to dispatch
    pub frames_stamped: u64,

    /// Total frames dropped by backpressure or correlation failures
    pub frames_dropped: u64,

    /// Total trigger pulses received from the source
    pub pulses_received: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of sinks that received data
    pub active_sinks: usize,

    /// Stamp metrics aggregator
    pub stamp_metrics: StampMetricsAggregator,
}

impl PipelineStats {
    /// Calculate frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_stamped as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate drop rate as percentage
    #[allow(dead_code)]
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_stamped + self.frames_dropped;
        if total > 0 {
            (self.frames_dropped as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames stamped: {}", self.frames_stamped);
        println!("   ├─ Pulses received: {}", self.pulses_received);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   └─ Active sinks: {}", self.active_sinks);

        let summary = self.stamp_metrics.summary();

        println!("\n📈 Stamp Metrics");
        println!("   ├─ Total frames: {}", summary.total_frames);
        println!(
            "   ├─ Trigger-stamped: {} ({:.1}%)",
            summary.trigger_stamped, summary.sync_rate
        );
        println!("   ├─ Clock-stamped: {}", summary.clock_stamped);
        println!("   ├─ Trigger latency (ms): {}", summary.trigger_latency_ms);
        println!("   └─ Queue depth: {}", summary.queue_depth);

        // The first adoption establishes the startup baseline; only the
        // ones after that mark a recovered desync episode.
        let recoveries = summary.baseline_adoptions.saturating_sub(1);
        if self.frames_dropped > 0 || recoveries > 0 {
            println!("\n⚠️  Anomalies");
            if self.frames_dropped > 0 && recoveries > 0 {
                println!("   ├─ Dropped frames: {}", self.frames_dropped);
                println!("   └─ Desync recoveries: {}", recoveries);
            } else if self.frames_dropped > 0 {
                println!("   └─ Dropped frames: {}", self.frames_dropped);
            } else {
                println!("   └─ Desync recoveries: {}", recoveries);
            }
        }

        println!();
    }
}
