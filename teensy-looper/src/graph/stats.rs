//! Execution-time accounting for the scheduler.

use crate::constants::AUDIO_BLOCK_SAMPLES;

/// Free-running cycle counter used to time node execution.
///
/// On Cortex-M7 this is the DWT `CYCCNT` register; wrapping is handled by the
/// scheduler.
pub trait CycleCounter {
    fn now(&self) -> u32;
}

/// Counter that always reads zero, for builds without timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCycleCounter;

impl CycleCounter for NoCycleCounter {
    fn now(&self) -> u32 {
        0
    }
}

impl<F: Fn() -> u32> CycleCounter for F {
    fn now(&self) -> u32 {
        self()
    }
}

/// Cost of one node, in counter cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeStats {
    /// Cost of the most recent update.
    pub cycles: u32,
    /// Worst update since the last reset.
    pub cycles_max: u32,
}

impl NodeStats {
    pub(crate) fn record(&mut self, cycles: u32) {
        self.cycles = cycles;
        self.cycles_max = self.cycles_max.max(cycles);
    }
}

/// Aggregate cost of scheduler passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerStats {
    /// Completed passes.
    pub ticks: u32,
    /// Cost of the most recent pass.
    pub cycles: u32,
    /// Worst pass since the last reset.
    pub cycles_max: u32,
    /// Passes that exceeded the block-period budget.
    pub overruns: u32,
    /// Passes skipped because the node list did not match the graph.
    pub skipped: u32,
}

impl SchedulerStats {
    /// Worst-case load as a percentage of `budget_cycles`.
    pub fn max_load_percent(&self, budget_cycles: u32) -> f32 {
        if budget_cycles == 0 {
            return 0.0;
        }
        self.cycles_max as f32 * 100.0 / budget_cycles as f32
    }
}

/// Counter cycles available in one block period.
pub fn block_budget_cycles(cpu_hz: u32, sample_rate: f32) -> u32 {
    let per_sample = cpu_hz as f32 / sample_rate;
    (per_sample * AUDIO_BLOCK_SAMPLES as f32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_stats_track_maximum() {
        let mut stats = NodeStats::default();
        stats.record(10);
        stats.record(30);
        stats.record(20);
        assert_eq!(stats.cycles, 20);
        assert_eq!(stats.cycles_max, 30);
    }

    #[test]
    fn budget_for_teensy_clock() {
        // 600 MHz, 44.1 kHz-ish: ~13 600 cycles per sample
        let budget = block_budget_cycles(600_000_000, 44_117.647);
        assert!((1_740_000..1_741_000).contains(&budget), "got {budget}");
    }

    #[test]
    fn load_percent() {
        let stats = SchedulerStats { cycles_max: 500, ..Default::default() };
        assert_eq!(stats.max_load_percent(1000), 50.0);
        assert_eq!(stats.max_load_percent(0), 0.0);
    }
}
