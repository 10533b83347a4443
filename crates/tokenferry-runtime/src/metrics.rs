//! Flat, boundary-safe performance telemetry.

use tokenferry_core::RawPerfStats;

/// Performance record with fixed field order, all numeric, safe to copy by
/// value across any boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerfMetricsData {
    /// Model load time in milliseconds, measured once at pipeline
    /// construction and identical across generate calls on that pipeline.
    pub load_time: f32,
    pub num_input_tokens: usize,
    pub num_generated_tokens: usize,
    pub ttft_mean: f32,
    pub ttft_std: f32,
    pub throughput_mean: f32,
    pub throughput_std: f32,
    pub generate_duration_mean: f32,
    pub generate_duration_std: f32,
}

/// Flatten the engine's nested measurements. Field copies only; all
/// statistics are computed by the engine.
pub(crate) fn extract_metrics(stats: &RawPerfStats) -> PerfMetricsData {
    PerfMetricsData {
        load_time: stats.load_time,
        num_input_tokens: stats.num_input_tokens,
        num_generated_tokens: stats.num_generated_tokens,
        ttft_mean: stats.ttft.mean,
        ttft_std: stats.ttft.std,
        throughput_mean: stats.throughput.mean,
        throughput_std: stats.throughput.std,
        generate_duration_mean: stats.generate_duration.mean,
        generate_duration_std: stats.generate_duration.std,
    }
}

/// Performance metrics for one generate call.
#[derive(Debug, Clone, Default)]
pub struct PerfMetrics {
    data: PerfMetricsData,
}

impl PerfMetrics {
    pub(crate) fn from_raw(stats: &RawPerfStats) -> Self {
        Self { data: extract_metrics(stats) }
    }

    /// The flat record, for handing across a boundary by value.
    pub fn data(&self) -> PerfMetricsData {
        self.data
    }

    /// Model load time in milliseconds.
    pub fn load_time(&self) -> f32 {
        self.data.load_time
    }

    /// Number of tokens in the input prompt.
    pub fn num_input_tokens(&self) -> usize {
        self.data.num_input_tokens
    }

    /// Number of tokens generated.
    pub fn num_generated_tokens(&self) -> usize {
        self.data.num_generated_tokens
    }

    /// Time to first token as (mean, std) in milliseconds.
    pub fn ttft(&self) -> (f32, f32) {
        (self.data.ttft_mean, self.data.ttft_std)
    }

    /// Throughput as (mean, std) in tokens per second.
    pub fn throughput(&self) -> (f32, f32) {
        (self.data.throughput_mean, self.data.throughput_std)
    }

    /// Generation duration as (mean, std) in milliseconds.
    pub fn generate_duration(&self) -> (f32, f32) {
        (self.data.generate_duration_mean, self.data.generate_duration_std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenferry_core::MeanStd;

    #[test]
    fn test_extract_copies_every_field() {
        let stats = RawPerfStats {
            load_time: 120.5,
            num_input_tokens: 7,
            num_generated_tokens: 42,
            ttft: MeanStd { mean: 11.0, std: 1.5 },
            throughput: MeanStd { mean: 95.0, std: 4.0 },
            generate_duration: MeanStd { mean: 440.0, std: 12.0 },
        };

        let data = extract_metrics(&stats);
        assert_eq!(data.load_time, 120.5);
        assert_eq!(data.num_input_tokens, 7);
        assert_eq!(data.num_generated_tokens, 42);
        assert_eq!(data.ttft_mean, 11.0);
        assert_eq!(data.ttft_std, 1.5);
        assert_eq!(data.throughput_mean, 95.0);
        assert_eq!(data.throughput_std, 4.0);
        assert_eq!(data.generate_duration_mean, 440.0);
        assert_eq!(data.generate_duration_std, 12.0);
    }

    #[test]
    fn test_accessors_group_mean_std_pairs() {
        let stats = RawPerfStats {
            ttft: MeanStd { mean: 3.0, std: 0.5 },
            ..Default::default()
        };
        let metrics = PerfMetrics::from_raw(&stats);
        assert_eq!(metrics.ttft(), (3.0, 0.5));
        assert_eq!(metrics.load_time(), 0.0);
    }
}
