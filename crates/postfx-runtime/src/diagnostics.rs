use std::collections::BTreeMap;
use std::time::Duration;

use postfx_core::EngineError;

/// Receives per-stage timings and frame failures for the debug collaborator.
///
/// Sinks must not call back into the device.
pub trait DiagnosticsSink {
    fn stage_timing(&mut self, stage: &str, elapsed: Duration);

    /// Called once when a pass aborts, before the error is returned to the caller.
    fn frame_error(&mut self, err: &EngineError) {
        let _ = err;
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl DiagnosticsSink for NoopDiagnostics {
    fn stage_timing(&mut self, _stage: &str, _elapsed: Duration) {}
}

/// Keeps the latest timing for each stage and a count of failed frames.
#[derive(Debug, Default, Clone)]
pub struct TimingLog {
    latest: BTreeMap<String, Duration>,
    samples: u64,
    errors: u64,
    last_error: Option<String>,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.latest.get(stage).copied()
    }

    pub fn stages(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.latest.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Total timings recorded since creation.
    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    pub fn error_count(&self) -> u64 {
        self.errors
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl DiagnosticsSink for TimingLog {
    fn stage_timing(&mut self, stage: &str, elapsed: Duration) {
        self.samples += 1;
        match self.latest.get_mut(stage) {
            Some(d) => *d = elapsed,
            None => {
                self.latest.insert(stage.to_string(), elapsed);
            }
        }
    }

    fn frame_error(&mut self, err: &EngineError) {
        self.errors += 1;
        self.last_error = Some(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_log_keeps_latest_per_stage() {
        let mut log = TimingLog::new();
        log.stage_timing("fxaa", Duration::from_micros(10));
        log.stage_timing("fxaa", Duration::from_micros(30));
        log.stage_timing("copy", Duration::from_micros(5));

        assert_eq!(log.get("fxaa"), Some(Duration::from_micros(30)));
        assert_eq!(log.stages().count(), 2);
        assert_eq!(log.sample_count(), 3);
    }

    #[test]
    fn timing_log_records_errors() {
        let mut log = TimingLog::new();
        log.frame_error(&EngineError::other("boom"));
        assert_eq!(log.error_count(), 1);
        assert!(log.last_error().unwrap().contains("boom"));
    }
}
