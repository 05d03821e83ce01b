//! Self-tuning rules of the periodic jobs.

/// Exponential moving average; the first sample seeds it.
pub fn ema(prev: Option<f64>, value: f64, alpha: f64) -> f64 {
    match prev {
        Some(prev) if prev.is_finite() => alpha * value + (1.0 - alpha) * prev,
        _ => value,
    }
}

/// How a run went, as seen by the tuner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunObservation {
    pub duration_sec: f64,
    pub errors: i64,
}

/// Speed thresholds and bounds of a tuned batch size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningBounds {
    pub floor: u32,
    pub ceiling: u32,
    pub fast_run_sec: f64,
    pub slow_run_sec: f64,
}

/// Grow the batch by one after a fast clean run, halve it after a slow or
/// failing one, otherwise keep it. The result stays within the bounds.
pub fn tune_batch(current: u32, run: RunObservation, bounds: TuningBounds) -> u32 {
    let next = if run.errors > 0 || run.duration_sec > bounds.slow_run_sec {
        current.div_ceil(2)
    } else if run.duration_sec < bounds.fast_run_sec {
        current.saturating_add(1)
    } else {
        current
    };
    clamp(next, bounds.floor, bounds.ceiling)
}

/// Deletion batch for the purge job given the storage overshoot.
///
/// Over budget: doubled beyond 50% overshoot, times 1.5 beyond 10%, else
/// plus 10. Under budget the batch shrinks by a fifth.
pub fn tune_delete_batch(current: u32, total_bytes: i64, max_bytes: i64, floor: u32, ceiling: u32) -> u32 {
    let current_f = f64::from(current);
    let next = if total_bytes > max_bytes {
        let ratio = (total_bytes - max_bytes) as f64 / max_bytes.max(1) as f64;
        if ratio > 0.5 {
            current_f * 2.0
        } else if ratio > 0.1 {
            current_f * 1.5
        } else {
            current_f + 10.0
        }
    } else {
        current_f * 0.8
    };
    clamp(next.round() as u32, floor, ceiling)
}

fn clamp(value: u32, floor: u32, ceiling: u32) -> u32 {
    value.clamp(floor.min(ceiling), ceiling.max(floor))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: TuningBounds = TuningBounds {
        floor: 1,
        ceiling: 20,
        fast_run_sec: 10.0,
        slow_run_sec: 25.0,
    };

    fn run(duration_sec: f64, errors: i64) -> RunObservation {
        RunObservation {
            duration_sec,
            errors,
        }
    }

    #[test]
    fn test_ema() {
        assert_eq!(ema(None, 10.0, 0.3), 10.0);
        assert!((ema(Some(10.0), 20.0, 0.3) - 13.0).abs() < 1e-9);
        assert_eq!(ema(Some(f64::NAN), 4.0, 0.3), 4.0);
    }

    #[test]
    fn test_tune_batch() {
        assert_eq!(tune_batch(3, run(2.0, 0), BOUNDS), 4);
        assert_eq!(tune_batch(3, run(15.0, 0), BOUNDS), 3);
        assert_eq!(tune_batch(8, run(30.0, 0), BOUNDS), 4);
        assert_eq!(tune_batch(5, run(2.0, 1), BOUNDS), 3);
        assert_eq!(tune_batch(20, run(1.0, 0), BOUNDS), 20);
        assert_eq!(tune_batch(1, run(60.0, 3), BOUNDS), 1);
    }

    #[test]
    fn test_tune_delete_batch() {
        // 60% over budget.
        assert_eq!(tune_delete_batch(100, 160, 100, 10, 1000), 200);
        // 20% over.
        assert_eq!(tune_delete_batch(100, 120, 100, 10, 1000), 150);
        // 5% over.
        assert_eq!(tune_delete_batch(100, 105, 100, 10, 1000), 110);
        // Under budget.
        assert_eq!(tune_delete_batch(100, 50, 100, 10, 1000), 80);
        assert_eq!(tune_delete_batch(11, 0, 100, 10, 1000), 10);
        assert_eq!(tune_delete_batch(800, 1000, 100, 10, 1000), 1000);
    }
}
