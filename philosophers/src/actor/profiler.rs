//! Interval profiler for the phases of one cycle.

use std::time::{Duration, Instant};

/// Measures `N` consecutive phases on the monotonic clock.
///
/// Each call to [`lap`](Self::lap) closes the current phase and opens the
/// next one. Laps beyond `N` are ignored.
#[derive(Debug, Clone)]
pub struct PhaseProfiler<const N: usize> {
    started: Instant,
    mark: Instant,
    phases: [Duration; N],
    next: usize,
}

impl<const N: usize> PhaseProfiler<N> {
    /// Start profiling now.
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            mark: now,
            phases: [Duration::ZERO; N],
            next: 0,
        }
    }

    /// Close the current phase.
    pub fn lap(&mut self) {
        let now = Instant::now();
        if let Some(phase) = self.phases.get_mut(self.next) {
            *phase = now.duration_since(self.mark);
            self.next += 1;
        }
        self.mark = now;
    }

    /// Number of phases closed so far.
    pub fn completed(&self) -> usize {
        self.next
    }

    /// Phase durations and the total since start.
    pub fn finish(self) -> ([Duration; N], Duration) {
        (self.phases, self.mark.duration_since(self.started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_phases_sum_to_total() {
        let mut profiler = PhaseProfiler::<3>::start();
        for _ in 0..3 {
            thread::sleep(Duration::from_millis(2));
            profiler.lap();
        }
        assert_eq!(profiler.completed(), 3);

        let (phases, total) = profiler.finish();
        assert!(phases.iter().all(|p| *p >= Duration::from_millis(2)));
        assert_eq!(phases.iter().sum::<Duration>(), total);
    }

    #[test]
    fn test_extra_laps_are_ignored() {
        let mut profiler = PhaseProfiler::<1>::start();
        profiler.lap();
        profiler.lap();
        assert_eq!(profiler.completed(), 1);
    }
}
