//! Wall-clock accounting of the solver phases.

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Stencil application including halo exchange.
    Apply,
    /// Global reductions (`dot`, `norm2`).
    Reduce,
    /// Local vector updates.
    Update,
}

/// Accumulated time per phase.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseTimings {
    pub apply: Duration,
    pub reduce: Duration,
    pub update: Duration,
    pub apply_calls: usize,
    pub reduce_calls: usize,
}

impl PhaseTimings {
    /// Run `f`, charging its wall time to `phase`.
    pub fn time<R>(&mut self, phase: Phase, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();
        match phase {
            Phase::Apply => {
                self.apply += elapsed;
                self.apply_calls += 1;
            }
            Phase::Reduce => {
                self.reduce += elapsed;
                self.reduce_calls += 1;
            }
            Phase::Update => self.update += elapsed,
        }
        out
    }

    pub fn total(&self) -> Duration {
        self.apply + self.reduce + self.update
    }
}

impl fmt::Display for PhaseTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<10} {:>8} {:>12}", "phase", "calls", "time [s]")?;
        writeln!(f, "{:<10} {:>8} {:>12.6}", "apply", self.apply_calls, self.apply.as_secs_f64())?;
        writeln!(f, "{:<10} {:>8} {:>12.6}", "reduce", self.reduce_calls, self.reduce.as_secs_f64())?;
        writeln!(f, "{:<10} {:>8} {:>12.6}", "update", "-", self.update.as_secs_f64())?;
        write!(f, "{:<10} {:>8} {:>12.6}", "total", "", self.total().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_calls_per_phase() {
        let mut t = PhaseTimings::default();
        let v = t.time(Phase::Apply, || 3);
        t.time(Phase::Reduce, || ());
        t.time(Phase::Reduce, || ());
        t.time(Phase::Update, || ());
        assert_eq!(v, 3);
        assert_eq!(t.apply_calls, 1);
        assert_eq!(t.reduce_calls, 2);
        assert!(t.to_string().contains("reduce"));
    }
}
