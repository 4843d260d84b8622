use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewindConfig {
    /// Delay between two rewind steps for short rewinds.
    pub base_step_delay: Duration,
    /// Long rewinds are sped up so they take about this long in total.
    pub min_total_duration: Duration,
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            base_step_delay: Duration::from_millis(50),
            min_total_duration: Duration::from_secs(1),
        }
    }
}

impl RewindConfig {
    /// `max(base_step_delay, min_total_duration / step_count)`.
    pub fn step_delay(&self, step_count: u32) -> Duration {
        if step_count == 0 {
            return self.base_step_delay;
        }
        self.base_step_delay
            .max(self.min_total_duration / step_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindPhase {
    Idle,
    Rewinding {
        step_delay: Duration,
        since_last_step: Duration,
        interruptible: bool,
    },
}

/// Throttles rewind steps; advanced once per fixed tick.
#[derive(Debug, Clone)]
pub struct RewindDriver {
    config: RewindConfig,
    phase: RewindPhase,
}

impl RewindDriver {
    pub fn new(config: RewindConfig) -> Self {
        Self {
            config,
            phase: RewindPhase::Idle,
        }
    }

    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    pub fn phase(&self) -> RewindPhase {
        self.phase
    }

    pub fn is_rewinding(&self) -> bool {
        matches!(self.phase, RewindPhase::Rewinding { .. })
    }

    pub fn is_interruptible(&self) -> bool {
        matches!(
            self.phase,
            RewindPhase::Rewinding {
                interruptible: true,
                ..
            }
        )
    }

    pub fn step_delay(&self) -> Option<Duration> {
        match self.phase {
            RewindPhase::Rewinding { step_delay, .. } => Some(step_delay),
            RewindPhase::Idle => None,
        }
    }

    /// Enters the rewinding phase; the first step fires once a full delay has
    /// elapsed.
    pub fn begin(&mut self, step_count: u32, interruptible: bool) -> Duration {
        let step_delay = self.config.step_delay(step_count);
        self.phase = RewindPhase::Rewinding {
            step_delay,
            since_last_step: Duration::ZERO,
            interruptible,
        };
        step_delay
    }

    /// Returns `true` when a rewind step is due this tick. At most one step
    /// is taken per tick.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let RewindPhase::Rewinding {
            step_delay,
            since_last_step,
            ..
        } = &mut self.phase
        else {
            return false;
        };
        *since_last_step = since_last_step.saturating_add(dt);
        if *since_last_step >= *step_delay {
            *since_last_step = Duration::ZERO;
            true
        } else {
            false
        }
    }

    pub fn finish(&mut self) {
        self.phase = RewindPhase::Idle;
    }
}
