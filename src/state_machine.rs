use std::fmt;

/// Phase of the repeat timer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatPhase {
    #[default]
    Idle,
    /// One-shot start delay is elapsing.
    PendingStart,
    /// Interval timer is ticking.
    Repeating,
}

#[derive(Debug, Clone)]
pub struct PhaseTransitionError {
    from: RepeatPhase,
    to: RepeatPhase,
}

impl fmt::Display for PhaseTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid repeat phase transition from {:?} to {:?}",
            self.from, self.to
        )
    }
}

impl std::error::Error for PhaseTransitionError {}

/// State machine for the repeat scheduler with validation
#[derive(Debug, Default)]
pub struct RepeatStateMachine {
    current: RepeatPhase,
}

impl RepeatStateMachine {
    pub fn new() -> Self {
        Self {
            current: RepeatPhase::Idle,
        }
    }

    pub fn current(&self) -> RepeatPhase {
        self.current
    }

    /// Validate and perform a phase transition
    pub fn transition_to(&mut self, next: RepeatPhase) -> Result<(), PhaseTransitionError> {
        if !Self::is_valid_transition(self.current, next) {
            log::error!(
                "[REPEAT] Phase transition INVALID: {:?} -> {:?}",
                self.current,
                next
            );
            return Err(PhaseTransitionError {
                from: self.current,
                to: next,
            });
        }

        log::trace!("[REPEAT] Phase transition: {:?} -> {:?}", self.current, next);
        self.current = next;
        Ok(())
    }

    fn is_valid_transition(from: RepeatPhase, to: RepeatPhase) -> bool {
        match (from, to) {
            // start()
            (RepeatPhase::Idle, RepeatPhase::PendingStart) => true,
            // start() again cancels whatever was armed
            (RepeatPhase::PendingStart, RepeatPhase::PendingStart) => true,
            (RepeatPhase::Repeating, RepeatPhase::PendingStart) => true,

            // Start delay expired
            (RepeatPhase::PendingStart, RepeatPhase::Repeating) => true,

            // stop() is always allowed
            (_, RepeatPhase::Idle) => true,

            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        !matches!(self.current, RepeatPhase::Idle)
    }

    /// Back to Idle, whatever the current phase
    pub fn reset(&mut self) {
        if self.is_armed() {
            log::debug!("[REPEAT] Resetting phase to Idle from {:?}", self.current);
        }
        self.current = RepeatPhase::Idle;
    }
}
