//! Execution-state lifecycle
//!
//! ```text
//! UNINITIALIZED --begin--> BEGUN --exec--> RUNNING --mark--> MARKED
//!                            ^               |  ^              |  |
//!                            +----rescan-----+  +---restore----+  |
//!                            +----------------rescan--------------+
//! any non-ENDED --end--> ENDED
//! ```
//!
//! - Transitions are explicit; nothing is legal after ENDED
//! - `exec` while MARKED keeps the mark
//! - `restore` consumes the mark; the caller marks again to restore again
//! - EXPLAIN and parallel setup observe the state without changing it

use std::fmt;

/// State of one execution-state instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanLifecycle {
    /// Created, resources not opened
    #[default]
    Uninitialized,
    /// Resources open, positioned before the first tuple
    Begun,
    /// Producing tuples
    Running,
    /// Producing tuples with a saved position
    Marked,
    /// Resources released; terminal
    Ended,
}

/// Rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForbiddenTransition {
    pub from: ScanLifecycle,
    pub operation: &'static str,
}

impl fmt::Display for ForbiddenTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not allowed in state {}", self.operation, self.from)
    }
}

type Transition = Result<ScanLifecycle, ForbiddenTransition>;

impl ScanLifecycle {
    /// Get the state name for observability
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Begun => "BEGUN",
            Self::Running => "RUNNING",
            Self::Marked => "MARKED",
            Self::Ended => "ENDED",
        }
    }

    /// Between a successful `begin` and `end`
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Begun | Self::Running | Self::Marked)
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }

    fn forbid(self, operation: &'static str) -> Transition {
        Err(ForbiddenTransition {
            from: self,
            operation,
        })
    }

    /// UNINITIALIZED → BEGUN
    pub fn begin(self) -> Transition {
        match self {
            Self::Uninitialized => Ok(Self::Begun),
            _ => self.forbid("begin"),
        }
    }

    /// BEGUN/RUNNING → RUNNING, MARKED → MARKED
    pub fn exec(self) -> Transition {
        match self {
            Self::Begun | Self::Running => Ok(Self::Running),
            Self::Marked => Ok(Self::Marked),
            _ => self.forbid("exec"),
        }
    }

    /// RUNNING/MARKED → MARKED
    pub fn mark(self) -> Transition {
        match self {
            Self::Running | Self::Marked => Ok(Self::Marked),
            _ => self.forbid("mark_pos"),
        }
    }

    /// MARKED → RUNNING
    pub fn restore(self) -> Transition {
        match self {
            Self::Marked => Ok(Self::Running),
            _ => self.forbid("restore_pos"),
        }
    }

    /// BEGUN/RUNNING/MARKED → BEGUN
    pub fn rescan(self) -> Transition {
        match self {
            Self::Begun | Self::Running | Self::Marked => Ok(Self::Begun),
            _ => self.forbid("rescan"),
        }
    }

    /// any non-ENDED → ENDED
    pub fn end(self) -> Transition {
        match self {
            Self::Ended => self.forbid("end"),
            _ => Ok(Self::Ended),
        }
    }

    /// EXPLAIN is only legal between begin and end
    pub fn check_explain(self) -> Result<(), ForbiddenTransition> {
        if self.is_live() {
            Ok(())
        } else {
            self.forbid("explain").map(|_| ())
        }
    }

    /// Parallel setup happens after begin and before the first tuple
    pub fn check_parallel_setup(self, operation: &'static str) -> Result<(), ForbiddenTransition> {
        match self {
            Self::Begun => Ok(()),
            _ => self.forbid(operation).map(|_| ()),
        }
    }
}

impl fmt::Display for ScanLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state_name())
    }
}
