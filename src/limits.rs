//! Resource limits for solver calls.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call resource ceilings. `None` means unlimited.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Limits {
    /// Wall-clock limit.
    pub time: Option<Duration>,
    /// Memory limit, in megabytes.
    pub memory: Option<usize>,
}

impl Limits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_memory(mut self, megabytes: usize) -> Self {
        self.memory = Some(megabytes);
        self
    }
}

/// Which limit stopped a computation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Exhausted {
    Time,
    Memory,
    Cancelled,
}

impl fmt::Display for Exhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exhausted::Time => write!(f, "timeout"),
            Exhausted::Memory => write!(f, "memout"),
            Exhausted::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Running budget derived from [`Limits`] at the start of a computation.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    deadline: Option<Instant>,
    memory: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Starts the clock now.
    pub fn start(limits: &Limits) -> Self {
        Self {
            deadline: limits.time.map(|t| Instant::now() + t),
            memory: limits.memory.map(|mb| mb.saturating_mul(1024 * 1024)),
            cancel: None,
        }
    }

    /// Attaches an external stop flag.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns the first exhausted limit, given the current memory footprint in bytes.
    pub fn check(&self, memory_used: usize) -> Option<Exhausted> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Some(Exhausted::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(Exhausted::Time);
            }
        }
        if let Some(memory) = self.memory {
            if memory_used > memory {
                return Some(Exhausted::Memory);
            }
        }
        None
    }
}
