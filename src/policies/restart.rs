//! # Restart cap for yielding tasks.
//!
//! [`RestartPolicy`] bounds how many consecutive benign exits a leader tolerates.
//!
//! - [`RestartPolicy::Unlimited`] the task is restarted forever (default).
//! - [`RestartPolicy::Limited`] the engine fails with
//!   [`RuntimeError::RestartsExhausted`](crate::RuntimeError::RestartsExhausted)
//!   once the task would need restart number `max + 1`.

/// Policy controlling how many consecutive restarts a leader performs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Restart without bound.
    #[default]
    Unlimited,
    /// Allow at most `max` consecutive restarts per leadership term.
    Limited {
        /// Maximum number of restarts.
        max: u32,
    },
}

impl RestartPolicy {
    /// Builds a policy from a signed cap: negative means unlimited.
    pub fn from_cap(cap: i64) -> Self {
        if cap < 0 {
            RestartPolicy::Unlimited
        } else {
            RestartPolicy::Limited {
                max: cap.min(i64::from(u32::MAX)) as u32,
            }
        }
    }

    /// Returns `true` if restart number `restarts` is allowed.
    pub fn allows(&self, restarts: u32) -> bool {
        match self {
            RestartPolicy::Unlimited => true,
            RestartPolicy::Limited { max } => restarts <= *max,
        }
    }
}
