//! # System auto-restart policy.
//!
//! [`RestartPolicy`] decides whether a supervisor that reached `Failed` at runtime
//! cycles through `Restarting` back to `Initializing` and starts again.
//!
//! ```text
//! RestartPolicy::Never      → Failed is terminal until reset() (default)
//! RestartPolicy::Limited(n) → at most n automatic restarts over the process lifetime
//! RestartPolicy::Always     → restart forever (spaced by Config::restart_backoff)
//! ```
//!
//! A failure of the caller-invoked `start()` is returned to the caller instead and
//! never triggers an automatic restart.

/// Policy controlling automatic restarts of the whole system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never restart automatically.
    #[default]
    Never,
    /// Restart at most this many times.
    Limited(u32),
    /// Restart every time.
    Always,
}

impl RestartPolicy {
    /// Whether another restart is allowed after `performed` restarts.
    pub fn permits(&self, performed: u32) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::Limited(max) => performed < *max,
            RestartPolicy::Always => true,
        }
    }

    /// `false` only for [`RestartPolicy::Never`] (and `Limited(0)`).
    pub fn is_enabled(&self) -> bool {
        self.permits(0)
    }

    /// Returns a short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            RestartPolicy::Never => "never",
            RestartPolicy::Limited(_) => "limited",
            RestartPolicy::Always => "always",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_counts_down() {
        let p = RestartPolicy::Limited(2);
        assert!(p.permits(0));
        assert!(p.permits(1));
        assert!(!p.permits(2));
    }

    #[test]
    fn never_and_zero_are_disabled() {
        assert!(!RestartPolicy::Never.is_enabled());
        assert!(!RestartPolicy::Limited(0).is_enabled());
        assert!(RestartPolicy::Always.permits(u32::MAX));
    }
}
