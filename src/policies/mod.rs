//! Recovery, backoff and restart policies.
//!
//! ## Contents
//! - [`BackoffPolicy`]  how delays evolve (base / factor / max + jitter)
//! - [`JitterPolicy`]   randomization strategy to avoid synchronized retries
//! - [`RecoveryPolicy`] per-component retry/escalation rule, applied by [`Recovery`]
//! - [`RestartPolicy`]  whether a Failed system restarts itself
//!
//! ## Quick wiring
//! ```text
//! Config { recovery: RecoveryPolicy, restart: RestartPolicy, restart_backoff: BackoffPolicy }
//!      └─► Supervisor uses:
//!           - Recovery::on_failure(name) → Retry(after) | Escalate
//!           - restart.permits(performed) on Failed
//!           - restart_backoff.delay_for(performed + 1) before each restart
//! ```

mod backoff;
mod jitter;
mod recovery;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use recovery::{Recovery, RecoveryAction, RecoveryPolicy, RecoveryRecord};
pub use restart::RestartPolicy;
