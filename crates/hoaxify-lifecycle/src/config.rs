use std::time::Duration;

use chrono::TimeDelta;

const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Knobs for the token and attachment lifecycles.
///
/// `session_ttl` and `attachment_grace` are compared against stored
/// timestamps, so they are calendar deltas. The sweep intervals only drive
/// tokio timers.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub session_ttl: TimeDelta,
    pub token_sweep_interval: Duration,
    pub attachment_grace: TimeDelta,
    pub attachment_sweep_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            session_ttl: TimeDelta::days(7),
            token_sweep_interval: ONE_HOUR,
            attachment_grace: TimeDelta::hours(24),
            attachment_sweep_interval: ONE_DAY,
        }
    }
}
