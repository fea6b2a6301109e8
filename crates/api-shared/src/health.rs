use crate::dto::HealthRes;
use std::time::Instant;

/// Liveness reporting for the API surfaces.
///
/// Created once at startup; reports the crate version and how long the process has been serving.
#[derive(Clone, Debug)]
pub struct HealthService {
    started: Instant,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn check_health(&self) -> HealthRes {
        HealthRes {
            ok: true,
            message: "MedAssist is alive".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
