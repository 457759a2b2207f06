//! Unified health reporting, shared by the bus, gate, and episodic store so
//! a single status endpoint can aggregate all three without bespoke shapes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub component: String,
    pub message: Option<String>,
    pub response_time_ms: Option<i64>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl HealthCheck {
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            component: component.into(),
            message: None,
            response_time_ms: None,
            metadata: None,
        }
    }

    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            component: component.into(),
            message: Some(message.into()),
            response_time_ms: None,
            metadata: None,
        }
    }

    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            component: component.into(),
            message: Some(message.into()),
            response_time_ms: None,
            metadata: None,
        }
    }

    pub fn with_response_time(mut self, ms: i64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// Aggregate health across the bus, gate, and episodic store into a single
/// worst-status-wins rollup, mirroring how a `/health` endpoint would.
pub fn aggregate(checks: &[HealthCheck]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    for check in checks {
        worst = match (&worst, &check.status) {
            (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            (_, HealthStatus::Unknown) if worst != HealthStatus::Unhealthy => HealthStatus::Unknown,
            (HealthStatus::Unknown, _) => worst,
            (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            (HealthStatus::Degraded, _) => worst,
            _ => HealthStatus::Healthy,
        };
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_is_healthy_when_all_healthy() {
        let checks = vec![HealthCheck::healthy("bus"), HealthCheck::healthy("gate")];
        assert_eq!(aggregate(&checks), HealthStatus::Healthy);
    }

    #[test]
    fn aggregate_surfaces_worst_status() {
        let checks = vec![
            HealthCheck::healthy("bus"),
            HealthCheck::degraded("gate", "breaker half-open"),
            HealthCheck::unhealthy("episodic", "lmdb map full"),
        ];
        assert_eq!(aggregate(&checks), HealthStatus::Unhealthy);
    }
}
