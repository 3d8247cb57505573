//! # Alert Dispatch
//!
//! The scheduler hands a structured [`AlertPayload`] to an [`AlertDispatcher`]
//! whenever a tick leaves any check Failed or Critical. Delivery is fire and
//! forget: the call runs on its own task under a timeout, failures are logged
//! and never retried, and an [`AlertCooldown`] suppresses repeats per service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

use crate::health::types::{CheckStatus, OverallStatus, SystemHealthSummary};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlertError {
    #[error("Alert delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("Alert delivery timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// At least one check Failed
    High,
    /// At least one service is failing while Unavailable
    Critical,
}

/// One failing check included in an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDetail {
    pub service: String,
    pub status: CheckStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub summary: String,
    pub details: Vec<AlertDetail>,
    pub system_status: OverallStatus,
}

impl AlertPayload {
    /// Build an alert from a summary; `None` when no check failed
    pub fn from_summary(summary: &SystemHealthSummary) -> Option<Self> {
        let details: Vec<AlertDetail> = summary
            .checks
            .iter()
            .filter(|check| check.status.is_failure())
            .map(|check| AlertDetail {
                service: check.service.clone(),
                status: check.status,
                message: check.message.clone(),
            })
            .collect();

        if details.is_empty() {
            return None;
        }

        let severity = if details.iter().any(|d| d.status == CheckStatus::Critical) {
            AlertSeverity::Critical
        } else {
            AlertSeverity::High
        };
        let services: Vec<&str> = details.iter().map(|d| d.service.as_str()).collect();

        Some(Self {
            id: Uuid::new_v4(),
            timestamp: summary.timestamp,
            severity,
            summary: format!(
                "{} failing health check(s): {}",
                details.len(),
                services.join(", ")
            ),
            details,
            system_status: summary.overall_status,
        })
    }
}

/// Delivery transport for alerts (webhook, email, pager...)
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn notify(&self, payload: AlertPayload) -> Result<(), AlertError>;
}

/// Default dispatcher: writes the alert to the log
#[derive(Debug, Clone, Default)]
pub struct LoggingAlertDispatcher;

#[async_trait]
impl AlertDispatcher for LoggingAlertDispatcher {
    async fn notify(&self, payload: AlertPayload) -> Result<(), AlertError> {
        match payload.severity {
            AlertSeverity::Critical => error!(
                alert_id = %payload.id,
                system_status = payload.system_status.as_str(),
                failing = payload.details.len(),
                "🚨 {}",
                payload.summary
            ),
            AlertSeverity::High => warn!(
                alert_id = %payload.id,
                system_status = payload.system_status.as_str(),
                failing = payload.details.len(),
                "⚠️ {}",
                payload.summary
            ),
        }
        Ok(())
    }
}

/// Suppresses repeat alerts for a service within `cooldown` of its previous one
///
/// Each service cools down independently, so a fresh failure elsewhere is
/// never hidden behind an earlier alert.
#[derive(Debug)]
pub struct AlertCooldown {
    cooldown: Duration,
    last_sent: DashMap<String, Instant>,
}

impl AlertCooldown {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: DashMap::new(),
        }
    }

    /// Claim the right to alert for `service` now; false while it is cooling down
    pub fn try_acquire(&self, service: &str) -> bool {
        let now = Instant::now();
        match self.last_sent.entry(service.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.cooldown {
                    return false;
                }
                entry.insert(now);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }
}
