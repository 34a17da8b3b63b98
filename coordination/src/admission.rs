//! Admission control for new debates
//!
//! Two ceilings guard debate creation: a trailing-hour window and a lifetime
//! total. Counts come from the repository plus in-flight reservations, read
//! and reserved under one lock so concurrent starts in this process cannot
//! both take the last slot. Separate processes sharing one store are not
//! coordinated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RateLimits;
use crate::error::{CouncilError, CouncilResult, LimitType};
use crate::state::SharedDebateRepository;

/// Usage against both ceilings at the time of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStatus {
    pub hourly_used: u64,
    pub hourly_remaining: u64,
    pub total_used: u64,
    pub total_remaining: u64,
}

/// A reserved creation slot. Released on drop, by which time the debate is
/// either stored (and counted by the repository) or abandoned.
#[derive(Debug)]
pub struct AdmissionPermit {
    in_flight: Arc<AtomicU64>,
    status: AdmissionStatus,
}

impl AdmissionPermit {
    /// Usage at the time the permit was granted, this debate included.
    pub fn status(&self) -> AdmissionStatus {
        self.status
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Gatekeeper for debate creation.
pub struct AdmissionController {
    repo: SharedDebateRepository,
    limits: RateLimits,
    gate: Mutex<()>,
    in_flight: Arc<AtomicU64>,
}

impl AdmissionController {
    pub fn new(repo: SharedDebateRepository, limits: RateLimits) -> Self {
        Self {
            repo,
            limits,
            gate: Mutex::new(()),
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Check both ceilings without reserving a slot.
    pub async fn check(&self) -> CouncilResult<AdmissionStatus> {
        let _gate = self.gate.lock().await;
        self.evaluate().await
    }

    /// Check both ceilings and reserve a slot for one new debate.
    pub async fn admit(&self) -> CouncilResult<AdmissionPermit> {
        let _gate = self.gate.lock().await;
        let status = self.evaluate().await?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        debug!(
            hourly_used = status.hourly_used + 1,
            total_used = status.total_used + 1,
            "admission granted"
        );
        Ok(AdmissionPermit {
            in_flight: Arc::clone(&self.in_flight),
            status: AdmissionStatus {
                hourly_used: status.hourly_used + 1,
                hourly_remaining: status.hourly_remaining.saturating_sub(1),
                total_used: status.total_used + 1,
                total_remaining: status.total_remaining.saturating_sub(1),
            },
        })
    }

    /// Current usage, or the first ceiling that is already reached.
    async fn evaluate(&self) -> CouncilResult<AdmissionStatus> {
        let now = Utc::now();
        let window_start = now - Duration::hours(1);
        let pending = self.in_flight.load(Ordering::SeqCst);

        let hourly_used = self
            .repo
            .count_since(window_start)
            .await
            .map_err(|source| CouncilError::Store {
                operation: "count_in_last_hour",
                source,
            })?
            + pending;

        if hourly_used >= self.limits.hourly_limit {
            let oldest = self
                .repo
                .oldest_since(window_start)
                .await
                .map_err(|source| CouncilError::Store {
                    operation: "oldest_in_last_hour",
                    source,
                })?;
            // The window frees a slot when its oldest entry ages out.
            let retry_after_seconds = oldest.map(|created| {
                let frees_at = created + Duration::hours(1);
                (frees_at - now).num_seconds().max(1) as u64
            });
            warn!(
                current = hourly_used,
                limit = self.limits.hourly_limit,
                ?retry_after_seconds,
                "hourly debate limit reached"
            );
            return Err(CouncilError::RateLimitExceeded {
                limit_type: LimitType::Hourly,
                current: hourly_used,
                limit: self.limits.hourly_limit,
                retry_after_seconds,
            });
        }

        let total_used = self
            .repo
            .count_all()
            .await
            .map_err(|source| CouncilError::Store {
                operation: "count_all",
                source,
            })?
            + pending;

        if total_used >= self.limits.total_limit {
            warn!(
                current = total_used,
                limit = self.limits.total_limit,
                "total debate limit reached"
            );
            return Err(CouncilError::RateLimitExceeded {
                limit_type: LimitType::Total,
                current: total_used,
                limit: self.limits.total_limit,
                retry_after_seconds: None,
            });
        }

        Ok(AdmissionStatus {
            hourly_used,
            hourly_remaining: self.limits.hourly_limit - hourly_used,
            total_used,
            total_remaining: self.limits.total_limit - total_used,
        })
    }
}
