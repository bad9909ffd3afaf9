//! Audit trail for permission mutations.
//!
//! Fire-and-forget: a sink never fails the request that produced the event.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gatekeeper_core::{PermissionId, UserId};

/// Which mutation was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PermissionDefined,
    PermissionGranted,
    PermissionRevoked,
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AuditAction::PermissionDefined => "permission_defined",
            AuditAction::PermissionGranted => "permission_granted",
            AuditAction::PermissionRevoked => "permission_revoked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "code", rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    /// Failed with the given error code.
    Failure(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    pub actor: UserId,
    pub action: AuditAction,
    pub subject_user: Option<UserId>,
    pub permission_id: Option<PermissionId>,
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    pub fn new(actor: UserId, action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            at: Utc::now(),
            actor,
            action,
            subject_user: None,
            permission_id: None,
            outcome,
        }
    }

    pub fn with_subject(mut self, user_id: UserId) -> Self {
        self.subject_user = Some(user_id);
        self
    }

    pub fn with_permission(mut self, permission_id: PermissionId) -> Self {
        self.permission_id = Some(permission_id);
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured `tracing` records under `gatekeeper::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let subject_user = event.subject_user.map(|u| u.get());
        let permission_id = event.permission_id.map(|p| p.get());
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "gatekeeper::audit",
                at = %event.at,
                actor = %event.actor,
                action = %event.action,
                subject_user,
                permission_id,
                outcome = "success",
                "audit"
            ),
            AuditOutcome::Failure(code) => tracing::info!(
                target: "gatekeeper::audit",
                at = %event.at,
                actor = %event.actor,
                action = %event.action,
                subject_user,
                permission_id,
                outcome = "failure",
                code,
                "audit"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}
