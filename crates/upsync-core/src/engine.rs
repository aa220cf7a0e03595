//! Reconciliation engine
//!
//! Converges the backend's registered instances against the desired
//! device catalog. Matching is symmetric and identity-based: a device
//! `d` matches an instance `a` iff `d == a` verbatim or
//! `normalize(d) == a`. The same predicate drives the add pass, the
//! remove pass, and the final-state computation.
//!
//! Per-device failures never abort the pass; partial convergence beats
//! all-or-nothing since each device is independent. Only a failure to
//! enumerate instances (or to read the catalog upstream) is fatal.

use serde::Serialize;

use upsync_config::DeviceSection;

use crate::backend::ServiceBackend;
use crate::naming;
use crate::{Error, Result};

/// How the pass ended, relative to the match predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileState {
    /// Desired and actual already described the same set; nothing done
    Matched,
    /// Changes were made and the sets now match
    ChangedMatched,
    /// Changes were attempted but the sets still differ
    ChangedUnmatched,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub state: ReconcileState,
    /// Device names registered this pass
    pub added: Vec<String>,
    /// Instance identities unregistered this pass
    pub removed: Vec<String>,
    /// Human-readable failure lines, one per failed operation
    pub failures: Vec<String>,
}

impl ReconcileReport {
    fn matched() -> Self {
        Self {
            state: ReconcileState::Matched,
            added: Vec::new(),
            removed: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// One desired device paired with its backend identity.
struct Desired<'a> {
    device: &'a DeviceSection,
    identity: String,
    /// Part of a colliding pair: excluded from additions, but still
    /// protects a matching instance from removal.
    colliding: bool,
}

impl Desired<'_> {
    fn matches(&self, instance: &str) -> bool {
        self.device.name == instance || self.identity == instance
    }
}

/// Run one reconciliation pass.
///
/// `devices` must be the catalog's sorted device list; instances are
/// processed strictly sequentially in that order so generated artifacts
/// and failure attribution stay deterministic.
///
/// # Errors
///
/// Fatal only when the backend cannot enumerate instances. Per-device
/// register/unregister failures and identity collisions are aggregated
/// into the report instead.
pub fn reconcile(
    devices: &[DeviceSection],
    backend: &dyn ServiceBackend,
    auto_start: bool,
) -> Result<ReconcileReport> {
    let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
    let (pairs, collisions) =
        naming::identity_pairs(&names, |n| backend.is_legal_identifier(n));

    let mut failures: Vec<String> = Vec::new();
    for collision in &collisions {
        let error = Error::IdentityCollision {
            first: collision.first.clone(),
            second: collision.second.clone(),
            identity: collision.identity.clone(),
        };
        tracing::error!(%error, "identity collision");
        failures.push(error.to_string());
    }

    let desired: Vec<Desired<'_>> = devices
        .iter()
        .zip(pairs)
        .map(|(device, (_, identity))| {
            let colliding = collisions
                .iter()
                .any(|c| c.first == device.name || c.second == device.name);
            Desired {
                device,
                identity,
                colliding,
            }
        })
        .collect();

    let actual = backend.list_instances()?;
    if failures.is_empty() && sets_match(&desired, &actual) {
        tracing::debug!(count = actual.len(), "desired and actual already match");
        return Ok(ReconcileReport::matched());
    }

    let mut added: Vec<String> = Vec::new();
    let mut removed: Vec<String> = Vec::new();

    for entry in &desired {
        if entry.colliding || actual.iter().any(|a| entry.matches(a)) {
            continue;
        }
        match backend.register_instance(entry.device, auto_start) {
            Ok(identifier) => {
                tracing::info!(device = %entry.device.name, identifier, "added instance");
                added.push(entry.device.name.clone());
            }
            Err(e) => {
                tracing::error!(device = %entry.device.name, error = %e, "registration failed");
                failures.push(e.to_string());
            }
        }
    }

    let actual = backend.list_instances()?;

    for instance in &actual {
        if desired.iter().any(|entry| entry.matches(instance)) {
            continue;
        }
        match backend.unregister_instance(instance) {
            Ok(()) => {
                tracing::info!(instance, "removed instance");
                removed.push(instance.clone());
            }
            Err(e) => {
                tracing::error!(instance, error = %e, "unregistration failed");
                failures.push(e.to_string());
            }
        }
    }

    let actual = backend.list_instances()?;

    if auto_start && (!added.is_empty() || !removed.is_empty()) {
        if let Err(e) = backend.restart_dependent_server() {
            tracing::error!(error = %e, "dependent server restart failed");
            failures.push(e.to_string());
        }
    }

    let state = if sets_match(&desired, &actual) {
        ReconcileState::ChangedMatched
    } else {
        ReconcileState::ChangedUnmatched
    };

    Ok(ReconcileReport {
        state,
        added,
        removed,
        failures,
    })
}

/// Desired and actual describe the same set under the identity-matching
/// rule, including cardinality.
fn sets_match(desired: &[Desired<'_>], actual: &[String]) -> bool {
    desired.len() == actual.len()
        && desired
            .iter()
            .all(|entry| actual.iter().any(|a| entry.matches(a)))
        && actual
            .iter()
            .all(|a| desired.iter().any(|entry| entry.matches(a)))
}
