//! Engine orchestration: the produced surface upstream callers invoke.
//!
//! Both flows run inside the caller's request/response cycle. Only
//! validation and lifecycle lookups can abort them; everything downstream of
//! alert creation is best-effort and lands in the outcome as counts and
//! warnings instead of errors.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::alerts::AlertStore;
use crate::directory::CareDirectory;
use crate::dispatch::{Dispatcher, NotificationStore};
use crate::email::EmailSender;
use crate::emergency::EmergencyIntake;
use crate::errors::{EngineError, Result};
use crate::model::{
    Alert, AlertCandidate, AlertEvent, AlertLevel, AlertStatus, EmergencyStatus, NewAlert,
    NewEmergencyAlert, NewMeasurement, NotificationKind, Severity,
};
use crate::realtime::{caregiver_channel, RealtimeHub};
use crate::recipients::RecipientResolver;
use crate::thresholds;

pub struct AlertEngine {
    directory: Arc<dyn CareDirectory>,
    store: Arc<dyn AlertStore>,
    recipients: RecipientResolver,
    dispatcher: Dispatcher,
    intake: EmergencyIntake,
    hub: RealtimeHub,
}

#[derive(Debug, Serialize)]
pub struct MeasurementOutcome {
    pub measurement_id: Uuid,
    pub measurement_alert_level: AlertLevel,
    pub alerts_created: Vec<Alert>,
    pub recipient_count: usize,
    pub notifications_sent: usize,
    pub emails_sent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmergencyOutcome {
    pub emergency_alert_id: Uuid,
    pub priority: Severity,
    pub recipient_count: usize,
    pub notifications_sent: usize,
    pub emails_sent: usize,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AlertEngine {
    pub fn new(
        directory: Arc<dyn CareDirectory>,
        store: Arc<dyn AlertStore>,
        notifications: Arc<dyn NotificationStore>,
        email: Arc<dyn EmailSender>,
        hub: RealtimeHub,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            recipients: RecipientResolver::new(directory.clone()),
            dispatcher: Dispatcher::new(notifications, email, hub.clone(), channel_timeout),
            intake: EmergencyIntake::new(directory.clone()),
            directory,
            store,
            hub,
        }
    }

    /// Measurement flow: validate → record → evaluate → create alerts →
    /// set the derived level → fan out. Every created alert, any severity,
    /// triggers full recipient resolution and dispatch.
    pub async fn submit_measurement(&self, new: NewMeasurement) -> Result<MeasurementOutcome> {
        let elder = self
            .directory
            .find_elder_by_id(new.elder_id)
            .await?
            .ok_or_else(|| EngineError::validation(format!("unknown elder {}", new.elder_id)))?;

        let measurement = self.store.record_measurement(new).await?;
        let candidates = thresholds::evaluate(&measurement);
        let level = thresholds::alert_level(&candidates);

        // Strict side effect: an empty candidate list forces normal,
        // overwriting anything stale.
        self.store
            .set_measurement_alert_level(measurement.id, level)
            .await?;

        let candidates = dedupe_candidates(candidates);
        let alerts_created = if candidates.is_empty() {
            Vec::new()
        } else {
            self.store
                .create_alerts(
                    candidates
                        .into_iter()
                        .map(|candidate| NewAlert {
                            elder_id: elder.id,
                            measurement_id: Some(measurement.id),
                            candidate,
                        })
                        .collect(),
                )
                .await?
        };

        let (recipient_count, notifications_sent, emails_sent, warning) = if alerts_created
            .is_empty()
        {
            (0, 0, 0, None)
        } else {
            let recipients = self.recipients.resolve(elder.id).await?;
            let mut notifications_sent = 0;
            let mut emails_sent = 0;
            for alert in &alerts_created {
                let event = AlertEvent {
                    alert_id: alert.id,
                    elder_id: elder.id,
                    elder_name: elder.full_name.clone(),
                    kind: NotificationKind::VitalAlert,
                    title: format!(
                        "Health alert: {}",
                        alert.alert_type.as_str().replace('_', " ")
                    ),
                    message: alert.message.clone(),
                    severity: alert.severity,
                };
                let report = self.dispatcher.dispatch(&event, &recipients).await;
                notifications_sent += report.notifications_sent;
                emails_sent += report.emails_sent;
            }
            (
                recipients.count(),
                notifications_sent,
                emails_sent,
                recipients.warning(),
            )
        };

        Ok(MeasurementOutcome {
            measurement_id: measurement.id,
            measurement_alert_level: level,
            alerts_created,
            recipient_count,
            notifications_sent,
            emails_sent,
            warning,
        })
    }

    /// Emergency flow: intake-resolve (never drops the signal), persist,
    /// broadcast to the ops channel, fan out to caregivers and family.
    pub async fn submit_emergency_signal(&self, raw: &Value) -> Result<EmergencyOutcome> {
        let signal = self.intake.resolve(raw).await?;

        let emergency = self
            .store
            .create_emergency_alert(NewEmergencyAlert {
                elder_id: signal.identity.elder_id,
                user_id: signal.identity.user_id,
                elder_name: signal.identity.elder_name.clone(),
                alert_type: signal.alert_type.clone(),
                priority: signal.priority,
                location: signal.location.clone(),
                medical_info: signal.identity.medical_info.clone(),
                vitals: signal.vitals.clone(),
                degraded: signal.identity.degraded,
            })
            .await?;

        // Ops channel first; best-effort, the persisted row is the durable
        // source of truth.
        self.hub.broadcast_to_coordinators(json!({
            "type": "emergency",
            "emergency_alert_id": emergency.id,
            "elder_id": emergency.elder_id,
            "elder_name": emergency.elder_name,
            "alert_type": emergency.alert_type,
            "priority": emergency.priority.as_str(),
            "degraded": emergency.degraded,
            "location": emergency.location,
            "vitals": emergency.vitals,
        }));

        let recipients = self.recipients.resolve(emergency.elder_id).await?;
        let event = AlertEvent {
            alert_id: emergency.id,
            elder_id: emergency.elder_id,
            elder_name: emergency.elder_name.clone(),
            kind: NotificationKind::Emergency,
            title: format!("Emergency: {}", emergency.alert_type.replace('_', " ")),
            message: format!(
                "{} triggered an emergency signal ({})",
                emergency.elder_name,
                emergency.alert_type.replace('_', " ")
            ),
            severity: emergency.priority,
        };
        let report = self.dispatcher.dispatch(&event, &recipients).await;

        self.store
            .set_emergency_status(emergency.id, EmergencyStatus::Dispatched)
            .await?;

        let mut warnings = Vec::new();
        if emergency.degraded {
            warnings.push(
                "elder identity could not be resolved; signal recorded under a placeholder"
                    .to_string(),
            );
        }
        if let Some(w) = recipients.warning() {
            warnings.push(w);
        }

        Ok(EmergencyOutcome {
            emergency_alert_id: emergency.id,
            priority: emergency.priority,
            recipient_count: recipients.count(),
            notifications_sent: report.notifications_sent,
            emails_sent: report.emails_sent,
            degraded: emergency.degraded,
            warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
        })
    }

    pub async fn acknowledge_alert(&self, alert_id: Uuid, actor: Uuid) -> Result<Alert> {
        let alert = self.store.acknowledge(alert_id, actor).await?;
        self.push_status_update(&alert).await;
        Ok(alert)
    }

    pub async fn resolve_alert(&self, alert_id: Uuid, actor: Uuid) -> Result<Alert> {
        let alert = self.store.resolve(alert_id, actor).await?;
        self.push_status_update(&alert).await;
        Ok(alert)
    }

    pub async fn mark_emergency_contacted(&self, alert_id: Uuid) -> Result<Alert> {
        self.store.mark_emergency_contacted(alert_id).await
    }

    pub async fn mark_next_of_kin_notified(&self, alert_id: Uuid) -> Result<Alert> {
        let alert = self.store.mark_next_of_kin_notified(alert_id).await?;
        self.push_status_update(&alert).await;
        Ok(alert)
    }

    pub async fn list_alerts(
        &self,
        elder_id: Option<Uuid>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>> {
        self.store.list_alerts(elder_id, status).await
    }

    /// Status changes go out to the assigned caregivers' live channels so
    /// dashboards stay current. Failures here never fail the transition.
    async fn push_status_update(&self, alert: &Alert) {
        match self.recipients.resolve(alert.elder_id).await {
            Ok(recipients) => {
                let payload = json!({
                    "type": "alert_status",
                    "alert_id": alert.id,
                    "elder_id": alert.elder_id,
                    "status": alert.status.as_str(),
                });
                for caregiver in &recipients.caregivers {
                    self.hub
                        .push(&caregiver_channel(caregiver.user_id), payload.clone());
                }
            }
            Err(err) => {
                tracing::warn!(%err, alert_id = %alert.id, "could not push status update");
            }
        }
    }
}

/// Within one evaluation run the same (measurement, type) pair must not be
/// created twice; first candidate per type wins.
fn dedupe_candidates(candidates: Vec<AlertCandidate>) -> Vec<AlertCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.alert_type))
        .collect()
}
