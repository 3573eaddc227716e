//! In-memory fakes for the engine's seams. Only compiled for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::alerts::AlertStore;
use crate::directory::CareDirectory;
use crate::dispatch::NotificationStore;
use crate::email::{EmailError, EmailSender, OutgoingEmail};
use crate::errors::{EngineError, Result};
use crate::model::{
    Alert, AlertLevel, AlertStatus, Assignment, Elder, EmergencyAlert, EmergencyStatus,
    Measurement, NewAlert, NewEmergencyAlert, NewMeasurement, NewNotification, Notification,
    User, UserRole,
};

// ── Directory ───────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<DirectoryState>,
}

#[derive(Default)]
struct DirectoryState {
    elders: Vec<Elder>,
    users: Vec<User>,
    assignments: Vec<Assignment>,
    subscriptions: Vec<(Uuid, Uuid)>,
}

impl MemoryDirectory {
    pub fn add_elder(&self, name: &str, user_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().elders.push(Elder {
            id,
            user_id,
            full_name: name.to_string(),
            phone: None,
            conditions: vec!["hypertension".to_string()],
            allergies: vec![],
            medications: vec![],
            blood_type: Some("O+".to_string()),
        });
        id
    }

    pub fn add_user(&self, name: &str, email: &str, role: UserRole, active: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().users.push(User {
            id,
            full_name: name.to_string(),
            email: email.to_string(),
            role,
            active,
        });
        id
    }

    pub fn add_assignment(&self, elder_id: Uuid, caregiver_id: Uuid, active: bool) {
        self.inner.lock().unwrap().assignments.push(Assignment {
            id: Uuid::new_v4(),
            elder_id,
            caregiver_id,
            active,
        });
    }

    pub fn add_subscription(&self, elder_id: Uuid, user_id: Uuid) {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .push((elder_id, user_id));
    }
}

#[async_trait]
impl CareDirectory for MemoryDirectory {
    async fn find_elder_by_id(&self, id: Uuid) -> Result<Option<Elder>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .elders
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn find_elder_by_user_id(&self, user_id: Uuid) -> Result<Option<Elder>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .elders
            .iter()
            .find(|e| e.user_id == Some(user_id))
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_active_assignments(&self, elder_id: Uuid) -> Result<Vec<Assignment>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .assignments
            .iter()
            .filter(|a| a.elder_id == elder_id && a.active)
            .cloned()
            .collect())
    }

    async fn find_subscription_user(&self, elder_id: Uuid) -> Result<Option<User>> {
        let state = self.inner.lock().unwrap();
        let user_id = state
            .subscriptions
            .iter()
            .rev()
            .find(|(eid, _)| *eid == elder_id)
            .map(|(_, uid)| *uid);
        Ok(user_id.and_then(|uid| state.users.iter().find(|u| u.id == uid).cloned()))
    }
}

// ── Alert store ─────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryAlertStore {
    inner: Mutex<AlertState>,
}

#[derive(Default)]
struct AlertState {
    measurements: HashMap<Uuid, Measurement>,
    alerts: HashMap<Uuid, Alert>,
    emergencies: HashMap<Uuid, EmergencyAlert>,
}

impl MemoryAlertStore {
    pub fn measurement(&self, id: Uuid) -> Option<Measurement> {
        self.inner.lock().unwrap().measurements.get(&id).cloned()
    }

    pub fn emergencies(&self) -> Vec<EmergencyAlert> {
        self.inner
            .lock()
            .unwrap()
            .emergencies
            .values()
            .cloned()
            .collect()
    }

    pub fn alert_count(&self) -> usize {
        self.inner.lock().unwrap().alerts.len()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn record_measurement(&self, new: NewMeasurement) -> Result<Measurement> {
        let measurement = Measurement {
            id: Uuid::new_v4(),
            elder_id: new.elder_id,
            recorded_at: new.recorded_at.unwrap_or_else(Utc::now),
            heart_rate: new.heart_rate,
            systolic: new.systolic,
            diastolic: new.diastolic,
            temperature: new.temperature,
            oxygen_saturation: new.oxygen_saturation,
            alert_level: None,
        };
        self.inner
            .lock()
            .unwrap()
            .measurements
            .insert(measurement.id, measurement.clone());
        Ok(measurement)
    }

    async fn set_measurement_alert_level(&self, id: Uuid, level: AlertLevel) -> Result<()> {
        if let Some(m) = self.inner.lock().unwrap().measurements.get_mut(&id) {
            m.alert_level = Some(level);
        }
        Ok(())
    }

    async fn create_alerts(&self, alerts: Vec<NewAlert>) -> Result<Vec<Alert>> {
        let mut created = Vec::with_capacity(alerts.len());
        let mut state = self.inner.lock().unwrap();
        for new in alerts {
            let alert = Alert {
                id: Uuid::new_v4(),
                elder_id: new.elder_id,
                measurement_id: new.measurement_id,
                alert_type: new.candidate.alert_type,
                severity: new.candidate.severity,
                message: new.candidate.message,
                trigger_value: new.candidate.trigger_value,
                normal_range: new.candidate.normal_range,
                status: AlertStatus::Active,
                acknowledged_by: None,
                acknowledged_at: None,
                resolved_by: None,
                resolved_at: None,
                emergency_contacted: false,
                next_of_kin_notified: false,
                created_at: Utc::now(),
            };
            state.alerts.insert(alert.id, alert.clone());
            created.push(alert);
        }
        Ok(created)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        Ok(self.inner.lock().unwrap().alerts.get(&id).cloned())
    }

    async fn list_alerts(
        &self,
        elder_id: Option<Uuid>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>> {
        let state = self.inner.lock().unwrap();
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| elder_id.map_or(true, |e| a.elder_id == e))
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        alerts.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        Ok(alerts)
    }

    async fn update_alert(&self, alert: &Alert) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .alerts
            .insert(alert.id, alert.clone());
        Ok(())
    }

    async fn create_emergency_alert(&self, new: NewEmergencyAlert) -> Result<EmergencyAlert> {
        let alert = EmergencyAlert {
            id: Uuid::new_v4(),
            elder_id: new.elder_id,
            user_id: new.user_id,
            elder_name: new.elder_name,
            alert_type: new.alert_type,
            priority: new.priority,
            status: EmergencyStatus::Pending,
            location: new.location,
            medical_info: new.medical_info,
            vitals: new.vitals,
            degraded: new.degraded,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .emergencies
            .insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn set_emergency_status(&self, id: Uuid, status: EmergencyStatus) -> Result<()> {
        if let Some(e) = self.inner.lock().unwrap().emergencies.get_mut(&id) {
            e.status = status;
        }
        Ok(())
    }
}

// ── Notification store ──────────────────────────────────────

#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: Mutex<Vec<Notification>>,
    fail_recipient: Mutex<Option<Uuid>>,
}

impl MemoryNotificationStore {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    /// Make writes for one recipient fail, to exercise isolation.
    pub fn fail_for(&self, recipient_id: Uuid) {
        *self.fail_recipient.lock().unwrap() = Some(recipient_id);
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn persist_notification(&self, new: NewNotification) -> Result<Notification> {
        if *self.fail_recipient.lock().unwrap() == Some(new.recipient_id) {
            return Err(EngineError::Integrity("simulated write failure".into()));
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            elder_id: new.elder_id,
            kind: new.kind.as_str().to_string(),
            title: new.title,
            message: new.message,
            priority: new.priority,
            metadata: new.metadata,
            read: false,
            created_at: Utc::now(),
        };
        self.notifications
            .lock()
            .unwrap()
            .push(notification.clone());
        Ok(notification)
    }
}

// ── Email senders ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct FailingEmailSender;

#[async_trait]
impl EmailSender for FailingEmailSender {
    async fn send(&self, _email: OutgoingEmail) -> Result<(), EmailError> {
        Err(EmailError("provider returned 503".into()))
    }
}

pub struct SlowEmailSender(pub Duration);

#[async_trait]
impl EmailSender for SlowEmailSender {
    async fn send(&self, _email: OutgoingEmail) -> Result<(), EmailError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}
