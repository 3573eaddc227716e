//! Alert persistence and lifecycle.
//!
//! The transition rules live in default trait methods so the Postgres store
//! and the in-memory test store behave identically: read, apply the shared
//! `AlertStatus` guard, write back. Each alert is mutated by a single human
//! action at a time, so plain read-modify-write is enough here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::{EngineError, Result};
use crate::model::{
    Alert, AlertLevel, AlertStatus, AlertType, EmergencyAlert, EmergencyStatus, Measurement,
    NewAlert, NewEmergencyAlert, NewMeasurement, Severity,
};

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn record_measurement(&self, new: NewMeasurement) -> Result<Measurement>;

    /// Strict side effect: always overwrites, so a stale level from an
    /// earlier evaluation cannot survive a now-normal reading.
    async fn set_measurement_alert_level(&self, id: Uuid, level: AlertLevel) -> Result<()>;

    async fn create_alerts(&self, alerts: Vec<NewAlert>) -> Result<Vec<Alert>>;

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>>;

    async fn list_alerts(
        &self,
        elder_id: Option<Uuid>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>>;

    async fn update_alert(&self, alert: &Alert) -> Result<()>;

    async fn create_emergency_alert(&self, new: NewEmergencyAlert) -> Result<EmergencyAlert>;

    async fn set_emergency_status(&self, id: Uuid, status: EmergencyStatus) -> Result<()>;

    async fn acknowledge(&self, alert_id: Uuid, actor: Uuid) -> Result<Alert> {
        let mut alert = self.require_alert(alert_id).await?;
        if alert.status.can_become(AlertStatus::Acknowledged) {
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_by = Some(actor);
            alert.acknowledged_at = Some(Utc::now());
            self.update_alert(&alert).await?;
        }
        Ok(alert)
    }

    async fn resolve(&self, alert_id: Uuid, actor: Uuid) -> Result<Alert> {
        let mut alert = self.require_alert(alert_id).await?;
        if alert.status.can_become(AlertStatus::Resolved) {
            alert.status = AlertStatus::Resolved;
            alert.resolved_by = Some(actor);
            alert.resolved_at = Some(Utc::now());
            self.update_alert(&alert).await?;
        }
        Ok(alert)
    }

    async fn mark_emergency_contacted(&self, alert_id: Uuid) -> Result<Alert> {
        let mut alert = self.require_alert(alert_id).await?;
        if !alert.emergency_contacted {
            alert.emergency_contacted = true;
            self.update_alert(&alert).await?;
        }
        Ok(alert)
    }

    /// Notifying next of kin on a still-active alert also acknowledges it:
    /// somebody has seen it, even if no caregiver pressed the button.
    async fn mark_next_of_kin_notified(&self, alert_id: Uuid) -> Result<Alert> {
        let mut alert = self.require_alert(alert_id).await?;
        let mut dirty = false;
        if !alert.next_of_kin_notified {
            alert.next_of_kin_notified = true;
            dirty = true;
        }
        if alert.status == AlertStatus::Active {
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_at = Some(Utc::now());
            dirty = true;
        }
        if dirty {
            self.update_alert(&alert).await?;
        }
        Ok(alert)
    }

    async fn require_alert(&self, alert_id: Uuid) -> Result<Alert> {
        self.get_alert(alert_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("alert {alert_id}")))
    }
}

pub struct PgAlertStore {
    pool: PgPool,
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AlertRow {
    id: Uuid,
    elder_id: Uuid,
    measurement_id: Option<Uuid>,
    alert_type: String,
    severity: String,
    message: String,
    trigger_value: String,
    normal_range: String,
    status: String,
    acknowledged_by: Option<Uuid>,
    acknowledged_at: Option<DateTime<Utc>>,
    resolved_by: Option<Uuid>,
    resolved_at: Option<DateTime<Utc>>,
    emergency_contacted: bool,
    next_of_kin_notified: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = EngineError;

    fn try_from(row: AlertRow) -> Result<Self> {
        let alert_type = AlertType::from_str(&row.alert_type).ok_or_else(|| {
            EngineError::Integrity(format!("unknown alert type '{}'", row.alert_type))
        })?;
        let severity = Severity::from_str(&row.severity)
            .ok_or_else(|| EngineError::Integrity(format!("unknown severity '{}'", row.severity)))?;
        let status = AlertStatus::from_str(&row.status)
            .ok_or_else(|| EngineError::Integrity(format!("unknown status '{}'", row.status)))?;
        Ok(Alert {
            id: row.id,
            elder_id: row.elder_id,
            measurement_id: row.measurement_id,
            alert_type,
            severity,
            message: row.message,
            trigger_value: row.trigger_value,
            normal_range: row.normal_range,
            status,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
            resolved_by: row.resolved_by,
            resolved_at: row.resolved_at,
            emergency_contacted: row.emergency_contacted,
            next_of_kin_notified: row.next_of_kin_notified,
            created_at: row.created_at,
        })
    }
}

const ALERT_COLUMNS: &str = "id, elder_id, measurement_id, alert_type, severity, message, \
     trigger_value, normal_range, status, acknowledged_by, acknowledged_at, resolved_by, \
     resolved_at, emergency_contacted, next_of_kin_notified, created_at";

#[async_trait]
impl AlertStore for PgAlertStore {
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
        sqlx::query(
            "INSERT INTO measurements \
             (id, elder_id, recorded_at, heart_rate, systolic, diastolic, temperature, \
              oxygen_saturation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(measurement.id)
        .bind(measurement.elder_id)
        .bind(measurement.recorded_at)
        .bind(measurement.heart_rate)
        .bind(measurement.systolic)
        .bind(measurement.diastolic)
        .bind(measurement.temperature)
        .bind(measurement.oxygen_saturation)
        .execute(&self.pool)
        .await?;
        Ok(measurement)
    }

    async fn set_measurement_alert_level(&self, id: Uuid, level: AlertLevel) -> Result<()> {
        sqlx::query("UPDATE measurements SET alert_level = $2 WHERE id = $1")
            .bind(id)
            .bind(level.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_alerts(&self, alerts: Vec<NewAlert>) -> Result<Vec<Alert>> {
        let mut created = Vec::with_capacity(alerts.len());
        let mut txn = self.pool.begin().await?;
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
            sqlx::query(
                "INSERT INTO alerts \
                 (id, elder_id, measurement_id, alert_type, severity, message, trigger_value, \
                  normal_range, status, emergency_contacted, next_of_kin_notified, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(alert.id)
            .bind(alert.elder_id)
            .bind(alert.measurement_id)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(&alert.message)
            .bind(&alert.trigger_value)
            .bind(&alert.normal_range)
            .bind(alert.status.as_str())
            .bind(alert.emergency_contacted)
            .bind(alert.next_of_kin_notified)
            .bind(alert.created_at)
            .execute(&mut *txn)
            .await?;
            created.push(alert);
        }
        txn.commit().await?;
        Ok(created)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        let row =
            sqlx::query_as::<_, AlertRow>(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Alert::try_from).transpose()
    }

    async fn list_alerts(
        &self,
        elder_id: Option<Uuid>,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE ($1::uuid IS NULL OR elder_id = $1) \
               AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT 200"
        ))
        .bind(elder_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn update_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            "UPDATE alerts SET status = $2, acknowledged_by = $3, acknowledged_at = $4, \
             resolved_by = $5, resolved_at = $6, emergency_contacted = $7, \
             next_of_kin_notified = $8 WHERE id = $1",
        )
        .bind(alert.id)
        .bind(alert.status.as_str())
        .bind(alert.acknowledged_by)
        .bind(alert.acknowledged_at)
        .bind(alert.resolved_by)
        .bind(alert.resolved_at)
        .bind(alert.emergency_contacted)
        .bind(alert.next_of_kin_notified)
        .execute(&self.pool)
        .await?;
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
        let medical_info = alert
            .medical_info
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let vitals = alert.vitals.as_ref().map(serde_json::to_value).transpose()?;
        sqlx::query(
            "INSERT INTO emergency_alerts \
             (id, elder_id, user_id, elder_name, alert_type, priority, status, location_lat, \
              location_lng, location_address, medical_info, vitals, degraded, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(alert.id)
        .bind(alert.elder_id)
        .bind(alert.user_id)
        .bind(&alert.elder_name)
        .bind(&alert.alert_type)
        .bind(alert.priority.as_str())
        .bind(alert.status.as_str())
        .bind(alert.location.as_ref().and_then(|l| l.latitude))
        .bind(alert.location.as_ref().and_then(|l| l.longitude))
        .bind(alert.location.as_ref().and_then(|l| l.address.clone()))
        .bind(medical_info)
        .bind(vitals)
        .bind(alert.degraded)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;
        Ok(alert)
    }

    async fn set_emergency_status(&self, id: Uuid, status: EmergencyStatus) -> Result<()> {
        sqlx::query("UPDATE emergency_alerts SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemoryAlertStore;
    use crate::model::AlertCandidate;

    fn new_alert(elder_id: Uuid) -> NewAlert {
        NewAlert {
            elder_id,
            measurement_id: Some(Uuid::new_v4()),
            candidate: AlertCandidate {
                alert_type: AlertType::HighHeartRate,
                severity: Severity::High,
                message: "Heart rate elevated: 105 bpm".into(),
                trigger_value: "105".into(),
                normal_range: "60 - 100 bpm".into(),
            },
        }
    }

    #[tokio::test]
    async fn acknowledge_then_resolve_captures_actors() {
        let store = MemoryAlertStore::default();
        let elder = Uuid::new_v4();
        let created = store.create_alerts(vec![new_alert(elder)]).await.unwrap();
        let id = created[0].id;
        assert_eq!(created[0].status, AlertStatus::Active);

        let nurse = Uuid::new_v4();
        let acked = store.acknowledge(id, nurse).await.unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_by, Some(nurse));
        assert!(acked.acknowledged_at.is_some());

        let doctor = Uuid::new_v4();
        let resolved = store.resolve(id, doctor).await.unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.resolved_by, Some(doctor));
    }

    #[tokio::test]
    async fn resolved_alerts_cannot_retransition() {
        let store = MemoryAlertStore::default();
        let created = store
            .create_alerts(vec![new_alert(Uuid::new_v4())])
            .await
            .unwrap();
        let id = created[0].id;

        let actor = Uuid::new_v4();
        store.resolve(id, actor).await.unwrap();

        // Both are no-ops, not errors.
        let after_ack = store.acknowledge(id, Uuid::new_v4()).await.unwrap();
        assert_eq!(after_ack.status, AlertStatus::Resolved);
        assert!(after_ack.acknowledged_by.is_none());

        let after_resolve = store.resolve(id, Uuid::new_v4()).await.unwrap();
        assert_eq!(after_resolve.resolved_by, Some(actor));
    }

    #[tokio::test]
    async fn lifecycle_on_missing_alert_is_not_found() {
        let store = MemoryAlertStore::default();
        let err = store.acknowledge(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(err, Err(EngineError::NotFound(_))));
        let err = store.resolve(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(err, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn next_of_kin_acknowledges_active_alert() {
        let store = MemoryAlertStore::default();
        let created = store
            .create_alerts(vec![new_alert(Uuid::new_v4())])
            .await
            .unwrap();
        let id = created[0].id;

        let updated = store.mark_next_of_kin_notified(id).await.unwrap();
        assert!(updated.next_of_kin_notified);
        assert_eq!(updated.status, AlertStatus::Acknowledged);
        // Side-channel acknowledgement has no actor.
        assert!(updated.acknowledged_by.is_none());
    }

    #[tokio::test]
    async fn emergency_contacted_flag_is_independent_of_status() {
        let store = MemoryAlertStore::default();
        let created = store
            .create_alerts(vec![new_alert(Uuid::new_v4())])
            .await
            .unwrap();
        let id = created[0].id;

        let updated = store.mark_emergency_contacted(id).await.unwrap();
        assert!(updated.emergency_contacted);
        assert_eq!(updated.status, AlertStatus::Active);
    }
}
