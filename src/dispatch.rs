//! Notification fan-out.
//!
//! One event, N recipients, each delivery isolated: a failed channel call is
//! logged, recorded in the report and excluded from the success tallies —
//! it never aborts the other recipients and never fails the caller. All
//! per-recipient work is issued concurrently and joined ("settle all"), with
//! a timeout bound on each channel call so one slow provider cannot stall
//! the whole fan-out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use sqlx::PgPool;
use tokio::time::timeout;
use uuid::Uuid;

use crate::email::{EmailError, EmailSender, EmailTemplate, OutgoingEmail};
use crate::errors::Result;
use crate::model::{
    AlertEvent, DeliveryReport, NewNotification, Notification, NotificationKind, Recipient,
    RecipientDelivery, RecipientRole, ResolvedRecipients,
};
use crate::realtime::{caregiver_channel, RealtimeHub};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn persist_notification(&self, new: NewNotification) -> Result<Notification>;
}

pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn persist_notification(&self, new: NewNotification) -> Result<Notification> {
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
        sqlx::query(
            "INSERT INTO notifications \
             (id, recipient_id, elder_id, kind, title, message, priority, metadata, read, \
              created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.elder_id)
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.priority.as_str())
        .bind(&notification.metadata)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(notification)
    }
}

pub struct Dispatcher {
    notifications: Arc<dyn NotificationStore>,
    email: Arc<dyn EmailSender>,
    hub: RealtimeHub,
    channel_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        email: Arc<dyn EmailSender>,
        hub: RealtimeHub,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            notifications,
            email,
            hub,
            channel_timeout,
        }
    }

    pub async fn dispatch(
        &self,
        event: &AlertEvent,
        recipients: &ResolvedRecipients,
    ) -> DeliveryReport {
        let deliveries = join_all(
            recipients
                .iter()
                .map(|recipient| self.deliver_to(event, recipient)),
        )
        .await;

        let report = DeliveryReport {
            notifications_sent: deliveries.iter().filter(|d| d.in_app).count(),
            emails_sent: deliveries.iter().filter(|d| d.email == Some(true)).count(),
            deliveries,
        };
        tracing::info!(
            alert_id = %event.alert_id,
            recipients = recipients.count(),
            notifications_sent = report.notifications_sent,
            emails_sent = report.emails_sent,
            "dispatch settled"
        );
        report
    }

    /// Caregivers get in-app + real-time push; family gets in-app + email.
    /// Family is the asynchronous channel only, by design. Both channel calls
    /// for a recipient are issued concurrently and both always settle.
    async fn deliver_to(&self, event: &AlertEvent, recipient: &Recipient) -> RecipientDelivery {
        let mut errors: Vec<String> = Vec::new();

        let in_app_call = timeout(self.channel_timeout, self.write_in_app(event, recipient));

        let (in_app, push, email) = match recipient.role {
            RecipientRole::Caregiver => {
                // The push is synchronous on the broadcast channel and has no
                // delivery guarantee; only the persisted write can fail here.
                let payload = json!({
                    "type": "alert",
                    "alert_id": event.alert_id,
                    "elder_id": event.elder_id,
                    "elder_name": event.elder_name,
                    "kind": event.kind.as_str(),
                    "title": event.title,
                    "message": event.message,
                    "severity": event.severity.as_str(),
                    "play_sound": event.severity.plays_sound(),
                });
                let delivered = self.hub.push(&caregiver_channel(recipient.user_id), payload);
                let in_app = match in_app_call.await {
                    Ok(Ok(())) => true,
                    Ok(Err(err)) => {
                        errors.push(format!("in-app: {err}"));
                        false
                    }
                    Err(_) => {
                        errors.push("in-app: timed out".to_string());
                        false
                    }
                };
                (in_app, Some(delivered), None)
            }
            RecipientRole::Family => {
                let email_call = timeout(self.channel_timeout, self.send_email(event, recipient));
                let (in_app_result, email_result) = tokio::join!(in_app_call, email_call);
                let in_app = match in_app_result {
                    Ok(Ok(())) => true,
                    Ok(Err(err)) => {
                        errors.push(format!("in-app: {err}"));
                        false
                    }
                    Err(_) => {
                        errors.push("in-app: timed out".to_string());
                        false
                    }
                };
                let email = match email_result {
                    Ok(Ok(())) => true,
                    Ok(Err(err)) => {
                        errors.push(format!("email: {err}"));
                        false
                    }
                    Err(_) => {
                        errors.push("email: timed out".to_string());
                        false
                    }
                };
                (in_app, None, Some(email))
            }
        };

        if !errors.is_empty() {
            tracing::warn!(
                recipient = %recipient.user_id,
                alert_id = %event.alert_id,
                errors = %errors.join("; "),
                "partial delivery failure"
            );
        }

        RecipientDelivery {
            recipient_id: recipient.user_id,
            role: recipient.role,
            in_app,
            push,
            email,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    }

    async fn write_in_app(
        &self,
        event: &AlertEvent,
        recipient: &Recipient,
    ) -> crate::errors::Result<()> {
        self.notifications
            .persist_notification(NewNotification {
                recipient_id: recipient.user_id,
                elder_id: event.elder_id,
                kind: event.kind,
                title: event.title.clone(),
                message: event.message.clone(),
                priority: event.severity,
                metadata: json!({
                    "alert_id": event.alert_id,
                    "severity": event.severity.as_str(),
                }),
            })
            .await?;
        Ok(())
    }

    async fn send_email(&self, event: &AlertEvent, recipient: &Recipient) -> Result<(), EmailError> {
        let template = match event.kind {
            NotificationKind::Emergency => EmailTemplate::EmergencyAlert,
            _ => EmailTemplate::VitalAlert,
        };
        self.email
            .send(OutgoingEmail {
                template,
                to: recipient.email.clone(),
                subject: event.title.clone(),
                fields: json!({
                    "elder_name": event.elder_name,
                    "message": event.message,
                    "severity": event.severity.as_str(),
                    "alert_id": event.alert_id,
                }),
            })
            .await
    }
}
