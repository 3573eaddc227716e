use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// 1. SEVERITY: the single ordered ranking used everywhere severity is
// compared or maxed (threshold bands, level rollup, dispatch sound flag,
// emergency triage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Whether the caregiver dashboard should play the alert sound.
    pub fn plays_sound(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Derived per-measurement level: the max candidate severity, collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// `critical → critical`, `high|medium → warning`, else `normal`.
    pub fn from_max_severity(max: Option<Severity>) -> Self {
        match max {
            Some(Severity::Critical) => Self::Critical,
            Some(Severity::High) | Some(Severity::Medium) => Self::Warning,
            _ => Self::Normal,
        }
    }
}

// 2. ALERTS: one abnormal-value finding per (measurement, type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighBloodPressure,
    LowBloodPressure,
    HighHeartRate,
    LowHeartRate,
    HighTemperature,
    LowTemperature,
    LowOxygen,
    VitalAbnormal,
    Sos,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighBloodPressure => "high_blood_pressure",
            Self::LowBloodPressure => "low_blood_pressure",
            Self::HighHeartRate => "high_heart_rate",
            Self::LowHeartRate => "low_heart_rate",
            Self::HighTemperature => "high_temperature",
            Self::LowTemperature => "low_temperature",
            Self::LowOxygen => "low_oxygen",
            Self::VitalAbnormal => "vital_abnormal",
            Self::Sos => "sos",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high_blood_pressure" => Some(Self::HighBloodPressure),
            "low_blood_pressure" => Some(Self::LowBloodPressure),
            "high_heart_rate" => Some(Self::HighHeartRate),
            "low_heart_rate" => Some(Self::LowHeartRate),
            "high_temperature" => Some(Self::HighTemperature),
            "low_temperature" => Some(Self::LowTemperature),
            "low_oxygen" => Some(Self::LowOxygen),
            "vital_abnormal" => Some(Self::VitalAbnormal),
            "sos" => Some(Self::Sos),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// `active → acknowledged → resolved`; resolved is terminal. Repeating a
    /// transition is a no-op, never an error, so both store impls share the
    /// same guard.
    pub fn can_become(self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Acknowledged)
                | (Self::Active, Self::Resolved)
                | (Self::Acknowledged, Self::Resolved)
        )
    }
}

/// What the threshold evaluator emits; becomes an Alert row once persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AlertCandidate {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub trigger_value: String,
    pub normal_range: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub elder_id: Uuid,
    pub measurement_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub trigger_value: String,
    pub normal_range: String,
    pub status: AlertStatus,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub emergency_contacted: bool,
    pub next_of_kin_notified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub elder_id: Uuid,
    pub measurement_id: Option<Uuid>,
    pub candidate: AlertCandidate,
}

// 3. MEASUREMENTS: one vital-sign reading. Absent fields stay absent —
// never coerced to zero.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMeasurement {
    pub elder_id: Uuid,
    pub recorded_at: Option<DateTime<Utc>>,
    pub heart_rate: Option<i32>,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub oxygen_saturation: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub id: Uuid,
    pub elder_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub heart_rate: Option<i32>,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub oxygen_saturation: Option<i32>,
    pub alert_level: Option<AlertLevel>,
}

// 4. DIRECTORY: entities consumed through the CareDirectory contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Elder,
    FamilyMember,
    Caregiver,
    Coordinator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elder => "elder",
            Self::FamilyMember => "family_member",
            Self::Caregiver => "caregiver",
            Self::Coordinator => "coordinator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "elder" => Some(Self::Elder),
            "family_member" => Some(Self::FamilyMember),
            "caregiver" => Some(Self::Caregiver),
            "coordinator" => Some(Self::Coordinator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Elder {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub phone: Option<String>,
    pub conditions: Vec<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub blood_type: Option<String>,
}

impl Elder {
    pub fn medical_info(&self) -> MedicalInfo {
        MedicalInfo {
            conditions: self.conditions.clone(),
            allergies: self.allergies.clone(),
            medications: self.medications.clone(),
            blood_type: self.blood_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: Uuid,
    pub elder_id: Uuid,
    pub caregiver_id: Uuid,
    pub active: bool,
}

// 5. RECIPIENTS: resolved at dispatch time, never cached — assignments can
// change between alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientRole {
    Caregiver,
    Family,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: RecipientRole,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedRecipients {
    pub caregivers: Vec<Recipient>,
    pub family: Option<Recipient>,
}

impl ResolvedRecipients {
    pub fn count(&self) -> usize {
        self.caregivers.len() + usize::from(self.family.is_some())
    }

    /// Zero recipients is a discoverable misconfiguration, not a fault.
    pub fn warning(&self) -> Option<String> {
        if self.count() == 0 {
            Some(
                "no recipients resolved: assign staff to this elder or link a family \
                 member subscription"
                    .to_string(),
            )
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipient> {
        self.caregivers.iter().chain(self.family.iter())
    }
}

// 6. EMERGENCY: canonical persisted form of a resolved emergency signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyStatus {
    Pending,
    Dispatched,
    Acknowledged,
    Resolved,
}

impl EmergencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

impl GeoLocation {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.address.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicalInfo {
    pub conditions: Vec<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub blood_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    pub heart_rate: Option<i32>,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub oxygen_saturation: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub elder_id: Uuid,
    pub user_id: Option<Uuid>,
    pub elder_name: String,
    pub alert_type: String,
    pub priority: Severity,
    pub status: EmergencyStatus,
    pub location: Option<GeoLocation>,
    pub medical_info: Option<MedicalInfo>,
    pub vitals: Option<VitalsSnapshot>,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmergencyAlert {
    pub elder_id: Uuid,
    pub user_id: Option<Uuid>,
    pub elder_name: String,
    pub alert_type: String,
    pub priority: Severity,
    pub location: Option<GeoLocation>,
    pub medical_info: Option<MedicalInfo>,
    pub vitals: Option<VitalsSnapshot>,
    pub degraded: bool,
}

// 7. NOTIFICATIONS: the persisted in-app channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    VitalAlert,
    Emergency,
    StatusUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VitalAlert => "vital_alert",
            Self::Emergency => "emergency",
            Self::StatusUpdate => "status_update",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub elder_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: Severity,
    pub metadata: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub elder_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Severity,
    pub metadata: serde_json::Value,
}

/// One event handed to the dispatcher; fans out to every resolved recipient.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub alert_id: Uuid,
    pub elder_id: Uuid,
    pub elder_name: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

// 8. DELIVERY REPORT: per-recipient breakdown; failures are recorded here,
// never propagated to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientDelivery {
    pub recipient_id: Uuid,
    pub role: RecipientRole,
    pub in_app: bool,
    pub push: Option<bool>,
    pub email: Option<bool>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub notifications_sent: usize,
    pub emails_sent: usize,
    pub deliveries: Vec<RecipientDelivery>,
}
