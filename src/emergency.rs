//! Emergency signal intake.
//!
//! Producers are panic buttons, wearables and mobile apps, and they disagree
//! about field names and nesting. Identity resolution is an explicit ordered
//! fallback chain; losing an emergency signal is the worst failure mode, so
//! a signal that resolves to nobody is still recorded under a synthesized
//! placeholder identity and flagged degraded.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::directory::CareDirectory;
use crate::errors::Result;
use crate::model::{GeoLocation, MedicalInfo, Severity, UserRole, VitalsSnapshot};

/// Wrapper keys some producers nest the real payload under, one level deep.
const WRAPPER_FIELDS: &[&str] = &["payload", "data"];

/// Identifier fields in fallback order; a producer may send an elder-record
/// id or a user-account id under any of these.
const IDENTIFIER_FIELDS: &[&str] = &["elderId", "elder_id", "userId", "user_id", "id"];

const NAME_FIELDS: &[&str] = &["name", "elderName", "elder_name", "patientName", "patient_name"];
const PHONE_FIELDS: &[&str] = &["phone", "phoneNumber", "phone_number"];
const TYPE_FIELDS: &[&str] = &["alertType", "alert_type", "type"];

/// Alert types that name a cardiac or stroke event escalate straight to
/// critical, whatever the vitals say.
const CRITICAL_TYPE_MARKERS: &[&str] = &["heart", "cardiac", "stroke"];

const TRIAGE_HR_HIGH: i32 = 120;
const TRIAGE_HR_LOW: i32 = 50;
const TRIAGE_SPO2_LOW: i32 = 90;

#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub elder_id: Uuid,
    pub user_id: Option<Uuid>,
    pub elder_name: String,
    pub medical_info: Option<MedicalInfo>,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedSignal {
    pub identity: ResolvedIdentity,
    pub alert_type: String,
    pub priority: Severity,
    pub location: Option<GeoLocation>,
    pub vitals: Option<VitalsSnapshot>,
}

pub struct EmergencyIntake {
    directory: Arc<dyn CareDirectory>,
}

impl EmergencyIntake {
    pub fn new(directory: Arc<dyn CareDirectory>) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, raw: &Value) -> Result<ResolvedSignal> {
        let signal = unwrap_wrapper(raw);
        let alert_type = extract_alert_type(&signal);
        let vitals = extract_vitals(&signal);
        let location = extract_location(&signal);
        let priority = classify_priority(&alert_type, vitals.as_ref());
        let identity = self.resolve_identity(&signal).await?;
        Ok(ResolvedSignal {
            identity,
            alert_type,
            priority,
            location,
            vitals,
        })
    }

    /// Ordered fallback chain, stop at first hit:
    /// elder by own id → elder by linked user id → user account with the
    /// elder role, then the elder linked to it → degraded placeholder.
    async fn resolve_identity(&self, signal: &Value) -> Result<ResolvedIdentity> {
        let mut matched_user: Option<(Uuid, String)> = None;

        for id in identifier_candidates(signal) {
            if let Some(elder) = self.directory.find_elder_by_id(id).await? {
                return Ok(identity_from_elder(elder));
            }
            if let Some(elder) = self.directory.find_elder_by_user_id(id).await? {
                return Ok(identity_from_elder(elder));
            }
            if let Some(user) = self.directory.find_user(id).await? {
                if user.role == UserRole::Elder {
                    // Explicit second leg: the account exists, does an elder
                    // record hang off it?
                    if let Some(elder) = self.directory.find_elder_by_user_id(user.id).await? {
                        return Ok(identity_from_elder(elder));
                    }
                    matched_user = Some((user.id, user.full_name));
                }
            }
        }

        // Nothing resolved: synthesize a placeholder from whatever the
        // signal (or a matched account) gave us, and flag it.
        let (user_id, name_from_user) = match matched_user {
            Some((id, name)) => (Some(id), Some(name)),
            None => (None, None),
        };
        let elder_name = name_from_user
            .or_else(|| extract_first_string(signal, NAME_FIELDS))
            .or_else(|| extract_first_string(signal, PHONE_FIELDS))
            .unwrap_or_else(|| "Unknown elder".to_string());

        tracing::warn!(
            %elder_name,
            "emergency identity resolution degraded to a placeholder"
        );

        Ok(ResolvedIdentity {
            elder_id: Uuid::new_v4(),
            user_id,
            elder_name,
            medical_info: None,
            degraded: true,
        })
    }
}

fn identity_from_elder(elder: crate::model::Elder) -> ResolvedIdentity {
    ResolvedIdentity {
        elder_id: elder.id,
        user_id: elder.user_id,
        elder_name: elder.full_name.clone(),
        medical_info: Some(elder.medical_info()),
        degraded: false,
    }
}

/// Coarse triage, independent of the per-field threshold table: default
/// high, escalate to critical on cardiac/stroke alert types or a vitals
/// breach (HR >120 or <50, oxygen <90).
pub fn classify_priority(alert_type: &str, vitals: Option<&VitalsSnapshot>) -> Severity {
    let lowered = alert_type.to_lowercase();
    if CRITICAL_TYPE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Severity::Critical;
    }
    if let Some(vitals) = vitals {
        if vitals
            .heart_rate
            .is_some_and(|hr| hr > TRIAGE_HR_HIGH || hr < TRIAGE_HR_LOW)
        {
            return Severity::Critical;
        }
        if vitals
            .oxygen_saturation
            .is_some_and(|spo2| spo2 < TRIAGE_SPO2_LOW)
        {
            return Severity::Critical;
        }
    }
    Severity::High
}

/// Unwrap exactly one level of nesting: a wrapper field holding either an
/// embedded object or a JSON-encoded string of one.
pub fn unwrap_wrapper(raw: &Value) -> Value {
    for key in WRAPPER_FIELDS {
        match raw.get(*key) {
            Some(Value::Object(_)) => return raw[*key].clone(),
            Some(Value::String(encoded)) => {
                if let Ok(inner @ Value::Object(_)) = serde_json::from_str::<Value>(encoded) {
                    return inner;
                }
            }
            _ => {}
        }
    }
    raw.clone()
}

/// All distinct well-formed identifiers, in field order.
pub fn identifier_candidates(signal: &Value) -> Vec<Uuid> {
    let mut out = Vec::new();
    for field in IDENTIFIER_FIELDS {
        if let Some(text) = signal.get(*field).and_then(Value::as_str) {
            if let Ok(id) = Uuid::parse_str(text) {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
    }
    out
}

fn extract_first_string(signal: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| signal.get(*f).and_then(Value::as_str))
        .map(str::to_string)
}

fn extract_alert_type(signal: &Value) -> String {
    extract_first_string(signal, TYPE_FIELDS).unwrap_or_else(|| "sos".to_string())
}

fn extract_location(signal: &Value) -> Option<GeoLocation> {
    let scope = signal.get("location").unwrap_or(signal);
    let location = GeoLocation {
        latitude: first_f64(scope, &["latitude", "lat"]),
        longitude: first_f64(scope, &["longitude", "lng", "lon"]),
        address: extract_first_string(scope, &["address"]),
    };
    (!location.is_empty()).then_some(location)
}

fn extract_vitals(signal: &Value) -> Option<VitalsSnapshot> {
    let scope = signal.get("vitals").unwrap_or(signal);
    let vitals = VitalsSnapshot {
        heart_rate: first_i32(scope, &["heartRate", "heart_rate"]),
        systolic: first_i32(scope, &["systolic"]),
        diastolic: first_i32(scope, &["diastolic"]),
        temperature: first_f64(scope, &["temperature"]),
        oxygen_saturation: first_i32(scope, &["oxygenSaturation", "oxygen_saturation", "spo2"]),
    };
    let has_any = vitals.heart_rate.is_some()
        || vitals.systolic.is_some()
        || vitals.diastolic.is_some()
        || vitals.temperature.is_some()
        || vitals.oxygen_saturation.is_some();
    has_any.then_some(vitals)
}

fn first_i32(scope: &Value, fields: &[&str]) -> Option<i32> {
    fields
        .iter()
        .find_map(|f| scope.get(*f).and_then(Value::as_i64))
        .map(|v| v as i32)
}

fn first_f64(scope: &Value, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|f| scope.get(*f).and_then(Value::as_f64))
}
