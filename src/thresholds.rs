//! Per-field vital-sign threshold evaluation.
//!
//! Pure and deterministic: one measurement in, zero or more alert candidates
//! out. Each field is evaluated independently against ordered severity bands
//! and only the single most severe matching band wins for that field. Absent
//! fields are skipped entirely.

use crate::model::{AlertCandidate, AlertLevel, AlertType, Measurement, Severity};

const BP_SYS_CRITICAL: i32 = 180;
const BP_DIA_CRITICAL: i32 = 120;
const BP_SYS_HIGH: i32 = 140;
const BP_DIA_HIGH: i32 = 90;
const BP_SYS_LOW: i32 = 90;
const BP_DIA_LOW: i32 = 60;

const HR_CRITICAL_HIGH: i32 = 120;
const HR_CRITICAL_LOW: i32 = 40;
const HR_HIGH: i32 = 100;
const HR_LOW: i32 = 60;

const TEMP_CRITICAL_HIGH: f64 = 103.0;
const TEMP_CRITICAL_LOW: f64 = 95.0;
const TEMP_HIGH: f64 = 100.4;
const TEMP_LOW: f64 = 96.8;

const SPO2_CRITICAL: i32 = 90;
const SPO2_LOW: i32 = 95;

const BP_NORMAL_RANGE: &str = "90/60 - 140/90 mmHg";
const HR_NORMAL_RANGE: &str = "60 - 100 bpm";
const TEMP_NORMAL_RANGE: &str = "96.8 - 100.4 °F";
const SPO2_NORMAL_RANGE: &str = "95 - 100 %";

/// Evaluate one measurement. A reading with several abnormal fields produces
/// several candidates; a fully normal (or fully absent) reading produces none.
pub fn evaluate(measurement: &Measurement) -> Vec<AlertCandidate> {
    let mut candidates = Vec::new();

    // Blood pressure needs both numbers for a "sys/dia" reading.
    if let (Some(sys), Some(dia)) = (measurement.systolic, measurement.diastolic) {
        if let Some(candidate) = evaluate_blood_pressure(sys, dia) {
            candidates.push(candidate);
        }
    }
    if let Some(hr) = measurement.heart_rate {
        if let Some(candidate) = evaluate_heart_rate(hr) {
            candidates.push(candidate);
        }
    }
    if let Some(temp) = measurement.temperature {
        if let Some(candidate) = evaluate_temperature(temp) {
            candidates.push(candidate);
        }
    }
    if let Some(spo2) = measurement.oxygen_saturation {
        if let Some(candidate) = evaluate_oxygen(spo2) {
            candidates.push(candidate);
        }
    }

    candidates
}

/// Rollup: max candidate severity collapsed to the measurement level.
/// An empty candidate list means `Normal`.
pub fn alert_level(candidates: &[AlertCandidate]) -> AlertLevel {
    AlertLevel::from_max_severity(candidates.iter().map(|c| c.severity).max())
}

fn evaluate_blood_pressure(sys: i32, dia: i32) -> Option<AlertCandidate> {
    let reading = format!("{sys}/{dia}");
    if sys >= BP_SYS_CRITICAL || dia >= BP_DIA_CRITICAL {
        Some(candidate(
            AlertType::HighBloodPressure,
            Severity::Critical,
            format!("Blood pressure critically elevated: {reading} mmHg"),
            reading,
            BP_NORMAL_RANGE,
        ))
    } else if sys >= BP_SYS_HIGH || dia >= BP_DIA_HIGH {
        Some(candidate(
            AlertType::HighBloodPressure,
            Severity::High,
            format!("Blood pressure elevated: {reading} mmHg"),
            reading,
            BP_NORMAL_RANGE,
        ))
    } else if sys <= BP_SYS_LOW || dia <= BP_DIA_LOW {
        Some(candidate(
            AlertType::LowBloodPressure,
            Severity::Medium,
            format!("Blood pressure low: {reading} mmHg"),
            reading,
            BP_NORMAL_RANGE,
        ))
    } else {
        None
    }
}

fn evaluate_heart_rate(hr: i32) -> Option<AlertCandidate> {
    if hr >= HR_CRITICAL_HIGH {
        Some(candidate(
            AlertType::HighHeartRate,
            Severity::Critical,
            format!("Heart rate critically elevated: {hr} bpm"),
            hr.to_string(),
            HR_NORMAL_RANGE,
        ))
    } else if hr <= HR_CRITICAL_LOW {
        Some(candidate(
            AlertType::LowHeartRate,
            Severity::Critical,
            format!("Heart rate critically low: {hr} bpm"),
            hr.to_string(),
            HR_NORMAL_RANGE,
        ))
    } else if hr >= HR_HIGH {
        Some(candidate(
            AlertType::HighHeartRate,
            Severity::High,
            format!("Heart rate elevated: {hr} bpm"),
            hr.to_string(),
            HR_NORMAL_RANGE,
        ))
    } else if hr <= HR_LOW {
        Some(candidate(
            AlertType::LowHeartRate,
            Severity::Medium,
            format!("Heart rate low: {hr} bpm"),
            hr.to_string(),
            HR_NORMAL_RANGE,
        ))
    } else {
        None
    }
}

fn evaluate_temperature(temp: f64) -> Option<AlertCandidate> {
    let reading = format!("{temp:.1}");
    if temp >= TEMP_CRITICAL_HIGH {
        Some(candidate(
            AlertType::HighTemperature,
            Severity::Critical,
            format!("Temperature critically elevated: {reading} °F"),
            reading,
            TEMP_NORMAL_RANGE,
        ))
    } else if temp <= TEMP_CRITICAL_LOW {
        Some(candidate(
            AlertType::LowTemperature,
            Severity::Critical,
            format!("Temperature critically low: {reading} °F"),
            reading,
            TEMP_NORMAL_RANGE,
        ))
    } else if temp >= TEMP_HIGH {
        Some(candidate(
            AlertType::HighTemperature,
            Severity::High,
            format!("Temperature elevated: {reading} °F"),
            reading,
            TEMP_NORMAL_RANGE,
        ))
    } else if temp <= TEMP_LOW {
        Some(candidate(
            AlertType::LowTemperature,
            Severity::Medium,
            format!("Temperature low: {reading} °F"),
            reading,
            TEMP_NORMAL_RANGE,
        ))
    } else {
        None
    }
}

fn evaluate_oxygen(spo2: i32) -> Option<AlertCandidate> {
    if spo2 <= SPO2_CRITICAL {
        Some(candidate(
            AlertType::LowOxygen,
            Severity::Critical,
            format!("Oxygen saturation critically low: {spo2}%"),
            spo2.to_string(),
            SPO2_NORMAL_RANGE,
        ))
    } else if spo2 <= SPO2_LOW {
        Some(candidate(
            AlertType::LowOxygen,
            Severity::High,
            format!("Oxygen saturation low: {spo2}%"),
            spo2.to_string(),
            SPO2_NORMAL_RANGE,
        ))
    } else {
        None
    }
}

fn candidate(
    alert_type: AlertType,
    severity: Severity,
    message: String,
    trigger_value: String,
    normal_range: &str,
) -> AlertCandidate {
    AlertCandidate {
        alert_type,
        severity,
        message,
        trigger_value,
        normal_range: normal_range.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn reading(
        hr: Option<i32>,
        sys: Option<i32>,
        dia: Option<i32>,
        temp: Option<f64>,
        spo2: Option<i32>,
    ) -> Measurement {
        Measurement {
            id: Uuid::new_v4(),
            elder_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            heart_rate: hr,
            systolic: sys,
            diastolic: dia,
            temperature: temp,
            oxygen_saturation: spo2,
            alert_level: None,
        }
    }

    #[test]
    fn normal_heart_rate_band_produces_nothing() {
        for hr in 61..=99 {
            let candidates = evaluate(&reading(Some(hr), None, None, None, None));
            assert!(candidates.is_empty(), "HR {hr} should be normal");
        }
    }

    #[test]
    fn heart_rate_boundaries_trigger() {
        // 60 is the low threshold, 100 the high one; both must fire.
        let low = evaluate(&reading(Some(60), None, None, None, None));
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].alert_type, AlertType::LowHeartRate);
        assert_eq!(low[0].severity, Severity::Medium);

        let high = evaluate(&reading(Some(100), None, None, None, None));
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].alert_type, AlertType::HighHeartRate);
        assert_eq!(high[0].severity, Severity::High);
    }

    #[test]
    fn heart_rate_critical_bands_win_over_lower_bands() {
        let tachy = evaluate(&reading(Some(120), None, None, None, None));
        assert_eq!(tachy.len(), 1);
        assert_eq!(tachy[0].severity, Severity::Critical);
        assert_eq!(tachy[0].alert_type, AlertType::HighHeartRate);
        assert!(tachy[0].message.contains("critically elevated"));

        let brady = evaluate(&reading(Some(40), None, None, None, None));
        assert_eq!(brady.len(), 1);
        assert_eq!(brady[0].severity, Severity::Critical);
        assert_eq!(brady[0].alert_type, AlertType::LowHeartRate);
        assert!(brady[0].message.contains("critically low"));
    }

    #[test]
    fn blood_pressure_bands() {
        let crit = evaluate(&reading(None, Some(185), Some(95), None, None));
        assert_eq!(crit[0].severity, Severity::Critical);
        assert_eq!(crit[0].trigger_value, "185/95");

        // Diastolic alone can cross the critical band.
        let dia_crit = evaluate(&reading(None, Some(150), Some(121), None, None));
        assert_eq!(dia_crit[0].severity, Severity::Critical);

        let high = evaluate(&reading(None, Some(150), Some(95), None, None));
        assert_eq!(high[0].severity, Severity::High);
        assert_eq!(high[0].alert_type, AlertType::HighBloodPressure);

        let low = evaluate(&reading(None, Some(85), Some(55), None, None));
        assert_eq!(low[0].severity, Severity::Medium);
        assert_eq!(low[0].alert_type, AlertType::LowBloodPressure);

        let normal = evaluate(&reading(None, Some(118), Some(76), None, None));
        assert!(normal.is_empty());
    }

    #[test]
    fn blood_pressure_requires_both_numbers() {
        assert!(evaluate(&reading(None, Some(190), None, None, None)).is_empty());
        assert!(evaluate(&reading(None, None, Some(130), None, None)).is_empty());
    }

    #[test]
    fn temperature_bands() {
        assert_eq!(
            evaluate(&reading(None, None, None, Some(103.0), None))[0].severity,
            Severity::Critical
        );
        assert_eq!(
            evaluate(&reading(None, None, None, Some(95.0), None))[0].severity,
            Severity::Critical
        );
        assert_eq!(
            evaluate(&reading(None, None, None, Some(100.4), None))[0].severity,
            Severity::High
        );
        assert_eq!(
            evaluate(&reading(None, None, None, Some(96.8), None))[0].severity,
            Severity::Medium
        );
        assert!(evaluate(&reading(None, None, None, Some(98.6), None)).is_empty());
    }

    #[test]
    fn oxygen_bands() {
        assert_eq!(
            evaluate(&reading(None, None, None, None, Some(90)))[0].severity,
            Severity::Critical
        );
        assert_eq!(
            evaluate(&reading(None, None, None, None, Some(95)))[0].severity,
            Severity::High
        );
        assert!(evaluate(&reading(None, None, None, None, Some(96))).is_empty());
    }

    #[test]
    fn absent_fields_are_skipped_not_zeroed() {
        let candidates = evaluate(&reading(None, None, None, None, None));
        assert!(candidates.is_empty());
    }

    #[test]
    fn multi_abnormal_reading_produces_one_candidate_per_field() {
        // HR 125 (critical), BP 150/95 (high), SpO2 93 (high).
        let candidates = evaluate(&reading(Some(125), Some(150), Some(95), None, Some(93)));
        assert_eq!(candidates.len(), 3);

        let severities: Vec<_> = candidates.iter().map(|c| (c.alert_type, c.severity)).collect();
        assert!(severities.contains(&(AlertType::HighHeartRate, Severity::Critical)));
        assert!(severities.contains(&(AlertType::HighBloodPressure, Severity::High)));
        assert!(severities.contains(&(AlertType::LowOxygen, Severity::High)));

        assert_eq!(alert_level(&candidates), AlertLevel::Critical);
    }

    #[test]
    fn level_rollup() {
        assert_eq!(alert_level(&[]), AlertLevel::Normal);

        let medium_only = evaluate(&reading(Some(55), None, None, None, None));
        assert_eq!(alert_level(&medium_only), AlertLevel::Warning);

        let high = evaluate(&reading(Some(105), None, None, None, None));
        assert_eq!(alert_level(&high), AlertLevel::Warning);

        let critical = evaluate(&reading(Some(130), None, None, None, None));
        assert_eq!(alert_level(&critical), AlertLevel::Critical);
    }
}
