//! Weekly-plan aggregation: volume, calories, duration, intensity bands.

use crate::config::MetricsSettings;
use crate::parse;
use crate::types::{IntensityBalance, MetricsDelta, ProgramMetrics, WeeklyPlan};

/// Intensity band a session falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntensityBand {
    Low,
    Medium,
    High,
}

/// Classify an intensity string into a band.
///
/// An embedded RPE numeral decides first (<=6 low, <=8 medium, >8 high);
/// otherwise well-known keywords, defaulting to medium.
pub fn classify_intensity(intensity: &str) -> IntensityBand {
    if let Some(rpe) = parse::extract_rpe(intensity) {
        return if rpe <= 6.0 {
            IntensityBand::Low
        } else if rpe <= 8.0 {
            IntensityBand::Medium
        } else {
            IntensityBand::High
        };
    }

    let lower = intensity.to_lowercase();
    if ["ligera", "baja", "low"].iter().any(|k| lower.contains(k)) {
        IntensityBand::Low
    } else if ["alta", "high", "máxima"].iter().any(|k| lower.contains(k)) {
        IntensityBand::High
    } else {
        IntensityBand::Medium
    }
}

/// Aggregate a weekly plan into program-level metrics.
///
/// Calories are a flat minutes-based heuristic; intensity percentages are
/// over the whole week's session count, not per-day.
pub fn compute_metrics(plan: &WeeklyPlan, settings: &MetricsSettings) -> ProgramMetrics {
    let mut metrics = ProgramMetrics::default();
    let mut band_counts = (0u64, 0u64, 0u64);
    let mut total_sessions = 0u64;

    for (day, day_plan) in plan {
        let session_count = day_plan.sessions.len() as u64;
        metrics.sessions_per_day.insert(day.clone(), session_count);
        total_sessions += session_count;

        // Declared day volume wins; otherwise assume a flat per-session figure
        metrics.total_volume += match parse::first_integer(&day_plan.volume) {
            Some(v) => v as f64,
            None => session_count as f64 * settings.fallback_volume_per_session,
        };

        for session in &day_plan.sessions {
            let minutes = parse::duration_minutes(&session.duration);
            metrics.total_duration += minutes;
            metrics.total_calories += (minutes * settings.calories_per_minute).round();

            if !session.modality.is_empty() {
                *metrics
                    .modality_distribution
                    .entry(session.modality.clone())
                    .or_insert(0) += 1;
            }

            match classify_intensity(&session.intensity) {
                IntensityBand::Low => band_counts.0 += 1,
                IntensityBand::Medium => band_counts.1 += 1,
                IntensityBand::High => band_counts.2 += 1,
            }
        }
    }

    if total_sessions > 0 {
        let total = total_sessions as f64;
        metrics.intensity_balance = IntensityBalance {
            low: band_counts.0 as f64 / total * 100.0,
            medium: band_counts.1 as f64 / total * 100.0,
            high: band_counts.2 as f64 / total * 100.0,
        };
    }

    metrics
}

/// Field-wise numeric delta, simulated minus original.
pub fn metrics_delta(original: &ProgramMetrics, simulated: &ProgramMetrics) -> MetricsDelta {
    MetricsDelta {
        total_volume: simulated.total_volume - original.total_volume,
        total_calories: simulated.total_calories - original.total_calories,
        total_duration: simulated.total_duration - original.total_duration,
        intensity_balance: IntensityBalance {
            low: simulated.intensity_balance.low - original.intensity_balance.low,
            medium: simulated.intensity_balance.medium - original.intensity_balance.medium,
            high: simulated.intensity_balance.high - original.intensity_balance.high,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayPlan, Session};

    fn session(duration: &str, intensity: &str, modality: &str) -> Session {
        Session {
            duration: duration.into(),
            intensity: intensity.into(),
            modality: modality.into(),
            ..Default::default()
        }
    }

    fn plan() -> WeeklyPlan {
        let mut plan = WeeklyPlan::new();
        plan.insert(
            "monday".into(),
            DayPlan {
                volume: "12 series".into(),
                tags: Vec::new(),
                sessions: vec![
                    session("30 min", "RPE 6", "Carrera"),
                    session("20 min", "RPE 9", "Fuerza"),
                ],
            },
        );
        plan.insert(
            "thursday".into(),
            DayPlan {
                volume: String::new(),
                tags: Vec::new(),
                sessions: vec![session("40 min", "moderada", "Carrera")],
            },
        );
        plan
    }

    #[test]
    fn test_classify_intensity_by_rpe() {
        assert_eq!(classify_intensity("RPE 6"), IntensityBand::Low);
        assert_eq!(classify_intensity("Media - RPE 7"), IntensityBand::Medium);
        assert_eq!(classify_intensity("RPE 8"), IntensityBand::Medium);
        assert_eq!(classify_intensity("RPE 8.5"), IntensityBand::High);
    }

    #[test]
    fn test_classify_intensity_by_keyword() {
        assert_eq!(classify_intensity("Baja"), IntensityBand::Low);
        assert_eq!(classify_intensity("intensidad alta"), IntensityBand::High);
        assert_eq!(classify_intensity("máxima"), IntensityBand::High);
        assert_eq!(classify_intensity("moderada"), IntensityBand::Medium);
        assert_eq!(classify_intensity(""), IntensityBand::Medium);
    }

    #[test]
    fn test_totals() {
        let metrics = compute_metrics(&plan(), &MetricsSettings::default());

        assert_eq!(metrics.total_duration, 90.0);
        // 30*8 + 20*8 + 40*8
        assert_eq!(metrics.total_calories, 720.0);
        // Declared 12 for monday, fallback 1 * 3 for thursday
        assert_eq!(metrics.total_volume, 15.0);
    }

    #[test]
    fn test_sessions_and_modalities() {
        let metrics = compute_metrics(&plan(), &MetricsSettings::default());

        assert_eq!(metrics.sessions_per_day["monday"], 2);
        assert_eq!(metrics.sessions_per_day["thursday"], 1);
        assert_eq!(metrics.modality_distribution["Carrera"], 2);
        assert_eq!(metrics.modality_distribution["Fuerza"], 1);
    }

    #[test]
    fn test_intensity_balance_sums_to_hundred() {
        let metrics = compute_metrics(&plan(), &MetricsSettings::default());
        let b = metrics.intensity_balance;

        assert!((b.low + b.medium + b.high - 100.0).abs() < 1e-9);
        // One low (RPE 6), one medium (moderada), one high (RPE 9)
        assert!((b.low - 100.0 / 3.0).abs() < 1e-9);
        assert!((b.high - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_plan_yields_defaults() {
        let metrics = compute_metrics(&WeeklyPlan::new(), &MetricsSettings::default());
        assert_eq!(metrics, ProgramMetrics::default());
    }

    #[test]
    fn test_delta_sign_matches_change() {
        let original = compute_metrics(&plan(), &MetricsSettings::default());

        let mut longer = plan();
        for day in longer.values_mut() {
            for s in &mut day.sessions {
                let minutes = crate::parse::duration_minutes(&s.duration) + 10.0;
                s.duration = crate::parse::format_minutes(minutes);
            }
        }
        let simulated = compute_metrics(&longer, &MetricsSettings::default());
        let delta = metrics_delta(&original, &simulated);

        assert!(delta.total_duration > 0.0);
        assert!(delta.total_calories > 0.0);
        assert_eq!(delta.total_duration, 30.0);
    }
}
