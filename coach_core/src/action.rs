//! Action application: typed mutations of session fields.
//!
//! Actions never mutate their input; `apply_action` returns a fresh
//! session. Numeric results are clamped to the action's declared limits
//! *after* the arithmetic. Malformed input degrades to a no-op, never an
//! error.

use crate::parse;
use crate::types::{Action, ActionLimits, ModificationOp, ModificationTarget, Session};

/// Apply one modification action to a session, returning the new session.
pub fn apply_action(action: &Action, session: &Session) -> Session {
    let mut out = session.clone();
    match action.target {
        ModificationTarget::Duration => apply_duration(action, &mut out),
        ModificationTarget::Intensity => apply_intensity(action, &mut out),
        ModificationTarget::Modality => apply_modality(action, &mut out),
        ModificationTarget::Notes => apply_notes(action, &mut out),
    }
    out
}

/// Apply every action of a rule in declaration order.
pub fn apply_all(actions: &[Action], session: &Session) -> Session {
    actions
        .iter()
        .fold(session.clone(), |s, a| apply_action(a, &s))
}

fn apply_duration(action: &Action, session: &mut Session) {
    match action.op {
        // Set replaces the raw value as provided by the caller; a bare
        // number gets the standard unit appended.
        ModificationOp::Set => {
            session.duration = match &action.value {
                crate::types::Value::Number(n) => parse::format_minutes(*n),
                crate::types::Value::Text(s) => s.clone(),
            };
        }
        ModificationOp::Increase | ModificationOp::Decrease | ModificationOp::Multiply => {
            let base = parse::duration_minutes(&session.duration);
            let operand = action.value.as_number();
            let result = match action.op {
                ModificationOp::Increase => base + operand,
                ModificationOp::Decrease => base - operand,
                // Multiply rounds to the nearest whole minute
                _ => (base * operand).round(),
            };
            session.duration = parse::format_minutes(clamp(result, action.limits.as_ref()));
        }
        ModificationOp::Clamp => {
            let base = parse::duration_minutes(&session.duration);
            session.duration = parse::format_minutes(clamp(base, action.limits.as_ref()));
        }
    }
}

fn apply_intensity(action: &Action, session: &mut Session) {
    match action.op {
        ModificationOp::Set => {
            session.intensity = match &action.value {
                crate::types::Value::Number(n) => parse::format_rpe(*n),
                crate::types::Value::Text(s) => s.clone(),
            };
        }
        // Arithmetic only applies when an RPE token is present; intensity
        // strings without one are left untouched.
        ModificationOp::Increase | ModificationOp::Decrease | ModificationOp::Multiply => {
            let Some(rpe) = parse::extract_rpe(&session.intensity) else {
                return;
            };
            let operand = action.value.as_number();
            let result = match action.op {
                ModificationOp::Increase => rpe + operand,
                ModificationOp::Decrease => rpe - operand,
                _ => rpe * operand,
            };
            let result = parse::round_tenth(clamp(result, action.limits.as_ref()));
            session.intensity = parse::format_rpe(result);
        }
        ModificationOp::Clamp => {
            let Some(rpe) = parse::extract_rpe(&session.intensity) else {
                return;
            };
            session.intensity = parse::format_rpe(clamp(rpe, action.limits.as_ref()));
        }
    }
}

fn apply_modality(action: &Action, session: &mut Session) {
    // Modality only supports wholesale replacement.
    if action.op == ModificationOp::Set {
        session.modality = action.value.as_text();
    }
}

fn apply_notes(action: &Action, session: &mut Session) {
    match action.op {
        ModificationOp::Set => session.notes = action.value.as_text(),
        // Increase on notes means "append on a new line"
        ModificationOp::Increase => {
            let addition = action.value.as_text();
            let addition = addition.trim();
            if session.notes.trim().is_empty() {
                session.notes = addition.to_string();
            } else {
                session.notes = format!("{}\n{}", session.notes.trim_end(), addition);
            }
        }
        _ => {}
    }
}

fn clamp(value: f64, limits: Option<&ActionLimits>) -> f64 {
    let Some(limits) = limits else {
        return value;
    };
    let mut v = value;
    if let Some(min) = limits.min {
        v = v.max(min);
    }
    if let Some(max) = limits.max {
        v = v.min(max);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn act(target: ModificationTarget, op: ModificationOp, value: Value) -> Action {
        Action {
            target,
            op,
            value,
            limits: None,
        }
    }

    fn session_with_duration(duration: &str) -> Session {
        Session {
            duration: duration.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_duration_increase_decrease_roundtrip() {
        let s = session_with_duration("30 min");

        let inc = act(
            ModificationTarget::Duration,
            ModificationOp::Increase,
            Value::Number(10.0),
        );
        let after = apply_action(&inc, &s);
        assert_eq!(after.duration, "40 min");

        let dec = act(
            ModificationTarget::Duration,
            ModificationOp::Decrease,
            Value::Number(10.0),
        );
        let back = apply_action(&dec, &after);
        assert_eq!(back.duration, "30 min");
    }

    #[test]
    fn test_duration_set_keeps_caller_text() {
        let s = session_with_duration("30 min");
        let set = act(
            ModificationTarget::Duration,
            ModificationOp::Set,
            "2 x 20 min".into(),
        );
        assert_eq!(apply_action(&set, &s).duration, "2 x 20 min");

        let set_num = act(
            ModificationTarget::Duration,
            ModificationOp::Set,
            Value::Number(25.0),
        );
        assert_eq!(apply_action(&set_num, &s).duration, "25 min");
    }

    #[test]
    fn test_duration_multiply_rounds() {
        let s = session_with_duration("45 min");
        let mul = act(
            ModificationTarget::Duration,
            ModificationOp::Multiply,
            Value::Number(1.1),
        );
        // 49.5 rounds to 50
        assert_eq!(apply_action(&mul, &s).duration, "50 min");
    }

    #[test]
    fn test_clamp_invariant_holds_for_all_arithmetic() {
        let limits = ActionLimits {
            min: Some(20.0),
            max: Some(60.0),
        };
        for (op, operand, start) in [
            (ModificationOp::Increase, 500.0, "30 min"),
            (ModificationOp::Decrease, 500.0, "30 min"),
            (ModificationOp::Multiply, 100.0, "30 min"),
            (ModificationOp::Clamp, 0.0, "90 min"),
        ] {
            let action = Action {
                target: ModificationTarget::Duration,
                op,
                value: Value::Number(operand),
                limits: Some(limits.clone()),
            };
            let result = apply_action(&action, &session_with_duration(start));
            let minutes = crate::parse::duration_minutes(&result.duration);
            assert!(
                (20.0..=60.0).contains(&minutes),
                "{:?} produced {}",
                op,
                result.duration
            );
        }
    }

    #[test]
    fn test_intensity_increase_adjusts_rpe() {
        let mut s = Session::default();
        s.intensity = "Alta - RPE 7".into();

        let inc = act(
            ModificationTarget::Intensity,
            ModificationOp::Increase,
            Value::Number(1.0),
        );
        assert_eq!(apply_action(&inc, &s).intensity, "RPE 8.0");
    }

    #[test]
    fn test_intensity_without_rpe_token_is_noop() {
        let mut s = Session::default();
        s.intensity = "moderada".into();

        let inc = act(
            ModificationTarget::Intensity,
            ModificationOp::Increase,
            Value::Number(1.0),
        );
        assert_eq!(apply_action(&inc, &s).intensity, "moderada");
    }

    #[test]
    fn test_intensity_set_replaces_whole_string() {
        let mut s = Session::default();
        s.intensity = "RPE 9".into();

        let set = act(
            ModificationTarget::Intensity,
            ModificationOp::Set,
            "suave".into(),
        );
        assert_eq!(apply_action(&set, &s).intensity, "suave");
    }

    #[test]
    fn test_intensity_clamped_to_limits() {
        let mut s = Session::default();
        s.intensity = "RPE 9".into();

        let action = Action {
            target: ModificationTarget::Intensity,
            op: ModificationOp::Increase,
            value: Value::Number(5.0),
            limits: Some(ActionLimits {
                min: None,
                max: Some(10.0),
            }),
        };
        assert_eq!(apply_action(&action, &s).intensity, "RPE 10.0");
    }

    #[test]
    fn test_modality_set_only() {
        let mut s = Session::default();
        s.modality = "Gimnasio".into();

        let set = act(
            ModificationTarget::Modality,
            ModificationOp::Set,
            "Casa".into(),
        );
        assert_eq!(apply_action(&set, &s).modality, "Casa");

        let inc = act(
            ModificationTarget::Modality,
            ModificationOp::Increase,
            "Casa".into(),
        );
        assert_eq!(apply_action(&inc, &s).modality, "Gimnasio");
    }

    #[test]
    fn test_notes_append_on_new_line() {
        let mut s = Session::default();
        s.notes = "Calentar bien".into();

        let append = act(
            ModificationTarget::Notes,
            ModificationOp::Increase,
            "  Evitar impacto  ".into(),
        );
        let out = apply_action(&append, &s);
        assert_eq!(out.notes, "Calentar bien\nEvitar impacto");
    }

    #[test]
    fn test_notes_append_to_empty() {
        let s = Session::default();
        let append = act(
            ModificationTarget::Notes,
            ModificationOp::Increase,
            "Primera nota".into(),
        );
        assert_eq!(apply_action(&append, &s).notes, "Primera nota");
    }

    #[test]
    fn test_input_session_never_mutated() {
        let s = session_with_duration("30 min");
        let inc = act(
            ModificationTarget::Duration,
            ModificationOp::Increase,
            Value::Number(10.0),
        );
        let _ = apply_action(&inc, &s);
        assert_eq!(s.duration, "30 min");
    }

    #[test]
    fn test_apply_all_in_declaration_order() {
        let s = session_with_duration("30 min");
        let actions = vec![
            act(
                ModificationTarget::Duration,
                ModificationOp::Increase,
                Value::Number(10.0),
            ),
            act(
                ModificationTarget::Duration,
                ModificationOp::Multiply,
                Value::Number(2.0),
            ),
        ];
        // (30 + 10) * 2, not (30 * 2) + 10
        assert_eq!(apply_all(&actions, &s).duration, "80 min");
    }
}
