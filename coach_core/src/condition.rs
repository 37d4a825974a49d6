//! Condition evaluation for chained rules.
//!
//! A condition resolves one context value (session field, day-plan tag set,
//! client biometrics, wall-clock day/hour) and compares it with the
//! condition's value. Malformed input never raises an error: every bad path
//! degrades to `false` so one broken rule cannot crash a simulation or a
//! scheduled run.

use crate::parse;
use crate::types::{ComparisonOp, Condition, ConditionField, EvalContext, LogicalOp, Session};
use chrono::{Datelike, Timelike};

/// Evaluate a single condition against a session and its context.
pub fn evaluate(condition: &Condition, session: &Session, ctx: &EvalContext) -> bool {
    // Tag membership operators only make sense on the tag field.
    match condition.op {
        ComparisonOp::HasTag | ComparisonOp::NotHasTag => {
            if condition.field != ConditionField::Tag {
                return false;
            }
            let wanted = condition.value.as_text().to_lowercase();
            let has = tag_union(session, ctx)
                .iter()
                .any(|t| t.to_lowercase() == wanted);
            return match condition.op {
                ComparisonOp::HasTag => has,
                _ => !has,
            };
        }
        _ => {}
    }

    // Day-of-week compares the real-world weekday from ctx.now, not the
    // session's scheduled day, and only supports equality.
    if condition.field == ConditionField::DayOfWeek {
        if condition.op != ComparisonOp::Equals {
            return false;
        }
        return weekday_name(ctx.now.weekday()) == condition.value.as_text().to_lowercase();
    }

    match resolve(condition.field, session, ctx) {
        Resolved::Text(text) => compare_text(&text, condition),
        Resolved::Number(n) => compare_number(n, condition),
        Resolved::Unsupported => false,
    }
}

/// Evaluate an ordered condition chain with sequential AND/OR reduction.
///
/// The operator joining result *i* with condition *i+1* comes from
/// `conditions[i].join`. Reduction is strictly left-to-right with no
/// precedence: `(((c1 op1 c2) op2 c3) op3 c4)`. Every condition is
/// evaluated; there is no short-circuit.
pub fn evaluate_chain(conditions: &[Condition], session: &Session, ctx: &EvalContext) -> bool {
    let Some(first) = conditions.first() else {
        return true;
    };

    let mut acc = evaluate(first, session, ctx);
    for (prev, cond) in conditions.iter().zip(conditions.iter().skip(1)) {
        let next = evaluate(cond, session, ctx);
        acc = match prev.join {
            LogicalOp::And => acc && next,
            LogicalOp::Or => acc || next,
        };
    }
    acc
}

/// What a context field resolves to before comparison.
enum Resolved {
    Text(String),
    Number(f64),
    Unsupported,
}

fn resolve(field: ConditionField, session: &Session, ctx: &EvalContext) -> Resolved {
    match field {
        ConditionField::Injury => {
            let client = ctx.client;
            let mut parts: Vec<&str> = Vec::new();
            if let Some(client) = client {
                for injury in &client.injuries {
                    parts.push(&injury.name);
                    parts.extend(injury.restrictions.iter().map(String::as_str));
                }
            }
            Resolved::Text(parts.join(" "))
        }
        ConditionField::Pattern => Resolved::Text(session.block.clone()),
        ConditionField::Modality => Resolved::Text(session.modality.clone()),
        ConditionField::Intensity => Resolved::Text(session.intensity.clone()),
        ConditionField::Duration => Resolved::Number(parse::duration_minutes(&session.duration)),
        ConditionField::Equipment => {
            let available: Vec<&str> = ctx
                .client
                .map(|c| {
                    c.equipment
                        .iter()
                        .filter(|e| e.available)
                        .map(|e| e.material.as_str())
                        .collect()
                })
                .unwrap_or_default();
            Resolved::Text(available.join(" "))
        }
        // Substring fallback over the joined tag string; exact membership
        // is only offered by has_tag/not_has_tag (historical asymmetry).
        ConditionField::Tag => Resolved::Text(tag_union(session, ctx).join(" ")),
        ConditionField::ClientWeight => Resolved::Number(
            ctx.client
                .and_then(|c| c.biometrics.weight_kg)
                .unwrap_or(0.0),
        ),
        ConditionField::Bmi => {
            Resolved::Number(ctx.client.and_then(|c| c.biometrics.bmi).unwrap_or(0.0))
        }
        ConditionField::Adherence => {
            let habits = ctx.client.map(|c| c.habits.as_slice()).unwrap_or(&[]);
            if habits.is_empty() {
                Resolved::Number(0.0)
            } else {
                let sum: f64 = habits.iter().map(|h| h.compliance).sum();
                Resolved::Number(sum / habits.len() as f64)
            }
        }
        ConditionField::Progress => {
            Resolved::Number(ctx.client.and_then(|c| c.progress).unwrap_or(0.0))
        }
        // Handled in evaluate() before resolution
        ConditionField::DayOfWeek => Resolved::Unsupported,
        ConditionField::HourOfDay => Resolved::Number(ctx.now.hour() as f64),
    }
}

fn weekday_name(day: chrono::Weekday) -> &'static str {
    match day {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}

/// Union of session tags and day-plan tags.
fn tag_union(session: &Session, ctx: &EvalContext) -> Vec<String> {
    let mut tags = session.tags.clone();
    if let Some(plan) = ctx.day_plan {
        tags.extend(plan.tags.iter().cloned());
    }
    tags
}

fn compare_text(text: &str, condition: &Condition) -> bool {
    let haystack = text.to_lowercase();
    let needle = condition.value.as_text().to_lowercase();

    match condition.op {
        ComparisonOp::Contains => haystack.contains(&needle),
        ComparisonOp::Equals => haystack == needle,
        ComparisonOp::NotContains => !haystack.contains(&needle),
        // Numeric operators on a text field coerce via first-integer
        // extraction, defaulting to 0.
        ComparisonOp::GreaterThan
        | ComparisonOp::LessThan
        | ComparisonOp::GreaterOrEqual
        | ComparisonOp::LessOrEqual
        | ComparisonOp::Between => {
            let n = parse::first_integer(text).unwrap_or(0) as f64;
            compare_number(n, condition)
        }
        ComparisonOp::HasTag | ComparisonOp::NotHasTag => false,
    }
}

fn compare_number(n: f64, condition: &Condition) -> bool {
    let rhs = condition.value.as_number();
    match condition.op {
        ComparisonOp::Equals => n == rhs,
        ComparisonOp::GreaterThan => n > rhs,
        ComparisonOp::LessThan => n < rhs,
        ComparisonOp::GreaterOrEqual => n >= rhs,
        ComparisonOp::LessOrEqual => n <= rhs,
        ComparisonOp::Between => match condition.value2 {
            Some(upper) => n >= rhs && n <= upper,
            None => false,
        },
        // Substring operators compare display forms.
        ComparisonOp::Contains => display_number(n).contains(&condition.value.as_text()),
        ComparisonOp::NotContains => !display_number(n).contains(&condition.value.as_text()),
        ComparisonOp::HasTag | ComparisonOp::NotHasTag => false,
    }
}

fn display_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
