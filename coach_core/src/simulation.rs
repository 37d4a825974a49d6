//! What-if simulation: apply a selected rule set to a cloned plan and
//! report metric deltas.
//!
//! Rules are applied one rule at a time per session, in the caller's
//! allow-list order. That means relative ordering within a session follows
//! the selection order, not global priority. The live plan is never
//! touched; committing the simulated plan back is the caller's decision.

use crate::config::MetricsSettings;
use crate::engine;
use crate::metrics;
use crate::types::{
    ClientContext, EvalContext, Rule, RuleApplication, SimulationResult, WeeklyPlan,
};
use chrono::{DateTime, Utc};

/// Caller-selected scope for one simulation run.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulationScope<'a> {
    pub client: Option<&'a ClientContext>,
    pub program_id: Option<&'a str>,
    pub client_id: Option<&'a str>,
}

/// Apply the allow-listed rules to every session of a cloned plan and
/// diff the metrics.
pub fn simulate(
    plan: &WeeklyPlan,
    rules: &[Rule],
    rule_ids: &[String],
    scope: SimulationScope,
    settings: &MetricsSettings,
    now: DateTime<Utc>,
) -> SimulationResult {
    // Unknown ids are skipped; selection order is preserved
    let selected: Vec<&Rule> = rule_ids
        .iter()
        .filter_map(|id| rules.iter().find(|r| &r.id == id))
        .collect();

    let mut simulated = plan.clone();
    let mut counts: Vec<(String, String, u64)> = selected
        .iter()
        .map(|r| (r.id.clone(), r.name.clone(), 0u64))
        .collect();

    for (day, day_plan) in simulated.iter_mut() {
        // Conditions read the day's original tags and volume
        let original_day = plan.get(day);

        let mut ctx = EvalContext::new(now);
        ctx.day_plan = original_day;
        ctx.client = scope.client;
        ctx.program_id = scope.program_id;
        ctx.client_id = scope.client_id;

        for session in day_plan.sessions.iter_mut() {
            for (i, rule) in selected.iter().enumerate() {
                let outcome = engine::apply_rules(std::slice::from_ref(*rule), session, &ctx);
                if let Some(modified) = outcome.session {
                    *session = modified;
                    counts[i].2 += 1;
                }
            }
        }
    }

    let original_metrics = metrics::compute_metrics(plan, settings);
    let simulated_metrics = metrics::compute_metrics(&simulated, settings);
    let deltas = metrics::metrics_delta(&original_metrics, &simulated_metrics);

    let rules_applied = counts
        .into_iter()
        .filter(|(_, _, n)| *n > 0)
        .map(|(rule_id, rule_name, sessions_modified)| RuleApplication {
            rule_id,
            rule_name,
            sessions_modified,
        })
        .collect();

    SimulationResult {
        original_plan: plan.clone(),
        simulated_plan: simulated,
        original_metrics,
        simulated_metrics,
        deltas,
        rules_applied,
        simulated_at: now,
    }
}
