//! Rule engine: lifecycle and application of chained rules.
//!
//! Application contract:
//! - only active rules participate
//! - scoped rules (program/client) require a matching caller scope
//! - rules fire in priority order (descending, ties keep insertion order)
//! - each rule sees the session as modified by earlier rules
//! - the returned session is only populated when at least one rule fired

use crate::store::RuleRepository;
use crate::types::{Action, Condition, EvalContext, Rule, Session};
use crate::{action, condition, Result};
use chrono::Utc;
use uuid::Uuid;

/// A rule that fired during one engine invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedRule {
    pub id: String,
    pub name: String,
}

/// Outcome of applying a rule set to one session.
#[derive(Clone, Debug, Default)]
pub struct RuleOutcome {
    pub modified: bool,
    /// Present only when at least one rule fired
    pub session: Option<Session>,
    pub rules_applied: Vec<AppliedRule>,
}

/// Apply a rule set to a session.
///
/// The engine itself never fails: malformed conditions evaluate to false
/// and malformed actions are no-ops, so one bad rule cannot take down a
/// batch run.
pub fn apply_rules(rules: &[Rule], session: &Session, ctx: &EvalContext) -> RuleOutcome {
    let mut candidates: Vec<&Rule> = rules
        .iter()
        .filter(|r| r.active)
        .filter(|r| in_scope(r, ctx))
        .collect();

    // Stable sort keeps insertion order among equal priorities
    candidates.sort_by_key(|r| std::cmp::Reverse(r.priority));

    let mut current = session.clone();
    let mut applied = Vec::new();

    for rule in candidates {
        if condition::evaluate_chain(&rule.conditions, &current, ctx) {
            current = action::apply_all(&rule.actions, &current);
            applied.push(AppliedRule {
                id: rule.id.clone(),
                name: rule.name.clone(),
            });
            tracing::debug!("Rule '{}' fired on session {}", rule.name, session.id);
        }
    }

    let modified = !applied.is_empty();
    RuleOutcome {
        modified,
        session: modified.then_some(current),
        rules_applied: applied,
    }
}

fn in_scope(rule: &Rule, ctx: &EvalContext) -> bool {
    if let Some(program_id) = rule.program_id.as_deref().filter(|s| !s.is_empty()) {
        if ctx.program_id != Some(program_id) {
            return false;
        }
    }
    if let Some(client_id) = rule.client_id.as_deref().filter(|s| !s.is_empty()) {
        if ctx.client_id != Some(client_id) {
            return false;
        }
    }
    true
}

// ============================================================================
// Rule lifecycle
// ============================================================================

/// Caller-supplied fields for a new rule.
#[derive(Clone, Debug)]
pub struct RuleDraft {
    pub name: String,
    pub description: String,
    pub active: bool,
    pub priority: u8,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub program_id: Option<String>,
    pub client_id: Option<String>,
}

/// Create and persist a new rule.
pub fn create_rule(repo: &dyn RuleRepository, draft: RuleDraft) -> Result<Rule> {
    let now = Utc::now();
    let rule = Rule {
        id: Uuid::new_v4().to_string(),
        name: draft.name,
        description: draft.description,
        active: draft.active,
        priority: draft.priority.clamp(1, 10),
        conditions: draft.conditions,
        actions: draft.actions,
        program_id: draft.program_id,
        client_id: draft.client_id,
        created_at: now,
        updated_at: now,
    };

    let mut rules = repo.load_rules()?;
    rules.push(rule.clone());
    repo.store_rules(&rules)?;

    tracing::info!("Created rule '{}' ({})", rule.name, rule.id);
    Ok(rule)
}

/// Update a rule in place; bumps its update timestamp.
///
/// Returns `None` when the id is unknown.
pub fn update_rule(
    repo: &dyn RuleRepository,
    id: &str,
    f: impl FnOnce(&mut Rule),
) -> Result<Option<Rule>> {
    let mut rules = repo.load_rules()?;
    let Some(rule) = rules.iter_mut().find(|r| r.id == id) else {
        return Ok(None);
    };

    f(rule);
    rule.priority = rule.priority.clamp(1, 10);
    rule.updated_at = Utc::now();
    let updated = rule.clone();

    repo.store_rules(&rules)?;
    Ok(Some(updated))
}

/// Flip a rule's active flag. Returns `None` when the id is unknown.
pub fn toggle_rule(repo: &dyn RuleRepository, id: &str) -> Result<Option<Rule>> {
    update_rule(repo, id, |r| r.active = !r.active)
}

/// Delete a rule; returns whether anything was removed.
pub fn delete_rule(repo: &dyn RuleRepository, id: &str) -> Result<bool> {
    let mut rules = repo.load_rules()?;
    let before = rules.len();
    rules.retain(|r| r.id != id);
    if rules.len() == before {
        return Ok(false);
    }
    repo.store_rules(&rules)?;
    tracing::info!("Deleted rule {}", id);
    Ok(true)
}
