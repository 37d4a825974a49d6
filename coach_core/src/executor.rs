//! Automation executor: due checks, action dispatch, run bookkeeping.
//!
//! Execution is fail-soft at the automation level: a failing action marks
//! that run as failed and still consumes the scheduled slot, but never
//! aborts sibling automations in the same batch.

use crate::runlog::{ExecutionRecord, RunSink};
use crate::schedule;
use crate::store::AutomationRepository;
use crate::types::{Automation, AutomationAction, RecurrenceConfig};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of a single automation run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub success: bool,
    pub error: Option<String>,
}

/// Dispatch target for automation actions.
///
/// The engine owns scheduling and bookkeeping; what an action actually
/// does lives behind this seam.
pub trait ActionHandler {
    fn handle(&mut self, action: &AutomationAction) -> Result<()>;
}

/// Default handler: records each dispatched action in the log.
///
/// Real side effects (plan recalculation, reminders, reports) are wired in
/// by the embedding application.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

impl ActionHandler for LoggingHandler {
    fn handle(&mut self, action: &AutomationAction) -> Result<()> {
        tracing::info!(
            "Dispatching {:?} (program={:?}, client={:?})",
            action.verb,
            action.program_id,
            action.client_id
        );
        Ok(())
    }
}

/// Whether an automation should run at `now`.
///
/// Inactive automations, automations without a computed next run, and
/// automations past their end date are never due.
pub fn is_due(automation: &Automation, now: DateTime<Utc>) -> bool {
    if !automation.active {
        return false;
    }
    if let Some(end) = automation.recurrence.end_at {
        if now > end {
            return false;
        }
    }
    match automation.next_run {
        Some(next) => now >= next,
        None => false,
    }
}

/// Run one automation's actions and update its bookkeeping.
///
/// Success advances `last_run`/`total_runs` and recomputes `next_run`.
/// Failure increments `error_count` and still advances `next_run` from
/// `now`, so a broken automation cannot retry in a tight loop.
pub fn execute(
    automation: &mut Automation,
    handler: &mut dyn ActionHandler,
    now: DateTime<Utc>,
) -> RunReport {
    let result = automation
        .actions
        .iter()
        .try_for_each(|action| handler.handle(action));

    automation.next_run = Some(schedule::next_run(&automation.recurrence, now));

    match result {
        Ok(()) => {
            automation.last_run = Some(now);
            automation.total_runs += 1;
            tracing::info!(
                "Automation '{}' ran ({} total)",
                automation.name,
                automation.total_runs
            );
            RunReport {
                success: true,
                error: None,
            }
        }
        Err(e) => {
            automation.error_count += 1;
            tracing::warn!("Automation '{}' failed: {}", automation.name, e);
            RunReport {
                success: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Run every due automation once and journal each outcome.
///
/// The next-run claim is persisted before actions execute, so a second
/// scheduler polling concurrently will not see the same slot as due.
pub fn run_due(
    repo: &dyn AutomationRepository,
    handler: &mut dyn ActionHandler,
    sink: &mut dyn RunSink,
    now: DateTime<Utc>,
) -> Result<Vec<ExecutionRecord>> {
    let mut automations = repo.load_automations()?;
    let due_ids: Vec<String> = automations
        .iter()
        .filter(|a| is_due(a, now))
        .map(|a| a.id.clone())
        .collect();

    if due_ids.is_empty() {
        return Ok(Vec::new());
    }

    // Claim the slots up front
    for automation in automations.iter_mut().filter(|a| due_ids.contains(&a.id)) {
        automation.next_run = Some(schedule::next_run(&automation.recurrence, now));
    }
    repo.store_automations(&automations)?;

    let mut records = Vec::new();
    for automation in automations.iter_mut().filter(|a| due_ids.contains(&a.id)) {
        let report = execute(automation, handler, now);
        let record = ExecutionRecord {
            automation_id: automation.id.clone(),
            automation_name: automation.name.clone(),
            ran_at: now,
            success: report.success,
            error: report.error,
            action_count: automation.actions.len(),
        };
        if let Err(e) = sink.append(&record) {
            tracing::warn!("Failed to journal run of {}: {}", automation.id, e);
        }
        records.push(record);
    }

    repo.store_automations(&automations)?;
    Ok(records)
}

// ============================================================================
// Automation lifecycle
// ============================================================================

/// Caller-supplied fields for a new automation.
#[derive(Clone, Debug)]
pub struct AutomationDraft {
    pub name: String,
    pub description: String,
    pub active: bool,
    pub recurrence: RecurrenceConfig,
    pub actions: Vec<AutomationAction>,
    pub created_by: String,
}

/// Create and persist a new automation; its first run time is computed
/// immediately.
pub fn create_automation(
    repo: &dyn AutomationRepository,
    draft: AutomationDraft,
) -> Result<Automation> {
    if draft.actions.is_empty() {
        return Err(Error::Execution(
            "automation requires at least one action".into(),
        ));
    }

    let now = Utc::now();
    let automation = Automation {
        id: Uuid::new_v4().to_string(),
        name: draft.name,
        description: draft.description,
        active: draft.active,
        next_run: Some(schedule::next_run(&draft.recurrence, now)),
        recurrence: draft.recurrence,
        actions: draft.actions,
        last_run: None,
        total_runs: 0,
        error_count: 0,
        created_at: now,
        updated_at: now,
        created_by: draft.created_by,
    };

    let mut automations = repo.load_automations()?;
    automations.push(automation.clone());
    repo.store_automations(&automations)?;

    tracing::info!("Created automation '{}' ({})", automation.name, automation.id);
    Ok(automation)
}

/// Update an automation in place; a recurrence change recomputes the next
/// run time. Returns `None` when the id is unknown.
pub fn update_automation(
    repo: &dyn AutomationRepository,
    id: &str,
    f: impl FnOnce(&mut Automation),
) -> Result<Option<Automation>> {
    let mut automations = repo.load_automations()?;
    let Some(automation) = automations.iter_mut().find(|a| a.id == id) else {
        return Ok(None);
    };

    let old_recurrence = automation.recurrence.clone();
    f(automation);
    if automation.recurrence != old_recurrence {
        automation.next_run = Some(schedule::next_run(&automation.recurrence, Utc::now()));
    }
    automation.updated_at = Utc::now();
    let updated = automation.clone();

    repo.store_automations(&automations)?;
    Ok(Some(updated))
}

/// Flip an automation's active flag. Returns `None` when the id is unknown.
pub fn toggle_automation(repo: &dyn AutomationRepository, id: &str) -> Result<Option<Automation>> {
    update_automation(repo, id, |a| a.active = !a.active)
}

/// Delete an automation; returns whether anything was removed.
pub fn delete_automation(repo: &dyn AutomationRepository, id: &str) -> Result<bool> {
    let mut automations = repo.load_automations()?;
    let before = automations.len();
    automations.retain(|a| a.id != id);
    if automations.len() == before {
        return Ok(false);
    }
    repo.store_automations(&automations)?;
    tracing::info!("Deleted automation {}", id);
    Ok(true)
}
