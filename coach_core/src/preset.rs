//! Preset store: versioned, shareable bundles of rule and automation
//! references.
//!
//! Structural updates bump the minor version and snapshot the pre-update
//! state into an append-only version log. Rollback snapshots first (so it
//! is itself undoable) and bumps the major version.

use crate::store::{AutomationRepository, PresetRepository, RuleRepository};
use crate::types::{Automation, Preset, PresetSnapshot, PresetStats, PresetVersion, Rule};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-supplied fields for a new preset.
#[derive(Clone, Debug)]
pub struct PresetDraft {
    pub name: String,
    pub description: String,
    pub rule_ids: Vec<String>,
    pub automation_ids: Vec<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub public: bool,
    pub created_by: String,
}

/// Listing filter over the preset collection.
#[derive(Clone, Copy, Debug)]
pub enum PresetFilter<'a> {
    All,
    Mine(&'a str),
    SharedWith(&'a str),
    Public,
}

/// Denormalized export payload: the preset plus full copies of every
/// referenced rule and automation, so an import can succeed on a store
/// that lacks those ids.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresetExport {
    pub preset: Preset,
    pub rules: Vec<Rule>,
    pub automations: Vec<Automation>,
}

/// Create and persist a new preset at version 1.0.0.
pub fn create_preset(repo: &dyn PresetRepository, draft: PresetDraft) -> Result<Preset> {
    let now = Utc::now();
    let preset = Preset {
        id: Uuid::new_v4().to_string(),
        name: draft.name,
        description: draft.description,
        version: "1.0.0".into(),
        rule_ids: draft.rule_ids,
        automation_ids: draft.automation_ids,
        tags: draft.tags,
        category: draft.category,
        public: draft.public,
        shared_with: Vec::new(),
        created_by: draft.created_by,
        created_at: now,
        updated_at: now,
        stats: PresetStats::default(),
    };

    let mut presets = repo.load_presets()?;
    presets.push(preset.clone());
    repo.store_presets(&presets)?;

    tracing::info!("Created preset '{}' ({})", preset.name, preset.id);
    Ok(preset)
}

/// Update a preset in place, bumping the minor version.
///
/// When the rule or automation references change, the pre-update state is
/// snapshotted into the version log before the overwrite. Returns `None`
/// when the id is unknown.
pub fn update_preset(
    repo: &dyn PresetRepository,
    id: &str,
    f: impl FnOnce(&mut Preset),
) -> Result<Option<Preset>> {
    let mut presets = repo.load_presets()?;
    let Some(preset) = presets.iter_mut().find(|p| p.id == id) else {
        return Ok(None);
    };

    let before_snapshot = PresetSnapshot::from(&*preset);
    let before_version = preset.version.clone();
    let before_refs = (preset.rule_ids.clone(), preset.automation_ids.clone());

    f(preset);

    if (preset.rule_ids.clone(), preset.automation_ids.clone()) != before_refs {
        append_version(repo, id, &before_version, "pre-update snapshot", before_snapshot)?;
    }

    preset.version = bump_minor(&preset.version);
    preset.updated_at = Utc::now();
    let updated = preset.clone();

    repo.store_presets(&presets)?;
    tracing::info!("Updated preset {} to v{}", id, updated.version);
    Ok(Some(updated))
}

/// Delete a preset and its version history; returns whether anything was
/// removed.
pub fn delete_preset(repo: &dyn PresetRepository, id: &str) -> Result<bool> {
    let mut presets = repo.load_presets()?;
    let before = presets.len();
    presets.retain(|p| p.id != id);
    if presets.len() == before {
        return Ok(false);
    }
    repo.store_presets(&presets)?;

    let mut versions = repo.load_preset_versions()?;
    versions.retain(|v| v.preset_id != id);
    repo.store_preset_versions(&versions)?;

    tracing::info!("Deleted preset {}", id);
    Ok(true)
}

/// Share a preset with users.
///
/// Membership is a union (re-sharing is a no-op), but the share counter
/// always advances by the number of ids supplied.
pub fn share_preset(
    repo: &dyn PresetRepository,
    id: &str,
    user_ids: &[String],
) -> Result<Option<Preset>> {
    let mut presets = repo.load_presets()?;
    let Some(preset) = presets.iter_mut().find(|p| p.id == id) else {
        return Ok(None);
    };

    for user_id in user_ids {
        if !preset.shared_with.contains(user_id) {
            preset.shared_with.push(user_id.clone());
        }
    }
    preset.stats.times_shared += user_ids.len() as u64;
    preset.updated_at = Utc::now();
    let updated = preset.clone();

    repo.store_presets(&presets)?;
    Ok(Some(updated))
}

/// Record one use of a preset. Returns `None` when the id is unknown.
pub fn use_preset(repo: &dyn PresetRepository, id: &str) -> Result<Option<Preset>> {
    let mut presets = repo.load_presets()?;
    let Some(preset) = presets.iter_mut().find(|p| p.id == id) else {
        return Ok(None);
    };

    preset.stats.times_used += 1;
    let updated = preset.clone();

    repo.store_presets(&presets)?;
    Ok(Some(updated))
}

/// Restore a preset to a logged version, bumping the major version.
///
/// The current state is snapshotted first, so the rollback itself can be
/// rolled back. Returns `None` when either id is unknown.
pub fn rollback_preset(
    repo: &dyn PresetRepository,
    preset_id: &str,
    version_id: &str,
) -> Result<Option<Preset>> {
    let versions = repo.load_preset_versions()?;
    let Some(target) = versions
        .iter()
        .find(|v| v.id == version_id && v.preset_id == preset_id)
        .cloned()
    else {
        return Ok(None);
    };

    let mut presets = repo.load_presets()?;
    let Some(preset) = presets.iter_mut().find(|p| p.id == preset_id) else {
        return Ok(None);
    };

    let current_snapshot = PresetSnapshot::from(&*preset);
    let current_version = preset.version.clone();
    append_version(
        repo,
        preset_id,
        &current_version,
        "pre-rollback snapshot",
        current_snapshot,
    )?;

    apply_snapshot(preset, &target.snapshot);
    preset.version = bump_major(&current_version);
    preset.updated_at = Utc::now();
    let updated = preset.clone();

    repo.store_presets(&presets)?;
    tracing::info!(
        "Rolled preset {} back to snapshot {} (now v{})",
        preset_id,
        version_id,
        updated.version
    );
    Ok(Some(updated))
}

/// Version log entries for a preset, oldest first.
pub fn list_versions(repo: &dyn PresetRepository, preset_id: &str) -> Result<Vec<PresetVersion>> {
    let versions = repo.load_preset_versions()?;
    Ok(versions
        .into_iter()
        .filter(|v| v.preset_id == preset_id)
        .collect())
}

/// List presets matching a filter.
pub fn list_presets(repo: &dyn PresetRepository, filter: PresetFilter) -> Result<Vec<Preset>> {
    let presets = repo.load_presets()?;
    Ok(presets
        .into_iter()
        .filter(|p| match filter {
            PresetFilter::All => true,
            PresetFilter::Mine(user) => p.created_by == user,
            PresetFilter::SharedWith(user) => p.shared_with.iter().any(|u| u == user),
            PresetFilter::Public => p.public,
        })
        .collect())
}

/// Export a preset as denormalized JSON. Returns `None` when the id is
/// unknown.
pub fn export_preset<S>(store: &S, id: &str) -> Result<Option<String>>
where
    S: PresetRepository + RuleRepository + AutomationRepository + ?Sized,
{
    let presets = store.load_presets()?;
    let Some(preset) = presets.into_iter().find(|p| p.id == id) else {
        return Ok(None);
    };

    let rules: Vec<Rule> = store
        .load_rules()?
        .into_iter()
        .filter(|r| preset.rule_ids.contains(&r.id))
        .collect();
    let automations: Vec<Automation> = store
        .load_automations()?
        .into_iter()
        .filter(|a| preset.automation_ids.contains(&a.id))
        .collect();

    let export = PresetExport {
        preset,
        rules,
        automations,
    };
    Ok(Some(serde_json::to_string_pretty(&export)?))
}

/// Import an exported preset as a private copy owned by `imported_by`.
///
/// Referenced rules and automations missing from the local store are
/// inserted; existing ids are left untouched.
pub fn import_preset<S>(store: &S, json: &str, imported_by: &str) -> Result<Preset>
where
    S: PresetRepository + RuleRepository + AutomationRepository + ?Sized,
{
    let export: PresetExport = serde_json::from_str(json)
        .map_err(|e| Error::Preset(format!("invalid export payload: {}", e)))?;

    let mut rules = store.load_rules()?;
    for rule in export.rules {
        if !rules.iter().any(|r| r.id == rule.id) {
            rules.push(rule);
        }
    }
    store.store_rules(&rules)?;

    let mut automations = store.load_automations()?;
    for automation in export.automations {
        if !automations.iter().any(|a| a.id == automation.id) {
            automations.push(automation);
        }
    }
    store.store_automations(&automations)?;

    let now = Utc::now();
    let source = export.preset;
    let preset = Preset {
        id: Uuid::new_v4().to_string(),
        name: source.name,
        description: source.description,
        version: source.version,
        rule_ids: source.rule_ids,
        automation_ids: source.automation_ids,
        tags: source.tags,
        category: source.category,
        // Imports are always private copies
        public: false,
        shared_with: Vec::new(),
        created_by: imported_by.to_string(),
        created_at: now,
        updated_at: now,
        stats: PresetStats::default(),
    };

    let mut presets = store.load_presets()?;
    presets.push(preset.clone());
    store.store_presets(&presets)?;

    tracing::info!("Imported preset '{}' as {}", preset.name, preset.id);
    Ok(preset)
}

fn append_version(
    repo: &dyn PresetRepository,
    preset_id: &str,
    version: &str,
    changes: &str,
    snapshot: PresetSnapshot,
) -> Result<()> {
    let mut versions = repo.load_preset_versions()?;
    versions.push(PresetVersion {
        id: Uuid::new_v4().to_string(),
        preset_id: preset_id.to_string(),
        version: version.to_string(),
        changes: changes.to_string(),
        created_at: Utc::now(),
        snapshot,
    });
    repo.store_preset_versions(&versions)
}

fn apply_snapshot(preset: &mut Preset, snapshot: &PresetSnapshot) {
    preset.name = snapshot.name.clone();
    preset.description = snapshot.description.clone();
    preset.rule_ids = snapshot.rule_ids.clone();
    preset.automation_ids = snapshot.automation_ids.clone();
    preset.tags = snapshot.tags.clone();
    preset.category = snapshot.category.clone();
    preset.public = snapshot.public;
    preset.shared_with = snapshot.shared_with.clone();
    preset.stats = snapshot.stats.clone();
}

/// "1.2.3" -> "1.3.0"; malformed strings restart at "1.1.0".
fn bump_minor(version: &str) -> String {
    let (major, minor, _) = parse_version(version);
    format!("{}.{}.0", major, minor + 1)
}

/// "1.2.3" -> "2.0.0"; malformed strings restart at "2.0.0".
fn bump_major(version: &str) -> String {
    let (major, _, _) = parse_version(version);
    format!("{}.0.0", major + 1)
}

fn parse_version(version: &str) -> (u64, u64, u64) {
    let mut parts = version.splitn(3, '.');
    let mut next = || {
        parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .unwrap_or(0)
    };
    let major = next();
    let minor = next();
    let patch = next();
    if major == 0 && minor == 0 && patch == 0 {
        (1, 0, 0)
    } else {
        (major, minor, patch)
    }
}
