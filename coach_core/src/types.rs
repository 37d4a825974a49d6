//! Core domain types for the program rule engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Sessions, day plans and weekly plans
//! - Client context (injuries, biometrics, equipment, habits)
//! - Chained rules (conditions, actions, limits)
//! - Recurring automations and their schedule configuration
//! - Presets and preset version snapshots
//! - Program metrics and simulation results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Plan Types
// ============================================================================

/// One training unit within a day.
///
/// `duration` and `intensity` are free-text display strings with embedded
/// numerics (e.g. `"40 min"`, `"RPE 7.5"`). Sessions are only ever mutated
/// by the action applier, which returns a fresh copy.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    #[serde(default)]
    pub id: String,
    /// Pattern/category label (e.g. "fuerza", "push")
    #[serde(default)]
    pub block: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub modality: String,
    #[serde(default)]
    pub intensity: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A day's container of sessions.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    /// Free text, parsed for a leading integer (series/exercise count)
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// A weekly plan maps day names to day plans.
///
/// BTreeMap keeps iteration deterministic, which the simulator relies on.
pub type WeeklyPlan = BTreeMap<String, DayPlan>;

// ============================================================================
// Client Context Types
// ============================================================================

/// A named injury with movement restrictions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Injury {
    pub name: String,
    #[serde(default)]
    pub restrictions: Vec<String>,
}

/// Biometric snapshot used by weight/BMI conditions.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Biometrics {
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
}

/// Equipment availability entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EquipmentItem {
    pub material: String,
    pub available: bool,
}

/// A habit compliance record (0-100).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HabitRecord {
    pub name: String,
    pub compliance: f64,
}

/// Read-only client snapshot supplied by the caller per evaluation.
///
/// The engine never mutates or fetches this itself.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientContext {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub injuries: Vec<Injury>,
    #[serde(default)]
    pub biometrics: Biometrics,
    #[serde(default)]
    pub equipment: Vec<EquipmentItem>,
    #[serde(default)]
    pub habits: Vec<HabitRecord>,
    /// Average goal progress (0-100), when the caller tracks goals
    #[serde(default)]
    pub progress: Option<f64>,
}

/// Runtime context for a single rule-engine invocation.
///
/// `now` is passed explicitly so day-of-week/hour-of-day conditions stay
/// deterministic under test.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext<'a> {
    pub now: DateTime<Utc>,
    pub day_plan: Option<&'a DayPlan>,
    pub client: Option<&'a ClientContext>,
    pub program_id: Option<&'a str>,
    pub client_id: Option<&'a str>,
}

impl<'a> EvalContext<'a> {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            day_plan: None,
            client: None,
            program_id: None,
            client_id: None,
        }
    }
}

// ============================================================================
// Condition Types
// ============================================================================

/// Which context field a condition reads.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Injury,
    Pattern,
    Modality,
    Intensity,
    Duration,
    Equipment,
    Tag,
    ClientWeight,
    Bmi,
    Adherence,
    Progress,
    DayOfWeek,
    HourOfDay,
}

/// Comparison operator applied to the resolved context value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Contains,
    Equals,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Between,
    HasTag,
    NotHasTag,
}

/// How a condition combines with the *next* condition in the chain.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

/// A condition or action payload: free text or a number.
///
/// Rule builders produce either shape depending on the selected field, so
/// both are accepted on the wire (untagged).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view: numbers pass through, text yields its first embedded
    /// integer, unparsable text yields 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(s) => crate::parse::first_integer(s).unwrap_or(0) as f64,
        }
    }

    /// Text view used by string comparisons.
    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// A single typed predicate within a rule's condition chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    #[serde(default)]
    pub id: String,
    pub field: ConditionField,
    pub op: ComparisonOp,
    pub value: Value,
    /// Upper bound for the `between` operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<f64>,
    /// Joins this condition with the following one (defaults to AND)
    #[serde(default)]
    pub join: LogicalOp,
}

// ============================================================================
// Action Types
// ============================================================================

/// Which session field an action modifies.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModificationTarget {
    Duration,
    Intensity,
    Modality,
    Notes,
}

/// The arithmetic/replacement operation an action performs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModificationOp {
    Set,
    Increase,
    Decrease,
    Multiply,
    Clamp,
}

/// Optional numeric bounds applied after an action's arithmetic.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionLimits {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// A typed mutation applied to one session field, optionally clamped.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub target: ModificationTarget,
    pub op: ModificationOp,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ActionLimits>,
}

// ============================================================================
// Rule Types
// ============================================================================

/// A named, prioritized, optionally-scoped pairing of a condition chain
/// and an action list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub active: bool,
    /// 1-10, higher fires first
    pub priority: u8,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    /// Restricts the rule to one program when set
    #[serde(default)]
    pub program_id: Option<String>,
    /// Restricts the rule to one client when set
    #[serde(default)]
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Recurrence and Automation Types
// ============================================================================

/// Recurrence frequency selector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

/// Day of the week for weekly recurrences.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn to_chrono(self) -> chrono::Weekday {
        match self {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }
}

/// Declarative schedule from which the next run timestamp is derived.
///
/// Exactly one of `weekday`/`day_of_month`/`interval_days` is meaningful,
/// selected by `frequency`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceConfig {
    pub frequency: Frequency,
    #[serde(default)]
    pub weekday: Option<Weekday>,
    /// 1-31; clamps to the last day of shorter months
    #[serde(default)]
    pub day_of_month: Option<u32>,
    /// Every N days, for custom frequency
    #[serde(default)]
    pub interval_days: Option<i64>,
    /// "HH:mm", defaults to 08:00
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

/// What a scheduled automation action does when it fires.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutomationVerb {
    RecalculateGoals,
    RefreshFinisher,
    UpdateIntensity,
    AdjustVolume,
    ApplyRules,
    SendReminder,
    GenerateReport,
    Custom,
}

/// One side-effecting action within an automation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AutomationAction {
    pub verb: AutomationVerb,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// A scheduled unit whose "condition" is purely time-based.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Automation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub active: bool,
    pub recurrence: RecurrenceConfig,
    pub actions: Vec<AutomationAction>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default)]
    pub error_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
}

// ============================================================================
// Preset Types
// ============================================================================

/// Usage counters kept on a preset.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PresetStats {
    #[serde(default)]
    pub times_used: u64,
    #[serde(default)]
    pub times_shared: u64,
    #[serde(default)]
    pub rating: Option<f32>,
}

/// A versioned, shareable named bundle referencing rules and automations
/// by id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Semver string, e.g. "1.2.0"
    pub version: String,
    #[serde(default)]
    pub rule_ids: Vec<String>,
    #[serde(default)]
    pub automation_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub shared_with: Vec<String>,
    #[serde(default)]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: PresetStats,
}

/// Field values captured when a preset's structure changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PresetSnapshot {
    pub name: String,
    pub description: String,
    pub rule_ids: Vec<String>,
    pub automation_ids: Vec<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub public: bool,
    pub shared_with: Vec<String>,
    pub stats: PresetStats,
}

impl From<&Preset> for PresetSnapshot {
    fn from(p: &Preset) -> Self {
        PresetSnapshot {
            name: p.name.clone(),
            description: p.description.clone(),
            rule_ids: p.rule_ids.clone(),
            automation_ids: p.automation_ids.clone(),
            tags: p.tags.clone(),
            category: p.category.clone(),
            public: p.public,
            shared_with: p.shared_with.clone(),
            stats: p.stats.clone(),
        }
    }
}

/// Append-only version log entry for a preset.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PresetVersion {
    pub id: String,
    pub preset_id: String,
    /// Version string the snapshot was taken at
    pub version: String,
    pub changes: String,
    pub created_at: DateTime<Utc>,
    pub snapshot: PresetSnapshot,
}

// ============================================================================
// Metrics and Simulation Types
// ============================================================================

/// Percentage of sessions per intensity band (sums to ~100 when the plan
/// has sessions).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IntensityBalance {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

/// Aggregated metrics over a weekly plan.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgramMetrics {
    pub total_volume: f64,
    pub total_calories: f64,
    /// Minutes
    pub total_duration: f64,
    pub intensity_balance: IntensityBalance,
    pub modality_distribution: BTreeMap<String, u64>,
    pub sessions_per_day: BTreeMap<String, u64>,
}

/// Field-wise numeric delta between two metric snapshots (simulated minus
/// original).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsDelta {
    pub total_volume: f64,
    pub total_calories: f64,
    pub total_duration: f64,
    pub intensity_balance: IntensityBalance,
}

/// Per-rule modification count from a simulation run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RuleApplication {
    pub rule_id: String,
    pub rule_name: String,
    pub sessions_modified: u64,
}

/// Dry-run output: both plans, metrics before/after, deltas and per-rule
/// counts. Pure snapshot; committing it back is the caller's decision.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub original_plan: WeeklyPlan,
    pub simulated_plan: WeeklyPlan,
    pub original_metrics: ProgramMetrics,
    pub simulated_metrics: ProgramMetrics,
    pub deltas: MetricsDelta,
    pub rules_applied: Vec<RuleApplication>,
    pub simulated_at: DateTime<Utc>,
}
