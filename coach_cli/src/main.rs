use clap::{Parser, Subcommand};
use coach_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "coach")]
#[command(about = "Rule-based training program modification engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and manage chained rules
    Rules {
        #[command(subcommand)]
        action: RuleCommands,
    },

    /// Inspect and run recurring automations
    Automations {
        #[command(subcommand)]
        action: AutomationCommands,
    },

    /// Manage automation presets
    Presets {
        #[command(subcommand)]
        action: PresetCommands,
    },

    /// Simulate a rule set against a weekly plan
    Simulate {
        /// Path to a weekly plan JSON file
        #[arg(long)]
        plan: PathBuf,

        /// Rule ids to apply, in order
        #[arg(long, required = true, num_args = 1..)]
        rules: Vec<String>,

        /// Path to a client context JSON file
        #[arg(long)]
        client: Option<PathBuf>,

        /// Program scope for rule matching
        #[arg(long)]
        program_id: Option<String>,

        /// Client scope for rule matching
        #[arg(long)]
        client_id: Option<String>,

        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Roll the run journal into the CSV archive
    Rollup {
        /// Remove processed journal files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(Subcommand)]
enum RuleCommands {
    /// List all rules
    List,
    /// Toggle a rule's active flag
    Toggle { id: String },
    /// Delete a rule
    Delete { id: String },
}

#[derive(Subcommand)]
enum AutomationCommands {
    /// List all automations
    List,
    /// Run every automation that is due
    RunDue,
    /// Run one automation now, regardless of its schedule
    Run { id: String },
    /// Toggle an automation's active flag
    Toggle { id: String },
    /// Delete an automation
    Delete { id: String },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// List presets
    List {
        /// Filter: all, mine, shared, public
        #[arg(long, default_value = "all")]
        filter: String,

        /// User id for the mine/shared filters
        #[arg(long)]
        user: Option<String>,
    },
    /// Show a preset's version history
    Versions { id: String },
    /// Export a preset (denormalized JSON) to stdout or a file
    Export {
        id: String,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import an exported preset as a private copy
    Import {
        file: PathBuf,

        /// Owner of the imported copy
        #[arg(long, default_value = "local")]
        user: String,
    },
}

fn main() -> Result<()> {
    coach_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let store = FileStore::new(&data_dir);

    match cli.command {
        Commands::Rules { action } => cmd_rules(&store, action),
        Commands::Automations { action } => cmd_automations(&store, &data_dir, action),
        Commands::Presets { action } => cmd_presets(&store, action),
        Commands::Simulate {
            plan,
            rules,
            client,
            program_id,
            client_id,
            json,
        } => cmd_simulate(
            &store, &config, &plan, &rules, client, program_id, client_id, json,
        ),
        Commands::Rollup { cleanup } => cmd_rollup(&data_dir, cleanup),
    }
}

fn cmd_rules(store: &FileStore, action: RuleCommands) -> Result<()> {
    match action {
        RuleCommands::List => {
            let rules = store.load_rules()?;
            if rules.is_empty() {
                println!("No rules defined.");
                return Ok(());
            }
            for rule in &rules {
                println!(
                    "{}  [{}] p{} {} ({} conditions, {} actions)",
                    rule.id,
                    if rule.active { "on " } else { "off" },
                    rule.priority,
                    rule.name,
                    rule.conditions.len(),
                    rule.actions.len()
                );
            }
        }
        RuleCommands::Toggle { id } => match engine::toggle_rule(store, &id)? {
            Some(rule) => println!(
                "Rule '{}' is now {}",
                rule.name,
                if rule.active { "active" } else { "inactive" }
            ),
            None => println!("No rule with id {}", id),
        },
        RuleCommands::Delete { id } => {
            if engine::delete_rule(store, &id)? {
                println!("Deleted rule {}", id);
            } else {
                println!("No rule with id {}", id);
            }
        }
    }
    Ok(())
}

fn cmd_automations(store: &FileStore, data_dir: &PathBuf, action: AutomationCommands) -> Result<()> {
    match action {
        AutomationCommands::List => {
            let automations = store.load_automations()?;
            if automations.is_empty() {
                println!("No automations defined.");
                return Ok(());
            }
            for a in &automations {
                println!(
                    "{}  [{}] {} - {} (next: {}, runs: {}, errors: {})",
                    a.id,
                    if a.active { "on " } else { "off" },
                    a.name,
                    schedule::describe(&a.recurrence),
                    a.next_run
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unscheduled".into()),
                    a.total_runs,
                    a.error_count
                );
            }
        }
        AutomationCommands::RunDue => {
            let mut handler = LoggingHandler;
            let mut sink = runlog::JsonlRunLog::in_dir(data_dir);
            let records = run_due(store, &mut handler, &mut sink, chrono::Utc::now())?;
            if records.is_empty() {
                println!("Nothing due.");
            } else {
                for record in &records {
                    println!(
                        "{}  {} - {}",
                        record.automation_id,
                        record.automation_name,
                        if record.success {
                            "ok".to_string()
                        } else {
                            format!("failed: {}", record.error.as_deref().unwrap_or("unknown"))
                        }
                    );
                }
                println!("Ran {} automation(s)", records.len());
            }
        }
        AutomationCommands::Run { id } => {
            let mut automations = store.load_automations()?;
            let Some(automation) = automations.iter_mut().find(|a| a.id == id) else {
                println!("No automation with id {}", id);
                return Ok(());
            };

            let now = chrono::Utc::now();
            let report = executor::execute(automation, &mut LoggingHandler, now);
            let record = runlog::ExecutionRecord {
                automation_id: automation.id.clone(),
                automation_name: automation.name.clone(),
                ran_at: now,
                success: report.success,
                error: report.error.clone(),
                action_count: automation.actions.len(),
            };
            let mut sink = runlog::JsonlRunLog::in_dir(data_dir);
            runlog::RunSink::append(&mut sink, &record)?;
            store.store_automations(&automations)?;

            match report.error {
                None => println!("Ran automation {}", id),
                Some(e) => println!("Automation {} failed: {}", id, e),
            }
        }
        AutomationCommands::Toggle { id } => match executor::toggle_automation(store, &id)? {
            Some(a) => println!(
                "Automation '{}' is now {}",
                a.name,
                if a.active { "active" } else { "inactive" }
            ),
            None => println!("No automation with id {}", id),
        },
        AutomationCommands::Delete { id } => {
            if executor::delete_automation(store, &id)? {
                println!("Deleted automation {}", id);
            } else {
                println!("No automation with id {}", id);
            }
        }
    }
    Ok(())
}

fn cmd_presets(store: &FileStore, action: PresetCommands) -> Result<()> {
    match action {
        PresetCommands::List { filter, user } => {
            let filter = match (filter.as_str(), user.as_deref()) {
                ("all", _) => PresetFilter::All,
                ("public", _) => PresetFilter::Public,
                ("mine", Some(u)) => PresetFilter::Mine(u),
                ("shared", Some(u)) => PresetFilter::SharedWith(u),
                ("mine", None) | ("shared", None) => {
                    eprintln!("--user is required for the mine/shared filters");
                    return Err(Error::Other("missing --user".into()));
                }
                (other, _) => {
                    eprintln!("Unknown filter: {}", other);
                    return Err(Error::Other(format!("unknown filter: {}", other)));
                }
            };
            let presets = preset::list_presets(store, filter)?;
            if presets.is_empty() {
                println!("No presets.");
                return Ok(());
            }
            for p in &presets {
                println!(
                    "{}  v{} {} ({} rules, {} automations, used {}x)",
                    p.id,
                    p.version,
                    p.name,
                    p.rule_ids.len(),
                    p.automation_ids.len(),
                    p.stats.times_used
                );
            }
        }
        PresetCommands::Versions { id } => {
            let versions = preset::list_versions(store, &id)?;
            if versions.is_empty() {
                println!("No version history for {}", id);
                return Ok(());
            }
            for v in &versions {
                println!("{}  v{} - {} ({})", v.id, v.version, v.changes, v.created_at);
            }
        }
        PresetCommands::Export { id, output } => match preset::export_preset(store, &id)? {
            Some(json) => {
                if let Some(path) = output {
                    std::fs::write(&path, &json)?;
                    println!("Exported preset {} to {}", id, path.display());
                } else {
                    println!("{}", json);
                }
            }
            None => println!("No preset with id {}", id),
        },
        PresetCommands::Import { file, user } => {
            let json = std::fs::read_to_string(&file)?;
            let imported = preset::import_preset(store, &json, &user)?;
            println!("Imported preset '{}' as {}", imported.name, imported.id);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    store: &FileStore,
    config: &Config,
    plan_path: &PathBuf,
    rule_ids: &[String],
    client_path: Option<PathBuf>,
    program_id: Option<String>,
    client_id: Option<String>,
    json: bool,
) -> Result<()> {
    let plan: WeeklyPlan = serde_json::from_str(&std::fs::read_to_string(plan_path)?)?;
    let client: Option<ClientContext> = match client_path {
        Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => None,
    };

    let rules = store.load_rules()?;
    let scope = SimulationScope {
        client: client.as_ref(),
        program_id: program_id.as_deref(),
        client_id: client_id.as_deref(),
    };

    let result = simulate(
        &plan,
        &rules,
        rule_ids,
        scope,
        &config.metrics,
        chrono::Utc::now(),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Simulation at {}", result.simulated_at.to_rfc3339());
    println!();
    if result.rules_applied.is_empty() {
        println!("No rules fired.");
    } else {
        for applied in &result.rules_applied {
            println!(
                "  {} - {} session(s) modified",
                applied.rule_name, applied.sessions_modified
            );
        }
    }
    println!();
    println!(
        "  duration: {} -> {} min ({:+})",
        result.original_metrics.total_duration,
        result.simulated_metrics.total_duration,
        result.deltas.total_duration
    );
    println!(
        "  calories: {} -> {} ({:+})",
        result.original_metrics.total_calories,
        result.simulated_metrics.total_calories,
        result.deltas.total_calories
    );
    println!(
        "  volume:   {} -> {} ({:+})",
        result.original_metrics.total_volume,
        result.simulated_metrics.total_volume,
        result.deltas.total_volume
    );

    Ok(())
}

fn cmd_rollup(data_dir: &PathBuf, cleanup: bool) -> Result<()> {
    let journal_path = data_dir.join(runlog::RUN_LOG_FILE);
    let csv_path = data_dir.join(runlog::RUN_ARCHIVE_FILE);

    if !journal_path.exists() {
        println!("No run journal found - nothing to roll up.");
        return Ok(());
    }

    let count = runlog::rollup_and_archive(&journal_path, &csv_path)?;
    println!("Rolled up {} run record(s) to CSV", count);
    println!("  CSV: {}", csv_path.display());

    if cleanup {
        let cleaned = runlog::cleanup_processed(data_dir)?;
        if cleaned > 0 {
            println!("Cleaned up {} processed journal file(s)", cleaned);
        }
    }

    Ok(())
}
