use crate::ReportKind;
use graphwire::config::{default_config_path, load_config, write_config};
use graphwire::output::{is_quiet, print_json, OutputMode};
use graphwire::report::{fingerprint, GraphSummary, ShardingPlanReport, UnusedBindingsReport};
use graphwire::resolver::GraphStatus;
use graphwire::ui::{self, Icons};
use graphwire::{DeclarationSet, Diagnostic, GraphOutcome, ResolutionOutput, Resolver, ResolverConfig};
use std::path::Path;
use std::time::Instant;
use tabled::Tabled;

fn resolve_input(output_mode: OutputMode, config: Option<&Path>, input: &Path) -> anyhow::Result<ResolutionOutput> {
    let config = match load_config(config)? {
        Some(config) => config,
        None => {
            tracing::debug!("No config file found, using defaults");
            ResolverConfig::default()
        }
    };
    let declarations = DeclarationSet::from_path(input)?;
    let resolver = Resolver::new(declarations, config)?;

    if output_mode.is_json() || is_quiet() {
        return Ok(resolver.resolve());
    }

    let start = Instant::now();
    let (progress, tx) = ui::ProgressManager::new();
    let output = resolver.resolve_with_events(Some(&tx));
    drop(tx);

    let bindings = output
        .graphs
        .iter()
        .filter_map(GraphOutcome::resolved)
        .map(|g| g.graph.len())
        .sum();
    progress.finish_with_summary(start.elapsed(), output.graphs.len(), bindings, output.fatal_count());
    Ok(output)
}

fn print_diagnostics<'a>(diagnostics: impl Iterator<Item = &'a Diagnostic>) {
    for diagnostic in diagnostics {
        ui::diagnostic(diagnostic);
    }
}

fn print_outcome(outcome: &GraphOutcome) {
    ui::section(&format!(" {} ({}) ", outcome.name(), outcome.status()));
    match outcome {
        GraphOutcome::Resolved(resolved) => {
            if let Some(parent) = &resolved.parent {
                ui::summary_row("parent:", parent);
            }
            ui::summary_row("bindings:", &resolved.graph.len().to_string());
            match &resolved.order {
                Some(order) => {
                    for (i, unit) in order.units.iter().enumerate() {
                        let names: Vec<String> = unit.iter().map(ToString::to_string).collect();
                        if unit.len() > 1 {
                            println!("  {:>4}. {} {}", i + 1, Icons::CYCLE, names.join(", "));
                        } else {
                            println!("  {:>4}. {}", i + 1, names.join(", "));
                        }
                    }
                    for shard in &order.shards {
                        ui::summary_row(
                            &format!("shard {}:", shard.index),
                            &format!("{} binding(s) in {} unit(s)", shard.len(), shard.unit_count),
                        );
                    }
                }
                None => println!("  {}", ui::muted("no initialization order")),
            }
            print_diagnostics(resolved.diagnostics.iter());
        }
        GraphOutcome::Aborted { error, .. } => ui::error(error),
        GraphOutcome::Skipped { blocked_by, .. } => {
            println!("  {} {}", Icons::SKIP, ui::dim(&format!("blocked by {}", blocked_by)));
        }
    }
}

pub fn run_resolve(
    output_mode: OutputMode,
    config: Option<&Path>,
    input: &Path,
    graph: Option<&str>,
) -> anyhow::Result<bool> {
    let output = resolve_input(output_mode, config, input)?;

    let selected: Vec<&GraphOutcome> = match graph {
        Some(name) => vec![output.require(name)?],
        None => output.graphs.iter().collect(),
    };
    let ok = !output.diagnostics.has_fatal()
        && selected.iter().all(|g| g.status() == GraphStatus::Resolved);

    if output_mode.is_json() {
        print_json(&serde_json::json!({
            "ok": ok,
            "fingerprint": fingerprint(&output),
            "diagnostics": output.diagnostics,
            "graphs": selected,
        }))?;
        return Ok(ok);
    }

    print_diagnostics(output.diagnostics.iter());
    for outcome in selected {
        print_outcome(outcome);
    }
    Ok(ok)
}

pub fn run_check(output_mode: OutputMode, config: Option<&Path>, input: &Path) -> anyhow::Result<bool> {
    let output = resolve_input(output_mode, config, input)?;
    let ok = !output.has_fatal();

    if output_mode.is_json() {
        let diagnostics: Vec<&Diagnostic> = output.all_diagnostics().collect();
        print_json(&serde_json::json!({
            "ok": ok,
            "graphs": output.graphs.len(),
            "errors": output.fatal_count(),
            "warnings": output.warning_count(),
            "diagnostics": diagnostics,
        }))?;
        return Ok(ok);
    }

    print_diagnostics(output.all_diagnostics());
    for outcome in &output.graphs {
        match outcome {
            GraphOutcome::Aborted { graph, error } => ui::error(&format!("{}: {}", graph, error)),
            GraphOutcome::Skipped { graph, blocked_by } => {
                ui::warn(&format!("{} skipped, blocked by {}", graph, blocked_by))
            }
            GraphOutcome::Resolved(_) => {}
        }
    }

    let graphs = output.graphs.len().to_string();
    let errors = output.fatal_count().to_string();
    let warnings = output.warning_count().to_string();
    println!(
        "{}",
        ui::stats_table(&[("Graphs", &graphs), ("Errors", &errors), ("Warnings", &warnings)])
    );
    if ok {
        ui::success("All graphs are valid");
    } else {
        ui::error("Validation failed");
    }
    Ok(ok)
}

#[derive(Tabled)]
struct UnusedRow {
    #[tabled(rename = "Graph")]
    graph: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Declared by")]
    origin: String,
    #[tabled(rename = "Input")]
    input: String,
}

#[derive(Tabled)]
struct ShardRow {
    #[tabled(rename = "Graph")]
    graph: String,
    #[tabled(rename = "Shard")]
    index: usize,
    #[tabled(rename = "Bindings")]
    bindings: usize,
    #[tabled(rename = "Units")]
    units: usize,
    #[tabled(rename = "First")]
    first: String,
    #[tabled(rename = "Last")]
    last: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Graph")]
    graph: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Bindings")]
    bindings: usize,
    #[tabled(rename = "Inherited")]
    inherited: usize,
    #[tabled(rename = "Edges")]
    edges: usize,
    #[tabled(rename = "Cycles")]
    cyclic_units: usize,
    #[tabled(rename = "Shards")]
    shards: usize,
    #[tabled(rename = "Errors")]
    errors: usize,
    #[tabled(rename = "Warnings")]
    warnings: usize,
}

pub fn run_report(
    output_mode: OutputMode,
    config: Option<&Path>,
    kind: ReportKind,
    input: &Path,
) -> anyhow::Result<bool> {
    let output = resolve_input(output_mode, config, input)?;

    match kind {
        ReportKind::Unused => {
            let report = UnusedBindingsReport::from_output(&output);
            if output_mode.is_json() {
                print_json(&report)?;
            } else if report.is_empty() {
                ui::success("No unused declarations");
            } else {
                ui::header("Unused declarations");
                let rows: Vec<UnusedRow> = report
                    .entries
                    .iter()
                    .map(|e| UnusedRow {
                        graph: e.graph.clone(),
                        key: e.key.clone(),
                        origin: e.origin.clone(),
                        input: if e.is_input { "yes" } else { "" }.to_string(),
                    })
                    .collect();
                println!("{}", ui::render(&rows));
            }
        }
        ReportKind::Shards => {
            let report = ShardingPlanReport::from_output(&output);
            if output_mode.is_json() {
                print_json(&report)?;
            } else {
                ui::header("Sharding plan");
                for plan in report.graphs.iter().filter(|p| !p.is_sharded()) {
                    ui::info(&plan.graph, &format!("{} binding(s), not sharded", plan.orderable));
                }
                let rows: Vec<ShardRow> = report
                    .graphs
                    .iter()
                    .flat_map(|plan| {
                        plan.shards.iter().map(|shard| ShardRow {
                            graph: plan.graph.clone(),
                            index: shard.index,
                            bindings: shard.bindings,
                            units: shard.units,
                            first: shard.first.clone().unwrap_or_default(),
                            last: shard.last.clone().unwrap_or_default(),
                        })
                    })
                    .collect();
                println!("{}", ui::render(&rows));
            }
        }
        ReportKind::Summary => {
            let summaries = GraphSummary::all(&output);
            if output_mode.is_json() {
                print_json(&summaries)?;
            } else {
                ui::header("Graph summary");
                let rows: Vec<SummaryRow> = summaries
                    .iter()
                    .map(|s| SummaryRow {
                        graph: s.graph.clone(),
                        status: s.status.to_string(),
                        bindings: s.bindings,
                        inherited: s.inherited,
                        edges: s.edges,
                        cyclic_units: s.cyclic_units,
                        shards: s.shards,
                        errors: s.errors,
                        warnings: s.warnings,
                    })
                    .collect();
                println!("{}", ui::render(&rows));
                ui::status(Icons::STATS, "fingerprint", &fingerprint(&output));
            }
        }
    }
    Ok(true)
}

pub fn run_init(output_mode: OutputMode, config: Option<&Path>, force: bool) -> anyhow::Result<bool> {
    let path = config.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    write_config(&path, &ResolverConfig::default(), force)?;

    if output_mode.is_json() {
        print_json(&serde_json::json!({ "config": path.display().to_string() }))?;
    } else {
        ui::status(Icons::GEAR, "config", &path.display().to_string());
        ui::success("Wrote default configuration");
    }
    Ok(true)
}
