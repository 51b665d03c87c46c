//! CLI command implementations.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

use sinter_bench::metrics::{mean_center_distance, mean_neck_width, BenchmarkMetrics};
use sinter_bench::runner::BenchmarkRunner;
use sinter_bench::scenarios::{Scenario, ScenarioKind};
use sinter_io::contract::{SimulationFile, SimulationSummary};
use sinter_io::store::{read_records, JsonLinesStore, StoreRecord};
use sinter_io::validator::{neck_count, validate_file};
use sinter_material::MaterialDatabase;
use sinter_model::{StepRecord, SystemState};
use sinter_solver::{Progress, ProgressHook, SessionBuilder};
use sinter_telemetry::VecSink;

fn print_geometry(label: &str, state: &SystemState) {
    let neck = mean_neck_width(state)
        .map_or_else(|| "-".to_string(), |w| format!("{w:.4e}m"));
    let distance = mean_center_distance(state)
        .map_or_else(|| "-".to_string(), |d| format!("{d:.4e}m"));
    println!("{label:<12} t = {:.4e}s  neck = {neck}  center distance = {distance}", state.time());
}

/// Run a simulation from config file.
pub fn simulate(
    config_path: &str,
    output_override: Option<&str>,
    progress: u64,
) -> Result<(), Box<dyn Error>> {
    println!("Sinter Simulation");
    println!("─────────────────");
    println!("Config:       {config_path}");

    let mut file = SimulationFile::load(Path::new(config_path))?;
    if let Some(path) = output_override {
        file.output.path = Some(PathBuf::from(path));
    }
    let input = validate_file(&file)?;
    let end_time = input.state.time() + input.conditions.duration;

    println!("Scenario:     {}", file.scenario.label());
    println!("Material:     {}", file.material);
    println!(
        "Cluster:      {} particles, {} nodes",
        input.state.particle_count(),
        input.state.node_count()
    );
    println!(
        "Conditions:   {:.1} K for {:.4e} s",
        input.conditions.temperature, input.conditions.duration
    );
    println!(
        "Solver:       {:?} / {:?}",
        input.config.time_stepper, input.config.root_finder
    );
    println!();

    let events = VecSink::new();
    let mut builder = SessionBuilder::new(input)
        .with_hook(Box::new(ProgressHook::new(progress, end_time, |p: &Progress| {
            println!(
                "  step {:>7}  t = {:.4e}s  dt = {:.3e}s  ({:.1}%)",
                p.step, p.time, p.step_width, p.percent
            );
        })))
        .with_event_sink(Box::new(events.clone()));
    if let Some(path) = &file.output.path {
        let store = JsonLinesStore::create(path)?
            .with_state_stride(file.output.state_stride)
            .with_steps(file.output.steps);
        builder = builder.with_store(Box::new(store));
    }

    let session = builder.build()?;
    let start = Instant::now();
    let outcome = session.run();
    let summary = SimulationSummary::from_outcome(&outcome, start.elapsed().as_secs_f64());

    println!();
    println!("Termination:  {:?}", summary.termination);
    println!("Accepted:     {}", summary.accepted_steps);
    println!(
        "Rejected:     {} ({} rejection events)",
        summary.rejected_steps,
        events.count("step_rejected")
    );
    println!("Recoveries:   {}", summary.recoveries);
    println!("Iterations:   {:.2} per step", summary.mean_iterations);
    println!("Wall time:    {:.3}s", summary.wall_time_seconds);
    if let (Some(first), Some(last)) = (outcome.time_series.first(), outcome.final_state()) {
        print_geometry("Initial:", first);
        print_geometry("Final:", last);
    }
    if let Some(path) = &file.output.path {
        println!("States:       {}", path.display());
    }
    if let Some(path) = &file.output.summary {
        summary.write_json(path)?;
        println!("Summary:      {}", path.display());
    }

    match outcome.error {
        Some(e) => Err(format!("Simulation failed: {e}").into()),
        None if !outcome.success => Err(format!("Simulation stopped: {:?}", outcome.termination).into()),
        None => Ok(()),
    }
}

/// Run benchmark suite.
pub fn benchmark(
    scenario_name: &str,
    output_path: Option<&str>,
    material_name: Option<&str>,
    duration: Option<f64>,
    parallel: bool,
) -> Result<(), Box<dyn Error>> {
    println!("Sinter Benchmark Suite");
    println!("══════════════════════");
    println!();

    // Look up material from database if specified
    let material_props = if let Some(name) = material_name {
        let db = MaterialDatabase::with_defaults();
        let props = db.get(name).ok_or_else(|| {
            let available: Vec<&str> = db.names();
            format!(
                "Unknown material: '{name}'. Available: {}",
                available.join(", ")
            )
        })?;
        println!("Material: {name}");
        println!();
        Some(props.clone())
    } else {
        None
    };

    let kinds: Vec<ScenarioKind> = if scenario_name == "all" {
        ScenarioKind::all().to_vec()
    } else {
        let kind = ScenarioKind::from_name(scenario_name).ok_or_else(|| {
            let available: Vec<&str> = ScenarioKind::all().iter().map(|k| k.name()).collect();
            format!(
                "Unknown scenario: '{scenario_name}'. Available: {}, all",
                available.join(", ")
            )
        })?;
        vec![kind]
    };

    let mut scenarios = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let mut scenario = Scenario::from_kind(kind)?;
        if let Some(props) = &material_props {
            scenario = scenario.with_material(props.clone());
        }
        if let Some(d) = duration {
            scenario = scenario.with_normalized_duration(d);
        }
        println!(
            "Queued: {} ({} particles, {} nodes, {} characteristic times)",
            kind.name(),
            scenario.state.particle_count(),
            scenario.state.node_count(),
            scenario.normalized_duration,
        );
        scenarios.push(scenario);
    }
    println!();

    let results = if parallel {
        BenchmarkRunner::run_batch(&scenarios)
    } else {
        scenarios.iter().map(BenchmarkRunner::run).collect()
    };

    let mut all_metrics = Vec::with_capacity(results.len());
    for result in results {
        let metrics = result.map_err(|e| format!("Benchmark failed: {e}"))?;
        println!("{}", metrics.scenario);
        println!("  Success:       {} ({})", metrics.success, metrics.termination);
        println!(
            "  Steps:         {} accepted, {} rejected",
            metrics.accepted_steps, metrics.rejected_steps
        );
        println!("  Wall time:     {:.3}s", metrics.total_wall_time);
        println!("  Avg step:      {:.3}ms", metrics.avg_step_time * 1000.0);
        println!("  Neck growth:   {:.4}%", metrics.neck_growth * 100.0);
        println!("  Shrinkage:     {:.4}%", metrics.shrinkage * 100.0);
        println!();
        all_metrics.push(metrics);
    }

    // Output CSV
    let csv = BenchmarkMetrics::to_csv(&all_metrics);
    if let Some(path) = output_path {
        std::fs::write(path, &csv)?;
        println!("Results written to: {path}");
    } else {
        println!("CSV Output:");
        println!("{csv}");
    }

    Ok(())
}

/// Summarize a JSON-lines output file.
pub fn inspect(path: &str) -> Result<(), Box<dyn Error>> {
    println!("Sinter Output Inspector");
    println!("───────────────────────");
    println!();

    let records = read_records(Path::new(path))?;
    let mut states: Vec<&SystemState> = Vec::new();
    let mut steps: Vec<&StepRecord> = Vec::new();
    for record in &records {
        match record {
            StoreRecord::State(s) => states.push(s),
            StoreRecord::Step(s) => steps.push(s),
        }
    }

    println!("Records:      {}", records.len());
    println!("States:       {}", states.len());
    println!("Steps:        {}", steps.len());

    if let (Some(first), Some(last)) = (states.first(), states.last()) {
        println!("Time range:   [{:.4e}, {:.4e}] s", first.time(), last.time());
        println!(
            "Cluster:      {} particles, {} nodes",
            last.particle_count(),
            last.node_count()
        );
        print_geometry("Initial:", first);
        print_geometry("Final:", last);
    }

    if !steps.is_empty() {
        let (min_width, max_width) = steps.iter().fold((f64::INFINITY, 0.0f64), |(lo, hi), s| {
            (lo.min(s.step_width), hi.max(s.step_width))
        });
        let drift: f64 = steps.iter().map(|s| s.total_volume_change()).sum();
        println!("Step widths:  [{min_width:.3e}, {max_width:.3e}] s");
        println!("Area drift:   {drift:.4e} m²");
    }

    Ok(())
}

/// Validate a simulation config or a state file.
pub fn validate(path: &str) -> Result<(), Box<dyn Error>> {
    println!("Sinter Validator");
    println!("────────────────");
    println!();

    if path.ends_with(".toml") {
        println!("Validating config: {path}");
        let file = SimulationFile::load(Path::new(path))?;
        match validate_file(&file) {
            Ok(input) => println!(
                "✅ Config is valid ({} particles, {} nodes, {} necks).",
                input.state.particle_count(),
                input.state.node_count(),
                neck_count(&input.state)
            ),
            Err(e) => println!("❌ Config validation failed: {e}"),
        }
    } else if path.ends_with(".json") {
        println!("Validating state: {path}");
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<SystemState>(&content) {
            Ok(state) => match state.require_contacts() {
                Ok(()) => println!(
                    "✅ State is valid ({} particles, {} nodes, {} necks).",
                    state.particle_count(),
                    state.node_count(),
                    neck_count(&state)
                ),
                Err(e) => println!("⚠️  State rings are valid, contacts will be discovered: {e}"),
            },
            Err(e) => println!("❌ State validation failed: {e}"),
        }
    } else {
        println!("Unsupported file format. Use .toml (config) or .json (state).");
    }

    Ok(())
}
