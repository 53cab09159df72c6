use std::thread;
use std::time::Instant;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use ts_core::TraitKind;
use ts_simulation::{SimEventKind, SimulationSession};

use super::SessionArgs;

pub fn run(args: &SessionArgs, realtime: bool, verbose: bool) -> Result<(), String> {
    let mut session = args.start_session()?;
    let initial = session.population();

    let mut extinct_at = None;
    for _ in 0..args.ticks {
        let started = Instant::now();
        let Some(report) = session.step() else {
            break;
        };
        if report.population == 0 && extinct_at.is_none() {
            extinct_at = Some(report.tick);
        }
        if realtime {
            let interval = session.clock().tick_interval();
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }
    tracing::info!(
        ticks = session.current_tick(),
        population = session.population(),
        "run finished"
    );

    // Header
    let config = session.config();
    println!(
        "  {} {}",
        "Simulation".bold(),
        format!(
            "({} ticks, seed={}, {}x{} world)",
            session.current_tick(),
            config.seed,
            session.grid().width(),
            session.grid().height()
        )
        .dimmed()
    );
    println!(
        "  {} agents seeded, {} alive, {} events logged",
        initial,
        session.population(),
        session.events().len()
    );
    println!(
        "  Simulated time: {:.1}s at {} ticks/s",
        session.clock().elapsed_seconds(),
        session.clock().tick_rate()
    );
    println!();

    if verbose {
        print_event_log(&session);
    } else {
        print_notable(&session, extinct_at);
    }

    print_trait_table(&session);
    Ok(())
}

fn print_event_log(session: &SimulationSession) {
    println!("  {}", "Event Log".bold().underline());
    println!();
    let mut any = false;
    for event in session.events().events() {
        if matches!(event.kind, SimEventKind::StepSummary(_)) {
            continue;
        }
        any = true;
        let tick_label = format!("[tick {:>4}]", event.tick).dimmed();
        let desc = colorize_event(&event.kind, &event.description);
        println!("  {tick_label} {desc}");
    }
    if !any {
        println!("  {}", "(no events)".dimmed());
    }
    println!();
}

fn print_notable(session: &SimulationSession, extinct_at: Option<u64>) {
    let mut births = 0;
    let mut deaths = 0;
    let mut mutations = 0;
    let mut dropped = 0;
    let mut faults = Vec::new();
    for event in session.events().events() {
        match &event.kind {
            SimEventKind::Birth { parents: Some(_), .. } => births += 1,
            SimEventKind::Death { .. } => deaths += 1,
            SimEventKind::Mutation { .. } => mutations += 1,
            SimEventKind::CapacityExceeded { .. } => dropped += 1,
            SimEventKind::DecisionFault { .. } => faults.push(event),
            _ => {}
        }
    }

    println!("  {}", "Notable Events".bold().underline());
    println!(
        "  {} born, {} died, {} mutations, {} dropped at the population cap",
        births.to_string().green(),
        deaths.to_string().red(),
        mutations.to_string().cyan(),
        dropped
    );
    for event in &faults {
        println!("  {}   {}", "WARN".yellow().bold(), event.description);
    }
    if let Some(tick) = extinct_at {
        println!("  {} population died out at tick {tick}", "EXTINCT".red().bold());
    }
    println!();
}

fn print_trait_table(session: &SimulationSession) {
    println!("  {}", "Population Traits".bold().underline());
    println!();

    if session.population() == 0 {
        println!("  {}", "(no survivors)".dimmed());
        println!();
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Trait", "Mean", "Min", "Max", "Range"]);

    for kind in TraitKind::ALL {
        let values: Vec<f64> = session
            .registry()
            .iter_alive()
            .map(|a| a.genome.get(kind))
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let bounds = kind.bounds();
        table.add_row(vec![
            kind.to_string(),
            format!("{mean:.3}"),
            format!("{min:.3}"),
            format!("{max:.3}"),
            format!("[{}, {}]", bounds.min, bounds.max),
        ]);
    }

    let generation = session
        .registry()
        .iter_alive()
        .map(|a| a.generation)
        .max()
        .unwrap_or(0);
    println!("{table}");
    println!("  Oldest lineage: generation {generation}");
    println!();
}

fn colorize_event(kind: &SimEventKind, description: &str) -> colored::ColoredString {
    match kind {
        SimEventKind::Birth { .. } => description.green(),
        SimEventKind::Death { .. } => description.red(),
        SimEventKind::Mutation { .. } => description.cyan(),
        SimEventKind::CapacityExceeded { .. } => description.yellow(),
        SimEventKind::DecisionFault { .. } => description.yellow().bold(),
        SimEventKind::StepSummary(_) => description.dimmed(),
    }
}
