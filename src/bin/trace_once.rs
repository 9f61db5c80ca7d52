// Manual check of an installed tracer: cargo run --bin trace_once -- path/to/file.py

use anyhow::{bail, Context};
use live_trace::config::Settings;
use live_trace::grid::build_grid;
use live_trace::scheduler::{
    AvailabilityStore, Completion, DocumentSnapshot, Notice, SystemLauncher, TraceScheduler,
    Trigger,
};
use live_trace::{interpreter, logging};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

fn main() -> anyhow::Result<()> {
    logging::init(None)?;

    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: trace_once <file.py>");
    };
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;

    let settings = Settings::load(None)?;
    let python = interpreter::resolve(settings.python_path.as_deref());
    println!("Interpreter: {}", python.display());

    let (tx, rx) = channel::<Completion>();
    let options = settings.run_options(python.clone())?;
    // assume the tracer is there; a missing module shows up as a user error
    let store = AvailabilityStore::with_verdict(python, true);
    let mut scheduler = TraceScheduler::new(SystemLauncher::new(tx), store, options);

    let snapshot = DocumentSnapshot::new(path.display().to_string(), text, Some(path.clone()));
    let decision = scheduler.request_run(snapshot, Trigger::Explicit, Instant::now());
    println!("Decision: {:?}", decision);

    loop {
        for notice in scheduler.take_notices() {
            if let Notice::Delivered { delivery, .. } = notice {
                println!("Result: {:?}", delivery.kind);
                let grid = build_grid(&delivery.source, &delivery.text);
                for (i, row) in grid.rows().iter().enumerate() {
                    let cells: Vec<&str> = row.cells.iter().map(|c| c.text.as_str()).collect();
                    println!("{:>4}: {:?}", i + 1, cells);
                }
                if grid.is_empty() {
                    println!("{}", delivery.text);
                }
                return Ok(());
            }
        }
        let completion = rx
            .recv_timeout(Duration::from_secs(60))
            .context("tracer did not finish within 60s")?;
        scheduler.on_completion(completion);
    }
}
