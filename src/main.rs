use anyhow::Context;
use clap::{Parser, Subcommand};
use live_trace::config::Settings;
use live_trace::grid::build_grid;
use live_trace::render::{GridRenderer, Panel, PanelState};
use live_trace::{host, interpreter, logging};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "live-trace", version, about = "Live Python execution traces for editors")]
struct Cli {
    /// Settings file (default: <config dir>/live-trace/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Python interpreter to run the tracer with
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    /// Working directory for tracer runs
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve an editor over stdin/stdout (the default)
    Host,
    /// Render a source file and its saved tracer output to HTML on stdout
    Render {
        source: PathBuf,
        /// Tracer output for `source`
        #[arg(long)]
        trace: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(python) = cli.python {
        settings.python_path = Some(python);
    }
    if let Some(workspace) = cli.workspace {
        settings.workspace_root = Some(workspace);
    }

    match cli.command.unwrap_or(Command::Host) {
        Command::Host => {
            let interpreter = interpreter::resolve(settings.python_path.as_deref());
            host::run_host_mode(settings, interpreter)
        }
        Command::Render { source, trace } => {
            let source_text = fs::read_to_string(&source)
                .with_context(|| format!("reading {}", source.display()))?;
            let trace_text = fs::read_to_string(&trace)
                .with_context(|| format!("reading {}", trace.display()))?;

            let panel = Panel::Trace {
                grid: build_grid(&source_text, &trace_text),
                source: source_text,
                trace: trace_text,
                interpreter: settings
                    .python_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            };
            let mut renderer = GridRenderer::new(settings.display_flags());
            println!("{}", renderer.render(&PanelState::new(panel)));
            Ok(())
        }
    }
}
