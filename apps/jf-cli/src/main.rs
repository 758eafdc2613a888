use std::path::{Path, PathBuf};
use std::thread;

use clap::{Parser, Subcommand};
use jf_core::ValueType;
use jf_exec::{ExecReport, ManagerState};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod demo;
mod error;

use demo::{Demo, DemoConfig};
use error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "jf-cli")]
#[command(about = "jointflow CLI - run the demo arm control graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo graph and print the final outputs
    Run {
        /// Demo configuration YAML (defaults apply to missing keys)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of ticks to run
        #[arg(long, default_value_t = 100)]
        ticks: u64,
        /// Override the tick rate in Hz
        #[arg(long)]
        rate: Option<f64>,
        /// Run on the real-time thread instead of stepping synchronously
        #[arg(long)]
        realtime: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the execution order of the demo graph
    Schedule {
        /// Demo configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the order with every port as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the default demo configuration as YAML
    Defaults,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            ticks,
            rate,
            realtime,
            json,
        } => cmd_run(config.as_deref(), ticks, rate, realtime, json),
        Commands::Schedule { config, json } => cmd_schedule(config.as_deref(), json),
        Commands::Defaults => cmd_defaults(),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<DemoConfig> {
    match path {
        Some(path) => DemoConfig::load(path),
        None => Ok(DemoConfig::default()),
    }
}

#[derive(Debug, Serialize)]
struct RunSummary {
    last_tick: u64,
    completed: u64,
    aborted: u64,
    overruns: u64,
    mean_tick_us: u64,
    max_tick_us: u64,
    tool_position: Option<[f64; 3]>,
    torques: Option<Vec<f64>>,
    control: Option<Vec<f64>>,
}

fn cmd_run(path: Option<&Path>, ticks: u64, rate: Option<f64>, realtime: bool, json: bool) -> CliResult<()> {
    let mut config = load_config(path)?;
    if let Some(rate) = rate {
        config.exec.rate_hz = rate;
    }
    let mut demo = Demo::build(&config)?;
    info!(dof = demo.dof, ticks, realtime, rate_hz = config.exec.rate_hz, "running demo");

    if realtime {
        run_realtime(&mut demo, ticks)?;
    } else {
        let dt = config.exec.period().as_secs_f64();
        for _ in 0..ticks {
            demo.manager.tick_once()?;
            if demo.manager.state() == ManagerState::Stopped {
                break;
            }
            demo.advance(dt)?;
        }
    }

    let mut fault = None;
    for report in demo.manager.take_reports() {
        if let ExecReport::Faulted { tick, error, .. } = report {
            fault = Some(CliError::Faulted {
                tick,
                message: error.to_string(),
            });
        }
    }
    demo.manager.stop()?;

    let stats = demo.manager.stats();
    let reader = demo.manager.reader();
    let summary = RunSummary {
        last_tick: reader.tick(),
        completed: stats.completed(),
        aborted: stats.aborted(),
        overruns: stats.overruns(),
        mean_tick_us: stats.mean_duration().as_micros() as u64,
        max_tick_us: stats.max_duration().as_micros() as u64,
        tool_position: reader.get(demo.tool_position).map(|p| [p.x, p.y, p.z]),
        torques: reader.get(demo.torques).map(|t| t.as_slice().to_vec()),
        control: reader.get(demo.control).map(|u| u.as_slice().to_vec()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    match fault {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn run_realtime(demo: &mut Demo, ticks: u64) -> CliResult<()> {
    let period = demo.manager.config().period();
    let reader = demo.manager.reader();
    demo.manager.start()?;
    while reader.tick() < ticks {
        if demo.manager.poll() != ManagerState::Running {
            warn!(tick = reader.tick(), "real-time loop ended early");
            return Ok(());
        }
        thread::sleep(period);
        demo.advance(period.as_secs_f64())?;
    }
    demo.manager.pause()?;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Ticks: {} completed, {} aborted, {} overruns (last tick {})",
        summary.completed, summary.aborted, summary.overruns, summary.last_tick
    );
    println!(
        "Tick time: mean {} us, max {} us",
        summary.mean_tick_us, summary.max_tick_us
    );
    if let Some([x, y, z]) = summary.tool_position {
        println!("Tool position: [{x:.4}, {y:.4}, {z:.4}] m");
    }
    print_joints("Joint torques (Nm)", summary.torques.as_deref());
    print_joints("Hold control", summary.control.as_deref());
}

fn print_joints(label: &str, values: Option<&[f64]>) {
    match values {
        Some(values) => {
            println!("{label}:");
            for (i, v) in values.iter().enumerate() {
                println!("  j{}: {v:>10.4}", i + 1);
            }
        }
        None => println!("{label}: undefined"),
    }
}

#[derive(Debug, Serialize)]
struct PortSummary<'a> {
    name: &'a str,
    value_type: ValueType,
}

#[derive(Debug, Serialize)]
struct ScheduledSystem<'a> {
    name: &'a str,
    id: u32,
    inputs: Vec<PortSummary<'a>>,
    outputs: Vec<PortSummary<'a>>,
}

fn cmd_schedule(path: Option<&Path>, json: bool) -> CliResult<()> {
    let config = load_config(path)?;
    let demo = Demo::build(&config)?;
    let graph = demo.manager.graph()?;
    let order = demo.manager.schedule().unwrap_or_default();

    let mut systems = Vec::with_capacity(order.len());
    for &id in order {
        let node = graph.system(id)?;
        let mut inputs = Vec::with_capacity(node.inputs.len());
        for &input in &node.inputs {
            let port = graph.input(input)?;
            inputs.push(PortSummary {
                name: &port.name,
                value_type: port.value_type,
            });
        }
        let mut outputs = Vec::with_capacity(node.outputs.len());
        for &output in &node.outputs {
            let port = graph.output(output)?;
            outputs.push(PortSummary {
                name: &port.name,
                value_type: port.value_type,
            });
        }
        systems.push(ScheduledSystem {
            name: &node.name,
            id: id.index(),
            inputs,
            outputs,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&systems)?);
        return Ok(());
    }

    println!("Execution order ({} systems):", systems.len());
    for (i, system) in systems.iter().enumerate() {
        println!("  {}. {} (sys#{})", i + 1, system.name, system.id);
        for port in &system.inputs {
            println!("       in  {:<18} {}", port.name, port.value_type);
        }
        for port in &system.outputs {
            println!("       out {:<18} {}", port.name, port.value_type);
        }
    }
    Ok(())
}

fn cmd_defaults() -> CliResult<()> {
    let yaml = serde_yaml::to_string(&DemoConfig::default())?;
    print!("{yaml}");
    Ok(())
}
