mod engines;
mod plugins;
mod snapshot;

use anyhow::Context;
use clap::{Parser, Subcommand};
use engines::ReferenceEngines;
use plugins::PluginRegistry;
use pnr_common::db::writer::save_def;
use pnr_common::util::breakpoint::Breakpoint;
use pnr_common::util::config::{ConfigStore, Priority};
use pnr_common::util::generator::{GeneratorParams, generate_random_design};
use pnr_common::util::logger;
use pnr_common::util::visualization::{SnapshotLayers, draw_snapshot};
use pnr_common::viewer::Viewer;
use pnr_conductor::{Conductor, RunArgs};
use snapshot::{SnapshotViewer, StdinStopHandler};
use std::path::{Path, PathBuf};
use std::rc::Rc;

const CONDUCTOR_ACTION: &str = "misc.alpha.conductor";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Overrides a parameter, e.g. `--set conductor.maxPlaceIterations=3`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Writes a snapshot per viewer refresh and pauses on breakpoints.
    #[arg(short, long)]
    interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Clone)]
struct BenchmarkArgs {
    #[arg(long, default_value_t = 200)]
    cells: usize,
    #[arg(long, default_value_t = 120)]
    nets: usize,
    #[arg(long, default_value_t = 6)]
    layers: u8,
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

impl Default for BenchmarkArgs {
    fn default() -> Self {
        let defaults = GeneratorParams::default();
        Self {
            cells: defaults.cells,
            nets: defaults.nets,
            layers: defaults.layers,
            seed: defaults.seed,
        }
    }
}

impl BenchmarkArgs {
    fn params(&self) -> GeneratorParams {
        GeneratorParams {
            cells: self.cells,
            nets: self.nets,
            layers: self.layers,
            seed: self.seed,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Place and route a generated benchmark with the P&R Conductor.
    Run {
        #[command(flatten)]
        bench: BenchmarkArgs,
        #[arg(long, default_value = "output")]
        output: PathBuf,
    },
    /// Write an unplaced benchmark as DEF.
    Generate {
        #[command(flatten)]
        bench: BenchmarkArgs,
        #[arg(long, default_value = "inputs/random.def")]
        output: PathBuf,
    },
    /// List the registered menus and actions.
    Plugins,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let command = args.command.unwrap_or(Commands::Run {
        bench: BenchmarkArgs::default(),
        output: PathBuf::from("output"),
    });

    match command {
        Commands::Generate { bench, output } => {
            prepare_output_dir(&output)?;
            let design = generate_random_design("random", &bench.params());
            save_def(&design, &output)
                .with_context(|| format!("Failed to write DEF to {:?}", output))?;
            log::info!("Generated: {:?}", output);
        }
        Commands::Plugins => {
            let engines = ReferenceEngines;
            let breakpoint = Breakpoint::new();
            let mut registry = PluginRegistry::new();
            registry.register(Box::new(Conductor::new(&config, &engines, &breakpoint)))?;

            for menu in registry.menus() {
                println!("{:<20} {}", menu.path, menu.label);
                for action in registry.actions().filter(|a| a.menu == *menu) {
                    println!("  {:<28} {}", action.path, action.label);
                    println!("  {:<28} {}", "", action.description);
                }
            }
        }
        Commands::Run { bench, output } => {
            if !run_flow(&config, &bench, &output, args.interactive)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ConfigStore> {
    let config = ConfigStore::new();
    if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        config
            .load_file(&args.config, Priority::ConfigurationFile)
            .with_context(|| format!("Invalid configuration file {:?}", args.config))?;
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
    }

    for assignment in &args.overrides {
        config
            .apply_assignment(assignment, Priority::CommandLine)
            .with_context(|| format!("Bad --set argument '{}'", assignment))?;
    }
    Ok(config)
}

fn prepare_output_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
        && !parent.as_os_str().is_empty()
    {
        log::info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Returns whether the design came out fully routed.
fn run_flow(
    config: &ConfigStore,
    bench: &BenchmarkArgs,
    output: &Path,
    interactive: bool,
) -> anyhow::Result<bool> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Cannot create output directory {:?}", output))?;
    let design = generate_random_design("random", &bench.params()).into_shared();

    let engines = ReferenceEngines;
    let breakpoint = Breakpoint::new();
    let viewer = if interactive {
        breakpoint.set_handler(Some(Box::new(StdinStopHandler)));
        let frames = output.join("frames");
        let viewer = SnapshotViewer::new(design.clone(), frames.clone(), 800)
            .with_context(|| format!("Cannot create snapshot directory {:?}", frames))?;
        Some(Rc::new(viewer))
    } else {
        None
    };

    // With an editor attached the design is taken from it.
    let args = match &viewer {
        Some(v) => RunArgs {
            cell: None,
            editor: Some(Rc::clone(v) as Rc<dyn Viewer>),
        },
        None => RunArgs {
            cell: Some(design.clone()),
            editor: None,
        },
    };

    let mut registry = PluginRegistry::new();
    registry.register(Box::new(Conductor::new(config, &engines, &breakpoint)))?;
    let status = registry.run(CONDUCTOR_ACTION, args)?;
    if let Some(v) = &viewer {
        log::info!("{} snapshots written.", v.frames());
    }

    let design = design.borrow();
    let def_path = output.join("routed.def");
    log::info!("Writing routed DEF to {:?}", def_path);
    save_def(&design, &def_path).with_context(|| format!("Failed to write {:?}", def_path))?;

    let png_path = output.join("routed.png");
    log::info!("Generating routed visualization...");
    let layers = SnapshotLayers {
        rubbers: false,
        ..Default::default()
    };
    draw_snapshot(&design, &[], layers, &png_path, 1000, 1000)
        .with_context(|| format!("Failed to write {:?}", png_path))?;

    match &design.measures {
        Some(m) if status == 0 && m.overflow == 0 => {
            log::info!(
                "Routed '{}' at pass {}: wirelength {:.2}, {} vias.",
                design.name,
                m.pass_number,
                m.wirelength,
                m.vias
            );
            Ok(true)
        }
        Some(m) => {
            log::error!("Routing of '{}' left an overflow of {}.", design.name, m.overflow);
            Ok(false)
        }
        None => {
            log::error!("The P&R Conductor did not complete, see the log above.");
            Ok(false)
        }
    }
}
