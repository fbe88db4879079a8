#![deny(unsafe_code)]
//! CLI binary for flowviz.
//!
//! Subcommands:
//! - `list`: print field kinds, sampling modes and parameter schemas
//! - `field <kind>`: write a direction- or magnitude-colored PNG of a generated field
//! - `lic <kind>`: run a fast LIC pass and write the texture as PNG
//! - `streamlines <kind>`: trace random streamlines, print a summary
//! - `particles <kind>`: advect particles for N ticks, print their positions

mod error;

use clap::{Args, Parser, Subcommand, ValueEnum};
use error::CliError;
use flowviz_core::config::{LIC, PARTICLES, STREAMLINES};
use flowviz_core::{
    FastLic, FieldKind, Integrator, IntegratorConfig, LicConfig, ParticleAdvector,
    ParticleConfig, RunSpec, Streamline, Xorshift64,
};
use flowviz_snapshot::{
    field_to_rgba, intensity_to_rgba, magnitude_to_rgba, plot_points, write_png,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

const STREAMLINE_COLOR: [u8; 4] = [255, 255, 255, 255];
const PARTICLE_COLOR: [u8; 4] = [255, 200, 64, 255];

#[derive(Parser)]
#[command(name = "flowviz", about = "2D vector field visualization CLI")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level (otherwise RUST_LOG, default warn).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Field selection shared by every rendering subcommand.
#[derive(Args)]
struct FieldArgs {
    /// Field kind (e.g. "attract", "swirl").
    kind: String,

    /// Field grid width.
    #[arg(short = 'W', long, default_value_t = 128)]
    width: usize,

    /// Field grid height.
    #[arg(short = 'H', long, default_value_t = 128)]
    height: usize,

    /// PRNG seed for deterministic output.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Component parameters as a JSON object.
    #[arg(long, default_value = "{}")]
    params: String,
}

impl FieldArgs {
    fn parse_params(&self) -> Result<Map<String, Value>, CliError> {
        match serde_json::from_str(&self.params) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CliError::Input("--params must be a JSON object".into())),
            Err(e) => Err(CliError::Input(format!("invalid --params JSON: {e}"))),
        }
    }

    /// Builds a validated run spec with `--params` placed under `section`.
    fn run_spec(&self, section: &str) -> Result<RunSpec, CliError> {
        let params = self.parse_params()?;
        let spec = RunSpec::new(&self.kind, self.width, self.height, self.seed)
            .with_params(json!({ section: params }));
        spec.validate()?;
        Ok(spec)
    }

    /// Run spec for commands without tunable components. Non-empty
    /// `--params` are rejected rather than silently dropped.
    fn field_only_spec(&self, command: &str) -> Result<RunSpec, CliError> {
        if !self.parse_params()?.is_empty() {
            return Err(CliError::Input(format!("`{command}` takes no --params")));
        }
        let spec = RunSpec::new(&self.kind, self.width, self.height, self.seed);
        spec.validate()?;
        Ok(spec)
    }
}

/// How `field` colors each cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Coloring {
    /// Hue from flow direction, brightness from magnitude.
    Direction,
    /// Grayscale magnitude.
    Magnitude,
}

impl Coloring {
    fn name(self) -> &'static str {
        match self {
            Coloring::Direction => "direction",
            Coloring::Magnitude => "magnitude",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List field kinds, sampling modes and component parameters.
    List,
    /// Write a colored PNG of a generated field.
    Field {
        #[command(flatten)]
        field: FieldArgs,

        /// Cell coloring.
        #[arg(long, value_enum, default_value_t = Coloring::Direction)]
        coloring: Coloring,

        /// Output file path.
        #[arg(short, long, default_value = "field.png")]
        output: PathBuf,
    },
    /// Run a fast LIC pass and write the texture as a PNG.
    Lic {
        #[command(flatten)]
        field: FieldArgs,

        /// Texture width in pixels (defaults to the field width).
        #[arg(long)]
        texture_width: Option<usize>,

        /// Texture height in pixels (defaults to the field height).
        #[arg(long)]
        texture_height: Option<usize>,

        /// Output file path.
        #[arg(short, long, default_value = "lic.png")]
        output: PathBuf,
    },
    /// Trace random streamlines and summarize how they terminated.
    Streamlines {
        #[command(flatten)]
        field: FieldArgs,

        /// Number of streamlines.
        #[arg(short, long, default_value_t = 64)]
        count: usize,

        /// Also plot the streamlines into this PNG.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Advect particles and print their final positions.
    Particles {
        #[command(flatten)]
        field: FieldArgs,

        /// Number of ticks.
        #[arg(short, long, default_value_t = 100)]
        ticks: usize,

        /// Time step per tick.
        #[arg(long, default_value_t = 1.0)]
        dt: f64,

        /// Also plot the particle trails into this PNG.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Termination counts over a streamline batch.
fn streamline_summary(lines: &[Streamline]) -> Value {
    let count = |pred: fn(&Streamline) -> bool| lines.iter().filter(|l| pred(l)).count();
    let total_steps: usize = lines.iter().map(Streamline::steps).sum();
    json!({
        "count": lines.len(),
        "invalid": count(|l| !l.valid()),
        "converged": count(Streamline::converged),
        "reached_boundary": count(Streamline::reached_boundary),
        "reached_end": count(Streamline::reached_end),
        "mean_steps": if lines.is_empty() { 0.0 } else { total_steps as f64 / lines.len() as f64 },
    })
}

fn streamline_json(line: &Streamline) -> Value {
    json!({
        "start": [line.start().x, line.start().y],
        "end": [line.position().x, line.position().y],
        "steps": line.steps(),
        "valid": line.valid(),
        "converged": line.converged(),
        "reached_boundary": line.reached_boundary(),
        "reached_end": line.reached_end(),
    })
}

fn write_overlay(
    path: &Path,
    width: usize,
    height: usize,
    points: impl IntoIterator<Item = flowviz_core::DVec2>,
    color: [u8; 4],
) -> Result<(), CliError> {
    let mut rgba = vec![0u8; width * height * 4];
    for pixel in rgba.chunks_mut(4) {
        pixel[3] = 255;
    }
    plot_points(&mut rgba, width, height, points, color);
    write_png(rgba, width, height, path)?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::List => {
            let kinds = FieldKind::list_names();
            if cli.json {
                print_json(&json!({
                    "kinds": kinds,
                    "sampling": ["nearest", "linear"],
                    "params": {
                        STREAMLINES: IntegratorConfig::param_schema(),
                        LIC: LicConfig::param_schema(),
                        PARTICLES: ParticleConfig::param_schema(),
                    },
                }))?;
            } else {
                println!("Field kinds:");
                for name in kinds {
                    println!("  {name}");
                }
                println!("Sampling:");
                println!("  nearest, linear");
            }
        }
        Command::Field {
            field,
            coloring,
            output,
        } => {
            let spec = field.field_only_spec("field")?;
            let vectors = spec.generate_field()?;
            let rgba = match coloring {
                Coloring::Direction => field_to_rgba(&vectors),
                Coloring::Magnitude => magnitude_to_rgba(&vectors),
            };
            write_png(rgba, spec.width, spec.height, &output)?;
            info!(kind = %spec.kind, coloring = coloring.name(), output = %output.display(), "wrote field snapshot");

            if cli.json {
                print_json(&json!({
                    "spec": spec,
                    "coloring": coloring.name(),
                    "max_magnitude": vectors.max_magnitude(),
                    "output": output.display().to_string(),
                }))?;
            } else {
                eprintln!(
                    "rendered {} field ({}x{}, seed {}) -> {}",
                    spec.kind,
                    spec.width,
                    spec.height,
                    spec.seed,
                    output.display()
                );
            }
        }
        Command::Lic {
            field,
            texture_width,
            texture_height,
            output,
        } => {
            let spec = field.run_spec(LIC)?;
            let vectors = spec.generate_field()?;
            let width = texture_width.unwrap_or(spec.width);
            let height = texture_height.unwrap_or(spec.height);
            let mut lic = FastLic::new(width, height, spec.lic_config()?)?;
            let rgba = intensity_to_rgba(lic.compute(&vectors));
            write_png(rgba, width, height, &output)?;

            let stats = lic.stats();
            if cli.json {
                print_json(&json!({
                    "spec": spec,
                    "config": lic.config().to_json(),
                    "texture": [width, height],
                    "seeds_traced": stats.seeds_traced,
                    "pixels_covered": stats.pixels_covered,
                    "output": output.display().to_string(),
                }))?;
            } else {
                eprintln!(
                    "rendered LIC of {} ({width}x{height}, {} seeds, {} pixels covered) -> {}",
                    spec.kind,
                    stats.seeds_traced,
                    stats.pixels_covered,
                    output.display()
                );
            }
        }
        Command::Streamlines {
            field,
            count,
            output,
        } => {
            let spec = field.run_spec(STREAMLINES)?;
            let vectors = spec.generate_field()?;
            let integrator = Integrator::new(spec.integrator_config()?)?;
            let mut rng = Xorshift64::new(spec.seed);
            let lines = integrator.integrate_random_streamlines(&vectors, count, &mut rng);

            if let Some(path) = &output {
                let points = lines
                    .iter()
                    .filter(|l| l.valid())
                    .flat_map(|l| std::iter::once(l.start()).chain(l.points().iter().copied()));
                write_overlay(path, spec.width, spec.height, points, STREAMLINE_COLOR)?;
            }

            let summary = streamline_summary(&lines);
            if cli.json {
                print_json(&json!({
                    "spec": spec,
                    "summary": summary,
                    "streamlines": lines.iter().map(streamline_json).collect::<Vec<_>>(),
                }))?;
            } else {
                println!("{} streamlines through {}:", lines.len(), spec.kind);
                println!("  converged:        {}", summary["converged"]);
                println!("  reached boundary: {}", summary["reached_boundary"]);
                println!("  reached end:      {}", summary["reached_end"]);
                println!("  invalid:          {}", summary["invalid"]);
                println!("  mean steps:       {}", summary["mean_steps"]);
            }
        }
        Command::Particles {
            field,
            ticks,
            dt,
            output,
        } => {
            if !dt.is_finite() {
                return Err(CliError::Input(format!("--dt must be finite, got {dt}")));
            }
            let spec = field.run_spec(PARTICLES)?;
            let vectors = spec.generate_field()?;
            let mut particles = ParticleAdvector::new(spec.particle_config()?)?;
            for _ in 0..ticks {
                particles.tick(&vectors, dt);
            }

            if let Some(path) = &output {
                let trails = (0..particles.len()).flat_map(|i| particles.trail(i));
                write_overlay(path, spec.width, spec.height, trails, PARTICLE_COLOR)?;
            }

            let positions: Vec<[f64; 2]> = particles.positions().iter().map(|p| [p.x, p.y]).collect();
            if cli.json {
                print_json(&json!({
                    "spec": spec,
                    "ticks": ticks,
                    "positions": positions,
                }))?;
            } else {
                println!("{} particles after {ticks} ticks in {}:", particles.len(), spec.kind);
                for [x, y] in positions {
                    println!("  {x:.6} {y:.6}");
                }
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
