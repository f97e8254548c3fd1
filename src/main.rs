use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::exit;
use vignette_runner::chart::{self, ChartRenderer, SvgRenderer};
use vignette_runner::config::{ConfigLoader, MissingSamplePolicy};
use vignette_runner::core::RunMode;
use vignette_runner::suite::ResultFormatter;
use vignette_runner::timings::{OperationBreakdown, TimingLogAggregator, TimingTable};
use vignette_runner::Result;

/// Regression harness for ParaView and VisIt vignettes.
#[derive(Parser, Debug)]
#[command(name = "vignette-runner")]
#[command(version)]
struct Cli {
    /// Enable debug logging and detailed result output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run, submit, or clean a test tree
    Suite(SuiteArgs),

    /// Aggregate per-rank Ascent timing logs into ascent_timings_summary.json
    Timings {
        /// Directory holding timings.*.txt or ascent_filter_times_*.csv
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Repeat a rank's last sample instead of zero-filling missing steps
        #[arg(long)]
        carry_forward: bool,
    },

    /// Sum Kombyne timers per operation into kombyne_breakdown.json
    Breakdown {
        /// Directory holding timings.*.txt
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Chart an aggregated timing summary as SVG
    TimingsChart {
        /// Path to an ascent_timings_summary.json file
        json: PathBuf,

        /// Open the chart after writing it
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args, Debug)]
struct SuiteArgs {
    /// Repository root holding <test_type>_Vignettes/
    root_directory: PathBuf,

    /// Test tree to use (ParaView or VisIt)
    #[arg(long = "test_type")]
    test_type: String,

    /// Submit each test's batch script instead of running locally
    #[arg(long, conflicts_with_all = ["generate_metrics", "clean"])]
    submit: bool,

    /// Regenerate comparisons, charts and the report without running tests
    #[arg(long = "generate-metrics", conflicts_with = "clean")]
    generate_metrics: bool,

    /// Remove generated files and exit
    #[arg(long)]
    clean: bool,

    /// Run only the N-th discovered test (0-based)
    #[arg(long = "test_number")]
    test_number: Option<usize>,

    /// Machine name for performance history (defaults to the host name)
    #[arg(long = "machine_name")]
    machine_name: Option<String>,

    /// ParaView version recorded with metrics
    #[arg(long = "paraview_version")]
    paraview_version: Option<String>,

    /// VisIt version recorded with metrics
    #[arg(long = "visit_version")]
    visit_version: Option<String>,

    /// Record missing baselines under the explicit baseline policy
    #[arg(long = "accept-baseline")]
    accept_baseline: bool,

    /// Configuration file (defaults to <root>/vignette-runner.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(long)]
    profile: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Suite(args) => run_suite(args, cli.verbose),
        Commands::Timings { dir, carry_forward } => run_timings(&dir, carry_forward),
        Commands::Breakdown { dir } => run_breakdown(&dir),
        Commands::TimingsChart { json, show } => run_timings_chart(&json, show),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_suite(args: SuiteArgs, verbose: bool) -> Result<()> {
    let mode = if args.submit {
        RunMode::Submit
    } else if args.generate_metrics {
        RunMode::MetricsOnly
    } else {
        RunMode::Run
    };

    let mut builder = vignette_runner::builder()
        .root_dir(&args.root_directory)
        .test_type(&args.test_type)
        .load_config(args.config, args.profile)?
        .mode(mode)
        .accept_baseline(args.accept_baseline);
    if let Some(name) = args.machine_name {
        builder = builder.machine_name(name);
    }
    if let Some(version) = args.paraview_version {
        builder = builder.paraview_version(version);
    }
    if let Some(version) = args.visit_version {
        builder = builder.visit_version(version);
    }
    let mut suite = builder.build()?;

    let verbose = verbose || suite.context().config.verbose;
    if verbose {
        for (key, value) in vignette_runner::config::env::detect_active_overrides() {
            tracing::debug!("env override: {}={}", key, value);
        }
    }

    if args.clean {
        suite.clean()?;
        return Ok(());
    }

    let formatter = ResultFormatter::new(verbose);
    match args.test_number {
        Some(index) => {
            let outcome = suite.run_one(index)?;
            formatter.outcome(&outcome);
        }
        None => {
            let report = suite.run_all()?;
            formatter.report(&report);
        }
    }
    Ok(())
}

fn run_timings(dir: &Path, carry_forward: bool) -> Result<()> {
    let policy = if carry_forward {
        MissingSamplePolicy::CarryForward
    } else {
        ConfigLoader::new().root_dir(dir).load()?.timings.missing_samples
    };
    let path = TimingLogAggregator::new(policy).write_summary(dir)?;
    println!("Timing summary written to {}", path.display());
    Ok(())
}

fn run_breakdown(dir: &Path) -> Result<()> {
    let breakdown = OperationBreakdown::from_dir(dir)?;
    let path = breakdown.write(dir)?;
    println!(
        "Breakdown of {} operations written to {}",
        breakdown.len(),
        path.display()
    );
    Ok(())
}

fn run_timings_chart(json: &Path, show: bool) -> Result<()> {
    let table = TimingTable::load(json)?;
    let title = format!("Ascent Performance Analysis ({})", json.display());
    let chart = chart::timing_chart(&table, &title);
    if chart.reference.is_none() {
        tracing::warn!("no '[total]' entry; drawing without the reference line");
    }

    let renderer = SvgRenderer::default();
    let path = json.with_extension(renderer.extension());
    renderer.render(&chart, &path)?;
    println!("Chart saved to {}", path.display());

    if show {
        chart::open(&path)?;
    }
    Ok(())
}
