use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use ta_latency_bench::aggregate::bucket_by_bars;
use ta_latency_bench::dataset::{self, Dataset, DatasetSource, SizeClass};
use ta_latency_bench::error::DatasetError;
use ta_latency_bench::harness::{BenchConfig, Profile};
use ta_latency_bench::providers::ProviderKind;
use ta_latency_bench::report::{render_all, ReportConfig};
use ta_latency_bench::schema::{self, PersistedReport, RunMeta, SCHEMA_VERSION};
use ta_latency_bench::suite::run_sizes;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceArg {
    Linear,
    RandomWalk,
    File,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Benchmark providers over the selected dataset sizes and write one JSON report each.
    Run {
        /// Providers to benchmark. Defaults to all built-in providers.
        #[arg(short, long, value_enum, num_args = 1.., action = clap::ArgAction::Append)]
        provider: Vec<ProviderKind>,

        /// Dataset size classes. Defaults to small and large.
        #[arg(short, long, value_enum, num_args = 1.., action = clap::ArgAction::Append)]
        size: Vec<SizeClass>,

        #[arg(long, value_enum, default_value_t = SourceArg::Linear)]
        source: SourceArg,

        /// Directory holding `<size>.ohlcv` files, for `--source file`.
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,

        /// Override the profile's nominal trial count.
        #[arg(long)]
        count: Option<f64>,

        /// Report output directory.
        #[arg(long, value_name = "DIR", default_value = "benchmarks/.out")]
        out: PathBuf,
    },

    /// Bucket all reports by bar count and render comparison charts.
    Report {
        #[arg(long, value_name = "DIR", default_value = "benchmarks/.out")]
        input: PathBuf,

        #[arg(long, value_name = "DIR", default_value = "benchmarks/charts")]
        output: PathBuf,
    },

    /// Write a dataset file for later `--source file` runs.
    GenerateDataset {
        #[arg(long, value_enum)]
        size: SizeClass,

        #[arg(long, value_enum, default_value_t = SourceArg::Linear)]
        source: SourceArg,

        #[arg(long, short = 'o', value_name = "DIR")]
        output: PathBuf,
    },

    /// Show metadata and fingerprint of a dataset file.
    DatasetInfo {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "ta-latency-bench")]
#[command(about = "Indicator latency comparison runner (JSON reports, SVG charts)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    /// Seed for the random-walk dataset.
    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Hide per-case progress bars.
    #[arg(long, default_value_t = false, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn source_for(arg: SourceArg, seed: u64, data_dir: Option<&Path>) -> anyhow::Result<DatasetSource> {
    Ok(match arg {
        SourceArg::Linear => DatasetSource::Linear,
        SourceArg::RandomWalk => DatasetSource::RandomWalk { seed },
        SourceArg::File => DatasetSource::File {
            dir: data_dir
                .context("--source file requires --data-dir")?
                .to_path_buf(),
        },
    })
}

fn run(
    cfg: &BenchConfig,
    providers: &[ProviderKind],
    sizes: &[SizeClass],
    source: &DatasetSource,
    count: Option<f64>,
    out: &Path,
) -> anyhow::Result<()> {
    let datasets: Vec<Dataset> = sizes
        .iter()
        .map(|size| {
            let ds = dataset::get_dataset(*size, source)?;
            info!(
                size = %size,
                bars = ds.bars(),
                fingerprint = %dataset::fingerprint(&ds),
                "dataset ready"
            );
            Ok(ds)
        })
        .collect::<Result<_, DatasetError>>()?;

    let nominal = count.unwrap_or_else(|| cfg.profile.nominal_count());
    let harness = cfg.harness();

    for kind in providers {
        let provider = kind.build();
        let result = run_sizes(provider.as_ref(), &datasets, nominal, &harness)?;

        for case in &result.cases {
            eprintln!(
                "[{}] {} @ {} bars: runs={} mean={} stdev={}",
                result.provider,
                case.id,
                case.bars,
                case.runs(),
                fmt_ms(case.mean()),
                fmt_ms(case.stdev())
            );
        }

        let report = PersistedReport::from_cases(&result.provider, &result.cases).with_run(RunMeta {
            schema_version: SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: cfg.profile.as_str().to_string(),
            seed: cfg.seed,
            timestamp_utc: now_utc(),
            git_sha: git_sha_short(),
        });
        let path = schema::save_report(&report, out)?;
        eprintln!("Report saved: {}", path.display());
    }
    Ok(())
}

fn fmt_ms(v: Option<f64>) -> String {
    match v {
        Some(ms) => format!("{ms:.4}ms"),
        None => "n/a".to_string(),
    }
}

fn report(input: &Path, output: &Path) -> anyhow::Result<()> {
    let reports = schema::load_all(input)?;
    if reports.is_empty() {
        anyhow::bail!("no reports found in {}", input.display());
    }

    let buckets = bucket_by_bars(&reports);
    let rendered = render_all(&buckets, output, &ReportConfig::default())?;
    for r in &rendered {
        eprintln!("{} bars:", r.bars);
        eprintln!("  {}", r.mean.display());
        eprintln!("  {}", r.mean_log10.display());
        match &r.diff {
            Ok(path) => eprintln!("  {}", path.display()),
            Err(e) => warn!(bars = r.bars, "skipped differential chart: {e}"),
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let cfg = BenchConfig {
        profile: args.profile.into(),
        seed: args.seed,
        progress: !args.no_progress,
    };

    match &args.cmd {
        Command::Run {
            provider,
            size,
            source,
            data_dir,
            count,
            out,
        } => {
            let providers = if provider.is_empty() {
                ProviderKind::all().to_vec()
            } else {
                provider.clone()
            };
            let sizes = if size.is_empty() {
                vec![SizeClass::Small, SizeClass::Large]
            } else {
                size.clone()
            };
            let source = source_for(*source, cfg.seed, data_dir.as_deref())?;
            run(&cfg, &providers, &sizes, &source, *count, out)?;
        }
        Command::Report { input, output } => report(input, output)?,
        Command::GenerateDataset {
            size,
            source,
            output,
        } => {
            let source = source_for(*source, cfg.seed, None)?;
            fs::create_dir_all(output)?;
            let ds = dataset::get_dataset(*size, &source)?;
            let path = dataset::dataset_path(output, *size);

            let start = std::time::Instant::now();
            dataset::write_dataset(&path, &ds, &source)?;
            let elapsed = start.elapsed();

            eprintln!("Dataset saved: {}", path.display());
            eprintln!("  Bars: {}", ds.bars());
            eprintln!("  Fingerprint: {}", dataset::fingerprint(&ds));
            eprintln!("  Written in {:.2}s", elapsed.as_secs_f64());
        }
        Command::DatasetInfo { path } => {
            let (meta, ds) = dataset::load_dataset(path)?;
            eprintln!("Dataset: {}", path.display());
            eprintln!("  Bars: {}", meta.bars);
            eprintln!("  Source: {:?}", meta.source);
            eprintln!("  Fingerprint: {}", dataset::fingerprint(&ds));

            let file_size = fs::metadata(path)?.len();
            eprintln!("  File size: {:.2} MB", file_size as f64 / 1_048_576.0);
        }
    }

    Ok(())
}
