//! Command-line front end for rule shadowing analysis

mod parallel;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use policy_engine::{
    ApplicationDefault, BundleValidator, ConfigLoader, CsvSources, PolicyLoader, ReportFormat,
    ShadowEvaluator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "policy-inspector")]
#[command(about = "Detect shadowed rules in firewall security policies", version)]
struct Args {
    /// Policy bundle to analyse (.toml, .json controller export, or .csv rules)
    #[arg(long, short = 'p')]
    policy: PathBuf,

    /// Address objects sheet for a .csv policy
    #[arg(long, value_name = "CSV")]
    address_objects: Option<PathBuf>,

    /// Address groups sheet for a .csv policy
    #[arg(long, value_name = "CSV")]
    address_groups: Option<PathBuf>,

    /// Config file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Compare addresses by resolved value instead of by name
    #[arg(long)]
    resolve_addresses: bool,

    /// Treatment of application-default services: opaque | broad
    #[arg(long, value_name = "POLICY")]
    application_default: Option<ApplicationDefault>,

    /// Device group to analyse (can be used multiple times, default: all)
    #[arg(long = "device-group", short = 'g', value_name = "NAME")]
    device_groups: Vec<String>,

    /// Output format: text | json | toml | csv
    #[arg(long, short = 'f')]
    format: Option<ReportFormat>,

    /// Also list rules that are not shadowed
    #[arg(long)]
    show_clear: bool,

    /// Evaluate device groups concurrently
    #[arg(long)]
    parallel: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout carries the report
    let env_filter = if args.verbose {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
    } else {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration; flags win over the file
    let mut config = ConfigLoader::load_or_default(args.config.clone())
        .context("Failed to load configuration")?;
    if args.resolve_addresses {
        config.engine.resolve_addresses = true;
    }
    if let Some(policy) = args.application_default {
        config.engine.application_default = policy;
    }
    if !args.device_groups.is_empty() {
        config.device_groups = args.device_groups.clone();
    }
    if let Some(format) = args.format {
        config.report.format = format;
    }
    if args.show_clear {
        config.report.show_clear = true;
    }

    let bundle = load_policy(&args)
        .with_context(|| format!("Failed to load policy from {}", args.policy.display()))?;

    for warning in BundleValidator::validate(&bundle) {
        tracing::warn!("{}", warning);
    }

    let options = config.engine.options();
    tracing::info!(
        "Analysing with {:?} address comparison, application-default {:?}",
        options.address_mode,
        options.application_default
    );

    let bundle = Arc::new(bundle);
    let report = if args.parallel {
        parallel::evaluate_parallel(Arc::clone(&bundle), options, &config.device_groups).await?
    } else {
        bundle
            .evaluate(&ShadowEvaluator::new(options), &config.device_groups)
            .context("Shadowing analysis failed")?
    };

    let rendered = report::render(&report, &bundle, &config.report)?;
    print!("{}", rendered);
    Ok(())
}

/// CSV policies may come with separate address sheets
fn load_policy(args: &Args) -> Result<policy_engine::PolicyBundle> {
    if args.address_objects.is_none() && args.address_groups.is_none() {
        return Ok(PolicyLoader::load_from_file(&args.policy)?);
    }

    let is_csv = args
        .policy
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        anyhow::bail!("--address-objects and --address-groups only apply to a .csv policy");
    }

    let mut sources = CsvSources::new(&args.policy);
    if let Some(path) = &args.address_objects {
        sources = sources.with_address_objects(path);
    }
    if let Some(path) = &args.address_groups {
        sources = sources.with_address_groups(path);
    }
    Ok(sources.load()?)
}
