use clap::Parser;
use logomatch::{
    check_campaign_compliance, check_logo_in_image, CheckConfig, ComplianceOptions, RansacParams,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Brand logo compliance checker for campaign creatives")]
struct Cli {
    /// Campaign YAML file; bare names resolve under input/campaigns/.
    #[arg(value_name = "CAMPAIGN", conflicts_with_all = ["image", "logo"])]
    campaign: Option<PathBuf>,
    /// Single-image mode: candidate image to check.
    #[arg(long, requires = "logo")]
    image: Option<PathBuf>,
    /// Single-image mode: logo to search for.
    #[arg(long, requires = "image")]
    logo: Option<PathBuf>,
    /// Minimum feature matches for a found verdict.
    #[arg(long, default_value_t = 10)]
    min_matches: usize,
    /// Lowe ratio-test threshold in (0, 1).
    #[arg(long, default_value_t = 0.75)]
    ratio: f32,
    /// RANSAC reprojection tolerance in pixels.
    #[arg(long, default_value_t = 5.0)]
    reproj_tolerance: f64,
    /// Directory holding logo assets (campaign mode).
    #[arg(long, default_value = "input/assets")]
    assets_dir: PathBuf,
    /// Root directory of generated campaign images (campaign mode).
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// Write the JSON summary to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,
    /// Suppress progress narration.
    #[arg(short, long)]
    quiet: bool,
    /// Run checks in parallel (needs the rayon build feature).
    #[arg(long)]
    parallel: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

fn check_config(cli: &Cli) -> Result<CheckConfig, String> {
    if cli.min_matches == 0 {
        return Err("--min-matches must be at least 1".into());
    }
    if !(cli.ratio > 0.0 && cli.ratio < 1.0) {
        return Err("--ratio must be in (0, 1)".into());
    }
    Ok(CheckConfig {
        min_match_count: cli.min_matches,
        good_match_threshold: cli.ratio,
        ransac: RansacParams {
            inlier_threshold: cli.reproj_tolerance,
            ..RansacParams::default()
        },
        ..CheckConfig::default()
    })
}

fn emit_json(cli: &Cli, json: String) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.json {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("logomatch=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    let check = check_config(&cli)?;

    if let (Some(image), Some(logo)) = (&cli.image, &cli.logo) {
        let result = check_logo_in_image(image, logo, &check);
        let compliant = result.found && result.error.is_none();
        emit_json(&cli, serde_json::to_string_pretty(&result)?)?;
        return Ok(if compliant {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let Some(campaign) = cli.campaign.clone() else {
        return Err("provide a campaign file, or --image together with --logo".into());
    };

    let options = ComplianceOptions {
        campaign_file: campaign,
        assets_dir: cli.assets_dir.clone(),
        output_dir: cli.output_dir.clone(),
        check,
        verbose: !cli.quiet,
        parallel: cli.parallel,
    };
    let summary = check_campaign_compliance(&options);
    emit_json(&cli, serde_json::to_string_pretty(&summary)?)?;

    // Non-compliance is surfaced through the exit status; the broader
    // pipeline decides what to do with it.
    Ok(if summary.is_compliant() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
