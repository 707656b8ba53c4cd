//! Campaign-wide compliance runs.
//!
//! The runner reads the campaign document, enumerates the product x
//! aspect-ratio x market cartesian product as lazy check tasks, runs the
//! per-image check for every task whose candidate image exists, and
//! aggregates the verdicts into a [`ComplianceSummary`]. Only a failure to
//! load the campaign document itself is fatal, and even that is returned as
//! a summary rather than an error.

use crate::compliance::{check_logo_in_image, CheckConfig, ComplianceResult};
use crate::trace::{trace_event, trace_span};
use crate::util::{LogoMatchError, LogoMatchResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Default directory for bare campaign file names.
const CAMPAIGNS_DIR: &str = "input/campaigns";

/// Campaign document, covering the fields the compliance engine reads.
/// Structural validation is the job of an upstream validator; unknown keys
/// are ignored here.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignDoc {
    /// Campaign identity and target markets.
    pub campaign: CampaignMeta,
    /// Creative settings (aspect ratios).
    #[serde(default)]
    pub creative: Creative,
    /// Products with their asset references.
    #[serde(default)]
    pub products: Vec<Product>,
}

/// `campaign:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignMeta {
    /// Campaign identifier used in output paths.
    pub id: String,
    /// Target markets.
    #[serde(default)]
    pub markets: Vec<Market>,
}

/// One market entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Market {
    /// Market identifier used in output paths.
    pub market_id: String,
}

/// `creative:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Creative {
    /// Aspect ratios such as `1x1` or `16x9`.
    #[serde(default)]
    pub aspect_ratios: Vec<String>,
}

/// One product entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    /// Product identifier used in output paths.
    pub id: String,
    /// Asset references.
    #[serde(default)]
    pub assets: Assets,
}

/// `products[].assets` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Assets {
    /// Logo file name under the assets directory. Absent means the product
    /// is skipped entirely, which is not an error.
    pub logo: Option<String>,
}

/// One unit of compliance work: a (product, aspect ratio, market) triple
/// with its resolved input paths.
#[derive(Debug, Clone)]
pub struct CheckTask {
    /// Product identifier.
    pub product_id: String,
    /// Aspect ratio label.
    pub aspect_ratio: String,
    /// Market identifier.
    pub market_id: String,
    /// Reference logo path.
    pub logo_path: PathBuf,
    /// Expected candidate image path.
    pub image_path: PathBuf,
}

/// Options for a campaign compliance run.
#[derive(Debug, Clone)]
pub struct ComplianceOptions {
    /// Campaign document path. A bare file name resolves under
    /// `input/campaigns/`.
    pub campaign_file: PathBuf,
    /// Directory holding logo assets.
    pub assets_dir: PathBuf,
    /// Root directory of generated campaign images.
    pub output_dir: PathBuf,
    /// Per-image check configuration.
    pub check: CheckConfig,
    /// Print progress narration to stdout. No effect on results.
    pub verbose: bool,
    /// Run checks in parallel (requires the `rayon` feature; ignored
    /// otherwise). Result order matches the sequential run either way.
    pub parallel: bool,
}

impl Default for ComplianceOptions {
    fn default() -> Self {
        Self {
            campaign_file: PathBuf::from("holiday_campaign.yaml"),
            assets_dir: PathBuf::from("input/assets"),
            output_dir: PathBuf::from("output"),
            check: CheckConfig::default(),
            verbose: false,
            parallel: false,
        }
    }
}

/// A per-image verdict with its task context.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// Product identifier.
    pub product_id: String,
    /// Aspect ratio label.
    pub aspect_ratio: String,
    /// Market identifier.
    pub market_id: String,
    /// Candidate image path that was checked.
    pub image_path: PathBuf,
    /// Logo path that was searched for.
    pub logo_path: PathBuf,
    /// The check outcome.
    #[serde(flatten)]
    pub check: ComplianceResult,
}

/// Aggregate outcome of a campaign compliance run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplianceSummary {
    /// Images actually checked (skipped combinations excluded).
    pub total_checked: usize,
    /// Images where the logo was detected.
    pub passed: usize,
    /// Images where the logo was not detected.
    pub failed: usize,
    /// Images that could not be checked.
    pub errors: usize,
    /// Per-image detail in enumeration order.
    pub results: Vec<TaskResult>,
    /// Set when the campaign document itself could not be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComplianceSummary {
    fn fatal(message: String) -> Self {
        Self {
            errors: 1,
            error: Some(message),
            ..Self::default()
        }
    }

    /// True when every checked image passed and nothing errored. The
    /// orchestrating workflow treats a non-compliant run as advisory, not
    /// fatal.
    pub fn is_compliant(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Resolves a campaign file argument: bare single-component relative names
/// are looked up under `input/campaigns/`.
pub fn resolve_campaign_path(path: &Path) -> PathBuf {
    let single_component = path.components().count() == 1
        && matches!(path.components().next(), Some(Component::Normal(_)));
    if path.is_relative() && single_component {
        Path::new(CAMPAIGNS_DIR).join(path)
    } else {
        path.to_path_buf()
    }
}

/// Loads and parses a campaign document.
pub fn load_campaign(path: &Path) -> LogoMatchResult<CampaignDoc> {
    let text = std::fs::read_to_string(path).map_err(|err| LogoMatchError::CampaignLoad {
        reason: format!("{}: {err}", path.display()),
    })?;
    serde_yaml::from_str(&text).map_err(|err| LogoMatchError::CampaignLoad {
        reason: format!("{}: {err}", path.display()),
    })
}

/// Lazily enumerates the check tasks of a campaign in the fixed
/// products -> aspect ratios -> markets order. Products without a logo asset
/// are omitted. The iterator is restartable: call again for a fresh pass.
pub fn check_tasks<'a>(
    doc: &'a CampaignDoc,
    assets_dir: &'a Path,
    output_dir: &'a Path,
) -> impl Iterator<Item = CheckTask> + 'a {
    let campaign_id = &doc.campaign.id;
    doc.products
        .iter()
        .filter_map(move |product| {
            product
                .assets
                .logo
                .as_ref()
                .map(|logo| (product, assets_dir.join(logo)))
        })
        .flat_map(move |(product, logo_path)| {
            doc.creative.aspect_ratios.iter().flat_map(move |ratio| {
                let logo_path = logo_path.clone();
                doc.campaign.markets.iter().map(move |market| {
                    let image_name = format!(
                        "campaign_{}_{}_{}.png",
                        product.id, market.market_id, ratio
                    );
                    CheckTask {
                        product_id: product.id.clone(),
                        aspect_ratio: ratio.clone(),
                        market_id: market.market_id.clone(),
                        logo_path: logo_path.clone(),
                        image_path: output_dir
                            .join(campaign_id)
                            .join(&product.id)
                            .join(ratio)
                            .join(&market.market_id)
                            .join(image_name),
                    }
                })
            })
        })
}

/// Checks logo compliance for every generated image of a campaign.
///
/// Never returns an error and never panics for per-image failures: a
/// missing or unparsable campaign document yields a summary with
/// `errors == 1` and empty results, and individual check failures become
/// error-carrying results.
pub fn check_campaign_compliance(options: &ComplianceOptions) -> ComplianceSummary {
    let verbose = options.verbose;
    if verbose {
        print_banner("LOGO COMPLIANCE CHECK");
        println!();
    }

    let campaign_path = resolve_campaign_path(&options.campaign_file);
    if !campaign_path.exists() {
        return ComplianceSummary::fatal(format!(
            "Campaign file not found: {}",
            campaign_path.display()
        ));
    }
    let doc = match load_campaign(&campaign_path) {
        Ok(doc) => doc,
        Err(err) => return ComplianceSummary::fatal(err.to_string()),
    };

    let _span = trace_span!("campaign_compliance", campaign = %doc.campaign.id).entered();

    if verbose {
        println!("Campaign: {}", doc.campaign.id);
        println!("Products: {}", doc.products.len());
        println!("Markets: {}", doc.campaign.markets.len());
        println!("Aspect Ratios: {}", doc.creative.aspect_ratios.len());
        println!();
        for product in &doc.products {
            if product.assets.logo.is_none() {
                println!("[SKIP] {}: No logo specified in campaign", product.id);
            }
        }
    }

    let mut tasks = Vec::new();
    for task in check_tasks(&doc, &options.assets_dir, &options.output_dir) {
        if task.image_path.exists() {
            tasks.push(task);
        } else if verbose {
            println!(
                "[SKIP] {} | {} | {}: Image not found",
                task.product_id, task.aspect_ratio, task.market_id
            );
        }
    }
    trace_event!("tasks_enumerated", count = tasks.len());

    let checks = run_checks(&tasks, options);

    let mut summary = ComplianceSummary::default();
    for (task, check) in tasks.into_iter().zip(checks) {
        summary.total_checked += 1;
        if check.error.is_some() {
            summary.errors += 1;
        } else if check.found {
            summary.passed += 1;
        } else {
            summary.failed += 1;
        }
        summary.results.push(TaskResult {
            product_id: task.product_id,
            aspect_ratio: task.aspect_ratio,
            market_id: task.market_id,
            image_path: task.image_path,
            logo_path: task.logo_path,
            check,
        });
    }

    if verbose {
        print_summary(&summary);
    }
    summary
}

#[cfg(feature = "rayon")]
fn run_checks(tasks: &[CheckTask], options: &ComplianceOptions) -> Vec<ComplianceResult> {
    if options.parallel {
        // Each check only reads its two input images; an order-preserving
        // gather keeps the output identical to the sequential run. Narration
        // replays after the gather, in task order.
        let checks: Vec<_> = tasks
            .par_iter()
            .map(|task| check_logo_in_image(&task.image_path, &task.logo_path, &options.check))
            .collect();
        if options.verbose {
            for (task, check) in tasks.iter().zip(&checks) {
                println!("{}", checking_line(task));
                println!("{}", status_line(check));
                println!();
            }
        }
        checks
    } else {
        run_checks_sequential(tasks, options)
    }
}

#[cfg(not(feature = "rayon"))]
fn run_checks(tasks: &[CheckTask], options: &ComplianceOptions) -> Vec<ComplianceResult> {
    run_checks_sequential(tasks, options)
}

fn run_checks_sequential(tasks: &[CheckTask], options: &ComplianceOptions) -> Vec<ComplianceResult> {
    tasks
        .iter()
        .map(|task| {
            if options.verbose {
                println!("{}", checking_line(task));
            }
            let check = check_logo_in_image(&task.image_path, &task.logo_path, &options.check);
            if options.verbose {
                println!("{}", status_line(&check));
                println!();
            }
            check
        })
        .collect()
}

fn checking_line(task: &CheckTask) -> String {
    format!(
        "Checking: {} | {} | {}",
        task.product_id, task.aspect_ratio, task.market_id
    )
}

fn status_line(check: &ComplianceResult) -> String {
    match (&check.error, check.found) {
        (Some(error), _) => format!("  [ERROR] {error}"),
        (None, true) => format!(
            "  [SUCCESS] Logo detected ({} matches, {}% confidence)",
            check.match_count,
            (check.confidence * 100.0) as u32
        ),
        (None, false) => format!(
            "  [WARNING] Logo NOT detected ({} matches, below threshold)",
            check.match_count
        ),
    }
}

fn print_banner(title: &str) {
    let rule = "=".repeat(70);
    println!("{rule}");
    println!("{title}");
    println!("{rule}");
}

fn print_summary(summary: &ComplianceSummary) {
    print_banner("COMPLIANCE SUMMARY");
    println!("Total images checked: {}", summary.total_checked);
    println!("[SUCCESS] Passed (logo detected): {}", summary.passed);
    println!("[WARNING] Failed (logo missing): {}", summary.failed);
    if summary.errors > 0 {
        println!("[ERROR] Errors: {}", summary.errors);
    }
    if summary.total_checked > 0 {
        let pass_rate = summary.passed as f64 / summary.total_checked as f64 * 100.0;
        println!("Pass rate: {pass_rate:.1}%");
    }
    println!();
}
