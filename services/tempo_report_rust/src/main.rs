//! Tempo Report Service (Rust)
//!
//! Responsibilities:
//! - Load normalized per-game possession records and closing totals from a
//!   JSON slate file
//! - Run the tempo engine over every game in parallel
//! - Print the per-scope residual statistics table and the period-2
//!   faster/slower verdict for each game
//! - Tally verdicts across the slate (by median, p-value, and mean)
//! - Optionally persist per-game significance reports as JSON for cache
//!   collaborators

use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempo_rust_core::models::{AggregateStats, SignificanceReport, TempoAnalysis};
use tempo_rust_core::{
    ChangePointDetector, GameInput, PossStartType, StdDevTable, TempoAnalyzer, TempoVerdict,
    DEFAULT_BANDWIDTH,
};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
struct Config {
    /// Kernel smoother bandwidth in possession-index units.
    bandwidth: f64,
    /// Change-point comparison window, in possessions.
    cp_window: usize,
    /// Minimum |z| for a change point.
    cp_threshold: f64,
    /// Optional JSON file with a calibrated std-dev table.
    std_dev_table: Option<PathBuf>,
    /// Optional directory for per-game significance report JSON.
    report_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bandwidth: env::var("TEMPO_BANDWIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BANDWIDTH),
            cp_window: env::var("CP_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            cp_threshold: env::var("CP_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3.0),
            std_dev_table: env::var("STD_DEV_TABLE").ok().map(PathBuf::from),
            report_dir: env::var("REPORT_DIR").ok().map(PathBuf::from),
        }
    }
}

fn load_std_devs(config: &Config) -> Result<StdDevTable> {
    match &config.std_dev_table {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading std-dev table {}", path.display()))?;
            let table = serde_json::from_str(&raw)
                .with_context(|| format!("parsing std-dev table {}", path.display()))?;
            info!("loaded std-dev table from {}", path.display());
            Ok(table)
        }
        None => Ok(StdDevTable::default()),
    }
}

// ============================================================================
// Report formatting
// ============================================================================

/// Table row order matches the board display: overall first, then dead-ball
/// starts, then live-ball starts, then the catch-all bucket.
const TYPE_ROWS: [PossStartType; 5] = [
    PossStartType::OppoMadeShot,
    PossStartType::OppoMadeFt,
    PossStartType::Rebound,
    PossStartType::Turnover,
    PossStartType::Other,
];

fn fmt_cells(stats: Option<&AggregateStats>) -> String {
    match stats {
        Some(s) if s.count > 0 => format!(
            "{:>4} {:>7} {:>7} {:>6} {:>6}",
            s.count,
            format!("{:+.1}s", s.mean),
            format!("{:+.1}s", s.median),
            format!("{:.1}%", s.pct_positive),
            format!("{:.1}%", s.p_value * 100.0),
        ),
        _ => format!("{:>4} {:>7} {:>7} {:>6} {:>6}", "-", "-", "-", "-", "-"),
    }
}

fn print_report(analysis: &TempoAnalysis, report: &SignificanceReport) {
    println!("Game {}", analysis.game_id);
    if !analysis.change_points.is_empty() {
        println!("  change points at {:?}", analysis.change_points);
    }

    println!(
        "  {:<10} | {:^33} | {:^33} | {:^33}",
        "Metric", "Period 1", "Period 2", "Game"
    );
    let sub = format!(
        "{:>4} {:>7} {:>7} {:>6} {:>6}",
        "Cnt", "Mean", "Med", "Slow%", "P-val"
    );
    println!("  {:<10} | {} | {} | {}", "", sub, sub, sub);

    println!(
        "  {:<10} | {} | {} | {}",
        "Overall",
        fmt_cells(Some(&report.period_1)),
        fmt_cells(Some(&report.period_2)),
        fmt_cells(Some(&report.overall)),
    );
    for bucket in TYPE_ROWS {
        if !report.by_type.contains_key(&bucket) {
            continue;
        }
        println!(
            "  {:<10} | {} | {} | {}",
            bucket.label(),
            fmt_cells(report.by_type_p1.get(&bucket)),
            fmt_cells(report.by_type_p2.get(&bucket)),
            fmt_cells(report.by_type.get(&bucket)),
        );
    }

    if report.period_2.count > 0 {
        println!(
            "  second half ran {} than expected (median residual {:+.1}s, p {:.1}%)",
            report.second_half_verdict().as_str(),
            report.period_2.median,
            report.period_2.p_value * 100.0,
        );
    } else {
        println!("  no period 2 possessions yet; verdict pending");
    }
    println!();
}

// ============================================================================
// Slate summary (faster/slower tallies by metric)
// ============================================================================

#[derive(Debug, Default)]
struct SlateSummary {
    total: usize,
    no_data: usize,
    median_faster: usize,
    median_slower: usize,
    pval_faster: usize,
    pval_slower: usize,
    mean_faster: usize,
    mean_slower: usize,
}

impl SlateSummary {
    fn record(&mut self, significance: Option<&SignificanceReport>) {
        let Some(report) = significance.filter(|r| r.period_2.count > 0) else {
            self.no_data += 1;
            return;
        };
        self.total += 1;

        match report.second_half_verdict() {
            TempoVerdict::Faster => self.median_faster += 1,
            TempoVerdict::Slower => self.median_slower += 1,
        }
        if report.period_2.p_value < 0.5 {
            self.pval_faster += 1;
        } else {
            self.pval_slower += 1;
        }
        if report.period_2.mean < 0.0 {
            self.mean_faster += 1;
        } else {
            self.mean_slower += 1;
        }
    }

    fn print(&self) {
        println!("{}", "=".repeat(60));
        println!("Period 2 Residual Statistics Summary");
        println!("{}", "=".repeat(60));
        println!("Games with P2 data: {}", self.total);
        println!("Games without P2 significance: {}", self.no_data);
        if self.total == 0 {
            return;
        }
        let pct = |n: usize| n as f64 / self.total as f64 * 100.0;
        println!(
            "By median:  faster {} ({:.1}%) / slower {} ({:.1}%)",
            self.median_faster,
            pct(self.median_faster),
            self.median_slower,
            pct(self.median_slower),
        );
        println!(
            "By p-value: faster {} ({:.1}%) / slower {} ({:.1}%)",
            self.pval_faster,
            pct(self.pval_faster),
            self.pval_slower,
            pct(self.pval_slower),
        );
        println!(
            "By mean:    faster {} ({:.1}%) / slower {} ({:.1}%)",
            self.mean_faster,
            pct(self.mean_faster),
            self.mean_slower,
            pct(self.mean_slower),
        );
    }
}

// ============================================================================
// Main
// ============================================================================

fn write_report(dir: &Path, analysis: &TempoAnalysis, report: &SignificanceReport) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating report dir {}", dir.display()))?;
    let path = dir.join(format!("{}_residuals.json", analysis.game_id));
    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let slate_path = env::args()
        .nth(1)
        .context("usage: tempo_report <games.json>")?;
    let config = Config::default();
    info!("config: {:?}", config);

    let raw = fs::read_to_string(&slate_path)
        .with_context(|| format!("reading slate file {}", slate_path))?;
    let games: Vec<GameInput> =
        serde_json::from_str(&raw).with_context(|| format!("parsing slate file {}", slate_path))?;
    info!("loaded {} games from {}", games.len(), slate_path);

    let analyzer = TempoAnalyzer::with_defaults()
        .with_std_devs(load_std_devs(&config)?)
        .with_bandwidth(config.bandwidth)
        .with_detector(ChangePointDetector::new(config.cp_window, config.cp_threshold));

    let analyses = analyzer.analyze_batch(&games);

    let mut summary = SlateSummary::default();
    for analysis in &analyses {
        match &analysis.significance {
            Some(report) => {
                print_report(analysis, report);
                if let Some(dir) = &config.report_dir {
                    write_report(dir, analysis, report)?;
                }
            }
            None => {
                warn!(
                    "game {}: no market total or degraded aggregation; trend only",
                    analysis.game_id
                );
                println!("Game {}: no significance data\n", analysis.game_id);
            }
        }
        summary.record(analysis.significance.as_ref());
    }

    summary.print();
    Ok(())
}
