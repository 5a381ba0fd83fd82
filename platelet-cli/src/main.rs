use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use platelet_core::{MatchConfig, MatchedResult, PatientProfile};
use platelet_records::{summarize_records_str, summarize_records_strict, RecordSummary};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "platelet-cli",
    about = "Ghép truyền tiểu cầu với xét nghiệm PLT và tính CCI."
)]
struct Args {
    /// File văn bản chứa các dòng truyền (`MM/DD/YY HHMM to HHMM`).
    #[arg(short, long)]
    transfusions: PathBuf,

    /// File văn bản chứa kết quả đếm tiểu cầu.
    #[arg(short, long)]
    counts: PathBuf,

    /// Cân nặng (kg).
    #[arg(long)]
    weight: f64,

    /// Chiều cao (cm).
    #[arg(long)]
    height: f64,

    /// Số đơn vị tiểu cầu mỗi lần truyền.
    #[arg(long, default_value_t = 1.0)]
    units: f64,

    /// File JSON cấu hình cửa sổ (thiếu trường nào thì dùng mặc định).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    pre_window_hours: Option<f64>,

    #[arg(long)]
    post_window_hours: Option<f64>,

    /// Dừng ở bản ghi lỗi đầu tiên thay vì bỏ qua.
    #[arg(long)]
    strict: bool,

    /// In báo cáo dạng JSON.
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let transfusion_text = read_text(&args.transfusions)?;
    let count_text = read_text(&args.counts)?;
    let config = load_config(&args)?;
    let profile = PatientProfile {
        weight_kg: args.weight,
        height_cm: args.height,
        units_transfused: args.units,
    };

    let summary = if args.strict {
        RecordSummary {
            report: summarize_records_strict(&transfusion_text, &count_text, &profile, &config)?,
            skipped: Vec::new(),
        }
    } else {
        summarize_records_str(&transfusion_text, &count_text, &profile, &config)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let report = &summary.report;
    println!(
        "BSA: {:.4} m²\nAdequate: {}\nInadequate: {}\nUnmatched: {}\nSkipped records: {}",
        report.dosing.body_surface_area,
        report.summary.adequate,
        report.summary.inadequate,
        report.summary.unmatched,
        summary.skipped.len()
    );
    print_section("Inadequate", report.inadequate());
    print_section("Adequate", report.adequate());
    print_section(
        "Unmatched",
        report.results.iter().filter(|result| result.cci.is_none()),
    );

    Ok(())
}

fn init_logger(verbose: bool) {
    let default_filter = if verbose {
        "platelet_records=debug,platelet_cli=debug,info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Không đọc được file {path:?}"))
}

fn load_config(args: &Args) -> anyhow::Result<MatchConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let data = read_text(path)?;
            serde_json::from_str::<MatchConfig>(&data)
                .with_context(|| format!("Config không hợp lệ: {path:?}"))?
        }
        None => MatchConfig::default(),
    };
    if let Some(hours) = args.pre_window_hours {
        config.pre_window_hours = hours;
    }
    if let Some(hours) = args.post_window_hours {
        config.post_window_hours = hours;
    }
    config.validate()?;
    info!(
        pre_window_hours = config.pre_window_hours,
        post_window_hours = config.post_window_hours,
        "using match windows"
    );
    Ok(config)
}

fn print_section<'a>(title: &str, results: impl Iterator<Item = &'a MatchedResult>) {
    let lines: Vec<String> = results.map(format_result_line).collect();
    if lines.is_empty() {
        return;
    }
    println!("\n{title}:");
    for line in lines {
        println!("  {line}");
    }
}

fn format_result_line(result: &MatchedResult) -> String {
    let count = |m: Option<&platelet_core::Measurement>| {
        m.map(|m| m.value.to_string()).unwrap_or_else(|| "-".to_string())
    };
    let cci = result
        .cci
        .map(|cci| format!("{cci:.0}"))
        .unwrap_or_else(|| "-".to_string());
    let delay = result
        .post_delay_minutes()
        .map(|minutes| format!(" ({minutes} min after)"))
        .unwrap_or_default();

    format!(
        "{} {}: pre={} post={}{} CCI={}",
        result.transfusion.date.format("%m/%d/%y"),
        result.transfusion.end_clock_time.format("%H%M"),
        count(result.pre_measurement.as_ref()),
        count(result.post_measurement.as_ref()),
        delay,
        cci
    )
}
