use std::io;
use std::path::{Path, PathBuf};

use ojol_adapters::export::{export_document, ExportOptions};
use ojol_adapters::mysql::MysqlDataBackend;
use ojol_core::config::AppConfig;
use ojol_core::pages::REPORTS;
use ojol_core::report::{ReportDefinition, ReportTab};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseOutcome {
    Run,
    HelpRequested,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ReportArgs {
    list: bool,
    report: Option<usize>,
    out: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let mut args = ReportArgs::default();
    if parse_args_from(std::env::args().skip(1), &mut args)? == ParseOutcome::HelpRequested {
        print_help();
        return Ok(());
    }

    if args.list {
        for definition in REPORTS {
            println!("{}", definition.title);
        }
        return Ok(());
    }

    let definition = select_report(args.report)?;
    let config = load_config(args.config_path.as_deref())?;
    let out = args.out.unwrap_or_else(|| {
        ReportTab::new(definition).default_export_path(&config.export_dir())
    });

    let backend = MysqlDataBackend::from_config(&config.database);
    let options = ExportOptions::from_config(&config);
    let exported = export_report(&backend, definition, &out, &options).await;
    backend.disconnect().await.map_err(io_other)?;
    let rows = exported?;

    println!("report.title={}", definition.title);
    println!("report.rows={rows}");
    println!("report.path={}", out.display());
    Ok(())
}

async fn export_report(
    backend: &MysqlDataBackend,
    definition: ReportDefinition,
    out: &Path,
    options: &ExportOptions,
) -> io::Result<usize> {
    let mut tab = ReportTab::new(definition);
    tab.load(backend).await.map_err(io_other)?;
    let document = tab.document().map_err(io_other)?;
    let rows = export_document(out, &document, options).map_err(io_other)?;
    info!(report = definition.title, rows, path = %out.display(), "report exported");
    Ok(rows)
}

fn load_config(path: Option<&Path>) -> io::Result<AppConfig> {
    let Some(path) = path else {
        return AppConfig::load_default().map_err(io_other);
    };
    let mut config = AppConfig::load_from_path(path).map_err(io_other)?;
    config
        .apply_overrides(|name| std::env::var(name).ok())
        .map_err(io_other)?;
    Ok(config)
}

// Reports are numbered from 1, as in their titles.
fn select_report(number: Option<usize>) -> io::Result<ReportDefinition> {
    let number = number.ok_or_else(|| io_other("--report is required (see --list)"))?;
    number
        .checked_sub(1)
        .and_then(|index| REPORTS.get(index).copied())
        .ok_or_else(|| {
            io_other(format!(
                "report {number} does not exist; expected 1..={}",
                REPORTS.len()
            ))
        })
}

fn parse_args_from(
    args: impl IntoIterator<Item = String>,
    config: &mut ReportArgs,
) -> io::Result<ParseOutcome> {
    let mut args = args.into_iter();
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::HelpRequested),
            "--list" => config.list = true,
            "--report" => {
                config.report = Some(
                    next_value(&mut args, "--report")?
                        .parse::<usize>()
                        .map_err(|error| io_other(format!("invalid --report value: {error}")))?,
                );
            }
            "--out" => config.out = Some(PathBuf::from(next_value(&mut args, "--out")?)),
            "--config" => {
                config.config_path = Some(PathBuf::from(next_value(&mut args, "--config")?));
            }
            other => return Err(io_other(format!("unknown argument: {other}"))),
        }
    }

    Ok(ParseOutcome::Run)
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> io::Result<String> {
    args.next()
        .ok_or_else(|| io_other(format!("missing value for {flag}")))
}

fn print_help() {
    println!(
        "ojol report exporter\n\n\
Usage:\n  cargo run -p ojol-app --bin ojol-report -- [OPTIONS]\n\n\
Options:\n  --list                 Print the available reports\n  --report <n>           Report number to export (1-10)\n  --out <path>           Output file; .pdf .html .csv or .json (default: <export_dir>/<title>.pdf)\n  --config <path>        Config file (default: the ojol-admin config.toml)\n  -h, --help             Show this help\n"
    );
}

fn io_other(error: impl std::fmt::Display) -> io::Error {
    io::Error::other(error.to_string())
}
