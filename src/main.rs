// Command-line entry point for c_testsmith.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use c_testsmith::application::GenerateUsecase;
use c_testsmith::config::ToolchainConfig;
use c_testsmith::infrastructure::toolchain::check_tool_available;
use c_testsmith::infrastructure::{CSourceParser, ClangGdbToolchain, WorkArea};
use c_testsmith::ports::artifact_exporter::FileExporter;
use c_testsmith::ports::{CallGraphBuilder, SourcePreprocessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthesize C unit tests from a captured execution", long_about = None)]
struct Cli {
    /// C source file containing the functions under test
    #[arg(short, long)]
    file: PathBuf,

    /// Top (entry) function; every function it reaches gets a test
    #[arg(short, long)]
    top: String,

    /// Work area for binaries, debugger transcripts and generated units
    #[arg(long, default_value = "tmp/")]
    tmp_folder: PathBuf,

    /// Toolchain configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Also write the report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ToolchainConfig::load(cli.config.as_deref())?;
    for tool in [&config.compiler, &config.debugger] {
        match check_tool_available(tool) {
            Ok(version) => tracing::info!("[Toolchain] using {}: {}", tool, version),
            Err(e) => tracing::warn!("[Toolchain] {}", e),
        }
    }

    let source = fs::read_to_string(&cli.file)
        .with_context(|| format!("Cannot read source file {}", cli.file.display()))?;
    let toolchain = ClangGdbToolchain::new(config.clone(), &cli.file);
    let expanded = toolchain
        .preprocess()
        .with_context(|| format!("Cannot preprocess {}", cli.file.display()))?;
    let graph = CSourceParser::for_expansion_of(source)
        .build_call_graph(&expanded)
        .with_context(|| format!("Cannot parse {}", cli.file.display()))?;
    tracing::info!(
        functions = graph.nodes.len(),
        file = %cli.file.display(),
        "[Parse] call graph built"
    );

    fs::create_dir_all(&cli.tmp_folder)
        .with_context(|| format!("Cannot create work area {}", cli.tmp_folder.display()))?;
    let work_area = WorkArea::new(&cli.tmp_folder);

    let usecase = GenerateUsecase {
        toolchain: &toolchain,
        exporter: &FileExporter,
        work_area: &work_area,
        word_size: config.word_size,
    };
    let report = usecase.run(&graph, &cli.top)?;

    let rendered = match cli.format {
        ReportFormat::Text => report.render_text(),
        ReportFormat::Json => report.to_json().context("Cannot serialize report")? + "\n",
    };
    print!("{}", rendered);
    if let Some(path) = &cli.report {
        fs::write(path, &rendered).with_context(|| format!("Cannot write report {}", path.display()))?;
    }
    Ok(())
}
