use std::process::ExitCode;

use anstream::eprintln;
use anyhow::Context as _;
use camino::Utf8PathBuf;
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use tracing_subscriber::EnvFilter;

use flowlint::{
    AnalyzeOptions, analyze,
    cache::Caches,
    config::Config,
    render::render_plain,
};

/// Finds problems in CI workflow files, and fixes some of them.
#[derive(Parser)]
#[command(about, version)]
struct App {
    /// Workflow files to analyze.
    #[arg(required = true)]
    files: Vec<Utf8PathBuf>,

    /// Apply available autofixes in place.
    #[arg(long)]
    fix: bool,

    /// Path to a configuration file.
    ///
    /// Defaults to probing flowlint.yml, flowlint.yaml, and
    /// .github/flowlint.yml in the working directory.
    #[arg(short, long, env = "FLOWLINT_CONFIG")]
    config: Option<Utf8PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn main() -> ExitCode {
    let app = App::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(app.verbose.tracing_level_filter().into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&app) {
        Ok(exit) => exit,
        Err(err) => {
            eprintln!("fatal: {err:?}");
            ExitCode::from(2)
        }
    }
}

fn run(app: &App) -> anyhow::Result<ExitCode> {
    let config = match &app.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(Utf8PathBuf::from(".").as_path())?,
    };

    let caches = std::sync::Arc::new(Caches::local("."));
    let options = AnalyzeOptions {
        fix: app.fix,
        cancel: Default::default(),
    };

    let mut any_findings = false;
    let mut stdout = anstream::stdout().lock();

    for path in &app.files {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {path}"))?;

        let analysis = analyze(&source, &config, &caches, &options)
            .with_context(|| format!("failed to analyze {path}"))?;

        if !analysis.diagnostics.is_empty() {
            any_findings = true;
            render_plain(&mut stdout, path.as_str(), &analysis.diagnostics)?;
        }

        if let Some(fixed) = analysis.fixed {
            std::fs::write(path, fixed)
                .with_context(|| format!("failed to write fixes to {path}"))?;
            tracing::info!("applied fixes to {path}");
        }
    }

    Ok(if any_findings {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
