//! Command dispatch and handlers.

pub mod scan;

use std::env;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::cache::ReachabilityCache;
use crate::cancel::CancellationToken;
use crate::checker::ReachabilityChecker;
use crate::cli::Cli;
use crate::config::Config;
use crate::context::ServiceContext;
use crate::report::Summary;

/// Directory to record source interactions into.
pub const RECORD_ENV: &str = "CLANK_RECORD";
/// Cassette file to answer source interactions from.
pub const REPLAY_ENV: &str = "CLANK_REPLAY";

fn env_path(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// Run a scan for the parsed arguments, writing reports to stdout.
///
/// When `CLANK_REPLAY` names a cassette, source calls are answered from it.
/// Otherwise, when `CLANK_RECORD` names a directory, source calls are
/// recorded to `source.cassette.yaml` there.
///
/// # Errors
///
/// Returns an error string if configuration is invalid, the context cannot
/// be built, or the report cannot be written. Findings are not errors; they
/// are counted in the returned [`Summary`].
pub fn dispatch(cli: &Cli) -> Result<Summary, String> {
    let config = Config::from_cli(cli)?;
    let ctx = if let Some(cassette) = env_path(REPLAY_ENV) {
        ServiceContext::replaying(&config, Path::new(&cassette))?
    } else if let Some(dir) = env_path(RECORD_ENV) {
        ServiceContext::recording(&config, Path::new(&dir))?
    } else {
        ServiceContext::live(&config)?
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    let mut stdout = std::io::stdout().lock();
    let result = runtime.block_on(run_with_context(&ctx, &config, &mut stdout));

    // Finish recording after the scan completes (even on error).
    if let Some(path) = ctx.finish()? {
        eprintln!("Recording saved to: {}", path.display());
    }
    result
}

/// Scan `config.targets` with the given context.
///
/// Ctrl-C cancels in-flight checks; they are reported as errors and the
/// scan still completes its report.
///
/// # Errors
///
/// Returns an error string if the report cannot be written.
pub async fn run_with_context(
    ctx: &ServiceContext,
    config: &Config,
    out: &mut dyn Write,
) -> Result<Summary, String> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling in-flight checks");
                cancel.cancel();
            }
        })
    };

    let checker = ReachabilityChecker::new(
        Arc::clone(&ctx.sources),
        Arc::new(ReachabilityCache::new()),
        cancel,
    );
    let result = scan::Scanner::new(ctx, &checker, config.jobs).run(&config.targets, out).await;
    watcher.abort();
    result
}
