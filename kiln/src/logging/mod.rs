//! Logging setup.
//!
//! Console output is always enabled; when `LOG_DIR` is set a daily-rolling
//! file layer is added as well. The returned guard must be kept alive for
//! the lifetime of the process so buffered file output is flushed.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::Result;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "kiln=info,tower_http=warn,kube=warn";

/// Initialize the tracing subscriber for a kiln process.
///
/// `RUST_LOG` overrides the default directive. Returns a guard for the file
/// writer when `LOG_DIR` is configured.
pub fn init_logging(log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "kiln.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();

            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(file_layer)
                .init();

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .init();

            Ok(None)
        }
    }
}
