//! Log setup for host link processes.
//!
//! Every event about a connection carries a `link` field. Transitions add
//! `from`, `to` and `trigger`; connect attempts add `generation` and
//! `attempt`; disable gate changes add `key`.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with JSON format
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with specific level.
///
/// `RUST_LOG` takes precedence over `level`. A second call keeps the first subscriber.
pub fn init_with_level(level: &str) {
    let _ = tracing::subscriber::set_global_default(json_subscriber(
        filter(level),
        std::io::stdout,
    ));
}

/// Initialize logging for tests (plain format)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn json_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer)
        .json()
        .finish()
}
