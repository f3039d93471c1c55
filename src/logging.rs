//! Structured log output for the `ontomatch` binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// JSON-lines subscriber: one object per event, with thread ids and names.
///
/// Install it with `SubscriberInitExt::init`, which also routes `log`
/// records from the index crate through it.
pub fn subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_writer(writer)
        .json()
        .finish()
}

/// `RUST_LOG` if set, `info` otherwise.
pub fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
