use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;
use tracing_tree::time::Uptime;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter, e.g. `RUST_LOG=shellwm::interaction=trace`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let tree = HierarchicalLayer::default()
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_timer(Uptime::default());
    // A second call (tests, embedding hosts) is harmless.
    let _ = tracing_subscriber::registry().with(filter).with(tree).try_init();
}
