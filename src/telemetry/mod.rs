//! 日志初始化：基于 tracing-subscriber 的结构化日志。
//!
//! # Logging
//!
//! The crate logs through `tracing` and never installs a subscriber on its
//! own. Binaries and tests call [`init_tracing`] (or [`init_test_tracing`])
//! once; `RUST_LOG` overrides the default directive.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "query_action=info";

/// Installs a fmt subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let fmt_layer = fmt::layer().with_target(true).with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

/// Same as [`init_tracing`] but writes through the libtest capture.
pub fn init_test_tracing() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,query_action=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_test_tracing();
        assert!(!init_tracing());
        init_test_tracing();
    }
}
