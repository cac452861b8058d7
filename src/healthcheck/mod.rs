//! Readiness probes.
//!
//! - [`TcpHandshakeChecker`] waits for the engine's protocol greeting
//! - [`ExecAuthChecker`] logs in with the application account
//! - [`AllOf`] combines probes; [`probe_for`] picks the configured set

mod checker;
mod command;
mod tcp;

pub use checker::{check_with_retry, AllOf, HealthChecker, RetryOutcome, MAX_BACKOFF};
pub use command::ExecAuthChecker;
pub use tcp::TcpHandshakeChecker;

use crate::config::{Configuration, ProbeKind};
use std::sync::Arc;

/// Host the published port is probed on.
pub const PROBE_HOST: &str = "127.0.0.1";

/// Build the readiness probe selected by `DB_HEALTH_PROBE`.
pub fn probe_for(config: &Configuration) -> Arc<dyn HealthChecker> {
    let timeout = config.health().timeout;
    let handshake = TcpHandshakeChecker::new(PROBE_HOST, config.host_port(), timeout);

    match config.health().probe {
        ProbeKind::Tcp => Arc::new(handshake),
        ProbeKind::Auth => Arc::new(AllOf::new(vec![
            Box::new(handshake),
            Box::new(ExecAuthChecker::new(
                config.container_name(),
                config.engine(),
                config.user(),
                config.database(),
                Arc::clone(config.password()),
                timeout,
            )),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{keys, ConfigResolver, MapSource};

    fn config(probe: &str) -> Configuration {
        ConfigResolver::new("/srv")
            .resolve(&MapSource::from_pairs([
                (keys::ROOT_PASSWORD, "r"),
                (keys::DATABASE, "shop"),
                (keys::USER, "shop_app"),
                (keys::PASSWORD, "p"),
                (keys::PORT, "3310"),
                (keys::HEALTH_PROBE, probe),
            ]))
            .unwrap()
    }

    #[test]
    fn test_probe_selection() {
        let tcp = probe_for(&config("tcp"));
        assert_eq!(tcp.describe(), "handshake 127.0.0.1:3310");

        let auth = probe_for(&config("auth"));
        assert!(auth.describe().starts_with("handshake 127.0.0.1:3310 + login as 'shop_app'"));
    }
}
