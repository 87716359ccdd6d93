//! Check command implementation

use anyhow::Result;

use rh_core::config::ConnectionConfig;
use rh_exec::{SessionManager, SshTransport};

use super::EXIT_CONNECTION;
use crate::output::{print_error, print_success};

/// Connect, authenticate and disconnect
pub async fn check_command(config: &ConnectionConfig) -> Result<u8> {
    let manager = SessionManager::new(SshTransport::new());
    let started = std::time::Instant::now();

    match manager.connect(config).await {
        Ok(mut session) => {
            let elapsed = started.elapsed();
            manager.close(&mut session).await;
            print_success(&format!(
                "Authenticated to {} as {} in {}ms",
                config.endpoint(),
                config.username,
                elapsed.as_millis()
            ));
            Ok(0)
        }
        Err(e) => {
            print_error(&format!("{} ({})", e, e.kind()));
            Ok(EXIT_CONNECTION)
        }
    }
}
