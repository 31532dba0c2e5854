//! Health check command - probes the replica host.

use std::{sync::Arc, time::Duration};

use liftcash_session::{Result, SessionConfig, actor::Agent, identity::AnonymousIdentity};

use crate::cli::HealthArgs;

/// Run the health check command, returning whether the host answered.
pub async fn run(config: &SessionConfig, args: &HealthArgs) -> Result<bool> {
    let agent = Agent::new(config.host.clone(), Arc::new(AnonymousIdentity))?;
    let probe = tokio::time::timeout(Duration::from_secs(args.timeout), agent.status()).await;

    match probe {
        Ok(Ok(status)) => {
            println!("healthy: {} answered HTTP {}", config.host, status);
            Ok(true)
        }
        Ok(Err(e)) => {
            eprintln!("unhealthy: {e}");
            Ok(false)
        }
        Err(_) => {
            eprintln!(
                "unhealthy: no answer from {} within {}s",
                config.host, args.timeout
            );
            Ok(false)
        }
    }
}
