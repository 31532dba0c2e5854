//! Login command - runs the identity provider flow.
//!
//! Ctrl-C while waiting for the provider logs out, which cancels the flow.

use liftcash_session::{Result, SessionController};

use crate::output::{OutputFormat, print_session};

/// Run the login command
pub async fn run(
    controller: &SessionController,
    format: OutputFormat,
) -> Result<()> {
    controller.initialize().await?;

    let login = controller.login();
    tokio::pin!(login);
    let finished = tokio::select! {
        result = &mut login => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            tracing::info!("Interrupted, cancelling login");
            controller.logout().await;
            login.await
        }
    };

    let session = result?;
    print_session(&session, format);
    Ok(())
}
