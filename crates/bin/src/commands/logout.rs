//! Logout command - forgets the stored credential.

use liftcash_session::{Result, SessionController};

use crate::output::{OutputFormat, print_session};

/// Run the logout command
pub async fn run(
    controller: &SessionController,
    format: OutputFormat,
) -> Result<()> {
    if let Err(e) = controller.initialize().await {
        // Logging out must work even when the stored state is unreadable.
        tracing::warn!(error = %e, "Could not resolve session before logout");
    }
    let session = controller.logout().await;
    print_session(&session, format);
    Ok(())
}
