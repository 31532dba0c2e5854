//! Status command - initializes the session and prints it.

use liftcash_session::{Result, SessionController};

use crate::output::{OutputFormat, print_session};

/// Run the status command
pub async fn run(
    controller: &SessionController,
    format: OutputFormat,
) -> Result<()> {
    let session = controller.initialize().await?;
    print_session(&session, format);
    Ok(())
}
