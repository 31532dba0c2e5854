//! Watch command - prints every session this process publishes.
//!
//! Sessions are not shared between processes. A standalone `watch` prints
//! the session resolved at startup and then only sees transitions made in
//! the same process, so it mostly shows how an embedding application
//! follows a [`SessionSubscription`](liftcash_session::SessionSubscription).
//! It runs until Ctrl-C.

use liftcash_session::{Result, SessionController};

use crate::output::{OutputFormat, print_session};

/// Run the watch command
pub async fn run(controller: &SessionController, format: OutputFormat) -> Result<()> {
    let mut subscription = controller.subscribe();
    controller.initialize().await?;
    print_session(&subscription.current(), format);

    loop {
        tokio::select! {
            next = subscription.changed() => match next {
                Some(session) => print_session(&session, format),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
