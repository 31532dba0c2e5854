//! Output formatting helpers for human-readable and JSON output.

use liftcash_session::{Session, actor::ActorBinding};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Print a table with aligned columns in human-readable format.
///
/// `headers` and each row in `rows` must have the same length.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }

    let col_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_line.join("  "));

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .take(col_count)
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        println!("{}", line.join("  "));
    }
}

fn binding_label(binding: &ActorBinding) -> &'static str {
    match binding {
        ActorBinding::Remote(_) => "remote",
        ActorBinding::StandIn => "stand-in",
    }
}

/// JSON shape of a session.
pub fn session_json(session: &Session) -> serde_json::Value {
    let actors: Vec<_> = session
        .actors()
        .values()
        .map(|actor| {
            serde_json::json!({
                "service": actor.service(),
                "canister_id": actor.canister_id(),
                "binding": binding_label(actor.binding()),
            })
        })
        .collect();
    serde_json::json!({
        "status": session.status(),
        "principal": session.principal().map(|p| p.to_text()),
        "anonymous": session.principal().map(|p| p.is_anonymous()),
        "actors": actors,
    })
}

/// Print a session in the selected format.
pub fn print_session(session: &Session, format: OutputFormat) {
    match format {
        OutputFormat::Human => {
            println!("Status:      {}", session.status());
            match session.principal() {
                Some(principal) if principal.is_anonymous() => {
                    println!("Principal:   {principal} (anonymous)")
                }
                Some(principal) => println!("Principal:   {principal}"),
                None => println!("Principal:   -"),
            }
            let rows: Vec<Vec<String>> = session
                .actors()
                .values()
                .map(|actor| {
                    vec![
                        actor.service().to_string(),
                        actor.canister_id().to_string(),
                        binding_label(actor.binding()).to_string(),
                    ]
                })
                .collect();
            if !rows.is_empty() {
                println!();
                print_table(&["SERVICE", "CANISTER", "BINDING"], &rows);
            }
        }
        OutputFormat::Json => println!("{}", session_json(session)),
    }
}
