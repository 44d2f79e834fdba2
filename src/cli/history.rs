use anyhow::Result;

use super::args::HistoryCliArgs;
use crate::db::{self, InvocationRepository, Outcome};

pub fn handle_history_command(args: HistoryCliArgs) -> Result<()> {
    let conn = db::init_db()?;
    let records = InvocationRepository::list(&conn, args.limit)?;

    if records.is_empty() {
        println!("No invocations recorded yet.");
        return Ok(());
    }

    println!("Last {} invocation(s):\n", records.len());

    for record in records {
        println!(
            "{}  {:<20} {:<10} attempt {}  {}",
            record.started_at, record.function, record.outcome, record.attempt, record.trigger
        );
        if let Some(error) = &record.error {
            println!("    error: {}", error);
        }
    }

    let failed = InvocationRepository::count_by_outcome(&conn, Outcome::Failed)?;
    let timed_out = InvocationRepository::count_by_outcome(&conn, Outcome::TimedOut)?;
    let unrouted = InvocationRepository::count_by_outcome(&conn, Outcome::Unrouted)?;
    println!(
        "\nTotals: {} failed, {} timed out, {} unrouted",
        failed, timed_out, unrouted
    );

    Ok(())
}
