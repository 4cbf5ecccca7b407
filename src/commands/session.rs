//! Session command - force-clears the stored session.
//!
//! Use this when a tab crashed in a way that left a session behind and no
//! tab on the case page can be opened to close it. Open tabs are not told;
//! a root still running re-persists its session on its next change.

// Rust guideline compliant 2026-02

use anyhow::Result;
use std::io::{self, BufRead, Write};

use super::status::describe;
use crate::storage::Storage;

/// Run `session clear`.
///
/// Shows the stored session and asks for confirmation (unless `skip_confirm`
/// is true).
pub async fn clear(storage: &Storage, skip_confirm: bool) -> Result<()> {
    let Some(info) = storage.session_information().await? else {
        println!("No active session, nothing to clear.");
        return Ok(());
    };

    println!();
    println!("This will remove the stored session:");
    println!();
    for line in describe(&info).lines() {
        println!("  {}", line);
    }
    println!();

    if !skip_confirm && !confirm(&mut io::stdin().lock())? {
        println!("Aborted.");
        return Ok(());
    }

    storage.clear_session_information().await?;
    log::info!("Session for case page {} cleared from CLI", info.case_page_id);
    println!("  ✓ Cleared session for case page {}", info.case_page_id);
    Ok(())
}

fn confirm(input: &mut impl BufRead) -> Result<bool> {
    print!("Are you sure? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
