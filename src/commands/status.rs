//! Status command - shows the session stored for this origin.

use anyhow::Result;

use crate::storage::{SessionInformation, Storage};

/// Print the stored session and its case page cache record.
pub async fn run(storage: &Storage) -> Result<()> {
    let Some(info) = storage.session_information().await? else {
        println!("No active session");
        return Ok(());
    };

    println!("{}", describe(&info));
    if let Some(record) = storage.case_page(info.case_page_id).await? {
        println!(
            "  Last active: {}",
            record.last_active.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

/// One-paragraph summary of a session.
pub fn describe(info: &SessionInformation) -> String {
    let sections: Vec<&str> = info.case_sections.iter().map(|s| s.as_str()).collect();
    format!(
        "Active session on case page {}\n  Sections: {}",
        info.case_page_id,
        sections.join(", ")
    )
}
