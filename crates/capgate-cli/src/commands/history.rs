//! History command: every capability that has ever been requested.

use anyhow::Result;

use super::AppContext;
use crate::theme::Theme;

/// Print the consent history.
pub(crate) async fn show_history(ctx: &AppContext) -> Result<()> {
    let records = ctx.consent.records().await?;

    println!("\n{}", Theme::header("Consent History"));
    println!("{}", Theme::separator());

    if records.is_empty() {
        println!("  {}", Theme::dimmed("No capability has been requested yet."));
        println!();
        return Ok(());
    }

    for record in &records {
        let when = record
            .first_asked_at
            .as_ref()
            .map_or_else(|| Theme::dimmed("unknown"), Theme::timestamp);
        println!("  {:<32} first asked {when}", record.key.as_str());
    }

    println!();
    println!(
        "{}",
        Theme::dimmed(&format!("{} capabilities requested", records.len()))
    );
    Ok(())
}
