//! Settings command: the system settings screen of the simulated authority.

use anyhow::Result;
use capgate_grant::CapabilityKey;
use tracing::info;

use super::AppContext;
use crate::theme::Theme;

/// Allow `key`, clearing any "don't ask again" choice.
pub(crate) async fn grant(ctx: &AppContext, key: &CapabilityKey) -> Result<()> {
    ctx.authority.grant(key).await?;
    info!(%key, "granted from settings");
    println!("{}", Theme::success(&format!("{key} is now allowed.")));
    Ok(())
}

/// Revoke `key`.
pub(crate) async fn deny(ctx: &AppContext, key: &CapabilityKey) -> Result<()> {
    ctx.authority.deny(key).await?;
    info!(%key, "denied from settings");
    println!("{}", Theme::warning(&format!("{key} is now denied.")));
    Ok(())
}

/// Forget the authority's answer for `key`. Consent history is kept.
pub(crate) async fn reset(ctx: &AppContext, key: &CapabilityKey) -> Result<()> {
    if ctx.authority.reset(key).await? {
        info!(%key, "reset from settings");
        println!("{}", Theme::success(&format!("{key} was reset.")));
        println!(
            "{}",
            Theme::dimmed("Consent history is permanent; `capgate history` still lists it.")
        );
    } else {
        println!("{}", Theme::info(&format!("Nothing stored for {key}.")));
    }
    Ok(())
}

/// List every capability the authority has an answer for.
pub(crate) fn list(ctx: &AppContext) {
    let records = ctx.authority.records();
    println!("\n{}", Theme::header("Capability Settings"));
    println!("{}", Theme::separator());
    if records.is_empty() {
        println!("  {}", Theme::dimmed("No capability has been answered yet."));
    }
    for (key, record) in records {
        let flag = if record.never_ask_again {
            format!("  {}", Theme::dimmed("(don't ask again)"))
        } else {
            String::new()
        };
        let when = record
            .updated_at
            .as_ref()
            .map(|at| format!("  {}", Theme::timestamp(at)))
            .unwrap_or_default();
        println!(
            "  {:<32} {}{flag}{when}",
            key.as_str(),
            Theme::grant_state(record.state)
        );
    }
    println!();
}
