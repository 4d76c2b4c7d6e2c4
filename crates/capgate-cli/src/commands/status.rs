//! Status command: what the authority and the consent history say per key.

use anyhow::Result;
use capgate_grant::{CapabilityKey, GrantAuthority};

use super::AppContext;
use crate::theme::Theme;

/// Print authority state, rationale flag and consent history for `keys`.
pub(crate) async fn show_status(ctx: &AppContext, keys: &[CapabilityKey]) -> Result<()> {
    println!("\n{}", Theme::header("Capability Status"));
    println!("{}", Theme::separator());

    for key in keys {
        let record = ctx.consent.record(key).await?;
        let authority = ctx.authority.record(key);

        println!("  {}", Theme::header(key.as_str()));
        println!(
            "    {}",
            Theme::kv("State", &Theme::grant_state(ctx.authority.current_state(key)))
        );
        println!(
            "    {}",
            Theme::kv(
                "Rationale due",
                &Theme::flag(ctx.authority.should_show_rationale(key))
            )
        );
        println!(
            "    {}",
            Theme::kv("Don't ask again", &Theme::flag(authority.never_ask_again))
        );
        println!(
            "    {}",
            Theme::kv(
                "Ever asked",
                &Theme::flag(record.as_ref().is_some_and(|r| r.ever_asked))
            )
        );
        if let Some(at) = record.as_ref().and_then(|r| r.first_asked_at.as_ref()) {
            println!("    {}", Theme::kv("First asked", &Theme::timestamp(at)));
        }
    }

    println!();
    Ok(())
}
