//! Bridge from `capgate_config::Config` to domain types.

use capgate_config::Config;
use capgate_grant::{CapabilityKey, GrantResult, OverlapPolicy};
use capgate_telemetry::{LogConfig, LogFormat};

/// Convert config to [`LogConfig`].
#[must_use]
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = match cfg.logging.format.as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Compact,
    };

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);

    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }

    log_config
}

/// Convert `negotiation.overlap` to an [`OverlapPolicy`].
#[must_use]
pub(crate) fn overlap_policy(cfg: &Config) -> OverlapPolicy {
    match cfg.negotiation.overlap.as_str() {
        "reject" => OverlapPolicy::Reject,
        _ => OverlapPolicy::Supersede,
    }
}

/// Keys named on the command line, or `negotiation.capabilities` when none
/// were given.
pub(crate) fn capability_keys(cfg: &Config, args: &[String]) -> GrantResult<Vec<CapabilityKey>> {
    if args.is_empty() {
        CapabilityKey::parse_all(&cfg.negotiation.capabilities)
    } else {
        CapabilityKey::parse_all(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_config_carries_level_format_and_directives() {
        let mut cfg = Config::default();
        cfg.logging.level = "debug".to_owned();
        cfg.logging.format = "json".to_owned();
        cfg.logging.directives = vec!["capgate_grant=trace".to_owned()];

        let lc = to_log_config(&cfg);
        assert_eq!(lc.level, "debug");
        assert_eq!(lc.format, LogFormat::Json);
        assert_eq!(lc.directives, vec!["capgate_grant=trace".to_owned()]);
    }

    #[test]
    fn unknown_format_falls_back_to_compact() {
        let mut cfg = Config::default();
        cfg.logging.format = "fancy".to_owned();
        assert_eq!(to_log_config(&cfg).format, LogFormat::Compact);
    }

    #[test]
    fn overlap_policy_mapping() {
        let mut cfg = Config::default();
        assert_eq!(overlap_policy(&cfg), OverlapPolicy::Supersede);
        cfg.negotiation.overlap = "reject".to_owned();
        assert_eq!(overlap_policy(&cfg), OverlapPolicy::Reject);
    }

    #[test]
    fn command_line_keys_win_over_config() {
        let cfg = Config::default();
        let from_config = capability_keys(&cfg, &[]).unwrap();
        assert_eq!(from_config[0].as_str(), "write-external-storage");

        let from_args = capability_keys(&cfg, &["record-audio".to_owned()]).unwrap();
        assert_eq!(from_args.len(), 1);
        assert_eq!(from_args[0].as_str(), "record-audio");
    }

    #[test]
    fn malformed_key_is_rejected() {
        let cfg = Config::default();
        assert!(capability_keys(&cfg, &[String::new()]).is_err());
    }
}
