//! Human-readable error descriptions, exit codes and structured JSON errors.

use cycler_core::error::CycleError;
use serde_json::json;

fn chain_contains(err: &eyre::Report, needles: &[&str]) -> bool {
    err.chain().any(|e| {
        let lower = e.to_string().to_ascii_lowercase();
        needles.iter().any(|n| lower.contains(n))
    })
}

fn is_config_error(err: &eyre::Report) -> bool {
    matches!(err.downcast_ref::<CycleError>(), Some(CycleError::Config(_)))
        || chain_contains(
            err,
            &["invalid configuration", "parse config", "read config", "invalid log level"],
        )
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<CycleError>() {
        return match ce {
            CycleError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: A GPIO line could not be read or driven, wrong pin numbers, or missing GPIO permissions.\nHow to fix: Check the [pins] section and wiring, make sure the process may access GPIO, then rerun `cycler self-check`. Actuators were forced to the safe state."
            ),
            CycleError::Interrupted => "What happened: The run was interrupted.\nLikely causes: Ctrl-C or a termination signal.\nHow to fix: Nothing to fix; actuators were forced to the safe state. Start a new run when ready.".to_string(),
            CycleError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/cycler.toml for a sample."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        let cause = err.root_cause();
        return format!(
            "What happened: Could not read the config file ({msg}).\nLikely causes: Wrong --config path or missing permissions. Cause: {cause}\nHow to fix: Pass --config with the path to a readable TOML file."
        );
    }

    if lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: The config file is not valid TOML for this schema.\nLikely causes: A typo, a wrong value type, or a missing [pins] section. Cause: {cause}\nHow to fix: Fix the reported key and rerun."
        );
    }

    if is_config_error(err) {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: {cause}.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: hardware fault 3, interrupted 4, config 5, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<CycleError>() {
        Some(CycleError::HardwareFault(_)) => 3,
        Some(CycleError::Interrupted) => 4,
        Some(CycleError::Config(_)) => 5,
        None if is_config_error(err) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<CycleError>() {
        Some(CycleError::HardwareFault(_)) => "HardwareFault",
        Some(CycleError::Interrupted) => "Interrupted",
        Some(CycleError::Config(_)) => "Config",
        None if is_config_error(err) => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn hardware_fault_maps_to_exit_3_through_context() {
        let err: eyre::Result<()> =
            Err(eyre::Report::new(CycleError::HardwareFault("gpio 6".into())));
        let err = err.wrap_err("run aborted").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("Hardware fault (gpio 6)"));
    }

    #[test]
    fn validation_failure_is_a_config_error() {
        let err: eyre::Result<()> = Err(eyre::eyre!("encoder.threshold must be in (0, encoder.bound)"));
        let err = err
            .wrap_err("invalid configuration in cfg.toml")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&err), 5);
        assert!(humanize(&err).contains("encoder.threshold"));
    }

    #[test]
    fn json_error_carries_reason() {
        let err = eyre::Report::new(CycleError::Interrupted);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Interrupted");
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn unknown_errors_exit_1() {
        let err = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).starts_with("Something went wrong."));
    }
}
