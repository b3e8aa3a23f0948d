//! Human-readable error descriptions and structured JSON error formatting.

use egg_core::error::{BuildError, EggError, Resource};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingAdc => {
                "What happened: No ADC was provided to the board.\nLikely causes: The ADC backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the MCP3008 is created successfully and passed via with_adc(...).".to_string()
            }
            BuildError::MissingWiperLink => {
                "What happened: No digipot link was provided to the board.\nLikely causes: The SPI link failed to initialize or was not wired into the builder.\nHow to fix: Ensure the digipot link is created successfully and passed via with_wiper_link(...).".to_string()
            }
            BuildError::MissingDivider => {
                "What happened: No divider switch was provided to the board.\nLikely causes: The divider GPIO lines failed to initialize.\nHow to fix: Check [[sensor]].divider_pins and pass the switch via with_divider(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/egg_config.toml for a sample."
            ),
        };
    }

    if let Some(ee) = err.downcast_ref::<EggError>() {
        return match ee {
            EggError::Busy(resource) => format!(
                "What happened: The {resource} stayed busy past the clock-stretch budget.\nLikely causes: A regulation pass or another bus read was holding it.\nHow to fix: Retry, or raise protocol.stretch_budget_ms in the config."
            ),
            EggError::HardwareFault(msg) | EggError::Hardware(msg) => {
                let part = match ee {
                    EggError::HardwareFault(_) => "A peripheral reported a fault",
                    _ => "A hardware call failed",
                };
                format!(
                    "What happened: {part} ({msg}).\nLikely causes: {}.\nHow to fix: Check wiring and [hardware] in the config, then rerun with --log-level=debug.",
                    likely_wiring(msg)
                )
            }
            EggError::InvalidChannel(ch) => format!(
                "What happened: Sensor channel {ch} does not exist.\nLikely causes: The board has two channels (0 and 1).\nHow to fix: Use a channel index below 2."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this board ({}).\nLikely causes: Typo in a key, wrong value type, or a missing [identity] / [[sensor]] section.\nHow to fix: Compare with etc/egg_config.toml and fix the reported line.",
            te.message()
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config <FILE> pointing at a readable TOML. Original: {msg}"
        );
    }

    if lower.contains("open digipot") || lower.contains("open adc") || lower.contains("divider pin")
    {
        return "What happened: Failed to initialize board peripherals.\nLikely causes: SPI disabled, wrong bus/pin numbers, or insufficient permissions.\nHow to fix: Enable SPI, fix [hardware] and divider_pins in the config, and run with access to /dev/spidev* and GPIO.".to_string();
    }

    if lower.contains("curve csv must have headers") {
        return "Invalid headers in curve CSV. Expected 'ratio,concentration'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Out-of-range values or a missing [[sensor]] field.\nHow to fix: Edit the TOML config and try again."
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

fn likely_wiring(msg: &str) -> &'static str {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("spi") {
        "SPI bus not enabled, wrong chip select, or loose MOSI/MISO/SCK wires"
    } else if lower.contains("gpio") {
        "Wrong GPIO pin numbers or another process owns the lines"
    } else if lower.contains("adc") {
        "ADC channel not wired or reference voltage missing"
    } else {
        "Board not powered or a bus line is disconnected"
    }
}

/// Stable short name for the JSON `reason` field.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => "InvalidConfig",
            _ => "MissingPeripheral",
        };
    }
    if let Some(ee) = err.downcast_ref::<EggError>() {
        return match ee {
            EggError::Busy(_) => "Busy",
            EggError::Hardware(_) => "Hardware",
            EggError::HardwareFault(_) => "HardwareFault",
            EggError::Config(_) => "InvalidConfig",
            EggError::InvalidChannel(_) => "InvalidChannel",
        };
    }
    if err.downcast_ref::<toml::de::Error>().is_some() {
        return "InvalidConfig";
    }
    "Error"
}

/// Stable exit codes: 2 config, 3 hardware, 4 busy, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "InvalidConfig" => 2,
        "Hardware" | "HardwareFault" | "MissingPeripheral" => 3,
        "Busy" => 4,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    if let Some(EggError::Busy(resource)) = err.downcast_ref::<EggError>() {
        let name = match resource {
            Resource::Adc => "adc",
            Resource::Digipot => "digipot",
            Resource::Divider => "divider",
        };
        return json!({ "reason": "Busy", "details": { "resource": name }, "message": msg })
            .to_string();
    }

    json!({ "reason": reason_name(err), "message": msg }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_maps_to_its_own_exit_code_and_details() {
        let err = eyre::Report::new(EggError::Busy(Resource::Digipot));
        assert_eq!(exit_code_for_error(&err), 4);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Busy");
        assert_eq!(v["details"]["resource"], "digipot");
        assert!(v["message"].as_str().unwrap().contains("stretch_budget_ms"));
    }

    #[test]
    fn wrapped_build_error_is_still_recognized() {
        use eyre::WrapErr;
        let err: eyre::Result<()> =
            Err(BuildError::InvalidConfig("wiper 1 is out of range or shared".into()))
                .wrap_err("assemble board");
        let err = err.unwrap_err();
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).contains("wiper 1"));
    }

    #[test]
    fn hardware_fault_hints_at_the_bus() {
        let err = eyre::Report::new(EggError::HardwareFault("spi error: adc transfer".into()));
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("SPI bus"));
    }

    #[test]
    fn unknown_errors_fall_back_to_generic() {
        let err = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).starts_with("Something went wrong."));
    }
}
