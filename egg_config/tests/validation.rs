use egg_config::load_toml;
use rstest::rstest;

const SENSORS: &str = r#"
[[sensor]]
type_name = "NO2"
unit_name = "ppb"
feedback_ohms = 10
target_power_mw = 43
supply_adc = 0
feedback_adc = 1
sensor_adc = 2
wiper = 0
divider_ohms = [4700, 10000, 47000]
r0_ohms = 2200
curve = [[24.8, 198.9], [98.8, 418.2]]

[[sensor]]
type_name = "CO"
unit_name = "ppb"
feedback_ohms = 10
target_power_mw = 76
supply_adc = 3
feedback_adc = 4
sensor_adc = 5
wiper = 1
divider_ohms = [4700, 10000, 47000]
r0_ohms = 750000
curve = [{ ratio = 0.402, concentration = 41250.0 }, { ratio = 0.723, concentration = 990.0 }]
"#;

fn config_with(head: &str) -> String {
    format!("{head}\n[identity]\nmodule_id = \"00:04:a3:0b:00:1c\"\n{SENSORS}")
}

#[test]
fn minimal_config_takes_defaults() {
    let cfg = load_toml(&config_with("")).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.adc.full_scale, 1024);
    assert_eq!(cfg.control.period_ms, 4000);
    assert_eq!(cfg.control.momentum_cap, None);
    assert_eq!(cfg.sampler.settle_ms, 10);
    assert_eq!(cfg.sensors.len(), 2);
    // both curve spellings land in the same shape
    assert_eq!(cfg.sensors[0].curve[1].concentration, 418.2);
    assert_eq!(cfg.sensors[1].curve[0].ratio, 0.402);
    assert_eq!(
        cfg.identity.module_id_bytes().unwrap(),
        [0x00, 0x04, 0xa3, 0x0b, 0x00, 0x1c]
    );
}

#[test]
fn shipped_config_is_valid() {
    let text = include_str!("../../etc/egg_config.toml");
    let cfg = load_toml(text).expect("parse shipped TOML");
    cfg.validate().expect("shipped config should pass");
}

#[rstest]
#[case("[control]\nperiod_ms = 0", "period_ms must be >= 1")]
#[case("[control]\nmomentum_step = 0", "momentum_step must be >= 1")]
#[case("[control]\nmomentum_cap = 0", "momentum_cap must be >= 1")]
#[case("[adc]\nfull_scale = 1", "full_scale must be >= 2")]
#[case("[adc]\nreference_mv = 0", "reference_mv must be > 0")]
fn rejects_out_of_range_sections(#[case] head: &str, #[case] needle: &str) {
    let cfg = load_toml(&config_with(head)).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
#[case("wiper = 0\n", "wiper = 1\n", "wiper 1 is already used")]
#[case("feedback_ohms = 10\n", "feedback_ohms = 0\n", "feedback_ohms must be > 0")]
#[case("\"NO2\"", "\"NITROGEN-DIOXIDE-X\"", "at most 16 bytes")]
#[case("r0_ohms = 2200", "r0_ohms = 0", "r0_ohms must be > 0")]
fn rejects_bad_sensor_entries(#[case] from: &str, #[case] to: &str, #[case] needle: &str) {
    let text = config_with("").replacen(from, to, 1);
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains(needle), "{err}");
}

#[test]
fn rejects_wrong_sensor_count() {
    let one = SENSORS.split("\n[[sensor]]").nth(1).unwrap_or_default();
    let text = format!("[identity]\nmodule_id = \"01:02:03:04:05:06\"\n[[sensor]]{one}");
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("one sensor is not enough");
    assert!(format!("{err}").contains("exactly 2 [[sensor]] entries"));
}

#[test]
fn rejects_descending_curve() {
    let text = config_with("").replace(
        "[[24.8, 198.9], [98.8, 418.2]]",
        "[[98.8, 418.2], [24.8, 198.9]]",
    );
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("descending ratios");
    assert!(format!("{err}").contains("strictly ascending"));
}

#[rstest]
#[case("00:04:a3:0b:00")]
#[case("00:04:a3:0b:00:zz")]
fn rejects_malformed_module_id(#[case] id: &str) {
    let text = config_with("").replace("00:04:a3:0b:00:1c", id);
    let cfg = load_toml(&text).expect("parse TOML");
    assert!(cfg.validate().is_err());
}
