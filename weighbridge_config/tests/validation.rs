use rstest::rstest;
use weighbridge_config::{DeliveryKind, ProtocolKind, load_toml};

const GOOD: &str = r#"
[serial]
port = "/dev/ttyS1"
baud = 4800
protocol = "reversed_text"
delimiter = "="
read_timeout_ms = 150

[scale]
empty_min = -0.5
empty_max = 0.5

[stability]
tolerance = 1.0
stable_duration_ms = 3000
tick_ms = 100

[matching]
match_window_hours = 12
require_plate_match = true
delivery_type = "receiving"

[offset]
lower_percent = -3.0
upper_percent = 4.0

[capture]
plate_timeout_ms = 2000
photo_timeout_ms = 3000

[logging]
level = "debug"
"#;

#[test]
fn full_config_parses_and_validates() {
    let cfg = load_toml(GOOD).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.serial.protocol, ProtocolKind::ReversedText);
    assert_eq!(cfg.serial.baud, 4_800);
    assert_eq!(cfg.matching.delivery_type, DeliveryKind::Receiving);
    assert_eq!(cfg.delimiter_byte(), b'=');
    assert_eq!(cfg.offset.lower_percent, Some(-3.0));
    assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
}

#[rstest]
#[case("[serial]\nbaud = 0\n", "baud")]
#[case("[serial]\nport = \"\"\n", "port")]
#[case("[serial]\nframe_len = 2\n", "frame_len")]
#[case(
    "[serial]\nprotocol = \"reversed_text\"\ndelimiter = \"==\"\n",
    "delimiter"
)]
#[case("[scale]\nempty_min = 1.0\nempty_max = -1.0\n", "empty_min")]
#[case("[stability]\ntolerance = -0.1\n", "tolerance")]
#[case("[stability]\nstable_duration_ms = 0\n", "stable_duration_ms")]
#[case("[stability]\ntick_ms = 0\n", "tick_ms")]
#[case("[matching]\nmatch_window_hours = 0\n", "match_window_hours")]
#[case("[matching]\nmatch_window_hours = 9000\n", "match_window_hours")]
#[case("[matching]\nsending_prefix = \"\"\n", "prefixes")]
#[case("[offset]\nlower_percent = 5.0\nupper_percent = 1.0\n", "lower_percent")]
#[case("[capture]\nplate_timeout_ms = 0\n", "timeouts")]
fn invalid_values_are_rejected_with_field_name(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject invalid value");
    assert!(
        err.to_string().contains(needle),
        "error {err} does not mention {needle}"
    );
}

#[test]
fn tick_longer_than_window_is_rejected() {
    let cfg = load_toml("[stability]\nstable_duration_ms = 50\ntick_ms = 100\n").unwrap();
    assert!(cfg.validate().is_err());
}
