mod common;

use common::channel;
use egg_core::error::BuildError;
use egg_core::mocks::{RecordingDivider, RecordingLink, ScriptedAdc};
use egg_core::{Board, ControlCfg};
use rstest::rstest;

#[rstest]
fn builder_missing_adc_yields_typed_build_error() {
    let err = Board::builder()
        // missing with_adc()
        .with_wiper_link(RecordingLink::new())
        .with_divider(RecordingDivider::new())
        .with_channels([channel(0), channel(1)])
        .try_build()
        .expect_err("should fail with MissingAdc");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingAdc) => {}
        other => panic!("expected MissingAdc, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_divider_yields_typed_build_error() {
    let err = Board::builder()
        .with_adc(ScriptedAdc::new())
        .with_wiper_link(RecordingLink::new())
        .try_build()
        .expect_err("should fail with MissingDivider");

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingDivider)
    ));
}

fn complete() -> egg_core::BoardBuilder<egg_core::Set, egg_core::Set, egg_core::Set> {
    Board::builder()
        .with_adc(ScriptedAdc::new())
        .with_wiper_link(RecordingLink::new())
        .with_divider(RecordingDivider::new())
}

#[rstest]
#[case::one_channel(vec![channel(0)], "expected 2 sensor channels")]
#[case::shared_wiper(vec![channel(0), channel(0)], "wiper 0 is out of range or shared")]
#[case::empty_curve(
    vec![channel(0), egg_core::SensorChannel { curve: vec![], ..channel(1) }],
    "at least one point"
)]
#[case::zero_feedback(
    vec![channel(0), egg_core::SensorChannel { feedback_ohms: 0, ..channel(1) }],
    "feedback_ohms must be > 0"
)]
fn invalid_channels_are_rejected(
    #[case] channels: Vec<egg_core::SensorChannel>,
    #[case] needle: &str,
) {
    let err = complete()
        .with_channels(channels)
        .build()
        .expect_err("invalid channels");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
fn zero_momentum_step_is_rejected() {
    let err = complete()
        .with_channels([channel(0), channel(1)])
        .with_control(ControlCfg {
            momentum_step: 0,
            ..ControlCfg::default()
        })
        .build()
        .expect_err("zero step");
    assert!(format!("{err}").contains("momentum_step"));
}

#[rstest]
fn complete_builder_succeeds_with_defaults() {
    let board = complete()
        .with_channels([channel(0), channel(1)])
        .build()
        .unwrap();
    assert_eq!(board.channels().len(), 2);
    assert_eq!(board.control().period_ms, 4000);
    assert_eq!(board.sampler().settle_ms, 10);
    assert_eq!(board.protocol().stretch_budget_ms, 25);
    assert_eq!(board.module_id(), [0; 6]);
    assert!(board.channel(2).is_err());
}
