use std::sync::Arc;
use std::thread;

use cycler_hardware::error::HwError;
use cycler_hardware::{SimInputs, SimOutputs};
use cycler_traits::{DigitalInput, DigitalOutput, Level};
use rstest::rstest;

#[rstest]
#[case(true)]
#[case(false)]
fn read_failure_is_a_typed_hw_error(#[case] fail: bool) {
    let mut inputs = SimInputs::new();
    inputs.fail_reads(fail);
    match inputs.read(16) {
        Ok(level) => {
            assert!(!fail);
            assert_eq!(level, Level::High);
        }
        Err(e) => {
            assert!(fail);
            match e.downcast_ref::<HwError>() {
                Some(HwError::Injected(16)) => {}
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}

#[test]
fn outputs_are_shared_across_threads() {
    let recorder = SimOutputs::new();
    let writers: Vec<_> = (0..4u8)
        .map(|ch| {
            let mut out = recorder.clone();
            thread::spawn(move || out.write(ch, Level::High).unwrap())
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }
    for ch in 0..4u8 {
        assert_eq!(recorder.level(ch), Level::High);
    }
    assert_eq!(recorder.history().len(), 4);
}

#[test]
fn panel_handle_drives_the_same_lines() {
    let panel = Arc::new(SimInputs::new());
    let mut reader = (*panel).clone();
    panel.press(1);
    assert!(reader.read(1).unwrap().is_low());
    panel.release(1);
    assert!(reader.read(1).unwrap().is_high());
}
