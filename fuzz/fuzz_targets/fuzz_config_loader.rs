#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = cycler_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config must convert without panicking.
    let machine = cycler_core::MachineCfg::from(&cfg);
    let _ = machine.timing.minimum_interval();
    let _ = machine.timing.hold_time();
    let _ = cfg.input_channels();
});
