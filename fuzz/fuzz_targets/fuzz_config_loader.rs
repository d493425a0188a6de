#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz TOML parsing of Config: it must never panic, only reject.
    // Parse errors and validation errors are both acceptable outcomes.
    match toml::from_str::<vent_config::Config>(data) {
        Ok(cfg) => {
            // validate() must not panic either
            let _ = cfg.validate();
        }
        Err(_e) => {
            // parse error is acceptable
        }
    }
});
