#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use sql_destination::config::{DestinationConfig, EndpointConfig, FieldConfig, Flags, PortValue};
use sql_destination::dialect::Dialect;
use sql_destination::driver::fake::{FakeDriver, FakeDriverHandle};
use sql_destination::statement::render_insert;

// Rendering an INSERT from arbitrary message values must never panic,
// regardless of what bytes the host's template engine produced (quoting
// failures degrade to `''`, never a crash).
fuzz_target!(|data: &[u8]| {
    let Ok(value) = std::str::from_utf8(data) else {
        return;
    };

    let config = DestinationConfig::new(
        Dialect::Mysql,
        EndpointConfig {
            host: "h".into(),
            port: PortValue::Numeric(3306),
            user: "u".into(),
            password: "p".into(),
            database: "d".into(),
            encoding: None,
        },
        "messages",
        vec![FieldConfig::templated("msg", "TEXT")],
        vec![],
        Some("-".to_string()),
        Flags::default(),
        -1,
        3,
        Duration::from_secs(10),
        vec![],
    )
    .unwrap();

    let driver = FakeDriver::new(&FakeDriverHandle::new());
    let _ = render_insert(&driver, &config, "messages", &[value.to_string()]);
    // Arity mismatches must be rejected, never panic either.
    let _ = render_insert(&driver, &config, "messages", &[]);
});
