use std::str::FromStr;

use rewind_common::{
    types::{Breakpoint, StopPolicy},
    EngineConfig, DEFAULT_OBJECT_NODE_BUDGET,
};
use tracing::info;

#[test]
fn test_default_config() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default();

    assert!(config.record_every_step);
    assert!(config.step_exclusions.iter().any(|pattern| pattern == "java.*"));
    assert_eq!(config.capture.object_node_budget, DEFAULT_OBJECT_NODE_BUDGET);
}

#[test]
fn test_config_with_custom_values() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default()
        .with_step_exclusions(["kotlin.*"])
        .with_record_every_step(false)
        .with_object_node_budget(16)
        .with_capture_receiver(false);

    let parsed = EngineConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
    assert_eq!(parsed, config);
    assert_eq!(parsed.step_exclusions, vec!["kotlin.*".to_string()]);
}

#[test]
fn test_breakpoint_specs() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let once = Breakpoint::from_str("Point.java:12 once").unwrap();
    assert_eq!(once.policy(), StopPolicy::Once);

    let mut counted = Breakpoint::from_str("Point.java:12 count 3").unwrap();
    let stops = (0..5).map(|_| counted.register_hit()).collect::<Vec<_>>();
    assert_eq!(stops, vec![false, false, true, true, true]);
    assert_eq!(counted.to_string(), "Point.java:12 [count: 5/3]");

    assert!(Breakpoint::from_str("Point.java").is_err());
}
