#![cfg(feature = "serde")]

use std::time::Duration;

use simatic_s7::{ClientConfig, ConnectionType};

#[test]
fn test_config_round_trips_through_json() {
    let config = ClientConfig::new("plc.local", 1)
        .with_rack(0)
        .with_timeout(Duration::from_millis(1500))
        .with_connection_type(ConnectionType::Op);

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["host"], "plc.local");
    assert_eq!(json["port"], 102);
    assert_eq!(json["timeout"], 1500);
    assert_eq!(json["connection_type"], "Op");

    let parsed: ClientConfig = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_from_application_file() {
    let text = r#"{
        "host": "10.0.0.5",
        "port": 1102,
        "rack": 0,
        "slot": 2,
        "timeout": 5000,
        "connection_type": "Pg"
    }"#;

    let config: ClientConfig = serde_json::from_str(text).unwrap();
    assert_eq!(config.host, "10.0.0.5");
    assert_eq!(config.port, 1102);
    assert_eq!(config.slot, 2);
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.connection_type, ConnectionType::Pg);
}
