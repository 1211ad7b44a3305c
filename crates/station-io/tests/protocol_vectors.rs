use station_io::protocol::{IncomingMessage, ProtocolVersion};

#[test]
fn parses_hello_message() {
    let raw = r#"{
        "type":"hello",
        "protocol_version":{"major":1,"minor":0},
        "capabilities":["command.v1","auth.hmac-sha256"],
        "client_id":"ops-console"
    }"#;

    let msg = IncomingMessage::parse(raw).expect("hello should parse");
    match msg {
        IncomingMessage::Hello(hello) => {
            assert!(hello.protocol_version.is_supported());
            assert_eq!(hello.client_id.as_deref(), Some("ops-console"));
        }
        _ => panic!("expected hello message"),
    }
}

#[test]
fn parses_command_message() {
    let raw = r#"{
        "type":"command",
        "protocol_version":{"major":1,"minor":0},
        "topic":"bombeo/motores/m5/comandos",
        "payload":"MARCHA"
    }"#;

    let msg = IncomingMessage::parse(raw).expect("command should parse");
    match msg {
        IncomingMessage::Command(cmd) => {
            assert_eq!(cmd.topic, "bombeo/motores/m5/comandos");
            assert_eq!(cmd.payload, "MARCHA");
            assert_eq!(cmd.protocol_version, ProtocolVersion::v1());
            assert!(cmd.auth_token.is_none());
        }
        _ => panic!("expected command message"),
    }
}

#[test]
fn command_version_defaults_when_absent() {
    let raw = r#"{"type":"command","topic":"bombeo/reco1/comandos","payload":"TRIP"}"#;
    let msg = IncomingMessage::parse(raw).expect("command should parse");
    match msg {
        IncomingMessage::Command(cmd) => {
            // Defaulted version 0.0 is an unsupported sentinel; the
            // bridge rejects it before it reaches the plant.
            assert!(!cmd.protocol_version.is_supported());
        }
        _ => panic!("expected command message"),
    }
}

#[test]
fn command_without_topic_fails_to_parse() {
    let raw = r#"{"type":"command","payload":"MARCHA"}"#;
    assert!(IncomingMessage::parse(raw).is_none());
}
