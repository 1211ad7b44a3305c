use thiserror::Error;

/// Unit path segment for the protective recloser.
pub const RECLOSER_ID: &str = "reco1";

/// What an inbound payload asks a unit to do. `Engage` starts a motor or
/// closes the recloser; `Disengage` stops or trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Engage,
    Disengage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    Motor(String),
    Recloser,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command payload is not text: {0}")]
    NotText(#[from] std::str::Utf8Error),

    #[error("no command keyword in payload {payload:?}")]
    UnrecognizedPayload { payload: String },

    #[error("no unit mapped to topic {topic:?}")]
    UnknownTopic { topic: String },
}

/// Static topic layout for one station namespace.
///
/// Motors publish on `<ns>/motores/<id>/telemetria` and listen on
/// `<ns>/motores/<id>/comandos`; the recloser uses `<ns>/reco1/estado`
/// and `<ns>/reco1/comandos`; the ambient packet goes out on
/// `<ns>/planta/telemetria`.
#[derive(Debug, Clone)]
pub struct TopicTable {
    namespace: String,
    motor_ids: Vec<String>,
}

impl TopicTable {
    pub fn new(namespace: &str, motor_ids: &[String]) -> Self {
        Self {
            namespace: namespace.to_string(),
            motor_ids: motor_ids.to_vec(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn motor_telemetry(&self, id: &str) -> String {
        format!("{}/motores/{}/telemetria", self.namespace, id)
    }

    pub fn motor_commands(&self, id: &str) -> String {
        format!("{}/motores/{}/comandos", self.namespace, id)
    }

    pub fn recloser_state(&self) -> String {
        format!("{}/{}/estado", self.namespace, RECLOSER_ID)
    }

    pub fn recloser_commands(&self) -> String {
        format!("{}/{}/comandos", self.namespace, RECLOSER_ID)
    }

    pub fn plant_telemetry(&self) -> String {
        format!("{}/planta/telemetria", self.namespace)
    }

    /// Every command topic the station listens on.
    pub fn command_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .motor_ids
            .iter()
            .map(|id| self.motor_commands(id))
            .collect();
        topics.push(self.recloser_commands());
        topics
    }

    /// Resolve a command topic to its target unit.
    pub fn route(&self, topic: &str) -> Result<CommandTarget, CommandError> {
        for id in &self.motor_ids {
            if topic == self.motor_commands(id) {
                return Ok(CommandTarget::Motor(id.clone()));
            }
        }
        if topic == self.recloser_commands() {
            return Ok(CommandTarget::Recloser);
        }
        Err(CommandError::UnknownTopic {
            topic: topic.to_string(),
        })
    }
}

/// Decode a raw command payload into an action.
///
/// The payload is plain text; matching is trimmed, case-insensitive
/// substring containment, so `"MARCHA AHORA"` still starts a unit.
/// Engage keywords win when both appear.
pub fn decode_action(raw: &[u8]) -> Result<CommandAction, CommandError> {
    let text = std::str::from_utf8(raw)?.trim().to_uppercase();
    if text.contains("MARCHA") || text.contains("CLOSE") {
        Ok(CommandAction::Engage)
    } else if text.contains("PARADA") || text.contains("TRIP") {
        Ok(CommandAction::Disengage)
    } else {
        Err(CommandError::UnrecognizedPayload { payload: text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TopicTable {
        TopicTable::new("bombeo", &["m4".to_string(), "m5".to_string()])
    }

    #[test]
    fn routes_motor_command_topics() {
        let routed = table().route("bombeo/motores/m5/comandos").unwrap();
        assert_eq!(routed, CommandTarget::Motor("m5".to_string()));
    }

    #[test]
    fn routes_recloser_command_topic() {
        let routed = table().route("bombeo/reco1/comandos").unwrap();
        assert_eq!(routed, CommandTarget::Recloser);
    }

    #[test]
    fn unknown_topic_is_an_error() {
        let err = table().route("bombeo/motores/m9/comandos").unwrap_err();
        assert!(matches!(err, CommandError::UnknownTopic { .. }));
        // Telemetry topics are not command topics.
        let err = table().route("bombeo/motores/m5/telemetria").unwrap_err();
        assert!(matches!(err, CommandError::UnknownTopic { .. }));
    }

    #[test]
    fn command_topics_cover_all_units() {
        let topics = table().command_topics();
        assert_eq!(
            topics,
            vec![
                "bombeo/motores/m4/comandos".to_string(),
                "bombeo/motores/m5/comandos".to_string(),
                "bombeo/reco1/comandos".to_string(),
            ]
        );
    }

    #[test]
    fn keywords_match_as_substrings() {
        assert_eq!(decode_action(b"MARCHA").unwrap(), CommandAction::Engage);
        assert_eq!(
            decode_action(b"  marcha ahora\n").unwrap(),
            CommandAction::Engage
        );
        assert_eq!(decode_action(b"PARADA").unwrap(), CommandAction::Disengage);
        assert_eq!(decode_action(b"trip").unwrap(), CommandAction::Disengage);
        assert_eq!(decode_action(b"CLOSE").unwrap(), CommandAction::Engage);
    }

    #[test]
    fn engage_wins_when_both_keywords_present() {
        assert_eq!(
            decode_action(b"MARCHA TRAS PARADA").unwrap(),
            CommandAction::Engage
        );
    }

    #[test]
    fn garbage_payloads_are_rejected() {
        assert!(matches!(
            decode_action(b"hola"),
            Err(CommandError::UnrecognizedPayload { .. })
        ));
        assert!(matches!(
            decode_action(&[0xff, 0xfe, 0x80]),
            Err(CommandError::NotText(_))
        ));
    }
}
