use crate::audit::{AuditEventType, AuditLogger};
use crate::auth::{AuthConfig, TokenValidator};
use crate::metrics::{
    AUTH_FAILURES, AUTH_MISSING, BRIDGE_CONNECTED, COMMANDS_APPLIED, COMMANDS_REJECTED,
};
use crate::protocol::{CommandMsg, IncomingMessage, ProtocolVersion, TelemetryMsg};
use crate::tls::{build_server_config, TlsSettings};
use rustls::{ServerConnection, StreamOwned};
use station_core::{decode_action, CommandEffect, Envelope, Plant, SimClock, TopicTable};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct BridgeConfig {
    pub bind_addr: String,
    pub tls: TlsSettings,
    pub auth: AuthConfig,
    pub require_handshake: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7700".to_string(),
            tls: TlsSettings::default(),
            auth: AuthConfig::default(),
            require_handshake: false,
        }
    }
}

enum BridgeStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl Read for BridgeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            BridgeStream::Plain(s) => s.read(buf),
            BridgeStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for BridgeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            BridgeStream::Plain(s) => s.write(buf),
            BridgeStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            BridgeStream::Plain(s) => s.flush(),
            BridgeStream::Tls(s) => s.flush(),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    handshake_seen: bool,
    client_id: Option<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            handshake_seen: false,
            client_id: None,
        }
    }

    fn reset(&mut self) {
        self.handshake_seen = false;
        self.client_id = None;
    }
}

/// Serve the pub/sub bridge until `stop` is set.
///
/// One client at a time, newline-framed JSON both ways: telemetry
/// envelopes out of `feed`, hello/command messages in. Command handling
/// is synchronous (parse, authorize, lock the plant, apply, unlock) and
/// never blocks on the socket.
#[allow(clippy::too_many_arguments)]
pub fn run_bridge(
    plant: Arc<Mutex<Plant>>,
    topics: TopicTable,
    feed: mpsc::Receiver<Envelope>,
    clock: SimClock,
    config: BridgeConfig,
    stop: Arc<AtomicBool>,
    audit: Option<Arc<AuditLogger>>,
) {
    let listener = TcpListener::bind(&config.bind_addr)
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));
    listener
        .set_nonblocking(true)
        .expect("Failed to set nonblocking");

    info!(
        addr = %config.bind_addr,
        tls = config.tls.enabled,
        auth = config.auth.enabled,
        commands = topics.command_topics().len(),
        "Bridge listening"
    );

    let tls_config = if config.tls.enabled {
        match build_server_config(&config.tls) {
            Ok(c) => Some(c),
            Err(e) => {
                error!(error = %e, "Failed to configure TLS");
                return;
            }
        }
    } else {
        None
    };

    let validator = if config.auth.enabled {
        Some(TokenValidator::from_config(&config.auth))
    } else {
        None
    };

    let mut client: Option<BridgeStream> = None;
    let mut recv_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut send_buf: Vec<u8> = Vec::new();
    let mut send_offset: usize = 0;
    let mut sequence: u64 = 0;
    let mut session = SessionState::new();

    loop {
        if stop.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }

        if client.is_none() {
            // Telemetry is fire-and-forget: with nobody listening it
            // just evaporates.
            while feed.try_recv().is_ok() {}

            match listener.accept() {
                Ok((stream, addr)) => {
                    info!(client_addr = %addr, "Bridge client connected");
                    stream
                        .set_nonblocking(true)
                        .expect("Failed to set nonblocking on client");

                    if let Some(tls_cfg) = &tls_config {
                        match ServerConnection::new(tls_cfg.clone()) {
                            Ok(conn) => {
                                client = Some(BridgeStream::Tls(Box::new(StreamOwned::new(
                                    conn, stream,
                                ))));
                            }
                            Err(e) => {
                                error!("Failed to create TLS connection state: {}", e);
                            }
                        }
                    } else {
                        client = Some(BridgeStream::Plain(stream));
                    }
                    BRIDGE_CONNECTED.set(1.0);
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!("Bridge accept error: {}", err);
                }
            }
        }

        let mut drop_client = false;
        if let Some(stream) = client.as_mut() {
            // Inbound commands
            let mut temp = [0u8; 1024];
            match stream.read(&mut temp) {
                Ok(0) => {
                    info!("Bridge client disconnected");
                    drop_client = true;
                    BRIDGE_CONNECTED.set(0.0);
                }
                Ok(n) => {
                    recv_buf.extend_from_slice(&temp[..n]);
                    while let Some(pos) = recv_buf.iter().position(|b| *b == b'\n') {
                        let line = recv_buf.drain(..=pos).collect::<Vec<u8>>();
                        if let Ok(text) = std::str::from_utf8(&line) {
                            let trimmed = text.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            if let Some(msg) = IncomingMessage::parse(trimmed) {
                                handle_incoming(
                                    msg,
                                    &plant,
                                    &topics,
                                    &clock,
                                    &validator,
                                    config.require_handshake,
                                    &mut session,
                                    audit.as_deref(),
                                );
                            } else {
                                debug!(line = trimmed, "Dropping unparseable bridge line");
                            }
                        }
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!(error = %err, "Bridge read error");
                    drop_client = true;
                    BRIDGE_CONNECTED.set(0.0);
                }
            }

            // Outbound telemetry: one envelope in flight; the rest wait
            // in the channel.
            if send_buf.is_empty() {
                if let Ok(envelope) = feed.try_recv() {
                    sequence = sequence.wrapping_add(1);
                    let msg = TelemetryMsg {
                        msg_type: "telemetry",
                        protocol_version: ProtocolVersion::v1(),
                        sequence,
                        unix_us: clock.unix_us(),
                        topic: envelope.topic,
                        payload: envelope.payload,
                    };
                    if let Ok(line) = serde_json::to_string(&msg) {
                        send_buf = line.into_bytes();
                        send_buf.push(b'\n');
                        send_offset = 0;
                    }
                }
            }

            if !send_buf.is_empty() {
                match stream.write(&send_buf[send_offset..]) {
                    Ok(0) => {
                        info!("Bridge client disconnected");
                        drop_client = true;
                        BRIDGE_CONNECTED.set(0.0);
                    }
                    Ok(n) => {
                        send_offset += n;
                        if send_offset >= send_buf.len() {
                            send_buf.clear();
                            send_offset = 0;
                        }
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(err) => {
                        warn!(error = %err, "Bridge write error");
                        drop_client = true;
                        BRIDGE_CONNECTED.set(0.0);
                    }
                }
            }
        }

        if drop_client {
            client = None;
            recv_buf.clear();
            send_buf.clear();
            send_offset = 0;
            session.reset();
        }

        std::thread::sleep(Duration::from_millis(5));
    }

    // Drop the socket before reporting shutdown so the peer sees a
    // clean close rather than a half-open connection.
    drop(client);
    BRIDGE_CONNECTED.set(0.0);
    info!("Bridge stopped");
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming(
    msg: IncomingMessage,
    plant: &Mutex<Plant>,
    topics: &TopicTable,
    clock: &SimClock,
    validator: &Option<TokenValidator>,
    require_handshake: bool,
    session: &mut SessionState,
    audit: Option<&AuditLogger>,
) {
    match msg {
        IncomingMessage::Hello(hello) => {
            if !hello.protocol_version.is_supported() {
                warn!(
                    major = hello.protocol_version.major,
                    minor = hello.protocol_version.minor,
                    "Unsupported protocol version"
                );
                return;
            }
            session.handshake_seen = true;
            session.client_id = hello.client_id.clone();
            info!(
                client_id = ?hello.client_id,
                capabilities = ?hello.capabilities,
                "Bridge handshake received"
            );
        }
        IncomingMessage::Command(cmd) => {
            handle_command(cmd, plant, topics, clock, validator, require_handshake, session, audit)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_command(
    cmd: CommandMsg,
    plant: &Mutex<Plant>,
    topics: &TopicTable,
    clock: &SimClock,
    validator: &Option<TokenValidator>,
    require_handshake: bool,
    session: &mut SessionState,
    audit: Option<&AuditLogger>,
) {
    if !cmd.protocol_version.is_supported() {
        warn!(
            major = cmd.protocol_version.major,
            minor = cmd.protocol_version.minor,
            "Unsupported protocol version"
        );
        return;
    }

    if require_handshake && !session.handshake_seen {
        warn!(topic = %cmd.topic, "Command received before handshake");
        COMMANDS_REJECTED.inc();
        return;
    }

    let mut operator: Option<String> = None;
    if let Some(val) = validator {
        match &cmd.auth_token {
            Some(token) => match val.validate(token) {
                Ok(claims) => operator = Some(claims.operator),
                Err(e) => {
                    warn!(error = %e, topic = %cmd.topic, "Invalid operator token");
                    AUTH_FAILURES.inc();
                    COMMANDS_REJECTED.inc();
                    reject_audit(audit, clock, &cmd, "invalid operator token");
                    return;
                }
            },
            None => {
                warn!(topic = %cmd.topic, "Missing operator token");
                AUTH_MISSING.inc();
                COMMANDS_REJECTED.inc();
                reject_audit(audit, clock, &cmd, "missing operator token");
                return;
            }
        }
    }

    let target = match topics.route(&cmd.topic) {
        Ok(target) => target,
        Err(e) => {
            // Commands for unmapped topics are ignored, never fatal.
            warn!(error = %e, "Ignoring command");
            COMMANDS_REJECTED.inc();
            reject_audit(audit, clock, &cmd, "unknown topic");
            return;
        }
    };

    let action = match decode_action(cmd.payload.as_bytes()) {
        Ok(action) => action,
        Err(e) => {
            warn!(error = %e, topic = %cmd.topic, "Ignoring command");
            COMMANDS_REJECTED.inc();
            reject_audit(audit, clock, &cmd, "unrecognized payload");
            return;
        }
    };

    let effect = {
        let mut plant = plant.lock().unwrap();
        plant.apply(&target, action, clock.now_us())
    };
    COMMANDS_APPLIED.inc();

    match &effect {
        CommandEffect::MotorStarted(id) => info!(motor = %id, "Motor started by command"),
        CommandEffect::MotorStopped(id) => info!(motor = %id, "Motor stopped by command"),
        CommandEffect::RecloserClosed => {
            info!("Recloser closed by command");
            log_audit(
                audit,
                clock,
                AuditEventType::RecloserClosed,
                serde_json::json!({ "operator": operator }),
            );
        }
        CommandEffect::RecloserTripped { motors_stopped } => {
            warn!(motors_stopped = ?motors_stopped, "Recloser tripped by command");
            log_audit(
                audit,
                clock,
                AuditEventType::RecloserTripped,
                serde_json::json!({ "operator": operator, "motors_stopped": motors_stopped }),
            );
        }
        CommandEffect::Unchanged => debug!(topic = %cmd.topic, "Command had no effect"),
    }

    log_audit(
        audit,
        clock,
        AuditEventType::CommandApplied,
        serde_json::json!({
            "topic": cmd.topic,
            "payload": cmd.payload,
            "operator": operator,
            "client_id": session.client_id,
            "effect": format!("{:?}", effect),
        }),
    );
}

fn reject_audit(audit: Option<&AuditLogger>, clock: &SimClock, cmd: &CommandMsg, reason: &str) {
    log_audit(
        audit,
        clock,
        AuditEventType::CommandRejected,
        serde_json::json!({
            "topic": cmd.topic,
            "payload": cmd.payload,
            "reason": reason,
        }),
    );
}

fn log_audit(
    audit: Option<&AuditLogger>,
    clock: &SimClock,
    event_type: AuditEventType,
    details: serde_json::Value,
) {
    if let Some(logger) = audit {
        if let Err(e) = logger.log_event(clock.now_us(), clock.unix_us(), event_type, details) {
            warn!(error = %e, "Audit write failed");
        }
    }
}
