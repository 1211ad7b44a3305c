use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

struct StationProcess {
    child: Child,
    addr: String,
}

impl StationProcess {
    fn start() -> Self {
        // Prefer the test-built binary when available to avoid extra cargo builds.
        let bin_path = std::env::var("CARGO_BIN_EXE_station-sim").unwrap_or_else(|_| {
            let candidates = [
                "../../target/release/station-sim",
                "target/release/station-sim",
                "./target/release/station-sim",
                "../../target/debug/station-sim",
                "target/debug/station-sim",
                "./target/debug/station-sim",
            ];
            for candidate in candidates {
                if std::path::Path::new(candidate).exists() {
                    return candidate.to_string();
                }
            }
            panic!(
                "Failed to locate station-sim binary. Expected CARGO_BIN_EXE_station-sim or a build in target/{{release,debug}}/station-sim."
            );
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .expect("Failed to bind ephemeral port for integration test");
        let addr = listener
            .local_addr()
            .expect("Failed to resolve bound address");
        let bind_addr = format!("127.0.0.1:{}", addr.port());
        drop(listener);

        // Fast ticks, no random faults, fixed seed: the run is
        // command-driven and deterministic.
        let child = Command::new(&bin_path)
            .args([
                "--bind",
                &bind_addr,
                "--tick-ms",
                "100",
                "--fault-probability",
                "0",
                "--seed",
                "7",
            ])
            .spawn()
            .expect("Failed to start station-sim");

        // Loop until port is open (up to 5s)
        let start = std::time::Instant::now();
        while start.elapsed().as_secs() < 5 {
            if TcpStream::connect(&bind_addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }

        thread::sleep(Duration::from_millis(300));
        Self {
            child,
            addr: bind_addr,
        }
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

impl Drop for StationProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn connect(addr: &str) -> (TcpStream, BufReader<TcpStream>) {
    let stream = TcpStream::connect(addr).expect("Failed to connect to station");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let reader = BufReader::new(stream.try_clone().unwrap());
    (stream, reader)
}

fn next_telemetry(reader: &mut BufReader<TcpStream>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("telemetry read failed");
    serde_json::from_str(&line).expect("telemetry line should be JSON")
}

fn send_command(stream: &mut TcpStream, topic: &str, payload: &str) {
    let msg = serde_json::json!({
        "type": "command",
        "protocol_version": { "major": 1, "minor": 0 },
        "topic": topic,
        "payload": payload,
    });
    writeln!(stream, "{}", msg).expect("command write failed");
}

#[test]
fn marcha_command_brings_motor_online() {
    let station = StationProcess::start();
    let (mut stream, mut reader) = connect(station.addr());

    // First reading for m5 should be OFF: nothing was commanded yet.
    let first_m5 = loop {
        let msg = next_telemetry(&mut reader);
        if msg["topic"] == "bombeo/motores/m5/telemetria" {
            break msg;
        }
    };
    assert_eq!(first_m5["payload"]["estado"], "OFF");
    assert_eq!(first_m5["payload"]["falla"], "NO");

    // Whitespace and extra words must not matter: substring match.
    send_command(&mut stream, "bombeo/motores/m5/comandos", "  marcha ahora\n");

    // The ramp needs a couple of 100 ms ticks to clear the 1 A noise
    // floor; give it a generous window.
    let mut came_online = false;
    for _ in 0..200 {
        let msg = next_telemetry(&mut reader);
        if msg["topic"] != "bombeo/motores/m5/telemetria" {
            continue;
        }
        if msg["payload"]["estado"] == "ON" {
            assert_eq!(msg["payload"]["falla"], "NO");
            assert!(msg["payload"]["corriente"].as_f64().unwrap() > 1.0);
            came_online = true;
            break;
        }
    }
    assert!(came_online, "m5 never reported estado=ON after MARCHA");
}

#[test]
fn trip_takes_the_whole_station_offline() {
    let station = StationProcess::start();
    let (mut stream, mut reader) = connect(station.addr());

    send_command(&mut stream, "bombeo/motores/m5/comandos", "MARCHA");

    // Wait until the motor is visibly running.
    for _ in 0..200 {
        let msg = next_telemetry(&mut reader);
        if msg["topic"] == "bombeo/motores/m5/telemetria" && msg["payload"]["estado"] == "ON" {
            break;
        }
    }

    send_command(&mut stream, "bombeo/reco1/comandos", "TRIP");

    // Once the recloser reports OFF, every later m5 reading must be OFF:
    // the cascade and the tick share one lock, so there is no tick in
    // which the recloser is open but the motor still runs.
    let mut reco_off = false;
    let mut m5_checked = false;
    for _ in 0..200 {
        let msg = next_telemetry(&mut reader);
        if msg["topic"] == "bombeo/reco1/estado" && msg["payload"]["estado"] == "OFF" {
            reco_off = true;
            continue;
        }
        if reco_off && msg["topic"] == "bombeo/motores/m5/telemetria" {
            assert_eq!(msg["payload"]["estado"], "OFF");
            assert_eq!(msg["payload"]["corriente"], 0.0);
            m5_checked = true;
            break;
        }
    }
    assert!(reco_off, "recloser never reported OFF after TRIP");
    assert!(m5_checked, "no m5 reading observed after the trip");

    // CLOSE restores the recloser.
    send_command(&mut stream, "bombeo/reco1/comandos", "CLOSE");
    let mut reco_on = false;
    for _ in 0..200 {
        let msg = next_telemetry(&mut reader);
        if msg["topic"] == "bombeo/reco1/estado" && msg["payload"]["estado"] == "ON" {
            reco_on = true;
            break;
        }
    }
    assert!(reco_on, "recloser never reported ON after CLOSE");
}

#[test]
fn unknown_topics_and_garbage_are_ignored() {
    let station = StationProcess::start();
    let (mut stream, mut reader) = connect(station.addr());

    // None of these may crash the bridge or mutate any motor.
    send_command(&mut stream, "bombeo/motores/m99/comandos", "MARCHA");
    send_command(&mut stream, "bombeo/motores/m5/comandos", "hola");
    stream.write_all(b"this is not json\n").unwrap();

    let mut m5_readings = 0;
    for _ in 0..100 {
        let msg = next_telemetry(&mut reader);
        if msg["topic"] == "bombeo/motores/m5/telemetria" {
            assert_eq!(msg["payload"]["estado"], "OFF");
            m5_readings += 1;
            if m5_readings >= 3 {
                break;
            }
        }
    }
    assert!(m5_readings >= 3, "bridge stopped publishing after bad input");
}
