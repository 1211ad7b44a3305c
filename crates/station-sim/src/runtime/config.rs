use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub bridge_enabled: bool,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub tick_ms: u64,
    pub namespace: String,
    pub seed: Option<u64>,
    pub fault_probability: f64,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub auth_secret: Option<String>,
    pub auth_max_age_secs: u64,
    pub require_handshake: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            bind_addr: "127.0.0.1:7700".to_string(),
            bridge_enabled: true,
            json_logs: false,
            metrics_addr: None,
            audit_path: None,
            tick_ms: 2000,
            namespace: "bombeo".to_string(),
            seed: None,
            fault_probability: 0.01,
            tls_cert: None,
            tls_key: None,
            auth_secret: None,
            auth_max_age_secs: 300,
            require_handshake: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--bind" => {
                    if i + 1 < args.len() {
                        cfg.bind_addr = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--no-bridge" => {
                    cfg.bridge_enabled = false;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--audit-log" => {
                    if i + 1 < args.len() {
                        cfg.audit_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--tick-ms" => {
                    if i + 1 < args.len() {
                        cfg.tick_ms = args[i + 1].parse().unwrap_or(2000).max(1);
                        i += 1;
                    }
                }
                "--namespace" => {
                    if i + 1 < args.len() {
                        cfg.namespace = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--seed" => {
                    if i + 1 < args.len() {
                        cfg.seed = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--fault-probability" => {
                    if i + 1 < args.len() {
                        cfg.fault_probability =
                            args[i + 1].parse().unwrap_or(0.01f64).clamp(0.0, 1.0);
                        i += 1;
                    }
                }
                "--tls-cert" => {
                    if i + 1 < args.len() {
                        cfg.tls_cert = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--tls-key" => {
                    if i + 1 < args.len() {
                        cfg.tls_key = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--auth-secret" => {
                    if i + 1 < args.len() {
                        cfg.auth_secret = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--auth-max-age" => {
                    if i + 1 < args.len() {
                        cfg.auth_max_age_secs = args[i + 1].parse().unwrap_or(300);
                        i += 1;
                    }
                }
                "--require-handshake" => {
                    cfg.require_handshake = true;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    pub fn print_help() {
        println!(
            r#"station-sim - Pumping-station device simulator

USAGE:
    station-sim [OPTIONS]

OPTIONS:
    --bind <ADDR>           Bridge TCP bind address [default: 127.0.0.1:7700]
    --no-bridge             Disable the bridge (standalone simulation)
    --run-seconds <SECS>    Run for a fixed duration then exit
    --json-logs             Output logs in JSON format (for log aggregation)
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>      Enable audit logging to specified JSONL file
    --tick-ms <MS>          Simulation tick period in milliseconds [default: 2000]
    --namespace <NS>        Topic namespace prefix [default: bombeo]
    --seed <N>              Seed the noise source for a reproducible run
    --fault-probability <P> Per-tick fault probability for running motors [default: 0.01]
    --tls-cert <PATH>       Path to TLS certificate (PEM) for bridge security
    --tls-key <PATH>        Path to TLS private key (PEM)
    --auth-secret <STR>     Shared secret for HMAC operator tokens on commands
    --auth-max-age <SECS>   Maximum operator token age in seconds [default: 300]
    --require-handshake     Require a protocol handshake before accepting commands
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,station_core=trace)

EXAMPLES:
    # Basic run with metrics
    station-sim --metrics-addr 0.0.0.0:9090

    # Deterministic short run without the bridge
    station-sim --run-seconds 10 --no-bridge --seed 7 --fault-probability 0

    # Production-style run with all observability
    station-sim --json-logs --metrics-addr 0.0.0.0:9090 --audit-log /var/log/station/audit.jsonl
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RuntimeConfig {
        let mut full = vec!["station-sim".to_string()];
        full.extend(args.iter().map(|s| s.to_string()));
        RuntimeConfig::from_args(&full)
    }

    #[test]
    fn defaults_without_args() {
        let cfg = parse(&[]);
        assert_eq!(cfg.tick_ms, 2000);
        assert_eq!(cfg.namespace, "bombeo");
        assert!(cfg.bridge_enabled);
        assert!(!cfg.show_help);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = parse(&[
            "--tick-ms",
            "1000",
            "--fault-probability",
            "0",
            "--seed",
            "42",
            "--no-bridge",
        ]);
        assert_eq!(cfg.tick_ms, 1000);
        assert_eq!(cfg.fault_probability, 0.0);
        assert_eq!(cfg.seed, Some(42));
        assert!(!cfg.bridge_enabled);
    }

    #[test]
    fn fault_probability_is_clamped() {
        let cfg = parse(&["--fault-probability", "7.5"]);
        assert_eq!(cfg.fault_probability, 1.0);
    }
}
