//! CLI argument parsing and command dispatch

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stress_bench_core::{ControllerConfig, RunConfig};
use stress_bench_probes::{HttpConfig, ProbeKind, ProbeOptions};

#[derive(Parser, Debug)]
#[command(name = "stress-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a load test until the request budget is spent or Ctrl+C
    Run(RunArgs),
    /// Validate a configuration file
    Validate {
        /// Path to configuration file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (.json or .toml); flags override its values
    #[arg(short, long, env = "STRESS_BENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target URL
    #[arg(short, long, env = "STRESS_BENCH_URL")]
    pub url: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, env = "STRESS_BENCH_METHOD")]
    pub method: Option<String>,

    /// User-Agent header
    #[arg(short = 'A', long, env = "STRESS_BENCH_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Number of concurrent workers
    #[arg(short, long, env = "STRESS_BENCH_THREADS")]
    pub threads: Option<usize>,

    /// Total requests; 0 runs until stopped
    #[arg(short = 'n', long, env = "STRESS_BENCH_REQUESTS")]
    pub requests: Option<u64>,

    /// Pause after each attempt, per worker (milliseconds)
    #[arg(long, env = "STRESS_BENCH_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Per-attempt timeout in seconds; 0 disables it
    #[arg(long, env = "STRESS_BENCH_TIMEOUT_SEC")]
    pub timeout_sec: Option<u64>,

    /// Pool-wide request rate limit (requests per second)
    #[arg(long, env = "STRESS_BENCH_RATE_LIMIT")]
    pub rate_limit: Option<f64>,

    /// Probe executor: http or curl
    #[arg(long, env = "STRESS_BENCH_PROBE", default_value = "http")]
    pub probe: ProbeKind,

    /// curl binary used by the curl probe
    #[arg(long, env = "STRESS_BENCH_CURL")]
    pub curl_path: Option<String>,

    /// Count 4xx/5xx responses as failures (http probe)
    #[arg(long)]
    pub fail_on_http_error: bool,

    /// Interval between status lines (milliseconds)
    #[arg(long, default_value_t = 500)]
    pub status_interval_ms: u64,

    /// Print events as JSON lines instead of log lines
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Load the config file, if any, and apply flag overrides
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(method) = &self.method {
            config.method = method.to_ascii_uppercase();
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(requests) = self.requests {
            config.requests = requests;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
        if let Some(timeout_sec) = self.timeout_sec {
            config.timeout_sec = timeout_sec;
        }
        if self.rate_limit.is_some() {
            config.rate_limit = self.rate_limit;
        }

        Ok(config)
    }

    /// Engine tunables
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
            .with_status_interval(Duration::from_millis(self.status_interval_ms.max(1)))
    }

    /// Probe construction options
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            http: HttpConfig::default(),
            fail_on_http_error: self.fail_on_http_error,
            curl_program: self.curl_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_run(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(std::iter::once("stress-bench").chain(args.iter().copied()))
            .expect("arguments should parse");
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("Expected run command, got {other:?}"),
        }
    }

    #[test]
    fn test_run_flags_override_defaults() {
        let args = parse_run(&[
            "run", "--url", "http://x", "-X", "post", "-t", "4", "-n", "100", "--delay-ms", "5",
            "--timeout-sec", "3", "--rate-limit", "50",
        ]);
        let config = args.run_config().unwrap();

        assert_eq!(config.url, "http://x");
        assert_eq!(config.method, "POST");
        assert_eq!(config.threads, 4);
        assert_eq!(config.requests, 100);
        assert_eq!(config.delay_ms, 5);
        assert_eq!(config.timeout_sec, 3);
        assert_eq!(config.rate_limit, Some(50.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_defaults() {
        let args = parse_run(&["run", "--url", "http://x"]);
        assert_eq!(args.probe, ProbeKind::Http);
        assert!(!args.json);
        assert_eq!(
            args.controller_config().status_interval,
            Duration::from_millis(500)
        );

        let config = args.run_config().unwrap();
        assert_eq!(config.method, "GET");
        assert_eq!(config.requests, 0);
    }

    #[test]
    fn test_probe_selection() {
        let args = parse_run(&["run", "--probe", "curl", "--curl-path", "/usr/bin/curl"]);
        assert_eq!(args.probe, ProbeKind::Curl);
        assert_eq!(
            args.probe_options().curl_program.as_deref(),
            Some("/usr/bin/curl")
        );

        let result = Cli::try_parse_from(["stress-bench", "run", "--probe", "wget"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_with_overrides() {
        let path = std::env::temp_dir().join(format!("stress-bench-cli-{}.toml", std::process::id()));
        std::fs::write(&path, "url = \"http://from-file\"\nthreads = 8\nrequests = 20\n").unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let args = parse_run(&["run", "--config", &path_arg, "--threads", "2"]);
        let config = args.run_config().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.url, "http://from-file");
        assert_eq!(config.threads, 2);
        assert_eq!(config.requests, 20);
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::try_parse_from(["stress-bench", "validate", "--config", "run.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate { .. }));
    }
}
