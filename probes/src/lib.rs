//! Probe executor implementations for stress-bench
//!
//! This crate provides implementations of the `ProbeExecutor` trait:
//!
//! - [`HttpProbe`]: native HTTP requests over a pooled `reqwest` client
//! - [`CurlProbe`]: one external `curl` process per attempt

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod curl;
pub mod http;

pub use curl::CurlProbe;
pub use http::{HttpClientPool, HttpConfig, HttpProbe};

use std::str::FromStr;
use std::sync::Arc;

use stress_bench_core::ProbeExecutor;

/// Errors raised while setting up a probe executor
#[derive(Debug, thiserror::Error)]
pub enum ProbeSetupError {
    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Unrecognized probe name
    #[error("unknown probe '{0}' (expected 'http' or 'curl')")]
    UnknownProbe(String),
}

/// Which probe executor to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeKind {
    /// Native HTTP client
    #[default]
    Http,
    /// External curl process
    Curl,
}

impl FromStr for ProbeKind {
    type Err = ProbeSetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "native" => Ok(ProbeKind::Http),
            "curl" => Ok(ProbeKind::Curl),
            other => Err(ProbeSetupError::UnknownProbe(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Http => f.write_str("http"),
            ProbeKind::Curl => f.write_str("curl"),
        }
    }
}

/// Options shared by the probe constructors
#[derive(Debug, Clone, Default)]
pub struct ProbeOptions {
    /// HTTP client settings (native probe only)
    pub http: HttpConfig,
    /// Count 4xx/5xx responses as failures (native probe only)
    pub fail_on_http_error: bool,
    /// Path to the curl binary (curl probe only)
    pub curl_program: Option<String>,
}

/// Build the probe executor for `kind`
pub fn build_probe(
    kind: ProbeKind,
    options: &ProbeOptions,
) -> Result<Arc<dyn ProbeExecutor>, ProbeSetupError> {
    let probe: Arc<dyn ProbeExecutor> = match kind {
        ProbeKind::Http => Arc::new(
            HttpProbe::new(&options.http)?.fail_on_http_error(options.fail_on_http_error),
        ),
        ProbeKind::Curl => match &options.curl_program {
            Some(program) => Arc::new(CurlProbe::with_program(program)),
            None => Arc::new(CurlProbe::new()),
        },
    };
    tracing::debug!(probe = probe.name(), "Probe executor ready");
    Ok(probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_kind_parse() {
        assert_eq!("http".parse::<ProbeKind>().unwrap(), ProbeKind::Http);
        assert_eq!("CURL".parse::<ProbeKind>().unwrap(), ProbeKind::Curl);
        assert!(matches!(
            "wget".parse::<ProbeKind>(),
            Err(ProbeSetupError::UnknownProbe(name)) if name == "wget"
        ));
        assert_eq!(ProbeKind::Curl.to_string(), "curl");
    }

    #[test]
    fn test_build_probe() {
        let options = ProbeOptions::default();
        assert_eq!(build_probe(ProbeKind::Http, &options).unwrap().name(), "http");
        assert_eq!(build_probe(ProbeKind::Curl, &options).unwrap().name(), "curl");
    }
}
