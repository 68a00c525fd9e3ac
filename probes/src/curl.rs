//! curl process probe executor.
//!
//! Runs `curl -s -L [--max-time T] -A <ua> -X <method> <url>` per attempt.
//! A non-zero exit status is a failure; curl is killed if the run is
//! cancelled while it is still running.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use stress_bench_core::{ProbeError, ProbeExecutor, ProbeRequest, ProbeStatus};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// curl's exit code for "operation timed out"
const CURL_TIMEOUT_EXIT: i32 = 28;

/// Longest output excerpt kept in a failure detail
const MAX_DETAIL_LEN: usize = 256;

/// Probe executor that shells out to curl
#[derive(Debug, Clone)]
pub struct CurlProbe {
    program: String,
}

impl CurlProbe {
    /// Use `curl` from `PATH`
    pub fn new() -> Self {
        Self::with_program("curl")
    }

    /// Use a specific curl binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The binary this probe runs
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for CurlProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for one attempt
pub fn build_args(request: &ProbeRequest) -> Vec<String> {
    let mut args = vec!["-s".to_string(), "-L".to_string()];
    if let Some(timeout) = request.timeout {
        args.push("--max-time".to_string());
        args.push(format_seconds(timeout));
    }
    args.extend([
        "-A".to_string(),
        request.user_agent.clone(),
        "-X".to_string(),
        request.method.clone(),
        request.target.clone(),
    ]);
    args
}

fn format_seconds(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        duration.as_secs().to_string()
    } else {
        format!("{:.3}", duration.as_secs_f64())
    }
}

fn excerpt(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stderr).trim().to_string();
    if text.is_empty() {
        text = String::from_utf8_lossy(stdout).trim().to_string();
    }
    if text.len() > MAX_DETAIL_LEN {
        let mut cut = MAX_DETAIL_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

#[async_trait]
impl ProbeExecutor for CurlProbe {
    fn name(&self) -> &str {
        "curl"
    }

    async fn probe(
        &self,
        request: &ProbeRequest,
        cancel: &CancellationToken,
    ) -> Result<ProbeStatus, ProbeError> {
        let child = Command::new(&self.program)
            .args(build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            output = child.wait_with_output() => output?,
        };

        if output.status.success() {
            return Ok(ProbeStatus::Success);
        }

        match output.status.code() {
            Some(CURL_TIMEOUT_EXIT) => Err(ProbeError::Timeout(request.timeout.unwrap_or_default())),
            code => {
                let output = excerpt(&output.stdout, &output.stderr);
                let status = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                tracing::trace!(target = %request.target, %status, "curl probe failed");
                Ok(ProbeStatus::failure(format!(
                    "curl exited with {status}. Output: {output}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProbeRequest {
        ProbeRequest {
            target: "http://example.invalid/path".into(),
            method: "POST".into(),
            user_agent: "ua/1.0".into(),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn test_build_args() {
        assert_eq!(
            build_args(&request()),
            vec![
                "-s",
                "-L",
                "--max-time",
                "5",
                "-A",
                "ua/1.0",
                "-X",
                "POST",
                "http://example.invalid/path"
            ]
        );
    }

    #[test]
    fn test_build_args_without_timeout() {
        let mut request = request();
        request.timeout = None;
        let args = build_args(&request);
        assert!(!args.iter().any(|a| a == "--max-time"));
        assert_eq!(args.len(), 7);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_secs(10)), "10");
        assert_eq!(format_seconds(Duration::from_millis(1500)), "1.500");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(1000);
        let text = excerpt(long.as_bytes(), b"");
        assert_eq!(text.len(), MAX_DETAIL_LEN + 3);
        assert_eq!(excerpt(b"out", b"  err \n"), "err");
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let probe = CurlProbe::with_program("/nonexistent/stress-bench-curl");
        let result = probe.probe(&request(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(ProbeError::Launch(_))));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        /// Write an executable shell script standing in for curl
        fn script(name: &str, body: &str) -> PathBuf {
            let dir = std::env::temp_dir().join(format!("stress-bench-curl-{}", std::process::id()));
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn probe(path: PathBuf) -> CurlProbe {
            CurlProbe::with_program(path.to_string_lossy())
        }

        #[tokio::test]
        async fn test_zero_exit_is_success() {
            let probe = probe(script("ok.sh", "exit 0"));
            let status = probe.probe(&request(), &CancellationToken::new()).await.unwrap();
            assert_eq!(status, ProbeStatus::Success);
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_failure_with_output() {
            let probe = probe(script("fail.sh", "echo \"$@\" >&2\nexit 6"));
            let status = probe.probe(&request(), &CancellationToken::new()).await.unwrap();
            match status {
                ProbeStatus::Failure { detail } => {
                    assert!(detail.starts_with("curl exited with 6."), "{detail}");
                    assert!(detail.contains("-A ua/1.0 -X POST http://example.invalid/path"));
                }
                other => panic!("Expected failure, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_timeout_exit_code() {
            let probe = probe(script("timeout.sh", "exit 28"));
            let result = probe.probe(&request(), &CancellationToken::new()).await;
            assert!(matches!(result, Err(ProbeError::Timeout(t)) if t == Duration::from_secs(5)));
        }

        #[tokio::test]
        async fn test_cancel_kills_process() {
            let probe = probe(script("hang.sh", "sleep 30"));
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.cancel();
            });

            let result = tokio::time::timeout(Duration::from_secs(2), probe.probe(&request(), &cancel))
                .await
                .expect("probe should return promptly on cancel");
            assert!(matches!(result, Err(ProbeError::Cancelled)));
        }
    }
}
