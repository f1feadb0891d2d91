//! Worker-process integration runner
//!
//! Every job runs in a fresh child process that receives its configuration
//! through a [`TransientConfigBundle`]. Output is streamed line by line into
//! tracing and the job's remote log sink while the runner waits for exit.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tidewater_core::{IntegrationRunner, JobLogSink, RunReport, RunRequest};
use tidewater_domain::constants::{
    ARG_AGENT_CONFIG_FILE, ARG_INTEGRATIONS_FILE, ARG_JOB_ID, ARG_LOG_FORMAT, ARG_LOG_LEVEL,
    ARG_REPROCESS_HISTORICAL, WORKER_LOG_FORMAT, WORKER_SUBCOMMAND,
};
use tidewater_domain::{AgentError, Result, WorkerAgentConfig};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::bundle::TransientConfigBundle;
use crate::errors::infra_err;

pub struct ProcessIntegrationRunner {
    program: PathBuf,
    leading_args: Vec<OsString>,
    temp_dir: PathBuf,
    worker_config: WorkerAgentConfig,
}

impl ProcessIntegrationRunner {
    pub fn new(
        program: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        worker_config: WorkerAgentConfig,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            temp_dir: temp_dir.into(),
            worker_config,
        }
    }

    /// Arguments placed before the worker subcommand, for interpreters or
    /// wrapper programs.
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self, bundle: &TransientConfigBundle, request: &RunRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(WORKER_SUBCOMMAND)
            .arg(ARG_INTEGRATIONS_FILE)
            .arg(bundle.integrations_file())
            .arg(ARG_AGENT_CONFIG_FILE)
            .arg(bundle.agent_config_file())
            .arg(ARG_LOG_LEVEL)
            .arg(&request.log_level)
            .arg(ARG_LOG_FORMAT)
            .arg(WORKER_LOG_FORMAT)
            .arg(ARG_JOB_ID)
            .arg(&request.job_id);
        if request.reprocess_historical {
            command.arg(ARG_REPROCESS_HISTORICAL);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl IntegrationRunner for ProcessIntegrationRunner {
    async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let started = Instant::now();
        let bundle = TransientConfigBundle::write(
            &self.temp_dir,
            &request.job_id,
            &request.integrations,
            &self.worker_config,
        )?;

        let mut child = self.command(&bundle, &request).spawn().map_err(|e| {
            AgentError::Process(format!("failed to spawn worker {}: {e}", self.program.display()))
        })?;
        info!(
            job_id = %request.job_id,
            correlation_id = %request.correlation_id,
            pid = child.id(),
            integrations = request.integrations.len(),
            "runner.worker.spawned"
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let sink = request.log_sink.as_ref();
        let (status, (), ()) = tokio::join!(
            child.wait(),
            pump(stdout, "stdout", &request.job_id, sink),
            pump(stderr, "stderr", &request.job_id, sink),
        );

        if let Some(sink) = sink {
            if let Err(err) = sink.flush().await {
                warn!(job_id = %request.job_id, error = %err, "runner.log_sink.flush_failed");
            }
        }

        let status =
            status.map_err(|e| AgentError::Process(format!("failed to wait for worker: {e}")))?;
        let duration = started.elapsed();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        if !status.success() {
            let reason = describe(status);
            warn!(job_id = %request.job_id, %reason, duration_ms, "runner.worker.failed");
            return Err(AgentError::Process(reason));
        }

        let artifact_count = count_artifacts(&self.worker_config.uploads_dir).await?;
        info!(
            job_id = %request.job_id,
            artifact_count,
            duration_ms,
            "runner.worker.exited"
        );
        drop(bundle);

        Ok(RunReport { exit_code: status.code().unwrap_or(0), artifact_count, duration })
    }
}

async fn pump<R>(
    reader: Option<R>,
    stream: &'static str,
    job_id: &str,
    sink: Option<&Arc<dyn JobLogSink>>,
) where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(job_id, stream, line = %line, "runner.worker.output");
                if let Some(sink) = sink {
                    sink.write_line(line).await;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(job_id, stream, error = %err, "runner.worker.output_unreadable");
                break;
            }
        }
    }
    debug!(job_id, stream, "runner.worker.stream_closed");
}

fn describe(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("worker exited with status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("worker terminated by signal {signal}");
        }
    }
    format!("worker exited abnormally: {status}")
}

async fn count_artifacts(uploads_dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(uploads_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(infra_err(err, format!("read {}", uploads_dir.display()))),
    };
    let mut count = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| infra_err(e, format!("read {}", uploads_dir.display())))?
    {
        let file_type = entry.file_type().await.map_err(|e| infra_err(e, "stat artifact"))?;
        if file_type.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(all(test, unix))]
mod tests {
    use parking_lot::Mutex;
    use tidewater_domain::{EncryptionKey, IntegrationConfig, SystemType};
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct Lines {
        lines: Mutex<Vec<String>>,
        flushes: Mutex<usize>,
    }

    #[async_trait]
    impl JobLogSink for Lines {
        async fn write_line(&self, line: String) {
            self.lines.lock().push(line);
        }

        async fn flush(&self) -> Result<()> {
            *self.flushes.lock() += 1;
            Ok(())
        }
    }

    struct Fixture {
        root: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(root.path().join("temp")).unwrap();
            std::fs::create_dir_all(root.path().join("uploads")).unwrap();
            Self { root }
        }

        fn temp_dir(&self) -> PathBuf {
            self.root.path().join("temp")
        }

        fn uploads_dir(&self) -> PathBuf {
            self.root.path().join("uploads")
        }

        /// Runner that executes `body` with `/bin/sh`; the worker arguments
        /// arrive as `$1..`.
        fn runner(&self, body: &str) -> ProcessIntegrationRunner {
            let script = self.root.path().join("worker.sh");
            std::fs::write(&script, body).unwrap();
            let config = WorkerAgentConfig {
                device_id: Uuid::new_v4(),
                customer_id: "c1".into(),
                channel: "stable".into(),
                encryption_key: EncryptionKey::from_bytes([2; 32]),
                uploads_dir: self.uploads_dir(),
                state_file: self.root.path().join("last_processed.json"),
            };
            ProcessIntegrationRunner::new("/bin/sh", self.temp_dir(), config)
                .with_leading_args([script])
        }

        fn assert_no_transient_files(&self) {
            let left: Vec<_> = std::fs::read_dir(self.temp_dir()).unwrap().collect();
            assert!(left.is_empty(), "transient files left behind: {left:?}");
        }
    }

    fn request(sink: Option<Arc<dyn JobLogSink>>, reprocess_historical: bool) -> RunRequest {
        RunRequest {
            job_id: "j1".into(),
            correlation_id: "m1".into(),
            integrations: vec![IntegrationConfig {
                name: "github".into(),
                stable_id: Some("repo1".into()),
                system_type: Some(SystemType::SourceCode),
                encrypted_auth: Some("c2VhbGVk".into()),
                exclusions: Vec::new(),
                config: serde_json::Value::Null,
            }],
            reprocess_historical,
            log_level: "debug".into(),
            log_sink: sink,
        }
    }

    #[tokio::test]
    async fn successful_run_streams_output_and_counts_artifacts() {
        let fixture = Fixture::new();
        let uploads = fixture.uploads_dir();
        let runner = fixture.runner(&format!(
            "test \"$1\" = export || exit 64\n\
             test \"$2\" = --integrations-file || exit 64\n\
             cat \"$3\"; echo\n\
             echo \"job ${{11}} level $7\"\n\
             echo to-stderr >&2\n\
             echo '{{}}' > {}/out.json\n",
            uploads.display()
        ));
        let lines = Arc::new(Lines::default());

        let report = runner.run(request(Some(lines.clone()), false)).await.unwrap();

        assert_eq!(report.exit_code, 0);
        assert_eq!(report.artifact_count, 1);
        assert!(report.has_artifacts());
        let seen = lines.lines.lock().clone();
        assert!(seen.iter().any(|l| l.contains("\"stable_id\":\"repo1\"")), "{seen:?}");
        assert!(seen.contains(&"job j1 level debug".to_string()));
        assert!(seen.contains(&"to-stderr".to_string()));
        assert_eq!(*lines.flushes.lock(), 1);
        fixture.assert_no_transient_files();
    }

    #[tokio::test]
    async fn clean_exit_without_artifacts_is_success() {
        let fixture = Fixture::new();
        let runner = fixture.runner("exit 0\n");

        let report = runner.run(request(None, false)).await.unwrap();
        assert_eq!(report.artifact_count, 0);
        assert!(!report.has_artifacts());
        fixture.assert_no_transient_files();
    }

    #[tokio::test]
    async fn reprocess_flag_is_forwarded() {
        let fixture = Fixture::new();
        let runner = fixture.runner("test \"${12}\" = --reprocess-historical || exit 7\n");

        runner.run(request(None, true)).await.unwrap();
        let err = runner.run(request(None, false)).await.unwrap_err();
        assert_eq!(err, AgentError::Process("worker exited with status 7".into()));
        fixture.assert_no_transient_files();
    }

    #[tokio::test]
    async fn worker_is_asked_for_json_logs() {
        let fixture = Fixture::new();
        let runner = fixture.runner("test \"$8 $9\" = \"--log-format json\" || exit 9\n");

        runner.run(request(None, false)).await.unwrap();
        fixture.assert_no_transient_files();
    }

    #[tokio::test]
    async fn failing_worker_is_process_error() {
        let fixture = Fixture::new();
        let runner = fixture.runner("echo partial\nexit 3\n");
        let lines = Arc::new(Lines::default());

        let err = runner.run(request(Some(lines.clone()), false)).await.unwrap_err();
        assert_eq!(err.code(), "process_error");
        assert!(err.to_string().contains("status 3"));
        assert_eq!(lines.lines.lock().as_slice(), ["partial".to_string()]);
        assert_eq!(*lines.flushes.lock(), 1);
        fixture.assert_no_transient_files();
    }

    #[tokio::test]
    async fn crashed_worker_is_process_error() {
        let fixture = Fixture::new();
        let runner = fixture.runner("kill -9 $$\n");

        let err = runner.run(request(None, false)).await.unwrap_err();
        assert!(err.to_string().contains("signal 9"), "{err}");
        fixture.assert_no_transient_files();
    }

    #[tokio::test]
    async fn spawn_failure_is_process_error() {
        let fixture = Fixture::new();
        let runner = ProcessIntegrationRunner::new(
            fixture.root.path().join("missing-worker"),
            fixture.temp_dir(),
            fixture.runner("").worker_config.clone(),
        );

        let err = runner.run(request(None, false)).await.unwrap_err();
        assert_eq!(err.code(), "process_error");
        assert!(err.to_string().contains("failed to spawn"));
        fixture.assert_no_transient_files();
    }
}
