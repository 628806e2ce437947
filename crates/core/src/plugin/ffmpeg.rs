//! FFmpeg-based plugin implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::config::FfmpegConfig;
use super::error::PluginError;
use super::traits::TranscodePlugin;
use super::types::{ExecOutcome, ParamValue, TranscodeJob, TranscodeMessage, STATUS_FAILED};

/// Progress parsed from `-progress pipe:2` output.
#[derive(Debug, Clone, Default)]
struct RunProgress {
    pid: Option<u32>,
    out_time_secs: f64,
    frame: Option<u64>,
    speed: Option<String>,
}

/// Handle on one in-flight ffmpeg process.
#[derive(Clone)]
struct ActiveRun {
    cancel: Arc<Notify>,
    progress: Arc<Mutex<RunProgress>>,
}

impl ActiveRun {
    fn new(pid: Option<u32>) -> Self {
        Self {
            cancel: Arc::new(Notify::new()),
            progress: Arc::new(Mutex::new(RunProgress {
                pid,
                ..Default::default()
            })),
        }
    }

    fn progress(&self) -> MutexGuard<'_, RunProgress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Regexes for the progress keys we track.
struct ProgressParser {
    time: Option<Regex>,
    speed: Option<Regex>,
    frame: Option<Regex>,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            time: Regex::new(r"out_time_ms=(\d+)").ok(),
            speed: Regex::new(r"speed=\s*(\d+\.?\d*)x").ok(),
            frame: Regex::new(r"^frame=\s*(\d+)").ok(),
        }
    }

    fn apply(&self, line: &str, progress: &mut RunProgress) {
        if let Some(caps) = self.time.as_ref().and_then(|re| re.captures(line)) {
            if let Some(us) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                // out_time_ms is in microseconds despite its name
                progress.out_time_secs = us / 1_000_000.0;
            }
        }
        if let Some(caps) = self.speed.as_ref().and_then(|re| re.captures(line)) {
            if let Some(speed) = caps.get(1) {
                progress.speed = Some(format!("{}x", speed.as_str()));
            }
        }
        if let Some(caps) = self.frame.as_ref().and_then(|re| re.captures(line)) {
            progress.frame = caps.get(1).and_then(|m| m.as_str().parse().ok());
        }
    }
}

/// Plugin that shells out to `ffmpeg`.
///
/// A single instance serves every task of the formats it is registered for;
/// running processes are tracked by task id so they can be cancelled and
/// queried.
pub struct FfmpegPlugin {
    config: FfmpegConfig,
    active: Mutex<HashMap<String, ActiveRun>>,
}

impl FfmpegPlugin {
    /// Creates a new FFmpeg plugin with the given configuration.
    pub fn new(config: FfmpegConfig) -> Self {
        Self {
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a plugin with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FfmpegConfig::default())
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    fn active(&self) -> MutexGuard<'_, HashMap<String, ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds the ffmpeg command line for a job.
    ///
    /// Parameter keys are passed through as options (a missing leading `-` is
    /// added); `true` flags are emitted bare and `false` flags are dropped.
    fn build_args(&self, job: &TranscodeJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            job.input.to_string_lossy().to_string(),
        ];

        for (key, value) in &job.params {
            let option = if key.starts_with('-') {
                key.clone()
            } else {
                format!("-{}", key)
            };
            match value {
                ParamValue::Bool(true) => args.push(option),
                ParamValue::Bool(false) => {}
                other => args.extend([option, other.to_string()]),
            }
        }

        args.extend([
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        args.extend(self.config.extra_args.iter().cloned());

        args.push(job.output.to_string_lossy().to_string());

        args
    }

    /// Reads progress until the process exits, is cancelled or times out.
    async fn drive(
        &self,
        job: &TranscodeJob,
        child: &mut Child,
        run: &ActiveRun,
    ) -> Result<ExecOutcome, PluginError> {
        let start = Instant::now();
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PluginError::execution_failed("stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();
        let parser = ProgressParser::new();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let work = async {
            let mut error_output = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }
                parser.apply(&line, &mut run.progress());
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        };

        let result = tokio::select! {
            res = timeout(timeout_duration, work) => Some(res),
            _ = run.cancel.notified() => None,
        };

        match result {
            None => {
                let _ = child.kill().await;
                info!(task_id = %job.task_id, "FFmpeg execution cancelled");
                Err(PluginError::Cancelled)
            }
            Some(Err(_)) => {
                let _ = child.kill().await;
                Err(PluginError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
            Some(Ok(Err(e))) => Err(PluginError::Io(e)),
            Some(Ok(Ok((status, error_output)))) => {
                if !status.success() {
                    debug!(
                        task_id = %job.task_id,
                        code = ?status.code(),
                        "FFmpeg exited with failure"
                    );
                    return Ok(ExecOutcome::failure(
                        status.code().unwrap_or(STATUS_FAILED),
                        TranscodeMessage::with_error(error_output),
                    ));
                }

                let output_size = tokio::fs::metadata(&job.output)
                    .await
                    .map(|m| m.len())
                    .map_err(|_| PluginError::execution_failed("Output file not created", None))?;

                let mut message = TranscodeMessage::with_output(format!(
                    "{} -> {}",
                    job.input.display(),
                    job.output.display()
                ));
                message.details.insert(
                    "duration_ms".to_string(),
                    serde_json::json!(start.elapsed().as_millis() as u64),
                );
                message
                    .details
                    .insert("output_size_bytes".to_string(), serde_json::json!(output_size));

                Ok(ExecOutcome::success(message))
            }
        }
    }
}

#[async_trait]
impl TranscodePlugin for FfmpegPlugin {
    fn kind(&self) -> &str {
        "ffmpeg"
    }

    async fn exec(&self, job: &TranscodeJob) -> Result<ExecOutcome, PluginError> {
        if let Some(parent) = job.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let args = self.build_args(job);
        debug!(task_id = %job.task_id, ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PluginError::ExecutableNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    PluginError::Io(e)
                }
            })?;

        let run = ActiveRun::new(child.id());
        self.active().insert(job.task_id.clone(), run.clone());

        let result = self.drive(job, &mut child, &run).await;

        self.active().remove(&job.task_id);
        result
    }

    async fn cancel(&self, task_id: &str) -> Result<(), PluginError> {
        let run = self.active().get(task_id).cloned();
        match run {
            Some(run) => {
                run.cancel.notify_one();
                Ok(())
            }
            None => Err(PluginError::NotRunning {
                task_id: task_id.to_string(),
            }),
        }
    }

    async fn process(
        &self,
        task_id: &str,
    ) -> Result<HashMap<String, serde_json::Value>, PluginError> {
        let run = self
            .active()
            .get(task_id)
            .cloned()
            .ok_or_else(|| PluginError::NotRunning {
                task_id: task_id.to_string(),
            })?;

        let progress = run.progress().clone();
        let mut status = HashMap::new();
        status.insert("pid".to_string(), serde_json::json!(progress.pid));
        status.insert(
            "out_time_secs".to_string(),
            serde_json::json!(progress.out_time_secs),
        );
        status.insert("frame".to_string(), serde_json::json!(progress.frame));
        status.insert("speed".to_string(), serde_json::json!(progress.speed));
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::types::TranscodeParams;
    use std::path::PathBuf;

    fn job(params: TranscodeParams) -> TranscodeJob {
        TranscodeJob {
            task_id: "task-1".to_string(),
            input: PathBuf::from("/in/a.flv"),
            output: PathBuf::from("/out/a.mp4"),
            params,
        }
    }

    #[test]
    fn test_build_args() {
        let plugin = FfmpegPlugin::with_defaults();
        let mut params = TranscodeParams::new();
        params.insert("-b:v".to_string(), ParamValue::from(1_200_000));
        params.insert("r".to_string(), ParamValue::from(30));
        params.insert("-an".to_string(), ParamValue::from(true));
        params.insert("-sn".to_string(), ParamValue::from(false));

        let args = plugin.build_args(&job(params));

        assert_eq!(&args[..3], &["-y", "-i", "/in/a.flv"]);
        assert!(args.windows(2).any(|w| w == ["-b:v", "1200000"]));
        assert!(args.windows(2).any(|w| w == ["-r", "30"]));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-sn".to_string()));
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:2"]));
        assert_eq!(args.last().unwrap(), "/out/a.mp4");
    }

    #[test]
    fn test_build_args_extra_args() {
        let mut config = FfmpegConfig::default();
        config.extra_args = vec!["-threads".to_string(), "2".to_string()];
        let plugin = FfmpegPlugin::new(config);

        let args = plugin.build_args(&job(TranscodeParams::new()));
        let threads = args.iter().position(|a| a == "-threads").unwrap();
        assert_eq!(args[threads + 1], "2");
        assert_eq!(args.last().unwrap(), "/out/a.mp4");
    }

    #[test]
    fn test_progress_parser() {
        let parser = ProgressParser::new();
        let mut progress = RunProgress::default();

        parser.apply("frame=120", &mut progress);
        parser.apply("out_time_ms=5000000", &mut progress);
        parser.apply("speed=2.5x", &mut progress);

        assert_eq!(progress.frame, Some(120));
        assert_eq!(progress.out_time_secs, 5.0);
        assert_eq!(progress.speed.as_deref(), Some("2.5x"));
    }

    #[tokio::test]
    async fn test_cancel_without_execution() {
        let plugin = FfmpegPlugin::with_defaults();
        let result = plugin.cancel("missing").await;
        assert!(matches!(result, Err(PluginError::NotRunning { .. })));
        assert!(plugin.process("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let temp = tempfile::TempDir::new().unwrap();
        let plugin = FfmpegPlugin::new(FfmpegConfig::with_path(PathBuf::from(
            "/nonexistent/ffmpeg-binary",
        )));
        let job = TranscodeJob {
            task_id: "task-1".to_string(),
            input: temp.path().join("a.flv"),
            output: temp.path().join("out/a.mp4"),
            params: TranscodeParams::new(),
        };

        let result = plugin.exec(&job).await;
        assert!(matches!(result, Err(PluginError::ExecutableNotFound { .. })));
        assert!(plugin.active().is_empty());
    }
}
