//! One supervised server run.
//!
//! State machine: `NotStarted -> Running -> (Stopping) -> Finished`.
//! Output lines are classified as they arrive; failed artifacts are
//! removed from both trees immediately and the run keeps going, since a
//! single boot can report several independent failures.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn, Instrument};
use uuid::Uuid;

use super::classify::LineClassifier;
use crate::config::LaunchConfig;
use crate::domain::outcome::RunTally;
use crate::domain::{PackError, Result, ValidationEvent, ValidationOutcome};
use crate::obs;
use crate::tree::WorkingTreePair;

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotStarted,
    Running,
    /// The stop directive has been sent.
    Stopping,
    Finished,
}

/// Launches the server against a tree pair and classifies its output.
#[derive(Debug, Clone)]
pub struct ServerSupervisor {
    launch: LaunchConfig,
    classifier: LineClassifier,
}

impl ServerSupervisor {
    pub fn new(launch: LaunchConfig) -> Result<Self> {
        if launch.command.is_empty() {
            return Err(PackError::Config("launch command is empty".to_string()));
        }
        let classifier = LineClassifier::new(&launch.failure_pattern, &launch.success_pattern)?;
        Ok(Self { launch, classifier })
    }

    pub fn launch(&self) -> &LaunchConfig {
        &self.launch
    }

    /// Boot the base tree once and report what happened.
    pub async fn run(&self, pair: &WorkingTreePair, attempt: u32) -> Result<ValidationOutcome> {
        let run_id = Uuid::new_v4().to_string();
        self.run_inner(pair)
            .instrument(obs::run_span(&run_id, attempt))
            .await
    }

    async fn run_inner(&self, pair: &WorkingTreePair) -> Result<ValidationOutcome> {
        let started = Instant::now();
        let mut state = SupervisorState::NotStarted;

        tokio::fs::write(
            pair.base().join(&self.launch.eula_file),
            self.launch.eula_contents.as_bytes(),
        )
        .await?;

        let (mut child, mut lines) = self.spawn(pair)?;
        let mut stdin = child.stdin.take();
        transition(&mut state, SupervisorState::Running);
        obs::emit_run_started(pair.base());

        let boot_deadline = (self.launch.boot_timeout_secs > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_secs(self.launch.boot_timeout_secs));
        let mut stop_deadline = None;

        let mut tally = RunTally::default();
        let mut force_kill = false;

        loop {
            let deadline = match state {
                SupervisorState::Stopping => stop_deadline,
                _ => boot_deadline,
            };
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, lines.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        if state == SupervisorState::Stopping {
                            warn!(
                                grace_secs = self.launch.stop_grace_secs,
                                "server ignored stop directive, killing"
                            );
                        } else {
                            warn!(
                                timeout_secs = self.launch.boot_timeout_secs,
                                "boot deadline reached, killing server"
                            );
                            tally.timed_out = true;
                        }
                        force_kill = true;
                        break;
                    }
                },
                None => lines.recv().await,
            };

            let Some(line) = next else {
                break;
            };
            tally.lines_scanned += 1;

            match self.classifier.classify(&line) {
                Some(ValidationEvent::ArtifactFailure(artifact)) => {
                    if tally.seen(&artifact) {
                        continue;
                    }
                    match pair.remove_artifact(&artifact) {
                        Ok(true) => obs::emit_artifact_removed(&artifact),
                        Ok(false) => obs::emit_artifact_missing(&artifact),
                        Err(PackError::UnsafeArtifactName(name)) => {
                            warn!(artifact = %name, "failure names an unsafe artifact path, not removing");
                            tally.unremovable.push(name);
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                    tally.removed.push(artifact);
                }
                Some(ValidationEvent::CleanCompletion) => {
                    tally.clean = true;
                    obs::emit_clean_completion(tally.lines_scanned);
                    if state == SupervisorState::Running {
                        self.send_stop(&mut stdin).await;
                        transition(&mut state, SupervisorState::Stopping);
                        stop_deadline = Some(
                            tokio::time::Instant::now()
                                + Duration::from_secs(self.launch.stop_grace_secs),
                        );
                    }
                }
                None => trace!(line = %line, "server output"),
            }
        }

        drop(stdin);
        let exit_code = self.reap(&mut child, force_kill).await?;
        transition(&mut state, SupervisorState::Finished);

        let outcome = ValidationOutcome::from_run(
            tally,
            exit_code,
            started.elapsed().as_millis() as u64,
        );
        obs::emit_run_finished(&outcome);
        Ok(outcome)
    }

    /// Start the server with stdin piped and both output streams merged
    /// into one line channel.
    fn spawn(
        &self,
        pair: &WorkingTreePair,
    ) -> Result<(Child, mpsc::UnboundedReceiver<String>)> {
        let exe = &self.launch.command[0];
        let args = &self.launch.command[1..];
        let launch_error =
            |e: std::io::Error| PackError::Launch(format!("{}: {e}", self.launch.command.join(" ")));

        let (stdout, stderr, output) = output_pipe().map_err(launch_error)?;
        let child = Command::new(exe)
            .args(args)
            .current_dir(pair.base())
            .stdin(Stdio::piped())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_error)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_lines(output, tx));
        Ok((child, rx))
    }

    async fn send_stop(&self, stdin: &mut Option<ChildStdin>) {
        let Some(pipe) = stdin.as_mut() else {
            return;
        };
        let directive = format!("{}\n", self.launch.stop_directive);
        let sent = async {
            pipe.write_all(directive.as_bytes()).await?;
            pipe.flush().await
        }
        .await;

        match sent {
            Ok(()) => debug!(directive = %self.launch.stop_directive, "stop directive sent"),
            // The server may already be on its way out.
            Err(e) => warn!(error = %e, "could not send stop directive"),
        }
    }

    /// Wait for exit, killing the process if asked to or if it outlives
    /// its output by more than the stop grace period.
    async fn reap(&self, child: &mut Child, force_kill: bool) -> Result<Option<i32>> {
        if !force_kill {
            let grace = Duration::from_secs(self.launch.stop_grace_secs);
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return Ok(status?.code());
            }
            warn!("server closed its output but did not exit, killing");
        }

        if let Err(e) = child.start_kill() {
            debug!(error = %e, "kill failed, process already gone");
        }
        Ok(child.wait().await?.code())
    }
}

fn transition(state: &mut SupervisorState, next: SupervisorState) {
    debug!(from = ?*state, to = ?next, "supervisor state");
    *state = next;
}

/// One pipe serving as both stdout and stderr, so lines arrive in the
/// order the server wrote them. The read end sees end-of-stream once
/// every holder of the write end has exited.
fn output_pipe() -> std::io::Result<(Stdio, Stdio, tokio::net::unix::pipe::Receiver)> {
    let (reader, writer) = std::io::pipe()?;
    let stderr = writer.try_clone()?;
    let reader = tokio::net::unix::pipe::Receiver::from_file(std::fs::File::from(
        std::os::fd::OwnedFd::from(reader),
    ))?;
    Ok((Stdio::from(writer), Stdio::from(stderr), reader))
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if tx.send(line).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "server output pipe closed");
                return;
            }
        }
    }
}
