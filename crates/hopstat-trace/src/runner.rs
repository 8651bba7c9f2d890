use crate::parser::process_mtr_raw;
use anyhow::{anyhow, bail, Context, Result};
use hopstat_model::PathModel;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MtrSettings {
    pub program: String,
    /// Report cycles (`mtr -c`), also the loss denominator.
    pub rounds: u32,
    pub extra_args: Vec<String>,
}

impl Default for MtrSettings {
    fn default() -> Self {
        Self {
            program: "mtr".to_string(),
            rounds: 10,
            extra_args: Vec::new(),
        }
    }
}

impl MtrSettings {
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            bail!("rounds must be at least 1");
        }
        if self.program.trim().is_empty() {
            bail!("mtr program path is empty");
        }
        Ok(())
    }
}

/// `--raw -c <rounds> <target> <extra args...>`
pub fn mtr_command_args(target: &str, settings: &MtrSettings) -> Vec<String> {
    let mut args = vec![
        "--raw".to_string(),
        "-c".to_string(),
        settings.rounds.to_string(),
        target.to_string(),
    ];
    args.extend(settings.extra_args.iter().cloned());
    args
}

pub trait ProbeRunner: Send + Sync {
    fn run(&self, target: &str, settings: &MtrSettings) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMtrRunner;

impl ProbeRunner for SystemMtrRunner {
    fn run(&self, target: &str, settings: &MtrSettings) -> Result<Vec<u8>> {
        run_mtr(target, settings)
    }
}

pub fn run_mtr(target: &str, settings: &MtrSettings) -> Result<Vec<u8>> {
    info!(host = target, rounds = settings.rounds, program = %settings.program, "running mtr");

    let output = Command::new(&settings.program)
        .args(mtr_command_args(target, settings))
        .output()
        .with_context(|| format!("failed to spawn {} for {target}", settings.program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{} failed for {target} (status: {}): {}",
            settings.program,
            output.status,
            stderr.trim()
        ));
    }

    debug!(host = target, bytes = output.stdout.len(), "mtr finished");
    Ok(output.stdout)
}

/// Runs the probe and processes its output on the current thread.
pub fn trace_with_runner<R>(runner: &R, target: &str, settings: &MtrSettings) -> Result<PathModel>
where
    R: ProbeRunner + ?Sized,
{
    settings.validate()?;
    let raw = runner.run(target, settings)?;
    process_mtr_raw(&raw, settings.rounds)
        .with_context(|| format!("unable to process mtr output for {target}"))
}

pub fn trace(target: &str, settings: &MtrSettings) -> Result<PathModel> {
    trace_with_runner(&SystemMtrRunner, target, settings)
}

/// Completion handle for a trace running on a worker thread.
pub struct TraceHandle {
    target: String,
    receiver: Receiver<Result<PathModel>>,
}

impl TraceHandle {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Blocks until the worker resolves.
    pub fn wait(self) -> Result<PathModel> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(worker_gone(&self.target)))
    }

    /// Returns `None` while the worker is still running. The result is handed
    /// out once; later polls report the worker as gone.
    pub fn try_wait(&mut self) -> Option<Result<PathModel>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone(&self.target))),
        }
    }
}

fn worker_gone(target: &str) -> anyhow::Error {
    anyhow!("trace worker for {target} exited without a result")
}

pub fn spawn_trace<R>(runner: Arc<R>, target: &str, settings: MtrSettings) -> TraceHandle
where
    R: ProbeRunner + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker_target = target.to_string();

    thread::spawn(move || {
        let result = trace_with_runner(&*runner, &worker_target, &settings);
        let _ = tx.send(result);
    });

    TraceHandle {
        target: target.to_string(),
        receiver: rx,
    }
}

#[derive(Debug)]
pub struct TraceJobResult {
    pub target: String,
    pub result: Result<PathModel>,
}

pub fn run_traces(targets: &[String], settings: &MtrSettings, concurrency: usize) -> Vec<TraceJobResult> {
    run_traces_with_runner(targets, settings, concurrency, Arc::new(SystemMtrRunner))
}

/// Traces every target with at most `concurrency` probes in flight. Results
/// come back in the order of `targets`.
pub fn run_traces_with_runner<R>(
    targets: &[String],
    settings: &MtrSettings,
    concurrency: usize,
    runner: Arc<R>,
) -> Vec<TraceJobResult>
where
    R: ProbeRunner + ?Sized,
{
    let workers = concurrency.clamp(1, targets.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let runner = &runner;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(target) = targets.get(index) else {
                    break;
                };
                let result = trace_with_runner(&**runner, target, settings);
                if tx.send((index, result)).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Result<PathModel>>> = targets.iter().map(|_| None).collect();
    for (index, result) in rx {
        slots[index] = Some(result);
    }

    targets
        .iter()
        .zip(slots)
        .map(|(target, slot)| TraceJobResult {
            target: target.clone(),
            result: slot.unwrap_or_else(|| Err(worker_gone(target))),
        })
        .collect()
}
