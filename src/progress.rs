use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::errors::HprofHistoError;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub label: &'static str,
    pub index: usize,
    pub total: usize,
}

/// Renders the progress of a parsing phase from a background thread.
///
/// The parsing thread must call `finish` (or drop the reporter) before printing anything else,
/// both wait for the polling thread to be gone.
pub struct ProgressReporter {
    done: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub fn start(
        phase: Phase,
        consumed: Arc<AtomicU64>,
        total_len: u64,
    ) -> Result<Self, HprofHistoError> {
        println!("{} (phase {}/{})", phase.label, phase.index, phase.total);
        let pb = ProgressBar::with_draw_target(Some(total_len), ProgressDrawTarget::stdout());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {bytes}/{total_bytes} (speed:{bytes_per_sec}) (eta:{eta})")?
                .progress_chars("#>-"),
        );

        // one-shot completion signal, a disconnection means the phase was interrupted
        let (send_done, receive_done) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name(format!("hprof-progress-{}", phase.index))
            .spawn(move || poll_progress(&pb, &consumed, &receive_done))?;

        Ok(ProgressReporter {
            done: Some(send_done),
            handle: Some(handle),
        })
    }

    /// Signals completion and blocks until the bar is rendered complete.
    pub fn finish(mut self) -> Result<(), HprofHistoError> {
        if let Some(done) = self.done.take() {
            // swallow errors as the poller can only be gone if it panicked, reported by join
            done.send(()).unwrap_or_default();
        }
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|e| HprofHistoError::StdThreadError { e }),
            None => Ok(()),
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        drop(self.done.take());
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default();
        }
    }
}

fn poll_progress(pb: &ProgressBar, consumed: &AtomicU64, receive_done: &Receiver<()>) {
    loop {
        pb.set_position(consumed.load(Ordering::Relaxed));
        match receive_done.recv_timeout(POLL_INTERVAL) {
            Ok(()) => {
                pb.finish();
                return;
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => {
                pb.abandon();
                return;
            }
        }
    }
}
