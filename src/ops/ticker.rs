use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

/// A recurring timer on its own thread.
///
/// The worker sends a running tick count every `period`. Dropping the
/// ticker (or calling `cancel`) disconnects the stop channel, which wakes
/// the worker immediately; the thread is joined before `drop` returns, so
/// at most one ticker per owner is ever live.
pub struct Ticker {
    stop_tx: Option<mpsc::Sender<()>>,
    tick_rx: mpsc::Receiver<u64>,
    worker: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn start(period: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (tick_tx, tick_rx) = mpsc::channel::<u64>();

        let worker = std::thread::spawn(move || {
            let mut count = 0u64;
            loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        count += 1;
                        if tick_tx.send(count).is_err() {
                            break;
                        }
                    }
                    // explicit stop or owner gone
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ticker {
            stop_tx: Some(stop_tx),
            tick_rx,
            worker: Some(worker),
        }
    }

    /// Wait up to `timeout` for the next tick
    pub fn recv_timeout(&self, timeout: Duration) -> Option<u64> {
        self.tick_rx.recv_timeout(timeout).ok()
    }

    /// Collapse any ticks that piled up into the latest count
    pub fn drain(&self) -> Option<u64> {
        self.tick_rx.try_iter().last()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("ticker thread panicked");
            }
        }
    }
}
