//! Sink delivery and the asynchronous dispatch pipeline
//!
//! In asynchronous mode a record travels through three stages:
//!
//! 1. the caller pushes it onto a bounded ingress channel,
//! 2. a dispatcher thread copies it onto one bounded queue per sink,
//! 3. one worker thread per sink drains that queue into the sink.
//!
//! Per-sink queues shed low-severity records when they fill up (see
//! [`should_drop`]); `Warn` and above are always enqueued, blocking the
//! dispatcher until the worker catches up.

use super::config::AsyncConfig;
use super::error::Result;
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::sink::SharedSink;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A rendered record shared by every sink queue it is copied onto
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub msg: Arc<[u8]>,
    pub level: LogLevel,
}

/// A registered sink and, in asynchronous mode, its queue
pub(crate) struct SinkSlot {
    pub sink: SharedSink,
    pub queue: Option<SinkQueue>,
}

pub(crate) type SinkSlots = Arc<Mutex<Vec<SinkSlot>>>;

/// Whether a record at `level` is shed when its sink queue holds `queued`
/// of `capacity` records
///
/// Above 60% occupancy `Debug` is dropped, above 80% `Info` too. `Warn`,
/// `Error` and `Critical` are never dropped.
#[inline]
pub fn should_drop(level: LogLevel, queued: usize, capacity: usize) -> bool {
    (level <= LogLevel::Debug && queued * 5 > capacity * 3)
        || (level <= LogLevel::Info && queued * 5 > capacity * 4)
}

/// Write one record to a sink, isolating the other sinks from a panic
pub(crate) fn deliver(sink: &SharedSink, msg: &[u8], level: LogLevel, metrics: &LoggerMetrics) {
    let mut guard = sink.lock();
    let result = catch_unwind(AssertUnwindSafe(|| guard.write(msg, level)));
    match result {
        Ok(()) => {
            metrics.record_delivered();
        }
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            eprintln!(
                "[LOGGER CRITICAL] Sink '{}' panicked: {}. Other sinks continue to function.",
                guard.name(),
                panic_msg
            );
        }
    }
}

/// Enqueue side of a sink queue
///
/// The dispatcher clones these out of the sink list so that a blocking push
/// never holds the list lock.
#[derive(Clone)]
pub(crate) struct QueueHandle {
    sender: Sender<Record>,
    capacity: usize,
}

impl QueueHandle {
    /// Apply backpressure and enqueue
    fn push(&self, record: &Record, metrics: &LoggerMetrics) {
        if should_drop(record.level, self.sender.len(), self.capacity) {
            metrics.record_dropped();
            return;
        }

        match self.sender.try_send(record.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                metrics.record_block();
                // Only Warn and above reach a full queue; wait for room
                let _ = self.sender.send(record);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Bounded queue in front of one sink, drained by its own worker thread
pub(crate) struct SinkQueue {
    handle: QueueHandle,
    worker: JoinHandle<()>,
}

impl SinkQueue {
    fn spawn(sink: SharedSink, capacity: usize, metrics: Arc<LoggerMetrics>) -> Result<Self> {
        let (sender, receiver): (Sender<Record>, Receiver<Record>) = bounded(capacity);
        let worker = thread::Builder::new()
            .name("rotalog-sink".to_string())
            .spawn(move || {
                for record in receiver.iter() {
                    deliver(&sink, &record.msg, record.level, &metrics);
                }
            })?;

        Ok(Self {
            handle: QueueHandle { sender, capacity },
            worker,
        })
    }

    fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Close the queue; the worker drains what is left and exits once the
    /// dispatcher lets go of its handle
    fn close(self) -> JoinHandle<()> {
        drop(self.handle);
        self.worker
    }
}

/// Ingress channel, dispatcher thread and per-sink worker bookkeeping
pub(crate) struct AsyncDispatcher {
    sender: RwLock<Option<Sender<Record>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    retired: Mutex<Vec<JoinHandle<()>>>,
    config: AsyncConfig,
    metrics: Arc<LoggerMetrics>,
}

impl AsyncDispatcher {
    pub fn start(config: AsyncConfig, slots: SinkSlots, metrics: Arc<LoggerMetrics>) -> Result<Self> {
        config.validate()?;

        let (sender, receiver): (Sender<Record>, Receiver<Record>) = bounded(config.buffer);
        let fanout_metrics = Arc::clone(&metrics);
        let dispatcher = thread::Builder::new()
            .name("rotalog-dispatch".to_string())
            .spawn(move || {
                let mut queues: Vec<QueueHandle> = Vec::new();
                for record in receiver.iter() {
                    queues.extend(
                        slots
                            .lock()
                            .iter()
                            .filter_map(|slot| slot.queue.as_ref().map(SinkQueue::handle)),
                    );
                    for queue in &queues {
                        queue.push(&record, &fanout_metrics);
                    }
                    queues.clear();
                }
            })?;

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
            retired: Mutex::new(Vec::new()),
            config,
            metrics,
        })
    }

    /// Create the queue and worker for a newly registered sink
    pub fn attach(&self, sink: SharedSink) -> Result<SinkQueue> {
        SinkQueue::spawn(sink, self.config.sink_buffer, Arc::clone(&self.metrics))
    }

    /// Close the queue of a removed sink; its worker is joined at shutdown
    pub fn detach(&self, queue: SinkQueue) {
        self.retired.lock().push(queue.close());
    }

    /// Hand a record to the dispatcher, blocking only while the ingress is full
    pub fn submit(&self, record: Record) {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            // Shut down; nothing will ever drain this record
            return;
        };

        match sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                self.metrics.record_block();
                let _ = sender.send(record);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Close every stage in order and wait for the threads to drain
    ///
    /// Returns `false` if some thread did not finish within `timeout`.
    pub fn shutdown(&self, slots: &SinkSlots, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        drop(self.sender.write().take());

        let mut clean = true;
        if let Some(handle) = self.dispatcher.lock().take() {
            clean &= join_until(handle, deadline, "dispatcher");
        }

        let Some(mut slots) = slots.try_lock_until(deadline) else {
            eprintln!("[LOGGER WARNING] Sink list still locked at shutdown deadline. Some logs may be lost.");
            return false;
        };
        let mut workers: Vec<JoinHandle<()>> = slots
            .iter_mut()
            .filter_map(|slot| slot.queue.take())
            .map(SinkQueue::close)
            .collect();
        drop(slots);
        workers.append(&mut self.retired.lock());

        for handle in workers {
            clean &= join_until(handle, deadline, "sink worker");
        }
        clean
    }
}

/// Join `handle` if it finishes before `deadline`
fn join_until(handle: JoinHandle<()>, deadline: Instant, role: &str) -> bool {
    loop {
        if handle.is_finished() {
            if let Err(e) = handle.join() {
                eprintln!("[LOGGER ERROR] Async {} thread panicked during shutdown: {:?}", role, e);
                return false;
            }
            return true;
        }

        if Instant::now() >= deadline {
            eprintln!(
                "[LOGGER WARNING] Async {} thread did not finish within timeout. \
                 Some logs may be lost.",
                role
            );
            return false;
        }

        thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_drop_thresholds() {
        // 60% of 10 is 6: Debug is shed from 7 queued on
        assert!(!should_drop(LogLevel::Debug, 6, 10));
        assert!(should_drop(LogLevel::Debug, 7, 10));
        assert!(!should_drop(LogLevel::Info, 7, 10));

        // 80% of 10 is 8: Info is shed from 9 queued on
        assert!(!should_drop(LogLevel::Info, 8, 10));
        assert!(should_drop(LogLevel::Info, 9, 10));

        for queued in 0..=10 {
            assert!(!should_drop(LogLevel::Warn, queued, 10));
            assert!(!should_drop(LogLevel::Error, queued, 10));
            assert!(!should_drop(LogLevel::Critical, queued, 10));
        }
    }

    #[test]
    fn test_should_drop_matches_default_capacity() {
        let capacity = AsyncConfig::default().sink_buffer;
        assert!(!should_drop(LogLevel::Debug, 6_000, capacity));
        assert!(should_drop(LogLevel::Debug, 6_001, capacity));
        assert!(!should_drop(LogLevel::Info, 8_000, capacity));
        assert!(should_drop(LogLevel::Info, 8_001, capacity));
    }
}
