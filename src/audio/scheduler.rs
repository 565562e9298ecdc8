//! Cycle scheduler: re-materializes deferred transforms once per cycle and
//! emits timestamped triggers to the audio boundary.
//!
//! One scheduler thread owns every channel. Commands arrive on a channel,
//! armed wake-ups sit in a min-heap, and the loop blocks until the next
//! command or due wake-up; all cycle work happens as discrete,
//! non-preemptive wake-ups on this one thread. Stale wake-ups for a
//! stopped or replaced channel are invalidated by an epoch check before
//! they can emit anything.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use colored::Colorize;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use ostinato_core::types::time::to_f64;
use ostinato_core::types::{resolve_deferred, span_cycles, ChannelId, Event};

use super::boundary::AudioBackend;
use super::clock::TransportClock;
use crate::config::EngineConfig;

/// Commands that can be sent to the scheduler thread
#[derive(Debug)]
pub(crate) enum Command {
    /// Start a channel, replacing any existing channel with the same id
    Play {
        channel: ChannelId,
        events: Vec<Event>,
    },
    /// Stop one channel
    Stop(ChannelId),
    /// Stop every channel
    StopAll,
    /// Shut the scheduler thread down
    Shutdown,
}

/// Handle for sending commands to the scheduler thread
#[derive(Clone)]
pub(crate) struct SchedulerHandle {
    command_tx: Sender<Command>,
    is_running: Arc<AtomicBool>,
}

impl SchedulerHandle {
    pub fn play(&self, channel: ChannelId, events: Vec<Event>) -> Result<()> {
        self.command_tx
            .send(Command::Play { channel, events })
            .map_err(|_| anyhow!("scheduler is not running"))
    }

    pub fn stop(&self, channel: ChannelId) {
        let _ = self.command_tx.send(Command::Stop(channel));
    }

    pub fn stop_all(&self) {
        let _ = self.command_tx.send(Command::StopAll);
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

/// One playable pattern stream
struct Channel {
    /// Materialized pattern snapshot, the source of truth for every cycle
    pattern: Vec<Event>,
    /// Cleared on stop; an in-flight wake-up must no-op once this is false
    running: bool,
    /// Cycle the channel started in; conditions use channel-relative cycles
    origin_cycle: i64,
    /// Bumped on replacement so stale wake-ups are discarded
    epoch: u64,
    /// Consecutive scheduling failures
    failures: u32,
}

/// An armed single-shot wake-up for one channel
struct Wakeup {
    due: Instant,
    channel: ChannelId,
    epoch: u64,
}

impl PartialEq for Wakeup {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due
    }
}

impl Eq for Wakeup {}

impl PartialOrd for Wakeup {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Wakeup {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse order for min-heap behavior (earliest first)
        other.due.cmp(&self.due)
    }
}

/// Channel records, keyed by id. One scheduler owns one registry.
#[derive(Default)]
struct ChannelRegistry {
    channels: HashMap<ChannelId, Channel>,
}

impl ChannelRegistry {
    fn insert(&mut self, id: ChannelId, channel: Channel) {
        self.channels.insert(id, channel);
    }

    fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    fn remove(&mut self, id: ChannelId) {
        if let Some(ch) = self.channels.get_mut(&id) {
            ch.running = false;
        }
        self.channels.remove(&id);
    }

    fn clear(&mut self) {
        for ch in self.channels.values_mut() {
            ch.running = false;
        }
        self.channels.clear();
    }
}

/// The scheduler thread state
pub(crate) struct CycleScheduler {
    registry: ChannelRegistry,
    wakeups: BinaryHeap<Wakeup>,
    clock: Arc<TransportClock>,
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
    command_rx: Receiver<Command>,
    is_running: Arc<AtomicBool>,
    next_epoch: u64,
}

impl CycleScheduler {
    /// Spawn the scheduler thread and return its handle.
    pub fn spawn(
        clock: Arc<TransportClock>,
        backend: Arc<dyn AudioBackend>,
        config: EngineConfig,
    ) -> SchedulerHandle {
        let (command_tx, command_rx) = unbounded();
        let is_running = Arc::new(AtomicBool::new(true));

        let scheduler = CycleScheduler {
            registry: ChannelRegistry::default(),
            wakeups: BinaryHeap::new(),
            clock,
            backend,
            config,
            command_rx,
            is_running: is_running.clone(),
            next_epoch: 0,
        };
        thread::spawn(move || scheduler.run_loop());

        SchedulerHandle {
            command_tx,
            is_running,
        }
    }

    fn run_loop(mut self) {
        loop {
            let received = match self.wakeups.peek() {
                Some(w) => self.command_rx.recv_deadline(w.due),
                None => self
                    .command_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(cmd) => {
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.fire_due(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.is_running.store(false, Ordering::Relaxed);
    }

    /// Handle a command, returns false on shutdown
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Play { channel, events } => {
                let now = self.backend.now();
                let epoch = self.bump_epoch();
                self.registry.insert(
                    channel,
                    Channel {
                        pattern: events,
                        running: true,
                        origin_cycle: self.clock.current_cycle(now),
                        epoch,
                        failures: 0,
                    },
                );
                // First wake-up fires straight away; events earlier in the
                // current cycle fall outside the tolerance window and are
                // dropped rather than replayed.
                self.arm(channel, epoch, now);
            }
            Command::Stop(channel) => self.registry.remove(channel),
            Command::StopAll => self.registry.clear(),
            Command::Shutdown => return false,
        }
        true
    }

    fn bump_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    fn arm(&mut self, channel: ChannelId, epoch: u64, due: Instant) {
        self.wakeups.push(Wakeup {
            due,
            channel,
            epoch,
        });
    }

    fn pop_due(&mut self, now: Instant) -> Option<Wakeup> {
        if self.wakeups.peek().is_some_and(|w| w.due <= now) {
            self.wakeups.pop()
        } else {
            None
        }
    }

    /// Fire every due wake-up, rearming each live channel for its next
    /// cycle boundary or backoff retry.
    fn fire_due(&mut self) {
        let now = self.backend.now();

        while let Some(wakeup) = self.pop_due(now) {
            let live = self
                .registry
                .get(wakeup.channel)
                .map(|ch| ch.running && ch.epoch == wakeup.epoch)
                .unwrap_or(false);
            if !live {
                continue;
            }

            match self.run_cycle(wakeup.channel, now) {
                Ok(next_due) => {
                    if let Some(ch) = self.registry.get_mut(wakeup.channel) {
                        ch.failures = 0;
                    }
                    self.arm(wakeup.channel, wakeup.epoch, next_due);
                }
                Err(err) => self.handle_failure(wakeup, now, err),
            }
        }
    }

    /// One wake-up for one channel: recompute the cycle, re-resolve the
    /// deferred transforms, fold multi-cycle patterns, and emit.
    fn run_cycle(&mut self, id: ChannelId, now: Instant) -> Result<Instant> {
        let (pattern, origin_cycle) = {
            let ch = self
                .registry
                .get(id)
                .ok_or_else(|| anyhow!("channel {} disappeared mid-cycle", id))?;
            (ch.pattern.clone(), ch.origin_cycle)
        };

        let current = self.clock.current_cycle(now);
        let cycle = (current - origin_cycle).max(0);

        let events = resolve_deferred(&pattern, cycle);
        let span = span_cycles(&events);
        let cycle_in_pattern = cycle.rem_euclid(span);

        if self.backend.is_ready() {
            for e in &events {
                if e.is_rest() || e.cycle() != cycle_in_pattern {
                    continue;
                }
                let at = self
                    .clock
                    .instant_within_cycle(current, to_f64(e.time_in_cycle()));
                // Late events within the tolerance window play at "now".
                let at = if at < now {
                    if now.duration_since(at) <= self.config.late_tolerance {
                        now
                    } else {
                        continue;
                    }
                } else {
                    at
                };
                self.backend
                    .trigger(&e.sample, e.gain.unwrap_or(1.0), &e.effects, &e.musical, at);
            }
        }

        Ok(self.clock.instant_of_cycle(current + 1))
    }

    /// Exponential backoff with a consecutive-failure budget; the channel
    /// is torn down rather than retried forever.
    fn handle_failure(&mut self, wakeup: Wakeup, now: Instant, err: anyhow::Error) {
        eprintln!(
            "{} channel {} cycle error: {}",
            "scheduler:".red(),
            wakeup.channel,
            err
        );

        let failures = match self.registry.get_mut(wakeup.channel) {
            Some(ch) => {
                ch.failures += 1;
                ch.failures
            }
            None => return,
        };

        if failures >= self.config.max_failures {
            eprintln!(
                "{} channel {} stopped after {} consecutive failures",
                "scheduler:".red(),
                wakeup.channel,
                failures
            );
            self.registry.remove(wakeup.channel);
        } else {
            let delay = backoff_delay(self.config.backoff_base, self.config.backoff_cap, failures);
            self.arm(wakeup.channel, wakeup.epoch, now + delay);
        }
    }
}

/// Retry delay for the nth consecutive failure: base doubling, capped.
fn backoff_delay(base: Duration, cap: Duration, failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(16);
    cap.min(base * 2u32.saturating_pow(exp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostinato_core::types::{EffectMap, MusicalMap, PatternBuilder};
    use std::sync::Mutex;

    struct CollectingBackend {
        triggers: Mutex<Vec<String>>,
        ready: bool,
    }

    impl CollectingBackend {
        fn new() -> Arc<Self> {
            Arc::new(CollectingBackend {
                triggers: Mutex::new(Vec::new()),
                ready: true,
            })
        }

        fn count(&self) -> usize {
            self.triggers.lock().unwrap().len()
        }
    }

    impl AudioBackend for CollectingBackend {
        fn trigger(&self, sample: &str, _: f32, _: &EffectMap, _: &MusicalMap, _: Instant) {
            self.triggers.lock().unwrap().push(sample.to_string());
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn now(&self) -> Instant {
            Instant::now()
        }
    }

    fn spawn_at(cps: f64, backend: Arc<CollectingBackend>) -> SchedulerHandle {
        let clock = Arc::new(TransportClock::new(cps, backend.now()));
        CycleScheduler::spawn(clock, backend, EngineConfig::default())
    }

    #[test]
    fn test_wakeup_heap_pops_earliest_first() {
        let now = Instant::now();
        let ch = ChannelId::fresh();
        let mut heap = BinaryHeap::new();

        heap.push(Wakeup {
            due: now + Duration::from_millis(20),
            channel: ch,
            epoch: 0,
        });
        heap.push(Wakeup {
            due: now,
            channel: ch,
            epoch: 0,
        });
        heap.push(Wakeup {
            due: now + Duration::from_millis(10),
            channel: ch,
            epoch: 0,
        });

        assert_eq!(heap.pop().unwrap().due, now);
        assert_eq!(heap.pop().unwrap().due, now + Duration::from_millis(10));
        assert_eq!(heap.pop().unwrap().due, now + Duration::from_millis(20));
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let base = Duration::from_millis(50);
        let cap = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, cap, 1), Duration::from_millis(50));
        assert_eq!(backoff_delay(base, cap, 2), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, cap, 3), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, cap, 20), cap);
    }

    #[test]
    fn test_plays_until_stopped() {
        let backend = CollectingBackend::new();
        let handle = spawn_at(8.0, backend.clone());

        let pattern = PatternBuilder::from_source("bd sn");
        handle.play(pattern.channel(), pattern.resolve()).unwrap();
        thread::sleep(Duration::from_millis(450));
        // at 8 cps a two-event cycle lasts 125ms; expect several triggers
        assert!(backend.count() >= 4, "got {} triggers", backend.count());
        assert!(backend
            .triggers
            .lock()
            .unwrap()
            .iter()
            .all(|s| s == "bd" || s == "sn"));

        handle.stop(pattern.channel());
        thread::sleep(Duration::from_millis(50));
        let after_stop = backend.count();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(backend.count(), after_stop);

        handle.shutdown();
    }

    #[test]
    fn test_replacement_swaps_pattern_without_crosstalk() {
        let backend = CollectingBackend::new();
        let handle = spawn_at(8.0, backend.clone());

        let first = PatternBuilder::from_source("bd");
        let channel = first.channel();
        handle.play(channel, first.resolve()).unwrap();
        thread::sleep(Duration::from_millis(300));

        handle.play(channel, PatternBuilder::from_source("sn").resolve()).unwrap();
        thread::sleep(Duration::from_millis(300));
        handle.stop_all();

        let triggers = backend.triggers.lock().unwrap();
        assert!(triggers.iter().any(|s| s == "sn"));
        assert_eq!(triggers.last().map(String::as_str), Some("sn"));

        handle.shutdown();
    }

    #[test]
    fn test_not_ready_backend_emits_nothing() {
        let backend = Arc::new(CollectingBackend {
            triggers: Mutex::new(Vec::new()),
            ready: false,
        });
        let handle = spawn_at(8.0, backend.clone());

        let pattern = PatternBuilder::from_source("bd*4");
        handle.play(pattern.channel(), pattern.resolve()).unwrap();
        thread::sleep(Duration::from_millis(300));

        assert_eq!(backend.count(), 0);
        handle.shutdown();
    }
}
