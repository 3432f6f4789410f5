use crate::config::TrackerConfig;
use crate::source::{TrackingFrame, TrackingSource};
use crate::timing::FrameClock;
use crate::types::LifecycleEvent;
use crate::{Result, TrackerError};
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Backoff while the source has nothing to poll.
const INERT_BACKOFF: Duration = Duration::from_millis(10);

/// Something the poller thread hands to the consumer side, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Lifecycle(LifecycleEvent),
    /// The runtime's tracker-role settings were rewritten.
    TrackerSettingsChanged,
}

/// Two-slot frame handoff. Readers load the front frame; the writer fills
/// the back frame and swaps it in. `Arc::make_mut` on the writer side
/// copies instead of writing when a reader still holds the back frame.
pub struct FrameBuffer {
    front: ArcSwap<TrackingFrame>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            front: ArcSwap::from_pointee(TrackingFrame::empty()),
        }
    }

    /// Last fully written frame.
    pub fn latest(&self) -> Arc<TrackingFrame> {
        self.front.load_full()
    }

    /// Make `frame` the front frame and return the previous one.
    pub fn publish(&self, frame: Arc<TrackingFrame>) -> Arc<TrackingFrame> {
        self.front.swap(frame)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Background thread running a [`TrackingSource`] as fast as the runtime
/// allows.
///
/// Lifecycle events travel through an unbounded FIFO channel and are never
/// dropped; poses travel through a [`FrameBuffer`] where only the newest
/// frame matters.
pub struct Poller {
    events: Receiver<SourceEvent>,
    frames: Arc<FrameBuffer>,
    stop_flag: Arc<AtomicBool>,
    rate_bits: Arc<AtomicU64>,
    thread: Option<JoinHandle<TrackingSource>>,
}

impl Poller {
    /// Move `source` onto a new poller thread.
    pub fn start(source: TrackingSource, clock: Arc<FrameClock>, config: &TrackerConfig) -> Result<Poller> {
        let (sender, events) = crossbeam_channel::unbounded();
        let frames = Arc::new(FrameBuffer::new());
        let stop_flag = Arc::new(AtomicBool::new(false));
        let rate_bits = Arc::new(AtomicU64::new(0f64.to_bits()));

        let ctx = LoopContext {
            sender,
            frames: frames.clone(),
            stop_flag: stop_flag.clone(),
            rate_bits: rate_bits.clone(),
            clock,
            extra_seconds: config.predict_seconds,
            interval: config.poll_interval,
        };

        let thread = std::thread::Builder::new()
            .name("vrtrack-poller".into())
            .spawn(move || poll_loop(source, ctx))
            .map_err(|e| TrackerError::ThreadSpawn(format!("Failed to spawn poller thread: {}", e)))?;

        Ok(Poller {
            events,
            frames,
            stop_flag,
            rate_bits,
            thread: Some(thread),
        })
    }

    /// All events queued so far, oldest first.
    pub fn drain_events(&self) -> Vec<SourceEvent> {
        self.events.try_iter().collect()
    }

    pub fn latest_frame(&self) -> Arc<TrackingFrame> {
        self.frames.latest()
    }

    /// Poll/sample cycles per second, measured over the last cycle.
    pub fn samples_per_second(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    /// Whether the thread is still cycling.
    pub fn is_running(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
            && self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stop after the current cycle and hand the source back.
    pub fn stop(mut self) -> Option<TrackingSource> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<TrackingSource> {
        self.stop_flag.store(true, Ordering::Release);
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(source) => Some(source),
            Err(_) => {
                log::error!("Poller thread panicked");
                None
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct LoopContext {
    sender: Sender<SourceEvent>,
    frames: Arc<FrameBuffer>,
    stop_flag: Arc<AtomicBool>,
    rate_bits: Arc<AtomicU64>,
    clock: Arc<FrameClock>,
    extra_seconds: f64,
    interval: Duration,
}

fn poll_loop(mut source: TrackingSource, ctx: LoopContext) -> TrackingSource {
    let mut back = Arc::new(TrackingFrame::empty());
    let mut last_cycle = Instant::now();
    let mut last_report = last_cycle;

    log::info!("Poller started");

    while !ctx.stop_flag.load(Ordering::Acquire) {
        let out = source.poll_events();
        let mut queued = out.events.into_iter().map(SourceEvent::Lifecycle).collect::<Vec<_>>();
        if out.tracker_settings_changed {
            queued.push(SourceEvent::TrackerSettingsChanged);
        }
        for event in queued {
            if ctx.sender.send(event).is_err() {
                log::info!("Poller channel disconnected, stopping");
                return source;
            }
        }
        if out.quit {
            log::info!("Poller stopping, runtime quit");
            break;
        }

        if !source.is_ready() {
            std::thread::sleep(INERT_BACKOFF);
            continue;
        }

        let delta = source.lookahead(&ctx.clock, ctx.extra_seconds);
        source.sample_into(delta, Arc::make_mut(&mut back));
        back = ctx.frames.publish(back);

        let now = Instant::now();
        let cycle = now.duration_since(last_cycle).as_secs_f64();
        if cycle > 0.0 {
            ctx.rate_bits.store((1.0 / cycle).to_bits(), Ordering::Relaxed);
        }
        last_cycle = now;
        if now.duration_since(last_report) >= Duration::from_secs(5) {
            log::debug!(
                "Poller at {:.0} samples/s",
                f64::from_bits(ctx.rate_bits.load(Ordering::Relaxed))
            );
            last_report = now;
        }

        if ctx.interval.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(ctx.interval);
        }
    }

    log::info!("Poller stopped");
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRuntime;
    use crate::runtime::{RawEvent, RawEventKind};

    fn started(mock: &MockRuntime) -> Poller {
        let config = TrackerConfig {
            poll_interval: Duration::from_micros(200),
            ..TrackerConfig::default()
        };
        let mut source = TrackingSource::new(Box::new(mock.clone()), &config);
        source.initialize().unwrap();
        Poller::start(source, Arc::new(FrameClock::new()), &config).unwrap()
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_frame_buffer_never_mutates_held_frame() {
        let buffer = FrameBuffer::new();
        let mut back = Arc::new(TrackingFrame::empty());
        Arc::make_mut(&mut back).sequence = 1;
        back = buffer.publish(back);

        let held = buffer.latest();
        assert_eq!(held.sequence, 1);

        Arc::make_mut(&mut back).sequence = 2;
        back = buffer.publish(back);
        // `back` is now the frame the reader holds; writing must copy.
        Arc::make_mut(&mut back).sequence = 3;
        assert_eq!(held.sequence, 1);
        assert_eq!(buffer.latest().sequence, 2);
    }

    #[test]
    fn test_events_arrive_in_order_and_frames_advance() {
        let mock = MockRuntime::new();
        let poller = started(&mock);

        mock.connect_device(3, "LHR-ABC123");
        mock.push_event(RawEvent::new(RawEventKind::TrackedDeviceRoleChanged, 3));
        mock.push_event(RawEvent::new(RawEventKind::TrackersSectionSettingChanged, 0));

        let mut events = Vec::new();
        assert!(wait_for(|| {
            events.extend(poller.drain_events());
            events.len() >= 3
        }));
        assert_eq!(
            events,
            vec![
                SourceEvent::Lifecycle(LifecycleEvent::Connected(3)),
                SourceEvent::Lifecycle(LifecycleEvent::RoleChanged(3)),
                SourceEvent::TrackerSettingsChanged,
            ]
        );

        assert!(wait_for(|| poller.latest_frame().serial(3) == Some("LHR-ABC123")));
        let a = poller.latest_frame().sequence;
        assert!(wait_for(|| poller.latest_frame().sequence > a));
        assert!(poller.samples_per_second() > 0.0);
    }

    #[test]
    fn test_stop_returns_source() {
        let mock = MockRuntime::new();
        let poller = started(&mock);
        assert!(wait_for(|| mock.pose_requests() > 0));
        assert!(poller.is_running());

        let source = poller.stop().expect("source back");
        assert!(source.is_ready());
        let requests = mock.pose_requests();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(mock.pose_requests(), requests);
    }

    #[test]
    fn test_quit_ends_loop() {
        let mock = MockRuntime::new();
        let poller = started(&mock);
        mock.push_event(RawEvent::new(RawEventKind::Quit, 0));

        assert!(wait_for(|| !poller.is_running()));
        assert_eq!(
            poller.drain_events(),
            vec![SourceEvent::Lifecycle(LifecycleEvent::RuntimeQuitRequested)]
        );
        let source = poller.stop().expect("source back");
        assert!(!source.is_ready());
    }
}
