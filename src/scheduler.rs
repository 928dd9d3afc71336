use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation token for the pending repaint. Exactly one is live per
/// mounted loop; it is replaced on every tick and canceled at teardown.
#[derive(Clone)]
pub struct FrameHandle {
    canceled: Arc<AtomicBool>,
}

impl FrameHandle {
    fn new() -> Self {
        Self {
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }
}

pub struct Tick {
    /// Seconds since the loop's origin. The renderer is a pure function of
    /// this value, so dropped frames never desynchronize the animation.
    pub t: f32,
    pub dt: f32,
}

/// Paces the repaint loop. The time origin is captured once at mount and
/// survives image-reference changes, keeping zoom/rotation continuous.
pub struct FrameScheduler {
    origin: Instant,
    target: Duration,
    handle: FrameHandle,
    last_tick: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(fps: u32) -> Self {
        Self {
            origin: Instant::now(),
            target: Duration::from_secs_f32(1.0 / fps.max(1) as f32),
            handle: FrameHandle::new(),
            last_tick: None,
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn elapsed(&self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }

    /// The currently pending frame's token.
    pub fn handle(&self) -> FrameHandle {
        self.handle.clone()
    }

    /// Cancels the pending frame; subsequent `tick()` calls return `None`
    /// until `restart()`.
    pub fn cancel(&mut self) {
        self.handle.cancel();
    }

    /// Swaps in a fresh handle after an image-reference change. Deliberately
    /// does NOT reset the origin.
    pub fn restart(&mut self) {
        self.handle.cancel();
        self.handle = FrameHandle::new();
        self.last_tick = None;
    }

    /// Sleeps out the remainder of the frame budget, then reports elapsed
    /// time. Ticks are strictly sequential; there is never a second frame in
    /// flight for the same loop.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.handle.is_canceled() {
            return None;
        }

        if let Some(last) = self.last_tick {
            let busy = last.elapsed();
            if busy < self.target {
                std::thread::sleep(self.target - busy);
            }
        }

        if self.handle.is_canceled() {
            return None;
        }

        let now = Instant::now();
        let dt = match self.last_tick {
            Some(last) => now.duration_since(last).as_secs_f32().max(1e-6),
            None => self.target.as_secs_f32(),
        };
        self.last_tick = Some(now);

        // Retire the consumed token and issue the next one.
        self.handle = FrameHandle::new();

        Some(Tick {
            t: now.duration_since(self.origin).as_secs_f32(),
            dt,
        })
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
