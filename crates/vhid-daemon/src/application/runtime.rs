//! Device ownership and the per-device deferred workers.
//!
//! [`DeviceSet`] owns one keyboard, one pointer and one touch surface built
//! from the loaded configuration.  [`DeviceRuntime`] spawns one Tokio task per
//! device.  Each task sleeps on a [`Notify`] and drains its device when woken.
//!
//! # Coalescing (for beginners)
//!
//! `Notify::notify_one` stores at most one permit.  Ten injections before the
//! worker gets scheduled therefore wake it once, and that one drain empties
//! the queue of all ten.  The device's own processor guarantees that two
//! drains of the same device never overlap, so a synchronous drain from
//! another context (a `reset`, the final drain at shutdown) is safe too.
//!
//! Draining decodes under a blocking mutex and writes to sinks that may do
//! file I/O.  Workers therefore run every drain on Tokio's blocking pool
//! with `spawn_blocking` and only await its completion.

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use vhid_core::{
    ConfigurationStore, DeviceClass, EventSink, KeyboardDevice, PointerDevice, Recording,
    ReplaySummary, StatisticsRegistry, TouchBounds, TouchDevice,
};

/// Sink type shared by every device in the daemon.
pub type DynSink = Box<dyn EventSink>;

/// Schedules a deferred drain for one device.
///
/// The runtime implements this by waking the device's worker task; tests and
/// the offline replay path drain synchronously instead.
#[cfg_attr(test, mockall::automock)]
pub trait DrainScheduler: Send + Sync {
    fn schedule(&self, device: DeviceClass);
}

// ── Device set ────────────────────────────────────────────────────────────────

/// The three emulated devices sharing one configuration store.
pub struct DeviceSet {
    pub config: Arc<ConfigurationStore>,
    pub keyboard: KeyboardDevice<DynSink>,
    pub pointer: PointerDevice<DynSink>,
    pub touch: TouchDevice<DynSink>,
}

impl DeviceSet {
    /// Builds the devices, asking `sink_for` for each device's sink.
    pub fn new(
        config: Arc<ConfigurationStore>,
        bounds: TouchBounds,
        mut sink_for: impl FnMut(DeviceClass) -> DynSink,
    ) -> Self {
        Self {
            keyboard: KeyboardDevice::new(Arc::clone(&config), sink_for(DeviceClass::Keyboard)),
            pointer: PointerDevice::new(Arc::clone(&config), sink_for(DeviceClass::Pointer)),
            touch: TouchDevice::new(bounds, sink_for(DeviceClass::Touch)),
            config,
        }
    }

    /// A read-only view over all three devices' counters.
    pub fn statistics(&self) -> StatisticsRegistry {
        StatisticsRegistry::new(
            Arc::clone(self.keyboard.stats()),
            Arc::clone(self.pointer.stats()),
            Arc::clone(self.touch.stats()),
        )
    }

    /// Drains one device synchronously.
    pub fn drain(&self, device: DeviceClass) -> usize {
        match device {
            DeviceClass::Keyboard => self.keyboard.run_deferred(),
            DeviceClass::Pointer => self.pointer.run_deferred(),
            DeviceClass::Touch => self.touch.run_deferred(),
        }
    }

    /// Drains one device and waits out any drain already running on it.
    pub fn flush(&self, device: DeviceClass) -> usize {
        match device {
            DeviceClass::Keyboard => self.keyboard.flush(),
            DeviceClass::Pointer => self.pointer.flush(),
            DeviceClass::Touch => self.touch.flush(),
        }
    }

    /// Flushes every device.  On return nothing queued before the call is
    /// left undecoded.
    pub fn flush_all(&self) -> usize {
        ALL_DEVICES.iter().map(|&device| self.flush(device)).sum()
    }

    /// Reinitialises one device, or all of them when `device` is `None`.
    pub fn reinitialize(&self, device: Option<DeviceClass>) {
        match device {
            Some(DeviceClass::Keyboard) => self.keyboard.reinitialize(),
            Some(DeviceClass::Pointer) => self.pointer.reinitialize(),
            Some(DeviceClass::Touch) => self.touch.reinitialize(),
            None => {
                for device in ALL_DEVICES {
                    self.reinitialize(Some(device));
                }
                return;
            }
        }
        debug!(device = device.map(DeviceClass::as_str), "device reinitialized");
    }

    /// Replays a recording with synchronous drains.
    pub fn replay(&self, recording: &Recording) -> ReplaySummary {
        recording.replay(&self.keyboard, &self.pointer, &self.touch)
    }
}

const ALL_DEVICES: [DeviceClass; 3] = [DeviceClass::Keyboard, DeviceClass::Pointer, DeviceClass::Touch];

fn slot(device: DeviceClass) -> usize {
    match device {
        DeviceClass::Keyboard => 0,
        DeviceClass::Pointer => 1,
        DeviceClass::Touch => 2,
    }
}

/// Drains in the caller's context.  Used for offline replay and tests.
#[derive(Clone)]
pub struct ImmediateDrain {
    devices: Arc<DeviceSet>,
}

impl ImmediateDrain {
    pub fn new(devices: Arc<DeviceSet>) -> Self {
        Self { devices }
    }
}

impl DrainScheduler for ImmediateDrain {
    fn schedule(&self, device: DeviceClass) {
        self.devices.drain(device);
    }
}

// ── Runtime ───────────────────────────────────────────────────────────────────

/// Cloneable handle that wakes device workers.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    wakers: Arc<[Notify; 3]>,
}

impl DrainScheduler for RuntimeHandle {
    fn schedule(&self, device: DeviceClass) {
        self.wakers[slot(device)].notify_one();
    }
}

/// One worker task per device, plus the shutdown signal.
pub struct DeviceRuntime {
    devices: Arc<DeviceSet>,
    handle: RuntimeHandle,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl DeviceRuntime {
    /// Spawns the three workers.  Must be called inside a Tokio runtime.
    pub fn start(devices: Arc<DeviceSet>) -> Self {
        let handle = RuntimeHandle {
            wakers: Arc::new([Notify::new(), Notify::new(), Notify::new()]),
        };
        let (shutdown, shutdown_rx) = watch::channel(false);

        let workers = ALL_DEVICES
            .iter()
            .map(|&device| {
                spawn_worker(
                    device,
                    Arc::clone(&devices),
                    handle.clone(),
                    shutdown_rx.clone(),
                )
            })
            .collect();

        debug!("device workers started");
        Self {
            devices,
            handle,
            shutdown,
            workers,
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn devices(&self) -> &Arc<DeviceSet> {
        &self.devices
    }

    /// Stops the workers, waits for them, and drains anything left queued.
    ///
    /// Returns the number of units consumed by the final drain.
    pub async fn shutdown(self) -> usize {
        // Receivers may already be gone if a worker panicked.
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("device worker failed: {e}");
            }
        }
        let devices = Arc::clone(&self.devices);
        let drained = match tokio::task::spawn_blocking(move || devices.flush_all()).await {
            Ok(drained) => drained,
            Err(e) => {
                error!("final drain failed: {e}");
                0
            }
        };
        debug!(drained, "device workers stopped");
        drained
    }
}

/// Drains `device` on the blocking pool.
async fn drain_blocking(devices: &Arc<DeviceSet>, device: DeviceClass) -> usize {
    let devices = Arc::clone(devices);
    match tokio::task::spawn_blocking(move || devices.drain(device)).await {
        Ok(drained) => drained,
        Err(e) => {
            error!(device = device.as_str(), "drain task failed: {e}");
            0
        }
    }
}

fn spawn_worker(
    device: DeviceClass,
    devices: Arc<DeviceSet>,
    handle: RuntimeHandle,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let wake = &handle.wakers[slot(device)];
        loop {
            tokio::select! {
                _ = wake.notified() => {
                    let drained = drain_blocking(&devices, device).await;
                    trace!(device = device.as_str(), drained, "worker drained queue");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        let drained = drain_blocking(&devices, device).await;
        debug!(device = device.as_str(), drained, "worker exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vhid_core::NormalizedEvent;

    /// Sink that appends into a shared vector the test can read.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<NormalizedEvent>>>);

    impl EventSink for Shared {
        fn emit(&mut self, event: NormalizedEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn device_set(shared: &Shared) -> Arc<DeviceSet> {
        Arc::new(DeviceSet::new(
            Arc::new(ConfigurationStore::new()),
            TouchBounds::default(),
            |_| Box::new(shared.clone()),
        ))
    }

    #[test]
    fn test_immediate_drain_runs_synchronously() {
        // Arrange
        let shared = Shared::default();
        let devices = device_set(&shared);
        let scheduler = ImmediateDrain::new(Arc::clone(&devices));
        devices.keyboard.inject_scancode(0x1E);

        // Act
        scheduler.schedule(DeviceClass::Keyboard);

        // Assert
        assert_eq!(shared.0.lock().unwrap().len(), 2);
        assert_eq!(devices.keyboard.queued(), 0);
    }

    #[test]
    fn test_reinitialize_single_device_leaves_others() {
        let shared = Shared::default();
        let devices = device_set(&shared);
        devices.keyboard.inject_scancode(0x1E);
        devices.pointer.inject_byte(0x08);

        devices.reinitialize(Some(DeviceClass::Keyboard));

        assert_eq!(devices.keyboard.queued(), 0);
        assert_eq!(devices.pointer.queued(), 1);
    }

    #[test]
    fn test_statistics_view_tracks_live_counters() {
        let shared = Shared::default();
        let devices = device_set(&shared);
        let stats = devices.statistics();

        devices.keyboard.inject_scancode(0x1E);
        devices.flush_all();

        assert_eq!(stats.snapshot().keyboard.key_presses, 1);
    }

    #[tokio::test]
    async fn test_worker_drains_after_schedule() {
        // Arrange
        let shared = Shared::default();
        let devices = device_set(&shared);
        let runtime = DeviceRuntime::start(Arc::clone(&devices));
        let handle = runtime.handle();

        // Act
        devices.keyboard.inject_scancode(0x1E);
        handle.schedule(DeviceClass::Keyboard);
        for _ in 0..200 {
            if devices.keyboard.queued() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        // Assert
        assert_eq!(devices.keyboard.queued(), 0);
        runtime.shutdown().await;
    }

    #[test]
    fn test_flush_all_drains_every_device() {
        // Arrange
        let shared = Shared::default();
        let devices = device_set(&shared);
        devices.keyboard.inject_scancode(0x1E);
        devices.pointer.inject_packet(&[0x08, 1, 1]).unwrap();

        // Act
        let drained = devices.flush_all();

        // Assert
        assert!(drained >= 2);
        assert_eq!(devices.keyboard.queued(), 0);
        assert_eq!(devices.pointer.queued(), 0);
        assert_eq!(devices.pointer.stats().snapshot().packets, 1);
    }

    #[tokio::test]
    async fn test_worker_drain_does_not_stall_the_runtime() {
        // Arrange: the keyboard sink is locked, so a drain blocks on it.
        let shared = Shared::default();
        let devices = device_set(&shared);
        let runtime = DeviceRuntime::start(Arc::clone(&devices));
        let guard = shared.0.lock().unwrap();
        devices.keyboard.inject_scancode(0x1E);
        runtime.handle().schedule(DeviceClass::Keyboard);

        // Act: other async work still completes while the drain is stuck.
        let ticked = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            for _ in 0..10 {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
        })
        .await;
        drop(guard);

        // Assert
        assert!(ticked.is_ok());
        runtime.shutdown().await;
        assert_eq!(devices.keyboard.queued(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_unscheduled_input() {
        // Arrange
        let shared = Shared::default();
        let devices = device_set(&shared);
        let runtime = DeviceRuntime::start(Arc::clone(&devices));

        // Act: never schedule; shutdown must still deliver.
        devices.touch.inject(vhid_core::TouchCommand::Scroll { dx: 0, dy: 1 }).unwrap();
        runtime.shutdown().await;

        // Assert
        assert_eq!(devices.touch.queued(), 0);
        assert_eq!(devices.touch.stats().snapshot().scrolls, 1);
    }
}
