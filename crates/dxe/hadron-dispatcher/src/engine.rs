//! Dispatch engine.
//!
//! [`Dispatcher::dispatch`] alternates two phases until neither makes
//! progress:
//!
//! 1. **Drain**: load and start every driver in the scheduled queue, in queue
//!    order. Volumes published by a started driver are processed right after
//!    it, so their drivers join the next rescan.
//! 2. **Rescan**: walk the registry in discovery order and schedule every
//!    dependent driver whose expression is now satisfied, together with the
//!    drivers ordered before and after it.
//!
//! Every rescan that schedules something is preceded by at least one new
//! `Initialized` driver, so the loop ends after at most one productive rescan
//! per registered driver.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use hadron_core::sync::TplLock;
use uefi::{EfiGuid, tpl};

use crate::config::DispatcherConfig;
use crate::entry::{DispatchOrder, DriverEntry, DriverState};
use crate::error::{DispatchError, LoadError};
use crate::handle::{DriverId, ImageHandle, VolumeHandle};
use crate::queue::ScheduledQueue;
use crate::registry::{DriverRegistry, read_dependency};
use crate::services::Services;
use crate::volume::{VolumeRecord, VolumeTracker};

/// Everything guarded by the dispatcher lock.
#[derive(Debug, Default)]
pub(crate) struct DispatcherState {
    pub(crate) registry: DriverRegistry,
    pub(crate) queue: ScheduledQueue,
    pub(crate) volumes: VolumeTracker,
    /// Volume and file name of the image hosting the dispatcher.
    pub(crate) hosting_image: Option<(VolumeHandle, EfiGuid)>,
}

impl DispatcherState {
    const fn new() -> Self {
        Self {
            registry: DriverRegistry::new(),
            queue: ScheduledQueue::new(),
            volumes: VolumeTracker::new(),
            hosting_image: None,
        }
    }

    /// Moves `id` to `Scheduled` and appends it to the queue.
    pub(crate) fn enqueue(&mut self, id: DriverId) {
        self.registry[id].set_state(DriverState::Scheduled);
        self.queue.push_back(id);
    }

    /// Takes `id` off the queue and moves it to `state`.
    fn retire(&mut self, id: DriverId, state: DriverState) {
        self.queue.remove(id);
        self.registry[id].set_state(state);
    }

    /// Schedules `id` with everything ordered around it.
    ///
    /// Dependent drivers that asked to run before `id`'s file are queued first,
    /// then `id`, then the drivers that asked to run after it. Each of those is
    /// inserted the same way, depth first. Matching is by file name only.
    pub(crate) fn insert_with_ordering(&mut self, id: DriverId) {
        let mut in_progress = Vec::new();
        self.insert_recursive(id, &mut in_progress);
    }

    fn insert_recursive(&mut self, id: DriverId, in_progress: &mut Vec<DriverId>) {
        in_progress.push(id);
        let name = self.registry[id].file_name();

        self.insert_ordered(id, DispatchOrder::Before(name), in_progress);
        self.enqueue(id);
        self.insert_ordered(id, DispatchOrder::After(name), in_progress);

        in_progress.pop();
    }

    fn insert_ordered(
        &mut self,
        anchor: DriverId,
        order: DispatchOrder,
        in_progress: &mut Vec<DriverId>,
    ) {
        for index in 0..self.registry.len() {
            let other = DriverId::new(index);
            if other == anchor || in_progress.contains(&other) {
                continue;
            }
            let entry = &self.registry[other];
            if entry.state() == DriverState::Dependent && entry.order() == Some(order) {
                log::trace!(
                    "Dispatcher: {} ordered {:?} of {}",
                    entry.file_name(),
                    order,
                    self.registry[anchor].file_name()
                );
                self.insert_recursive(other, in_progress);
            }
        }
    }
}

/// Summary of one [`Dispatcher::dispatch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Driver images started.
    pub started: usize,
    /// Nested firmware volumes published from dependency-gated volume images.
    pub volumes_produced: usize,
    /// Drivers refused by the security policy.
    pub untrusted: usize,
    /// Drivers whose load failed.
    pub failed: usize,
    /// Drain phases run; each was announced to the observer.
    pub rounds: usize,
    /// Rescans that scheduled at least one driver.
    ///
    /// Each one follows a new `Initialized` driver, so this never exceeds the
    /// number of registered drivers. The closing rescan that finds nothing is
    /// not counted.
    pub rescans: usize,
}

impl DispatchReport {
    /// Returns `true` if the call dispatched nothing at all.
    pub fn is_idle(&self) -> bool {
        self.started + self.volumes_produced + self.untrusted + self.failed == 0
    }
}

/// Marks the dispatcher as running for the lifetime of the guard.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Result<Self, DispatchError> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| Self(flag))
            .map_err(|_| DispatchError::AlreadyRunning)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The DXE driver dispatcher.
///
/// One instance exists per boot. All methods take `&self` and may be called
/// from driver entry points while [`dispatch`](Self::dispatch) is running.
pub struct Dispatcher {
    pub(crate) services: Services,
    pub(crate) config: DispatcherConfig,
    pub(crate) state: TplLock<DispatcherState>,
    running: AtomicBool,
}

impl Dispatcher {
    /// Creates a dispatcher over `services`.
    ///
    /// Nothing is discovered until [`dispatch`](Self::dispatch) or
    /// [`process_volume_arrivals`](Self::process_volume_arrivals) runs.
    pub fn new(services: Services, config: DispatcherConfig) -> Self {
        Self {
            services,
            config,
            state: TplLock::named("dispatcher", tpl::HIGH_LEVEL, DispatcherState::new()),
            running: AtomicBool::new(false),
        }
    }

    /// The configuration the dispatcher was created with.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Returns `true` while [`dispatch`](Self::dispatch) is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Loads and starts every driver whose dependencies can be satisfied.
    ///
    /// Pending volume arrivals are processed first. Returns once a full
    /// rescan of the registry schedules nothing new.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AlreadyRunning`] if called while a dispatch is
    /// already in progress, e.g. from a driver's entry point.
    pub fn dispatch(&self) -> Result<DispatchReport, DispatchError> {
        let _running = RunningGuard::enter(&self.running)?;

        self.process_volume_arrivals();

        let mut report = DispatchReport::default();
        loop {
            while self.dispatch_next(&mut report) {}

            report.rounds += 1;
            if let Some(observer) = &self.services.observer {
                observer.round_complete(report.rounds);
            }

            if !self.rescan() {
                break;
            }
            report.rescans += 1;
        }

        log::info!(
            "Dispatcher: {} started, {} volumes, {} untrusted, {} failed in {} rounds",
            report.started,
            report.volumes_produced,
            report.untrusted,
            report.failed,
            report.rounds
        );
        Ok(report)
    }

    /// Dispatches the head of the scheduled queue.
    ///
    /// Returns `false` if the queue was empty.
    fn dispatch_next(&self, report: &mut DispatchReport) -> bool {
        let head = {
            let state = self.state.lock();
            state
                .queue
                .front()
                .and_then(|id| state.registry.get(id).cloned())
        };
        let Some(entry) = head else {
            return false;
        };
        let id = entry.id();

        let image = if entry.is_fv_image() {
            None
        } else if let Some(image) = entry.image() {
            Some(image)
        } else {
            match self.services.loader.load(entry.volume(), &entry.file_name()) {
                Ok(image) => Some(image),
                Err(LoadError::SecurityViolation(retained)) => {
                    log::warn!(
                        "Dispatcher: {} from {} rejected by security policy",
                        entry.file_name(),
                        entry.volume()
                    );
                    let mut state = self.state.lock();
                    state.registry[id].set_image(retained);
                    state.retire(id, DriverState::Untrusted);
                    report.untrusted += 1;
                    return true;
                }
                Err(LoadError::Failed(status)) => {
                    log::error!(
                        "Dispatcher: failed to load {} from {}: {}",
                        entry.file_name(),
                        entry.volume(),
                        status
                    );
                    self.state.lock().retire(id, DriverState::Initialized);
                    report.failed += 1;
                    return true;
                }
            }
        };

        {
            let mut state = self.state.lock();
            if image.is_some() {
                state.registry[id].set_image(image);
            }
            state.retire(id, DriverState::Initialized);
        }

        match image {
            Some(image) => {
                log::debug!("Dispatcher: starting {} ({})", entry.file_name(), image);
                let status = self.services.loader.start(image);
                if status.is_error() {
                    log::warn!("Dispatcher: {} returned {}", entry.file_name(), status);
                } else {
                    log::info!("Dispatcher: started {}", entry.file_name());
                }
                report.started += 1;
            }
            None => {
                let produced =
                    self.produce_volume(entry.volume(), entry.fv().as_ref(), &entry.file_name());
                match produced {
                    Ok(_) => report.volumes_produced += 1,
                    Err(status) => log::warn!(
                        "Dispatcher: volume image {} from {} not published: {}",
                        entry.file_name(),
                        entry.volume(),
                        status
                    ),
                }
            }
        }

        self.process_volume_arrivals();
        true
    }

    /// Walks the registry once and schedules every newly satisfied driver.
    ///
    /// Returns `true` if anything was scheduled.
    fn rescan(&self) -> bool {
        let mut progress = false;
        let mut index = 0;
        loop {
            let id = DriverId::new(index);
            index += 1;
            let Some(mut entry) = self.driver(id) else {
                break;
            };

            if entry.has_depex_protocol_error() {
                let read = read_dependency(
                    entry.fv().as_ref(),
                    &entry.file_name(),
                    self.services.evaluator.as_ref(),
                );
                let mut state = self.state.lock();
                state.registry[id].apply_dependency(read);
                entry = state.registry[id].clone();
            }

            match entry.state() {
                DriverState::Dependent => {}
                DriverState::Unrequested => {
                    log::trace!(
                        "Dispatcher: {} waits for a schedule request",
                        entry.file_name()
                    );
                    continue;
                }
                _ => continue,
            }
            if entry.has_depex_protocol_error() || entry.order().is_some() {
                continue;
            }

            if self.services.evaluator.is_satisfied(&entry) {
                let mut state = self.state.lock();
                if state.registry[id].state() == DriverState::Dependent {
                    log::debug!("Dispatcher: dependencies of {} satisfied", entry.file_name());
                    state.insert_with_ordering(id);
                    progress = true;
                }
            }
        }
        progress
    }

    /// Moves an on-request driver from `Unrequested` to `Dependent`.
    ///
    /// The driver is considered on the next rescan.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] if `volume` holds no `Unrequested`
    /// driver named `file`.
    pub fn schedule(&self, volume: VolumeHandle, file: EfiGuid) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        let id = state
            .registry
            .find_in_state(volume, &file, DriverState::Unrequested)
            .ok_or(DispatchError::NotFound { volume, file })?;
        state.registry[id].set_state(DriverState::Dependent);
        log::debug!("Dispatcher: {file} from {volume} requested");
        Ok(())
    }

    /// Queues a driver the security policy refused.
    ///
    /// If the loader kept the image, it is started without loading again.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] if `volume` holds no `Untrusted`
    /// driver named `file`.
    pub fn trust(&self, volume: VolumeHandle, file: EfiGuid) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        let id = state
            .registry
            .find_in_state(volume, &file, DriverState::Untrusted)
            .ok_or(DispatchError::NotFound { volume, file })?;
        state.enqueue(id);
        log::info!("Dispatcher: {file} from {volume} trusted");
        Ok(())
    }

    /// Returns a snapshot of driver `id`.
    pub fn driver(&self, id: DriverId) -> Option<DriverEntry> {
        self.state.lock().registry.get(id).cloned()
    }

    /// Returns a snapshot of every registered driver, in discovery order.
    pub fn drivers(&self) -> Vec<DriverEntry> {
        self.state.lock().registry.iter().cloned().collect()
    }

    /// Returns the scheduled queue, in run order.
    pub fn scheduled_queue(&self) -> Vec<DriverId> {
        self.state.lock().queue.iter().collect()
    }

    /// Returns every driver that has not been dispatched and is not queued.
    ///
    /// These are the `Unrequested` and `Dependent` drivers, the candidates for
    /// a "discovered but not dispatched" report at the end of DXE.
    pub fn undispatched(&self) -> Vec<DriverEntry> {
        self.state
            .lock()
            .registry
            .iter()
            .filter(|entry| {
                matches!(
                    entry.state(),
                    DriverState::Unrequested | DriverState::Dependent
                )
            })
            .cloned()
            .collect()
    }

    /// Logs every undispatched driver with the reason it is still waiting.
    ///
    /// Returns the number of drivers reported.
    pub fn report_undispatched(&self) -> usize {
        let pending = self.undispatched();
        for entry in &pending {
            let reason = if entry.state() == DriverState::Unrequested {
                "waiting for a schedule request"
            } else if entry.has_depex_protocol_error() {
                "dependency section not readable"
            } else if entry.order().is_some() {
                "ordering target never scheduled"
            } else {
                "dependencies not satisfied"
            };
            log::warn!(
                "Dispatcher: {} from {} not dispatched: {}",
                entry.file_name(),
                entry.volume(),
                reason
            );
        }
        pending.len()
    }

    /// Volume and file name of the DXE core image found during discovery.
    pub fn hosting_image(&self) -> Option<(VolumeHandle, EfiGuid)> {
        self.state.lock().hosting_image
    }

    /// Number of processed firmware volumes.
    pub fn volume_count(&self) -> usize {
        self.state.lock().volumes.len()
    }

    /// Returns the processed firmware volumes, in arrival order.
    pub fn volumes(&self) -> Vec<VolumeRecord> {
        self.state.lock().volumes.iter().copied().collect()
    }

    /// Image handle of driver `id`, once loaded.
    pub fn image_of(&self, id: DriverId) -> Option<ImageHandle> {
        self.state.lock().registry.get(id).and_then(DriverEntry::image)
    }
}
