//! In-memory firmware platform for dispatcher tests.
//!
//! [`MockPlatform`] implements every service trait. Drivers "install"
//! protocols when started, dependency expressions are evaluated against those
//! protocols, and volumes can be published up front, by a started driver, or
//! by expanding a volume image.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use uefi::ffs::{FvFileType, SectionType, depex};
use uefi::guid::GUID_SIZE;
use uefi::{AuthStatus, EfiGuid, EfiStatus};

use crate::engine::{DispatchReport, Dispatcher};
use crate::entry::DriverEntry;
use crate::error::{DispatchError, LoadError};
use crate::handle::{ImageHandle, VolumeHandle};
use crate::services::{
    DependencyEvaluator, DispatchObserver, FirmwareVolume, FvFile, ImageLoader, Section,
    SecurityPolicy, Services, Verdict, VolumeSource,
};

/// Short test GUID.
pub(crate) fn guid(n: u32) -> EfiGuid {
    EfiGuid::new(n, 0, 0, [0; 8])
}

fn with_operand(opcode: u8, operand: EfiGuid) -> Vec<u8> {
    let mut bytes = vec![opcode];
    bytes.extend(operand.to_bytes());
    bytes.push(depex::END);
    bytes
}

/// `PUSH protocol END`
pub(crate) fn depex_push(protocol: EfiGuid) -> Vec<u8> {
    with_operand(depex::PUSH, protocol)
}

/// `BEFORE file END`
pub(crate) fn depex_before(file: EfiGuid) -> Vec<u8> {
    with_operand(depex::BEFORE, file)
}

/// `AFTER file END`
pub(crate) fn depex_after(file: EfiGuid) -> Vec<u8> {
    with_operand(depex::AFTER, file)
}

/// `SOR PUSH protocol END`
pub(crate) fn depex_sor(protocol: EfiGuid) -> Vec<u8> {
    let mut bytes = vec![depex::SOR];
    bytes.extend(depex_push(protocol));
    bytes
}

/// A firmware volume built in memory.
#[derive(Default)]
pub(crate) struct MockVolume {
    name: Option<EfiGuid>,
    files: Vec<FvFile>,
    sections: BTreeMap<(EfiGuid, SectionType), Vec<u8>>,
    /// Remaining DXE_DEPEX reads that fail with a protocol error, per file.
    protocol_errors: Mutex<BTreeMap<EfiGuid, usize>>,
}

impl MockVolume {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn named(name: EfiGuid) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    pub(crate) fn file(mut self, name: EfiGuid, file_type: FvFileType) -> Self {
        self.files.push(FvFile { name, file_type });
        self
    }

    pub(crate) fn driver(self, name: EfiGuid) -> Self {
        self.file(name, FvFileType::DRIVER)
    }

    pub(crate) fn driver_with_depex(mut self, name: EfiGuid, depex: Vec<u8>) -> Self {
        self.sections.insert((name, SectionType::DXE_DEPEX), depex);
        self.driver(name)
    }

    pub(crate) fn depex_protocol_error(mut self, name: EfiGuid, reads: usize) -> Self {
        self.protocol_errors.get_mut().unwrap().insert(name, reads);
        self
    }

    pub(crate) fn apriori(self, names: &[EfiGuid]) -> Self {
        self.apriori_named(EfiGuid::APRIORI_FILE, names)
    }

    pub(crate) fn apriori_named(mut self, file: EfiGuid, names: &[EfiGuid]) -> Self {
        let data = names.iter().flat_map(|name| name.to_bytes()).collect();
        self.sections.insert((file, SectionType::RAW), data);
        self.file(file, FvFileType::FREEFORM)
    }

    pub(crate) fn fv_image(mut self, name: EfiGuid, depex: Option<Vec<u8>>) -> Self {
        self.sections.insert(
            (name, SectionType::FIRMWARE_VOLUME_IMAGE),
            b"_FVH".to_vec(),
        );
        if let Some(depex) = depex {
            self.sections.insert((name, SectionType::DXE_DEPEX), depex);
        }
        self.file(name, FvFileType::FIRMWARE_VOLUME_IMAGE)
    }
}

impl FirmwareVolume for MockVolume {
    fn name(&self) -> Option<EfiGuid> {
        self.name
    }

    fn files(&self, file_type: FvFileType) -> Vec<FvFile> {
        self.files
            .iter()
            .filter(|file| file_type == FvFileType::ALL || file.file_type == file_type)
            .copied()
            .collect()
    }

    fn read_section(
        &self,
        file: &EfiGuid,
        section_type: SectionType,
    ) -> Result<Section, EfiStatus> {
        if section_type == SectionType::DXE_DEPEX {
            let mut errors = self.protocol_errors.lock().unwrap();
            if let Some(remaining) = errors.get_mut(file).filter(|remaining| **remaining > 0) {
                *remaining -= 1;
                return Err(EfiStatus::PROTOCOL_ERROR);
            }
        }
        self.sections
            .get(&(*file, section_type))
            .map(|data| Section {
                data: data.clone(),
                auth: AuthStatus::empty(),
            })
            .ok_or(EfiStatus::NOT_FOUND)
    }
}

/// Every firmware service the dispatcher needs, backed by plain collections.
#[derive(Default)]
pub(crate) struct MockPlatform {
    volumes: Mutex<BTreeMap<VolumeHandle, Arc<MockVolume>>>,
    pending: Mutex<VecDeque<VolumeHandle>>,
    next_handle: AtomicU64,
    protocols: Mutex<BTreeSet<EfiGuid>>,
    produces: Mutex<BTreeMap<EfiGuid, Vec<EfiGuid>>>,
    on_start: Mutex<BTreeMap<EfiGuid, MockVolume>>,
    nested: Mutex<BTreeMap<EfiGuid, MockVolume>>,
    load_failures: Mutex<BTreeMap<EfiGuid, LoadError>>,
    start_status: Mutex<BTreeMap<EfiGuid, EfiStatus>>,
    rejected_images: Mutex<BTreeSet<EfiGuid>>,
    images: Mutex<BTreeMap<ImageHandle, EfiGuid>>,
    next_image: AtomicU64,
    loads: Mutex<Vec<EfiGuid>>,
    starts: Mutex<Vec<ImageHandle>>,
    unsound: Mutex<Vec<EfiGuid>>,
    refused: Mutex<BTreeSet<EfiGuid>>,
    evaluations: Mutex<Vec<EfiGuid>>,
    rounds: AtomicUsize,
    installs: AtomicUsize,
    reentry: Mutex<Option<Weak<Dispatcher>>>,
    reentry_results: Mutex<Vec<Result<DispatchReport, DispatchError>>>,
}

impl MockPlatform {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn services(self: &Arc<Self>) -> Services {
        Services::new(self.clone(), self.clone(), self.clone())
            .with_security(self.clone())
            .with_observer(self.clone())
    }

    /// Queues `volume` for the dispatcher and returns its handle.
    pub(crate) fn publish(&self, volume: MockVolume) -> VolumeHandle {
        let handle = VolumeHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.volumes.lock().unwrap().insert(handle, Arc::new(volume));
        self.pending.lock().unwrap().push_back(handle);
        handle
    }

    /// Starting `driver` installs `protocols`.
    pub(crate) fn produces(&self, driver: EfiGuid, protocols: &[EfiGuid]) {
        self.produces
            .lock()
            .unwrap()
            .insert(driver, protocols.to_vec());
    }

    /// Starting `driver` publishes `volume`.
    pub(crate) fn publish_on_start(&self, driver: EfiGuid, volume: MockVolume) {
        self.on_start.lock().unwrap().insert(driver, volume);
    }

    /// Expanding volume image `file` publishes `volume`.
    pub(crate) fn nested_volume(&self, file: EfiGuid, volume: MockVolume) {
        self.nested.lock().unwrap().insert(file, volume);
    }

    /// The next load of `driver` fails with `err`.
    pub(crate) fn fail_load(&self, driver: EfiGuid, err: LoadError) {
        self.load_failures.lock().unwrap().insert(driver, err);
    }

    pub(crate) fn start_status(&self, driver: EfiGuid, status: EfiStatus) {
        self.start_status.lock().unwrap().insert(driver, status);
    }

    pub(crate) fn reject_volume_image(&self, file: EfiGuid) {
        self.rejected_images.lock().unwrap().insert(file);
    }

    /// Every started driver calls `dispatcher.dispatch()` from its entry point.
    pub(crate) fn reenter_on_start(&self, dispatcher: &Arc<Dispatcher>) {
        *self.reentry.lock().unwrap() = Some(Arc::downgrade(dispatcher));
    }

    pub(crate) fn reentry_results(&self) -> Vec<Result<DispatchReport, DispatchError>> {
        self.reentry_results.lock().unwrap().clone()
    }

    pub(crate) fn loads(&self) -> Vec<EfiGuid> {
        self.loads.lock().unwrap().clone()
    }

    pub(crate) fn started_images(&self) -> Vec<ImageHandle> {
        self.starts.lock().unwrap().clone()
    }

    /// File names of started images, in start order.
    pub(crate) fn starts(&self) -> Vec<EfiGuid> {
        let images = self.images.lock().unwrap();
        self.starts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|image| images.get(image).copied())
            .collect()
    }

    /// Drivers evaluated while flagged or ordered; must stay empty.
    /// The evaluator never lets `driver` be scheduled.
    pub(crate) fn refuse(&self, driver: EfiGuid) {
        self.refused.lock().unwrap().insert(driver);
    }

    /// Drivers passed to `is_satisfied`, in call order.
    pub(crate) fn evaluations(&self) -> Vec<EfiGuid> {
        self.evaluations.lock().unwrap().clone()
    }

    pub(crate) fn unsound_evaluations(&self) -> Vec<EfiGuid> {
        self.unsound.lock().unwrap().clone()
    }

    pub(crate) fn rounds(&self) -> usize {
        self.rounds.load(Ordering::Relaxed)
    }

    pub(crate) fn installs(&self) -> usize {
        self.installs.load(Ordering::Relaxed)
    }

    fn evaluate(&self, expression: &[u8]) -> bool {
        let protocols = self.protocols.lock().unwrap();
        let mut stack = Vec::new();
        let mut pc = 0;
        while let Some(&opcode) = expression.get(pc) {
            pc += 1;
            match opcode {
                depex::SOR => {}
                depex::PUSH => {
                    let protocol = EfiGuid::from_slice(&expression[pc..]).unwrap();
                    pc += GUID_SIZE;
                    stack.push(protocols.contains(&protocol));
                }
                depex::AND | depex::OR => {
                    let lhs = stack.pop().unwrap();
                    let rhs = stack.pop().unwrap();
                    stack.push(if opcode == depex::AND { lhs && rhs } else { lhs || rhs });
                }
                depex::NOT => {
                    let value = stack.pop().unwrap();
                    stack.push(!value);
                }
                depex::TRUE => stack.push(true),
                depex::FALSE => stack.push(false),
                depex::END => return stack.pop().unwrap_or(false),
                _ => return false,
            }
        }
        false
    }
}

impl VolumeSource for MockPlatform {
    fn next_volume(&self) -> Option<VolumeHandle> {
        self.pending.lock().unwrap().pop_front()
    }

    fn open(&self, handle: VolumeHandle) -> Option<Arc<dyn FirmwareVolume>> {
        self.volumes
            .lock()
            .unwrap()
            .get(&handle)
            .map(|volume| volume.clone() as Arc<dyn FirmwareVolume>)
    }

    fn install(
        &self,
        _section: Section,
        _parent: VolumeHandle,
        file: EfiGuid,
    ) -> Result<VolumeHandle, EfiStatus> {
        self.installs.fetch_add(1, Ordering::Relaxed);
        let volume = self.nested.lock().unwrap().remove(&file);
        volume
            .map(|volume| self.publish(volume))
            .ok_or(EfiStatus::VOLUME_CORRUPTED)
    }
}

impl ImageLoader for MockPlatform {
    fn load(&self, _volume: VolumeHandle, file: &EfiGuid) -> Result<ImageHandle, LoadError> {
        self.loads.lock().unwrap().push(*file);
        let failure = self.load_failures.lock().unwrap().remove(file);
        if let Some(err) = failure {
            if let LoadError::SecurityViolation(Some(image)) = err {
                self.images.lock().unwrap().insert(image, *file);
            }
            return Err(err);
        }
        let image = ImageHandle::new(self.next_image.fetch_add(1, Ordering::Relaxed) + 1);
        self.images.lock().unwrap().insert(image, *file);
        Ok(image)
    }

    fn start(&self, image: ImageHandle) -> EfiStatus {
        self.starts.lock().unwrap().push(image);
        let Some(file) = self.images.lock().unwrap().get(&image).copied() else {
            return EfiStatus::INVALID_PARAMETER;
        };

        if let Some(protocols) = self.produces.lock().unwrap().get(&file) {
            self.protocols.lock().unwrap().extend(protocols.iter().copied());
        }
        let published = self.on_start.lock().unwrap().remove(&file);
        if let Some(volume) = published {
            self.publish(volume);
        }

        let reentry = self.reentry.lock().unwrap().clone();
        if let Some(dispatcher) = reentry.and_then(|weak| weak.upgrade()) {
            let result = dispatcher.dispatch();
            self.reentry_results.lock().unwrap().push(result);
        }

        self.start_status
            .lock()
            .unwrap()
            .get(&file)
            .copied()
            .unwrap_or(EfiStatus::SUCCESS)
    }
}

impl DependencyEvaluator for MockPlatform {
    fn is_satisfied(&self, driver: &DriverEntry) -> bool {
        if driver.has_depex_protocol_error() || driver.order().is_some() {
            self.unsound.lock().unwrap().push(driver.file_name());
        }
        self.evaluations.lock().unwrap().push(driver.file_name());
        if self.refused.lock().unwrap().contains(&driver.file_name()) {
            return false;
        }
        driver.depex().is_none_or(|expression| self.evaluate(expression))
    }
}

impl SecurityPolicy for MockPlatform {
    fn authenticate(&self, _auth: AuthStatus, _volume: VolumeHandle, file: &EfiGuid) -> Verdict {
        if self.rejected_images.lock().unwrap().contains(file) {
            Verdict::Reject(EfiStatus::SECURITY_VIOLATION)
        } else {
            Verdict::Accept
        }
    }
}

impl DispatchObserver for MockPlatform {
    fn round_complete(&self, _round: usize) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }
}
