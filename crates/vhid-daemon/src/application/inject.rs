//! InjectUseCase: applies injection-surface commands to the device set.
//!
//! A [`Command`] is one line from the command surface, already parsed.
//! Stimulus commands push onto the matching device's ingress queue and then
//! ask the [`DrainScheduler`] for a deferred drain; they never decode in the
//! caller's context.  Configuration commands go straight to the shared
//! [`ConfigurationStore`], which never waits on decoding.
//!
//! When recording is enabled, every stimulus command is appended to a
//! [`Recording`] exactly as injected, rejected ones included, together with
//! setting writes and resets, so a replay reproduces the same events and
//! counters.
//!
//! Settings, lock writes and resets first flush every device.  Input queued
//! before the command is therefore decoded under the old state, just as a
//! replay, which drains after every stimulus, decodes it.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use vhid_core::{
    ConfigError, DeviceClass, InjectError, Lock, PacketFraming, Recording, SettingChange,
    StatisticsSnapshot, Stimulus, TouchCommand,
};

use super::runtime::{DeviceSet, DrainScheduler};

/// A configuration field reachable from the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    RepeatDelay,
    RepeatRate,
    Dpi,
    /// Packet length: 3 or 4.
    Framing,
    /// Lock indicators: 0 is off, anything else is on.
    CapsLock,
    NumLock,
    ScrollLock,
}

impl Setting {
    pub fn name(self) -> &'static str {
        match self {
            Setting::RepeatDelay => "repeat_delay",
            Setting::RepeatRate => "repeat_rate",
            Setting::Dpi => "dpi",
            Setting::Framing => "framing",
            Setting::CapsLock => "caps",
            Setting::NumLock => "num",
            Setting::ScrollLock => "scroll",
        }
    }

    fn lock(self) -> Option<Lock> {
        match self {
            Setting::CapsLock => Some(Lock::Caps),
            Setting::NumLock => Some(Lock::Num),
            Setting::ScrollLock => Some(Lock::Scroll),
            _ => None,
        }
    }
}

/// One parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Keyboard scan codes, injected in order.
    Key(Vec<u8>),
    /// One whole pointer packet.
    Packet(Vec<u8>),
    /// Raw pointer bytes, assembled under the configured framing.
    PointerBytes(Vec<u8>),
    Touch(TouchCommand),
    Set(Setting, u32),
    Get(Setting),
    Stats,
    /// Reinitialise one device, or every device when `None`.
    Reset(Option<DeviceClass>),
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Stimulus units queued and units dropped on a full queue.
    Injected { accepted: usize, dropped: usize },
    Value(Setting, u32),
    Stats(StatisticsSnapshot),
    Reset(Option<DeviceClass>),
}

/// Error type for the inject use case.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRejected {
    #[error("stimulus rejected: {0}")]
    Inject(#[from] InjectError),

    #[error("setting rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("framing must be 3 or 4, got {0}")]
    Framing(u32),
}

/// Executes commands against a shared [`DeviceSet`].
pub struct InjectUseCase<D: DrainScheduler> {
    devices: Arc<DeviceSet>,
    scheduler: D,
    recording: Option<Recording>,
}

impl<D: DrainScheduler> InjectUseCase<D> {
    pub fn new(devices: Arc<DeviceSet>, scheduler: D) -> Self {
        Self {
            devices,
            scheduler,
            recording: None,
        }
    }

    /// Starts capturing every stimulus into a [`Recording`].
    pub fn with_recording(mut self) -> Self {
        self.recording = Some(Recording::new());
        self
    }

    /// Hands back the captured recording, if recording was enabled.
    pub fn take_recording(&mut self) -> Option<Recording> {
        self.recording.take()
    }

    /// Executes one command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandRejected`] when a stimulus or setting fails validation.
    /// The device and configuration state are unchanged in that case.
    pub fn execute(&mut self, command: Command) -> Result<Reply, CommandRejected> {
        match command {
            Command::Key(bytes) => Ok(self.inject_keys(&bytes)),
            Command::Packet(bytes) => self.inject_packet(bytes),
            Command::PointerBytes(bytes) => Ok(self.inject_pointer_bytes(&bytes)),
            Command::Touch(touch) => self.inject_touch(touch),
            Command::Set(setting, value) => self.set(setting, value),
            Command::Get(setting) => Ok(Reply::Value(setting, self.get(setting))),
            Command::Stats => Ok(Reply::Stats(self.devices.statistics().snapshot())),
            Command::Reset(device) => {
                self.devices.flush_all();
                self.record(Stimulus::Reset(device));
                self.devices.reinitialize(device);
                Ok(Reply::Reset(device))
            }
        }
    }

    fn record(&mut self, stimulus: Stimulus) {
        if let Some(recording) = self.recording.as_mut() {
            recording.push(stimulus);
        }
    }

    fn inject_keys(&mut self, bytes: &[u8]) -> Reply {
        let mut accepted = 0;
        for &byte in bytes {
            self.record(Stimulus::Keyboard(byte));
            if self.devices.keyboard.inject_scancode(byte) {
                accepted += 1;
            }
        }
        self.scheduler.schedule(DeviceClass::Keyboard);
        Reply::Injected {
            accepted,
            dropped: bytes.len() - accepted,
        }
    }

    fn inject_packet(&mut self, bytes: Vec<u8>) -> Result<Reply, CommandRejected> {
        let result = self.devices.pointer.inject_packet(&bytes);
        self.record(Stimulus::PointerPacket(bytes));
        let queued = result?;
        self.scheduler.schedule(DeviceClass::Pointer);
        Ok(Reply::Injected {
            accepted: usize::from(queued),
            dropped: usize::from(!queued),
        })
    }

    fn inject_pointer_bytes(&mut self, bytes: &[u8]) -> Reply {
        let mut accepted = 0;
        for &byte in bytes {
            self.record(Stimulus::PointerByte(byte));
            if self.devices.pointer.inject_byte(byte) {
                accepted += 1;
            }
        }
        self.scheduler.schedule(DeviceClass::Pointer);
        Reply::Injected {
            accepted,
            dropped: bytes.len() - accepted,
        }
    }

    fn inject_touch(&mut self, command: TouchCommand) -> Result<Reply, CommandRejected> {
        self.record(Stimulus::Touch(command));
        let queued = self.devices.touch.inject(command)?;
        self.scheduler.schedule(DeviceClass::Touch);
        Ok(Reply::Injected {
            accepted: usize::from(queued),
            dropped: usize::from(!queued),
        })
    }

    fn set(&mut self, setting: Setting, value: u32) -> Result<Reply, CommandRejected> {
        self.devices.flush_all();
        match setting.lock() {
            Some(lock) => {
                let on = value != 0;
                self.record(Stimulus::Lock(lock, on));
                self.devices.keyboard.set_lock(lock, on);
            }
            None => {
                let change = match setting {
                    Setting::RepeatDelay => SettingChange::RepeatDelayMs(value),
                    Setting::RepeatRate => SettingChange::RepeatRateMs(value),
                    Setting::Dpi => SettingChange::DpiPercent(value),
                    _ => SettingChange::Framing(
                        usize::try_from(value)
                            .ok()
                            .and_then(PacketFraming::from_len)
                            .ok_or(CommandRejected::Framing(value))?,
                    ),
                };
                self.record(Stimulus::Setting(change));
                self.devices.config.apply(change)?;
            }
        }
        debug!(setting = setting.name(), value, "setting updated");
        Ok(Reply::Value(setting, self.get(setting)))
    }

    fn get(&self, setting: Setting) -> u32 {
        let config = &self.devices.config;
        match setting {
            Setting::RepeatDelay => config.repeat_delay_ms(),
            Setting::RepeatRate => config.repeat_rate_ms(),
            Setting::Dpi => config.dpi_percent(),
            Setting::Framing => config.packet_framing().packet_len() as u32,
            Setting::CapsLock | Setting::NumLock | Setting::ScrollLock => {
                let indicators = self.devices.keyboard.indicators();
                u32::from(setting.lock().is_some_and(|lock| lock.is_on(&indicators)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::runtime::{ImmediateDrain, MockDrainScheduler};
    use mockall::predicate::eq;
    use vhid_core::{ConfigurationStore, NormalizedEvent, TouchBounds};

    fn devices() -> Arc<DeviceSet> {
        Arc::new(DeviceSet::new(
            Arc::new(ConfigurationStore::new()),
            TouchBounds::default(),
            |_| Box::new(Vec::<NormalizedEvent>::new()),
        ))
    }

    fn immediate(devices: &Arc<DeviceSet>) -> InjectUseCase<ImmediateDrain> {
        InjectUseCase::new(Arc::clone(devices), ImmediateDrain::new(Arc::clone(devices)))
    }

    #[test]
    fn test_key_command_queues_and_schedules_keyboard_drain() {
        // Arrange
        let devices = devices();
        let mut scheduler = MockDrainScheduler::new();
        scheduler
            .expect_schedule()
            .with(eq(DeviceClass::Keyboard))
            .times(1)
            .return_const(());
        let mut use_case = InjectUseCase::new(Arc::clone(&devices), scheduler);

        // Act
        let reply = use_case.execute(Command::Key(vec![0x1E, 0x9E])).unwrap();

        // Assert
        assert_eq!(reply, Reply::Injected { accepted: 2, dropped: 0 });
        assert_eq!(devices.keyboard.queued(), 2);
    }

    #[test]
    fn test_rejected_touch_is_not_scheduled() {
        // Arrange
        let devices = devices();
        let mut scheduler = MockDrainScheduler::new();
        scheduler.expect_schedule().never();
        let mut use_case = InjectUseCase::new(Arc::clone(&devices), scheduler);

        // Act
        let result = use_case.execute(Command::Touch(TouchCommand::Tap { x: 5000, y: 0 }));

        // Assert
        assert!(matches!(result, Err(CommandRejected::Inject(InjectError::OutOfBounds { .. }))));
        assert_eq!(devices.touch.stats().snapshot().rejected, 1);
    }

    #[test]
    fn test_bad_packet_length_is_rejected() {
        let mut scheduler = MockDrainScheduler::new();
        scheduler.expect_schedule().never();
        let mut use_case = InjectUseCase::new(devices(), scheduler);

        let result = use_case.execute(Command::Packet(vec![0x08, 1]));

        assert_eq!(result, Err(CommandRejected::Inject(InjectError::PacketLength(2))));
    }

    #[test]
    fn test_set_then_get_round_trips_value() {
        let devices = devices();
        let mut use_case = immediate(&devices);

        let set = use_case.execute(Command::Set(Setting::Dpi, 250)).unwrap();
        let get = use_case.execute(Command::Get(Setting::Dpi)).unwrap();

        assert_eq!(set, Reply::Value(Setting::Dpi, 250));
        assert_eq!(get, Reply::Value(Setting::Dpi, 250));
    }

    #[test]
    fn test_out_of_range_set_keeps_previous_value() {
        let devices = devices();
        let mut use_case = immediate(&devices);

        let result = use_case.execute(Command::Set(Setting::RepeatRate, 5));

        assert!(matches!(result, Err(CommandRejected::Config(_))));
        assert_eq!(devices.config.repeat_rate_ms(), 33);
    }

    #[test]
    fn test_framing_set_accepts_only_three_or_four() {
        let devices = devices();
        let mut use_case = immediate(&devices);

        assert_eq!(
            use_case.execute(Command::Set(Setting::Framing, 3)),
            Ok(Reply::Value(Setting::Framing, 3))
        );
        assert_eq!(
            use_case.execute(Command::Set(Setting::Framing, 5)),
            Err(CommandRejected::Framing(5))
        );
        assert_eq!(devices.config.packet_framing(), PacketFraming::Standard);
    }

    #[test]
    fn test_stats_reflect_drained_stimuli() {
        // Arrange
        let devices = devices();
        let mut use_case = immediate(&devices);

        // Act
        use_case.execute(Command::Key(vec![0x1D, 0x2E])).unwrap();
        use_case.execute(Command::Packet(vec![0x09, 4, 0, 0])).unwrap();
        let reply = use_case.execute(Command::Stats).unwrap();

        // Assert
        let Reply::Stats(snapshot) = reply else {
            panic!("expected stats reply, got {reply:?}");
        };
        assert_eq!(snapshot.keyboard.combos, 1);
        assert_eq!(snapshot.pointer.left_clicks, 1);
    }

    #[test]
    fn test_recording_captures_rejected_stimuli_too() {
        // Arrange
        let devices = devices();
        let mut use_case = immediate(&devices).with_recording();

        // Act
        use_case.execute(Command::Key(vec![0x1E])).unwrap();
        let _ = use_case.execute(Command::Packet(vec![0x08]));
        let _ = use_case.execute(Command::Touch(TouchCommand::Tap { x: -1, y: 0 }));
        use_case.execute(Command::Stats).unwrap();

        // Assert
        let recording = use_case.take_recording().unwrap();
        assert_eq!(
            recording.stimuli,
            vec![
                Stimulus::Keyboard(0x1E),
                Stimulus::PointerPacket(vec![0x08]),
                Stimulus::Touch(TouchCommand::Tap { x: -1, y: 0 }),
            ]
        );
    }

    #[test]
    fn test_set_decodes_queued_packets_under_the_old_dpi() {
        // Arrange: the scheduler never drains, so the packet stays queued.
        let devices = devices();
        let mut scheduler = MockDrainScheduler::new();
        scheduler.expect_schedule().return_const(());
        let mut use_case = InjectUseCase::new(Arc::clone(&devices), scheduler);
        use_case.execute(Command::Packet(vec![0x08, 10, 0])).unwrap();

        // Act
        use_case.execute(Command::Set(Setting::Dpi, 50)).unwrap();

        // Assert
        assert_eq!(devices.pointer.queued(), 0);
        assert_eq!(devices.pointer.stats().snapshot().total_dx, 10);
    }

    #[test]
    fn test_lock_set_writes_indicator_and_reads_back() {
        // Arrange
        let devices = devices();
        let mut use_case = immediate(&devices);

        // Act
        let on = use_case.execute(Command::Set(Setting::CapsLock, 1)).unwrap();
        let num = use_case.execute(Command::Get(Setting::NumLock)).unwrap();
        use_case.execute(Command::Key(vec![0x3A, 0xBA])).unwrap();
        let after_toggle = use_case.execute(Command::Get(Setting::CapsLock)).unwrap();

        // Assert
        assert_eq!(on, Reply::Value(Setting::CapsLock, 1));
        assert_eq!(num, Reply::Value(Setting::NumLock, 0));
        assert_eq!(after_toggle, Reply::Value(Setting::CapsLock, 0));
    }

    #[test]
    fn test_recording_captures_settings_locks_and_resets() {
        // Arrange
        let devices = devices();
        let mut use_case = immediate(&devices).with_recording();

        // Act
        use_case.execute(Command::Set(Setting::Dpi, 50)).unwrap();
        let _ = use_case.execute(Command::Set(Setting::RepeatRate, 5));
        let _ = use_case.execute(Command::Set(Setting::Framing, 7));
        use_case.execute(Command::Set(Setting::ScrollLock, 2)).unwrap();
        use_case.execute(Command::Reset(None)).unwrap();
        use_case.execute(Command::Get(Setting::Dpi)).unwrap();

        // Assert: unrepresentable framing values are not recorded.
        let recording = use_case.take_recording().unwrap();
        assert_eq!(
            recording.stimuli,
            vec![
                Stimulus::Setting(SettingChange::DpiPercent(50)),
                Stimulus::Setting(SettingChange::RepeatRateMs(5)),
                Stimulus::Lock(Lock::Scroll, true),
                Stimulus::Reset(None),
            ]
        );
    }

    #[test]
    fn test_reset_decodes_queued_input_before_reinitializing() {
        // Arrange
        let devices = devices();
        let mut scheduler = MockDrainScheduler::new();
        scheduler.expect_schedule().return_const(());
        let mut use_case = InjectUseCase::new(Arc::clone(&devices), scheduler);
        use_case.execute(Command::Key(vec![0x1E])).unwrap();

        // Act
        use_case.execute(Command::Reset(Some(DeviceClass::Pointer))).unwrap();

        // Assert
        assert_eq!(devices.keyboard.queued(), 0);
        assert_eq!(devices.keyboard.stats().snapshot().key_presses, 1);
    }

    #[test]
    fn test_reset_reinitializes_requested_device() {
        let devices = devices();
        let mut use_case = immediate(&devices);
        use_case.execute(Command::Key(vec![0x3A])).unwrap();

        let reply = use_case.execute(Command::Reset(Some(DeviceClass::Keyboard))).unwrap();

        assert_eq!(reply, Reply::Reset(Some(DeviceClass::Keyboard)));
        assert!(!devices.keyboard.indicators().caps_lock);
        assert_eq!(devices.keyboard.stats().snapshot().key_presses, 0);
    }
}
