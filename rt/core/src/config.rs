//! Runtime configuration

use crate::context::ContextId;
use crate::message::AppId;
use crate::time::TickDuration;
use crate::{RtError, RtResult};

/// Tunables of the runtime.
///
/// The deadlines were chosen empirically on hardware; they are parameters,
/// not invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeConfig {
    /// A draw holding the frame lock longer than this is considered lost
    pub frame_watchdog: TickDuration,
    /// Time a quitting app gets before its task is deleted, per context
    pub shutdown_timeout: [TickDuration; ContextId::COUNT],
    /// Time a download may take before the fallback app is loaded
    pub download_timeout: TickDuration,
    /// Longest a runloop blocks without sending a heartbeat
    pub heartbeat_interval: TickDuration,
    /// A runloop silent for this long is considered hung
    pub hang_timeout: Option<TickDuration>,
    /// Supervisor sweep period
    pub sweep_interval: TickDuration,
    /// Minimum interval between two accepted button transitions
    pub debounce: TickDuration,
    /// Button poll period while any button is held
    pub button_poll: TickDuration,
    pub queue_depth: usize,
    /// Blocking budget of a task-context post
    pub post_timeout: TickDuration,
    pub arena_size: [usize; ContextId::COUNT],
    pub stack_size: [usize; ContextId::COUNT],
    /// Address the MainApp arena is mapped at; later contexts follow at
    /// `ARENA_STRIDE` intervals
    pub arena_base: u32,
    pub default_app: AppId,
    pub backlight_brightness: u8,
    pub backlight_duration: TickDuration,
}

impl RuntimeConfig {
    /// Address distance between two context arenas
    pub const ARENA_STRIDE: u32 = 0x0010_0000;

    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    pub fn shutdown_timeout(&self, context: ContextId) -> TickDuration {
        self.shutdown_timeout[context.index()]
    }

    pub fn arena_size(&self, context: ContextId) -> usize {
        self.arena_size[context.index()]
    }

    pub fn stack_size(&self, context: ContextId) -> usize {
        self.stack_size[context.index()]
    }

    pub fn arena_base(&self, context: ContextId) -> u32 {
        self.arena_base
            .wrapping_add(Self::ARENA_STRIDE.wrapping_mul(context.index() as u32))
    }

    fn validate(&self) -> RtResult<()> {
        let positive = [
            self.frame_watchdog,
            self.download_timeout,
            self.heartbeat_interval,
            self.sweep_interval,
            self.button_poll,
        ];
        if positive.iter().any(TickDuration::is_zero)
            || self.queue_depth == 0
            || self.arena_size.iter().any(|size| *size == 0)
            || self.stack_size.iter().any(|size| *size == 0)
        {
            return Err(RtError::ProgrammingError);
        }
        if let Some(hang) = self.hang_timeout {
            if hang <= self.heartbeat_interval {
                return Err(RtError::ProgrammingError);
            }
        }
        let span = u64::from(Self::ARENA_STRIDE);
        if self.arena_size.iter().any(|size| *size as u64 > span) {
            return Err(RtError::ProgrammingError);
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_watchdog: TickDuration::from_millis(250),
            shutdown_timeout: [
                TickDuration::from_secs(5),
                TickDuration::from_secs(2),
                TickDuration::from_secs(5),
            ],
            download_timeout: TickDuration::from_secs(6),
            heartbeat_interval: TickDuration::from_secs(1),
            hang_timeout: Some(TickDuration::from_secs(10)),
            sweep_interval: TickDuration::from_millis(500),
            debounce: TickDuration::from_millis(2),
            button_poll: TickDuration::from_millis(10),
            queue_depth: 16,
            post_timeout: TickDuration::from_millis(10),
            arena_size: [48 * 1024, 10 * 1024, 16 * 1024],
            stack_size: [64 * 1024, 32 * 1024, 64 * 1024],
            arena_base: 0x2001_0000,
            default_app: AppId::SYSTEM,
            backlight_brightness: 100,
            backlight_duration: TickDuration::from_secs(3),
        }
    }
}

/// Builder for `RuntimeConfig`
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    pub fn frame_watchdog(mut self, watchdog: TickDuration) -> Self {
        self.config.frame_watchdog = watchdog;
        self
    }

    pub fn shutdown_timeout(mut self, context: ContextId, timeout: TickDuration) -> Self {
        self.config.shutdown_timeout[context.index()] = timeout;
        self
    }

    pub fn download_timeout(mut self, timeout: TickDuration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    pub fn heartbeat_interval(mut self, interval: TickDuration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// `None` disables hang detection
    pub fn hang_timeout(mut self, timeout: Option<TickDuration>) -> Self {
        self.config.hang_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: TickDuration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn debounce(mut self, debounce: TickDuration) -> Self {
        self.config.debounce = debounce;
        self
    }

    pub fn button_poll(mut self, poll: TickDuration) -> Self {
        self.config.button_poll = poll;
        self
    }

    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.queue_depth = depth;
        self
    }

    pub fn post_timeout(mut self, timeout: TickDuration) -> Self {
        self.config.post_timeout = timeout;
        self
    }

    pub fn arena_size(mut self, context: ContextId, size: usize) -> Self {
        self.config.arena_size[context.index()] = size;
        self
    }

    pub fn stack_size(mut self, context: ContextId, size: usize) -> Self {
        self.config.stack_size[context.index()] = size;
        self
    }

    pub fn arena_base(mut self, base: u32) -> Self {
        self.config.arena_base = base;
        self
    }

    pub fn default_app(mut self, app: AppId) -> Self {
        self.config.default_app = app;
        self
    }

    pub fn backlight(mut self, brightness: u8, duration: TickDuration) -> Self {
        self.config.backlight_brightness = brightness;
        self.config.backlight_duration = duration;
        self
    }

    /// Validates and returns the configuration
    pub fn build(self) -> RtResult<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
