//! Foreground scan requests and the passive background re-scan timer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, info, trace, warn};

use crate::backend::DiscoveryBackend;
use crate::error::DiscoveryError;
use crate::session::{ScanPhase, SharedState};

/// Delay between arming and the background timer becoming active.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(30);
/// Period of the background timer once active.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(45);

/// Scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
	pub warmup: Duration,
	pub interval: Duration,
	/// Stop a foreground scan that has not completed after this long.
	/// `None` lets a foreground scan run until the backend completes it.
	pub foreground_timeout: Option<Duration>,
}

impl Default for ScanTiming {
	fn default() -> Self {
		Self {
			warmup: DEFAULT_WARMUP,
			interval: DEFAULT_INTERVAL,
			foreground_timeout: None,
		}
	}
}

/// Where the background timer is in its two-phase life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundState {
	#[default]
	Disarmed,
	/// Waiting out the warm-up delay.
	WarmingUp,
	/// Interval timer running.
	Armed,
}

#[derive(Debug, Default)]
struct BackgroundTimer {
	state: BackgroundState,
	task: Option<JoinHandle<()>>,
	/// Bumped on every cancel so a stale task never flips the state.
	generation: u64,
}

impl BackgroundTimer {
	fn cancel(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
		self.state = BackgroundState::Disarmed;
		self.generation = self.generation.wrapping_add(1);
	}
}

/// Owns foreground scans and the background timer for one session.
///
/// `arm_background`/`disarm_background` are the only mutators of the timer.
/// Timer-driven ticks and foreground requests both funnel phase changes
/// through the session state, so they cannot overlap.
pub struct ScanScheduler {
	backend: Arc<dyn DiscoveryBackend>,
	state: Arc<SharedState>,
	timing: ScanTiming,
	background: Arc<Mutex<BackgroundTimer>>,
	watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl ScanScheduler {
	pub(crate) fn new(backend: Arc<dyn DiscoveryBackend>, state: Arc<SharedState>, timing: ScanTiming) -> Self {
		Self {
			backend,
			state,
			timing,
			background: Arc::new(Mutex::new(BackgroundTimer::default())),
			watchdog: Mutex::new(None),
		}
	}

	pub fn timing(&self) -> ScanTiming {
		self.timing
	}

	pub fn background_state(&self) -> BackgroundState {
		self.background.lock().state
	}

	/// Starts a user-visible scan. Returns false if one was already running
	/// or the backend refused to start.
	///
	/// Pre-empts a background scan: the phase switches to foreground before
	/// the backend is called, so events from an in-flight background pass
	/// are reported with foreground semantics.
	pub async fn start_foreground(&self) -> bool {
		let begun = self
			.state
			.update(|s| {
				if s.phase == ScanPhase::ForegroundScanning {
					return false;
				}
				s.discovered.clear();
				s.scanning_subnet = None;
				s.phase = ScanPhase::ForegroundScanning;
				true
			})
			.unwrap_or(false);

		if !begun {
			debug!(target = "preke.scheduler", "foreground scan already running");
			return false;
		}

		info!(target = "preke.scheduler", "foreground scan requested");
		if let Err(e) = self.backend.start_discovery().await {
			warn!(target = "preke.scheduler", error = %e, "foreground scan failed to start");
			self.state.update(|s| {
				if s.phase == ScanPhase::ForegroundScanning {
					s.phase = ScanPhase::Idle;
				}
			});
			return false;
		}

		self.arm_watchdog();
		true
	}

	/// Asks the backend to end the current scan. Completion still arrives as
	/// a backend event; nothing is synthesized here.
	pub async fn stop_foreground(&self) -> Result<(), DiscoveryError> {
		self.cancel_watchdog();
		self.backend.stop_discovery().await.inspect_err(|e| {
			warn!(target = "preke.scheduler", error = %e, "failed to stop discovery");
		})
	}

	/// Arms the background timer: after the warm-up delay an interval timer
	/// starts and every tick runs [`tick`](Self::tick). Re-arming cancels the
	/// previous timers first.
	pub fn arm_background(&self) {
		let mut timer = self.background.lock();
		timer.cancel();
		timer.state = BackgroundState::WarmingUp;

		let generation = timer.generation;
		let background = Arc::clone(&self.background);
		let backend = Arc::clone(&self.backend);
		let state = Arc::clone(&self.state);
		let ScanTiming { warmup, interval, .. } = self.timing;

		timer.task = Some(tokio::spawn(async move {
			sleep(warmup).await;
			{
				let mut timer = background.lock();
				if timer.generation != generation {
					return;
				}
				timer.state = BackgroundState::Armed;
			}
			debug!(target = "preke.scheduler", interval_secs = interval.as_secs(), "background timer armed");

			let mut ticks = interval_at(Instant::now() + interval, interval);
			ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticks.tick().await;
				background_tick(backend.as_ref(), &state).await;
			}
		}));

		debug!(target = "preke.scheduler", warmup_secs = warmup.as_secs(), "background timer warming up");
	}

	/// Cancels the warm-up and interval timers. Safe to call when disarmed.
	pub fn disarm_background(&self) {
		let mut timer = self.background.lock();
		if timer.state != BackgroundState::Disarmed {
			debug!(target = "preke.scheduler", "background timer disarmed");
		}
		timer.cancel();
	}

	/// One background tick. Starts a scan only when no foreground scan is
	/// running and no device, discovered or saved, is known. Returns whether
	/// a scan was started.
	pub async fn tick(&self) -> bool {
		background_tick(self.backend.as_ref(), &self.state).await
	}

	fn arm_watchdog(&self) {
		let Some(timeout) = self.timing.foreground_timeout else {
			return;
		};
		let backend = Arc::clone(&self.backend);
		let state = Arc::clone(&self.state);

		let task = tokio::spawn(async move {
			sleep(timeout).await;
			if state.is_closed() || state.read(|s| s.phase) != ScanPhase::ForegroundScanning {
				return;
			}
			info!(
				target = "preke.scheduler",
				timeout_secs = timeout.as_secs(),
				"foreground scan timed out; stopping"
			);
			if let Err(e) = backend.stop_discovery().await {
				warn!(target = "preke.scheduler", error = %e, "failed to stop timed out scan");
			}
		});

		if let Some(previous) = self.watchdog.lock().replace(task) {
			previous.abort();
		}
	}

	pub(crate) fn cancel_watchdog(&self) {
		if let Some(task) = self.watchdog.lock().take() {
			task.abort();
		}
	}
}

impl Drop for ScanScheduler {
	fn drop(&mut self) {
		self.background.lock().cancel();
		self.cancel_watchdog();
	}
}

impl std::fmt::Debug for ScanScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScanScheduler")
			.field("timing", &self.timing)
			.field("background", &self.background_state())
			.finish()
	}
}

async fn background_tick(backend: &dyn DiscoveryBackend, state: &SharedState) -> bool {
	let eligible = state
		.update(|s| {
			let eligible =
				s.phase != ScanPhase::ForegroundScanning && s.discovered.is_empty() && s.saved.is_empty();
			if eligible && s.phase == ScanPhase::Idle {
				s.phase = ScanPhase::BackgroundScanning;
			}
			eligible
		})
		.unwrap_or(false);

	if !eligible {
		trace!(target = "preke.scheduler", "background tick skipped");
		return false;
	}

	debug!(target = "preke.scheduler", "background scan starting");
	if let Err(e) = backend.start_discovery().await {
		warn!(target = "preke.scheduler", error = %e, "background scan failed to start");
		state.update(|s| {
			if s.phase == ScanPhase::BackgroundScanning {
				s.phase = ScanPhase::Idle;
			}
		});
		return false;
	}
	true
}
