use super::client::AnalysisClient;
use super::task::AnalysisTask;
use crate::camera::FrameSurface;
use crate::error::AnalysisError;
use crate::events::{EventBus, StereocamEvent};
use crate::frame::StillImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Read-only view of the loop for progress and result rendering
#[derive(Debug, Clone)]
pub struct AnalysisSnapshot {
    pub running: bool,
    pub prompt_text: String,
    pub interval: Duration,
    /// Last successful description; survives later failures
    pub result_text: Option<String>,
    /// Error of the most recent failed cycle, cleared by the next success
    pub error_message: Option<String>,
    pub last_fire_time: Option<Instant>,
    pub in_flight: usize,
    pub active_task: Option<AnalysisTask>,
}

impl AnalysisSnapshot {
    pub fn is_analyzing(&self) -> bool {
        self.in_flight > 0
    }

    /// Fraction of the interval elapsed since the last fire, in [0, 1]
    pub fn progress(&self, now: Instant) -> f64 {
        match self.last_fire_time {
            Some(last) if !self.interval.is_zero() => {
                let elapsed = now.saturating_duration_since(last);
                (elapsed.as_secs_f64() / self.interval.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct LoopState {
    /// Bumped on every start and stop; cycles from an older generation are discarded
    generation: u64,
    running: bool,
    prompt_text: String,
    interval: Duration,
    last_fire_time: Option<Instant>,
    active_task: Option<AnalysisTask>,
    result_text: Option<String>,
    error_message: Option<String>,
    in_flight: usize,
}

struct TimerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything a single cycle needs, cloned into each spawned cycle
#[derive(Clone)]
struct CycleContext {
    client: Arc<dyn AnalysisClient>,
    surface: Arc<dyn FrameSurface>,
    state: Arc<Mutex<LoopState>>,
    event_bus: Arc<EventBus>,
    jpeg_quality: u8,
    prompt_text: String,
    generation: u64,
}

/// Samples the video surface on a fixed period and asks for a description of each frame.
///
/// Cycles fire on the timer regardless of whether the previous one has
/// answered, so several may be in flight at once. Each commits its own
/// outcome when it resolves, as long as the loop has not been stopped or
/// restarted in the meantime.
pub struct AnalysisLoop {
    client: Arc<dyn AnalysisClient>,
    jpeg_quality: u8,
    state: Arc<Mutex<LoopState>>,
    timer: Mutex<Option<TimerHandle>>,
    event_bus: Arc<EventBus>,
}

impl AnalysisLoop {
    pub fn new(client: Arc<dyn AnalysisClient>, jpeg_quality: u8, event_bus: Arc<EventBus>) -> Self {
        Self {
            client,
            jpeg_quality,
            state: Arc::new(Mutex::new(LoopState::default())),
            timer: Mutex::new(None),
            event_bus,
        }
    }

    /// Start analysing `surface` every `interval_seconds`. Any previous run is
    /// torn down first. An empty prompt leaves the loop idle.
    pub fn start(
        &self,
        prompt_text: &str,
        interval_seconds: f64,
        surface: Arc<dyn FrameSurface>,
    ) -> Result<(), AnalysisError> {
        // rejects NaN, negative and out-of-range values; sub-nanosecond rounds to zero
        let interval = match Duration::try_from_secs_f64(interval_seconds) {
            Ok(interval) if !interval.is_zero() => interval,
            _ => {
                return Err(AnalysisError::InvalidInterval {
                    seconds: interval_seconds,
                })
            }
        };

        self.stop();

        let generation = {
            let mut state = self.state.lock();
            state.prompt_text = prompt_text.to_string();
            state.interval = interval;

            if prompt_text.trim().is_empty() {
                info!("No analysis prompt set; capture-analyze loop stays idle");
                return Ok(());
            }

            state.running = true;
            state.last_fire_time = Some(Instant::now());
            state.generation
        };

        info!(
            "Starting capture-analyze loop every {:.1}s: \"{}\"",
            interval_seconds, prompt_text
        );

        let context = CycleContext {
            client: Arc::clone(&self.client),
            surface,
            state: Arc::clone(&self.state),
            event_bus: Arc::clone(&self.event_bus),
            jpeg_quality: self.jpeg_quality,
            prompt_text: prompt_text.to_string(),
            generation,
        };

        let token = CancellationToken::new();
        let task = tokio::spawn(run_timer(context, interval, token.clone()));
        *self.timer.lock() = Some(TimerHandle { token, task });

        Ok(())
    }

    /// Cancel the timer. Cycles still in flight may finish, but their
    /// outcomes are discarded.
    pub fn stop(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.token.cancel();
            timer.task.abort();
            info!("Capture-analyze loop stopped");
        }

        let mut state = self.state.lock();
        state.generation += 1;
        state.running = false;
        state.in_flight = 0;
    }

    /// Run one cycle now, outside the timer, and wait for its outcome.
    /// The outcome is committed like a timer-driven cycle.
    pub async fn capture_and_analyze(
        &self,
        surface: Arc<dyn FrameSurface>,
    ) -> Result<String, AnalysisError> {
        let (prompt_text, generation) = {
            let state = self.state.lock();
            (state.prompt_text.clone(), state.generation)
        };
        if prompt_text.trim().is_empty() {
            return Err(AnalysisError::NoPrompt);
        }

        let context = CycleContext {
            client: Arc::clone(&self.client),
            surface,
            state: Arc::clone(&self.state),
            event_bus: Arc::clone(&self.event_bus),
            jpeg_quality: self.jpeg_quality,
            prompt_text,
            generation,
        };
        run_cycle(context).await
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        let state = self.state.lock();
        AnalysisSnapshot {
            running: state.running,
            prompt_text: state.prompt_text.clone(),
            interval: state.interval,
            result_text: state.result_text.clone(),
            error_message: state.error_message.clone(),
            last_fire_time: state.last_fire_time,
            in_flight: state.in_flight,
            active_task: state.active_task.clone(),
        }
    }
}

impl Drop for AnalysisLoop {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.token.cancel();
            timer.task.abort();
        }
    }
}

async fn run_timer(context: CycleContext, period: Duration, token: CancellationToken) {
    // first tick completes immediately, giving the kick-off cycle
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Analysis timer cancelled");
                break;
            }
            _ = ticker.tick() => {
                let cycle = context.clone();
                tokio::spawn(async move {
                    let _ = run_cycle(cycle).await;
                });
            }
        }
    }
}

async fn run_cycle(context: CycleContext) -> Result<String, AnalysisError> {
    let mut task = AnalysisTask::new(context.prompt_text.clone());
    {
        let mut state = context.state.lock();
        if state.generation != context.generation {
            return Err(AnalysisError::Cancelled);
        }
        state.in_flight += 1;
        state.active_task = Some(task.clone());
    }

    debug!("Analysis cycle {} started", task.id);
    context.event_bus.publish(StereocamEvent::AnalysisStarted {
        task_id: task.id.clone(),
        timestamp: SystemTime::now(),
    });

    let outcome = capture_and_send(&context).await;

    let event = {
        let mut state = context.state.lock();
        if state.generation != context.generation {
            debug!("Discarding late analysis outcome for cycle {}", task.id);
            return outcome;
        }
        state.in_flight = state.in_flight.saturating_sub(1);

        match &outcome {
            Ok(text) => {
                task.complete(text.clone());
                state.active_task = Some(task.clone());
                state.result_text = Some(text.clone());
                state.error_message = None;
                state.last_fire_time = Some(Instant::now());
                StereocamEvent::AnalysisCompleted {
                    task_id: task.id.clone(),
                    result: text.clone(),
                    timestamp: SystemTime::now(),
                }
            }
            Err(e) => {
                error!("Error analyzing image: {}", e);
                task.fail(e.to_string());
                state.active_task = Some(task.clone());
                state.error_message = Some(e.to_string());
                StereocamEvent::AnalysisFailed {
                    task_id: task.id.clone(),
                    error: e.to_string(),
                    timestamp: SystemTime::now(),
                }
            }
        }
    };

    context.event_bus.publish(event);
    outcome
}

async fn capture_and_send(context: &CycleContext) -> Result<String, AnalysisError> {
    let frame = context.surface.current_frame()?;
    let still = StillImage::from_frame(&frame, context.jpeg_quality)?;
    let data_url = still.to_data_url();

    debug!(
        "Captured frame {} as {} byte JPEG",
        still.frame_id,
        still.jpeg.len()
    );

    let result = context.client.analyze(&data_url, &context.prompt_text).await?;
    if result.trim().is_empty() {
        warn!("Analysis returned an empty description");
        return Ok("No analysis available".to_string());
    }
    Ok(result)
}
