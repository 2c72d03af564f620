//! Generator → modifier → transport pipeline
//!
//! One tick runs the whole chain synchronously on the driver task:
//!
//! ```text
//! combine ──► normalize ──► observe ──► modifiers ──► observe ──► rate gate ──► encode ──► write
//! (first      (Frame)      (generated)  (in order)   (transformed)             (29 bytes)
//!  generator)
//! ```
//!
//! Observers run on every tick; the rate gate only throttles transport
//! writes. The pipeline is a statum state machine so that registration is
//! only possible while configuring and ticking only while running:
//!
//! ```text
//! Configuring ──start──► Running ──cancel / stop──► Stopped
//! ```

mod gate;
pub mod handle;
pub mod stage;

pub use gate::RateGate;
pub use handle::PipelineHandle;
pub use stage::{Generator, GeneratorError, Modifier};

use crate::frame::{Frame, RawSample};
use crate::transport::{Transport, TransportError};
use crate::wire;
use chrono::Local;
use statum::{machine, state};
use std::fmt::{self, Display};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(5);
pub const DEFAULT_LOOP_YIELD: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),

    #[error("Pipeline task error: {0}")]
    TaskError(String),
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Observer channel closed")]
    Closed,

    #[error("Observer failed: {0}")]
    Failed(String),
}

/// Callback invoked with the frame at one of the two observation points
pub type Observer = Box<dyn FnMut(&Frame) -> Result<(), ObserverError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverPoint {
    /// Right after normalization, before any modifier
    Generated,
    /// After the full modifier chain
    Transformed,
}

impl Display for ObserverPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverPoint::Generated => write!(f, "generated"),
            ObserverPoint::Transformed => write!(f, "transformed"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub send_interval: Duration,
    pub loop_yield: Duration,
    pub stats_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            loop_yield: DEFAULT_LOOP_YIELD,
            stats_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub transmits: u64,
    pub idle_ticks: u64,
    pub gated_ticks: u64,
    pub generator_faults: u64,
    pub observer_faults: u64,
}

impl PipelineStats {
    /// Counter deltas relative to an earlier snapshot
    pub fn since(&self, earlier: &PipelineStats) -> PipelineStats {
        PipelineStats {
            ticks: self.ticks.saturating_sub(earlier.ticks),
            transmits: self.transmits.saturating_sub(earlier.transmits),
            idle_ticks: self.idle_ticks.saturating_sub(earlier.idle_ticks),
            gated_ticks: self.gated_ticks.saturating_sub(earlier.gated_ticks),
            generator_faults: self.generator_faults.saturating_sub(earlier.generator_faults),
            observer_faults: self.observer_faults.saturating_sub(earlier.observer_faults),
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No generator produced a frame
    Idle,
    /// Frame went through the chain but was not written
    Observed(Frame),
    /// Frame went through the chain and was written to the transport
    Transmitted(Frame),
}

impl TickOutcome {
    pub fn frame(&self) -> Option<Frame> {
        match self {
            TickOutcome::Idle => None,
            TickOutcome::Observed(frame) | TickOutcome::Transmitted(frame) => Some(*frame),
        }
    }

    pub fn transmitted(&self) -> bool {
        matches!(self, TickOutcome::Transmitted(_))
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum PipelineState {
    Configuring,
    Running,
    Stopped,
}

#[machine]
pub struct Pipeline<S: PipelineState> {
    settings: PipelineSettings,
    generators: Vec<Box<dyn Generator>>,
    modifiers: Vec<Box<dyn Modifier>>,
    generate_observers: Vec<Observer>,
    transform_observers: Vec<Observer>,
    transport: Option<Box<dyn Transport>>,
    gate: RateGate,
    stats: PipelineStats,
}

impl<S: PipelineState> Pipeline<S> {
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            debug!("Closing transport");
            transport.close();
        }
    }
}

impl Pipeline<Configuring> {
    pub fn create(settings: PipelineSettings) -> Self {
        debug!("Creating pipeline with settings: {:?}", settings);
        let gate = RateGate::new(settings.send_interval);
        Self::new(
            settings,
            Vec::new(), // generators
            Vec::new(), // modifiers
            Vec::new(), // generate_observers
            Vec::new(), // transform_observers
            None,       // transport
            gate,
            PipelineStats::default(),
        )
    }

    pub fn add_generator(&mut self, generator: Box<dyn Generator>) -> &mut Self {
        info!("Registering generator #{}: {}", self.generators.len(), generator.name());
        self.generators.push(generator);
        self
    }

    pub fn add_modifier(&mut self, modifier: Box<dyn Modifier>) -> &mut Self {
        info!("Registering modifier #{}: {}", self.modifiers.len(), modifier.name());
        self.modifiers.push(modifier);
        self
    }

    /// Registers a callback that sees every normalized frame before modifiers
    pub fn on_generate<F>(&mut self, observer: F) -> &mut Self
    where
        F: FnMut(&Frame) -> Result<(), ObserverError> + Send + 'static,
    {
        self.generate_observers.push(Box::new(observer));
        self
    }

    /// Registers a callback that sees every frame after the modifier chain
    pub fn on_transform<F>(&mut self, observer: F) -> &mut Self
    where
        F: FnMut(&Frame) -> Result<(), ObserverError> + Send + 'static,
    {
        self.transform_observers.push(Box::new(observer));
        self
    }

    pub fn set_transport(&mut self, transport: Box<dyn Transport>) -> &mut Self {
        self.transport = Some(transport);
        self
    }

    pub fn start(self) -> Pipeline<Running> {
        info!(
            "Starting pipeline: {} generators, {} modifiers, transport {}, min send interval {:?}",
            self.generators.len(),
            self.modifiers.len(),
            if self.transport.is_some() { "attached" } else { "none" },
            self.gate.min_interval()
        );
        self.transition()
    }
}

impl Pipeline<Running> {
    /// First registered generator wins.
    ///
    /// Errors and panics from the generator both count as "no frame" for
    /// this tick; the loop keeps running.
    pub fn combine(&mut self) -> Option<RawSample> {
        let generator = self.generators.first_mut()?;
        match panic::catch_unwind(AssertUnwindSafe(|| generator.generate())) {
            Ok(Ok(sample)) => Some(sample),
            Ok(Err(e)) => {
                warn!("Generator {} failed, skipping tick: {}", generator.name(), e);
                self.stats.generator_faults += 1;
                None
            }
            Err(_) => {
                error!("Generator {} panicked, skipping tick", generator.name());
                self.stats.generator_faults += 1;
                None
            }
        }
    }

    /// Left-to-right fold over all modifiers
    pub fn apply_modifiers(&mut self, frame: Frame) -> Frame {
        self.modifiers
            .iter_mut()
            .fold(frame, |current, modifier| modifier.update(&current))
    }

    pub fn tick(&mut self) -> Result<TickOutcome, PipelineError> {
        self.stats.ticks += 1;

        let Some(raw) = self.combine() else {
            self.stats.idle_ticks += 1;
            return Ok(TickOutcome::Idle);
        };

        let generated = raw.normalize();
        notify(
            &mut self.generate_observers,
            &generated,
            ObserverPoint::Generated,
            &mut self.stats,
        );

        let transformed = self.apply_modifiers(generated);
        notify(
            &mut self.transform_observers,
            &transformed,
            ObserverPoint::Transformed,
            &mut self.stats,
        );

        let Some(transport) = self.transport.as_mut() else {
            return Ok(TickOutcome::Observed(transformed));
        };

        let now = Instant::now();
        if !self.gate.is_open_at(now) {
            self.stats.gated_ticks += 1;
            return Ok(TickOutcome::Observed(transformed));
        }

        let bytes = wire::encode(&transformed);
        let written = transport.write(&bytes)?;
        self.gate.record_transmit(now);
        self.stats.transmits += 1;
        debug!("Transmitted {} bytes: {}", written, transformed);

        Ok(TickOutcome::Transmitted(transformed))
    }

    /// Ticks until the token is cancelled or the transport fails.
    ///
    /// The transport is closed on both exits. A transport fault is returned
    /// to the caller after the close.
    pub async fn run_until_cancelled(
        mut self,
        token: CancellationToken,
    ) -> Result<Pipeline<Stopped>, PipelineError> {
        info!(
            "Entering pipeline loop (send interval {:?}, yield {:?})",
            self.settings.send_interval, self.settings.loop_yield
        );

        let stats_interval = chrono::Duration::from_std(self.settings.stats_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let mut last_stats_time = Local::now();
        let mut last_snapshot = self.stats;

        let result = loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("Cancellation received, leaving pipeline loop");
                    break Ok(());
                }

                _ = tokio::time::sleep(self.settings.loop_yield) => {
                    if let Err(e) = self.tick() {
                        error!("Pipeline tick failed: {}", e);
                        break Err(e);
                    }

                    let now = Local::now();
                    if now - last_stats_time > stats_interval {
                        let window = self.stats.since(&last_snapshot);
                        let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
                        info!(
                            "Pipeline stats: {} ticks, {} transmits, {} gated, {} idle in {} seconds ({:.1} Hz out)",
                            window.ticks,
                            window.transmits,
                            window.gated_ticks,
                            window.idle_ticks,
                            elapsed_seconds,
                            window.transmits as f64 / elapsed_seconds as f64
                        );
                        if window.generator_faults > 0 || window.observer_faults > 0 {
                            warn!(
                                "Contained faults: {} generator, {} observer",
                                window.generator_faults, window.observer_faults
                            );
                        }
                        last_snapshot = self.stats;
                        last_stats_time = now;
                    }
                }
            }
        };

        self.close_transport();
        result?;

        info!("Pipeline stopped after {} ticks", self.stats.ticks);
        Ok(self.transition())
    }

    /// Stops without the run loop, closing the transport
    pub fn stop(mut self) -> Pipeline<Stopped> {
        self.close_transport();
        self.transition()
    }
}

impl Pipeline<Stopped> {
    /// Closing again is a no-op for every transport
    pub fn close(&mut self) {
        self.close_transport();
    }
}

// Each callback is isolated: an error or panic is logged and counted, the
// remaining observers and the modifier chain still run.
fn notify(
    observers: &mut [Observer],
    frame: &Frame,
    point: ObserverPoint,
    stats: &mut PipelineStats,
) {
    for (index, observer) in observers.iter_mut().enumerate() {
        match panic::catch_unwind(AssertUnwindSafe(|| observer(frame))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                stats.observer_faults += 1;
                warn!("Observer #{} at {} point failed: {}", index, point, e);
            }
            Err(_) => {
                stats.observer_faults += 1;
                error!("Observer #{} at {} point panicked", index, point);
            }
        }
    }
}
