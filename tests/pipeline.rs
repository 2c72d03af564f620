use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xserialone::frame::{Axis, Button, Dpad, Frame, RawSample};
use xserialone::pipeline::{
    Configuring, Generator, GeneratorError, ObserverError, Pipeline, PipelineError,
    PipelineHandle, PipelineSettings, TickOutcome,
};
use xserialone::transport::{Transport, TransportError};
use xserialone::wire;

#[derive(Clone, Default)]
struct RecordingTransport {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingTransport {
    fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(bytes.len())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

struct FailingTransport;

impl Transport for FailingTransport {
    fn write(&mut self, _bytes: &[u8]) -> Result<usize, TransportError> {
        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write timed out",
        )))
    }

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        true
    }
}

/// Replays a script of samples, then reports an error for every call
struct Scripted {
    samples: VecDeque<Result<RawSample, GeneratorError>>,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    fn new(samples: Vec<Result<RawSample, GeneratorError>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = Self {
            samples: samples.into(),
            calls: calls.clone(),
        };
        (generator, calls)
    }

    fn repeating(frame: Frame) -> Self {
        Self::new((0..64).map(|_| Ok(frame.into())).collect()).0
    }
}

impl Generator for Scripted {
    fn generate(&mut self) -> Result<RawSample, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.samples
            .pop_front()
            .unwrap_or_else(|| Err(GeneratorError::ReadError("script exhausted".into())))
    }
}

/// Panics on every `period`-th call, returns a neutral frame otherwise
struct Unstable {
    period: usize,
    calls: usize,
}

impl Generator for Unstable {
    fn generate(&mut self) -> Result<RawSample, GeneratorError> {
        self.calls += 1;
        if self.calls % self.period == 0 {
            panic!("driver bug on call {}", self.calls);
        }
        Ok(Frame::neutral().into())
    }
}

fn settings(send_interval: Duration) -> PipelineSettings {
    PipelineSettings {
        send_interval,
        ..PipelineSettings::default()
    }
}

fn recorder(
    pipeline: &mut Pipeline<Configuring>,
) -> (Arc<Mutex<Vec<Frame>>>, Arc<Mutex<Vec<Frame>>>) {
    let generated = Arc::new(Mutex::new(Vec::new()));
    let transformed = Arc::new(Mutex::new(Vec::new()));
    let g = generated.clone();
    let t = transformed.clone();
    pipeline
        .on_generate(move |frame| {
            g.lock().unwrap().push(*frame);
            Ok(())
        })
        .on_transform(move |frame| {
            t.lock().unwrap().push(*frame);
            Ok(())
        });
    (generated, transformed)
}

#[test]
fn no_generators_is_idle() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline.set_transport(Box::new(transport.clone()));
    let (generated, transformed) = recorder(&mut pipeline);

    let mut running = pipeline.start();
    assert_eq!(running.tick().unwrap(), TickOutcome::Idle);

    assert!(transport.writes().is_empty());
    assert!(generated.lock().unwrap().is_empty());
    assert!(transformed.lock().unwrap().is_empty());
    assert_eq!(running.stats().idle_ticks, 1);
}

#[test]
fn modifiers_fold_in_registration_order() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .add_modifier(Box::new(|frame: &Frame| frame.with_button(Button::A, true)))
        .add_modifier(Box::new(|frame: &Frame| {
            if frame.button(Button::A) {
                frame.with_axis(Axis::LeftStickX, 1.0)
            } else {
                *frame
            }
        }))
        .set_transport(Box::new(transport.clone()));
    let (generated, transformed) = recorder(&mut pipeline);

    let mut running = pipeline.start();
    let outcome = running.tick().unwrap();
    assert!(outcome.transmitted());

    let expected = Frame::neutral()
        .with_button(Button::A, true)
        .with_axis(Axis::LeftStickX, 1.0);
    assert_eq!(outcome.frame(), Some(expected));
    assert_eq!(generated.lock().unwrap().as_slice(), &[Frame::neutral()]);
    assert_eq!(transformed.lock().unwrap().as_slice(), &[expected]);

    let writes = transport.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].len(), wire::PACKET_LEN);
    assert_eq!(writes[0], wire::encode(&expected).to_vec());
}

#[test]
fn rate_gate_limits_writes_not_observers() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(settings(Duration::from_secs(1)));
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .set_transport(Box::new(transport.clone()));
    let (generated, transformed) = recorder(&mut pipeline);

    let mut running = pipeline.start();
    assert!(running.tick().unwrap().transmitted());
    assert_eq!(
        running.tick().unwrap(),
        TickOutcome::Observed(Frame::neutral())
    );

    assert_eq!(transport.writes().len(), 1);
    assert_eq!(generated.lock().unwrap().len(), 2);
    assert_eq!(transformed.lock().unwrap().len(), 2);
    assert_eq!(running.stats().gated_ticks, 1);
}

#[test]
fn zero_interval_sends_every_tick() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(settings(Duration::ZERO));
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .set_transport(Box::new(transport.clone()));

    let mut running = pipeline.start();
    for _ in 0..3 {
        assert!(running.tick().unwrap().transmitted());
    }
    assert_eq!(transport.writes().len(), 3);
}

#[test]
fn first_generator_wins() {
    let pressed = Frame::new([true; 10], [1.0; 6], Dpad::UP_RIGHT);
    let (second, second_calls) = Scripted::new(vec![Ok(pressed.into())]);

    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .add_generator(Box::new(second));

    let mut running = pipeline.start();
    let outcome = running.tick().unwrap();
    assert_eq!(outcome, TickOutcome::Observed(Frame::neutral()));
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn generator_error_skips_the_tick() {
    let transport = RecordingTransport::default();
    let (generator, calls) = Scripted::new(vec![
        Err(GeneratorError::ReadError("unplugged".into())),
        Ok(Frame::neutral().into()),
    ]);
    let mut pipeline = Pipeline::create(settings(Duration::ZERO));
    pipeline
        .add_generator(Box::new(generator))
        .set_transport(Box::new(transport.clone()));
    let (generated, _) = recorder(&mut pipeline);

    let mut running = pipeline.start();
    assert_eq!(running.tick().unwrap(), TickOutcome::Idle);
    assert!(running.tick().unwrap().transmitted());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(generated.lock().unwrap().len(), 1);
    assert_eq!(transport.writes().len(), 1);
    let stats = running.stats();
    assert_eq!(stats.generator_faults, 1);
    assert_eq!(stats.idle_ticks, 1);
}

#[test]
fn plain_samples_are_normalized() {
    let raw = json!({
        "buttons": [1, 0, "yes", null],
        "axes": [2.5, "-0.5", "x"],
        "dpad": [3, -7],
    });
    let (generator, _) = Scripted::new(vec![Ok(raw.into())]);
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline.add_generator(Box::new(generator));
    let (generated, _) = recorder(&mut pipeline);

    let mut running = pipeline.start();
    let frame = running.tick().unwrap().frame().unwrap();

    assert_eq!(
        frame.buttons(),
        &[true, false, true, false, false, false, false, false, false, false]
    );
    assert_eq!(frame.axes(), &[1.0, -0.5, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(frame.dpad(), (1, -1));
    assert_eq!(generated.lock().unwrap().as_slice(), &[frame]);
}

#[test]
fn failing_observer_does_not_stop_the_chain() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .on_generate(|_| Err(ObserverError::Failed("display gone".into())))
        .add_modifier(Box::new(|frame: &Frame| frame.with_dpad(0, -1)))
        .set_transport(Box::new(transport.clone()));
    let (_, transformed) = recorder(&mut pipeline);

    let mut running = pipeline.start();
    let outcome = running.tick().unwrap();

    assert!(outcome.transmitted());
    assert_eq!(transformed.lock().unwrap()[0].dpad(), Dpad::DOWN);
    assert_eq!(running.stats().observer_faults, 1);
}

#[test]
fn transport_failure_is_reported() {
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .set_transport(Box::new(FailingTransport));

    let mut running = pipeline.start();
    let err = running.tick().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::TransportError(TransportError::Io(_))
    ));
    assert_eq!(running.stats().transmits, 0);
}

#[test]
fn transmitted_bytes_decode_to_the_frame() {
    let transport = RecordingTransport::default();
    let frame = Frame::new(
        [true, false, false, true, false, true, false, false, true, false],
        [0.5, -0.25, 1.0, -1.0, 0.0, 0.75],
        Dpad::DOWN_LEFT,
    );
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline
        .add_generator(Box::new(Scripted::repeating(frame)))
        .set_transport(Box::new(transport.clone()));

    let mut running = pipeline.start();
    running.tick().unwrap();

    let writes = transport.writes();
    assert_eq!(writes[0][0], wire::HEADER);
    assert_eq!(wire::decode(&writes[0]).unwrap(), frame);
}

#[test]
fn stop_closes_the_transport() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline.set_transport(Box::new(transport.clone()));

    let mut stopped = pipeline.start().stop();
    assert!(!transport.is_open());
    stopped.close();
    assert!(!transport.is_open());
}

#[tokio::test]
async fn cancelled_run_closes_the_transport() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(settings(Duration::ZERO));
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .set_transport(Box::new(transport.clone()));

    let mut handle = PipelineHandle::spawn(pipeline.start());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stats = handle.shutdown().await.unwrap();

    assert!(!transport.is_open());
    assert!(stats.ticks > 0);
    assert_eq!(stats.transmits as usize, transport.writes().len());
}

#[tokio::test]
async fn fatal_transport_error_ends_the_run() {
    let mut pipeline = Pipeline::create(PipelineSettings::default());
    pipeline
        .add_generator(Box::new(Scripted::repeating(Frame::neutral())))
        .set_transport(Box::new(FailingTransport));

    let mut handle = PipelineHandle::spawn(pipeline.start());
    let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap();
    assert!(matches!(result, Err(PipelineError::TransportError(_))));
}

#[test]
fn generator_panic_skips_the_tick() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(settings(Duration::ZERO));
    pipeline
        .add_generator(Box::new(Unstable { period: 2, calls: 0 }))
        .set_transport(Box::new(transport.clone()));
    let (generated, _) = recorder(&mut pipeline);

    let mut running = pipeline.start();
    assert!(running.tick().unwrap().transmitted());
    assert_eq!(running.tick().unwrap(), TickOutcome::Idle);
    assert!(running.tick().unwrap().transmitted());

    let stats = running.stats();
    assert_eq!(stats.generator_faults, 1);
    assert_eq!(stats.idle_ticks, 1);
    assert_eq!(generated.lock().unwrap().len(), 2);
    assert_eq!(transport.writes().len(), 2);
}

#[tokio::test]
async fn generator_panics_do_not_end_the_run() {
    let transport = RecordingTransport::default();
    let mut pipeline = Pipeline::create(settings(Duration::ZERO));
    pipeline
        .add_generator(Box::new(Unstable { period: 2, calls: 0 }))
        .set_transport(Box::new(transport.clone()));

    let mut handle = PipelineHandle::spawn(pipeline.start());
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = handle.shutdown().await.unwrap();

    assert!(stats.generator_faults > 0);
    assert!(stats.transmits > 0);
    assert!(!transport.is_open());
}
