use handex_core::{
    two_hands_visible, FeedbackState, Prediction, TrialOutcome, TrialRecord, TrialState,
};
use handex_timing::Timer;
use handex_vision::{Detector, DetectorLoader, Recorder, VideoSource};
use tiny_skia::{Color, Pixmap};
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::config::{TrialConfig, TrialVariant};
use crate::registry::CompletionCallback;

#[derive(Debug, Clone, PartialEq)]
pub enum TrialEvent {
    ModelLoaded,
    CameraStarted,
    FrameProcessed { two_hands: bool },
    StopRequested,
    Faulted(String),
}

/// Runs exactly one trial from start to finish, coordinating the model,
/// video, recorder, and feedback lifecycles, and reporting back to the
/// host exactly once.
pub struct TrialController<L, V, R, T>
where
    L: DetectorLoader,
    V: VideoSource,
    R: Recorder,
    T: Timer,
{
    pub config: TrialConfig,
    pub timer: T,
    loader: L,
    detector: Option<L::Detector>,
    video: V,
    recorder: Option<R>,
    state: TrialState,
    feedback: FeedbackState,
    canvas: Option<Pixmap>,
    started_at: T::Timestamp,
    frames_polled: u64,
    consecutive_failures: u32,
    cancel: CancellationToken,
    completion: Option<CompletionCallback>,
    recording: bool,
    video_hidden: bool,
}

impl<L, V, R, T> TrialController<L, V, R, T>
where
    L: DetectorLoader,
    V: VideoSource,
    R: Recorder,
    T: Timer,
{
    pub fn new(
        config: TrialConfig,
        loader: L,
        video: V,
        recorder: Option<R>,
        timer: T,
        completion: CompletionCallback,
    ) -> Self {
        let started_at = timer.now();
        info!(trial = %config.trial, variant = ?config.variant, "trial started");
        Self {
            config,
            timer,
            loader,
            detector: None,
            video,
            recorder,
            state: TrialState::LoadingModel,
            feedback: FeedbackState::Loading,
            canvas: None,
            started_at,
            frames_polled: 0,
            consecutive_failures: 0,
            cancel: CancellationToken::new(),
            completion: Some(completion),
            recording: false,
            video_hidden: false,
        }
    }

    pub fn state(&self) -> &TrialState {
        &self.state
    }

    pub fn feedback(&self) -> &FeedbackState {
        &self.feedback
    }

    pub fn canvas(&self) -> Option<&Pixmap> {
        self.canvas.as_ref()
    }

    pub fn frames_polled(&self) -> u64 {
        self.frames_polled
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn video_hidden(&self) -> bool {
        self.video_hidden
    }

    /// Shared stop flag; the UI's stop/end button cancels through this.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// True once a stop has been observed and teardown is due.
    pub fn stop_pending(&self) -> bool {
        self.cancel.is_cancelled() && self.state != TrialState::Complete
    }

    /// Performs at most one unit of work for the current state: a model
    /// load attempt, a camera start attempt, or one detection poll. The
    /// cancellation flag is checked before any provider call.
    pub fn update(&mut self) -> Vec<TrialEvent> {
        let mut events = Vec::new();

        if self.cancel.is_cancelled() {
            if self.state != TrialState::Complete {
                events.push(TrialEvent::StopRequested);
            }
            return events;
        }

        match self.state {
            TrialState::LoadingModel => match self.loader.load() {
                Ok(detector) => {
                    self.detector = Some(detector);
                    events.push(TrialEvent::ModelLoaded);
                }
                Err(e) => events.push(TrialEvent::Faulted(e.to_string())),
            },
            TrialState::AcquiringCamera => match self.video.start() {
                Ok(true) => events.push(TrialEvent::CameraStarted),
                Ok(false) => {
                    events.push(TrialEvent::Faulted("camera refused to start".into()))
                }
                Err(e) => events.push(TrialEvent::Faulted(e.to_string())),
            },
            TrialState::Detecting => self.poll_frame(&mut events),
            TrialState::Faulted | TrialState::Complete => {}
        }

        events
    }

    pub fn handle_event(&mut self, event: TrialEvent) -> bool {
        match (&self.state, &event) {
            (TrialState::LoadingModel, TrialEvent::ModelLoaded) => {
                self.state = TrialState::AcquiringCamera;
                self.feedback = FeedbackState::Acquiring;
                info!(trial = %self.config.trial, "model loaded");
                true
            }
            (TrialState::AcquiringCamera, TrialEvent::CameraStarted) => {
                self.state = TrialState::Detecting;
                info!(trial = %self.config.trial, "camera started");
                true
            }
            (_, TrialEvent::Faulted(message)) => {
                warn!(trial = %self.config.trial, %message, "trial faulted");
                self.state = TrialState::Faulted;
                self.feedback = FeedbackState::Faulted(message.clone());
                true
            }
            (_, TrialEvent::StopRequested) => {
                self.cancel.cancel();
                true
            }
            (TrialState::Detecting, TrialEvent::FrameProcessed { .. }) => true,
            _ => false,
        }
    }

    /// One poll-loop iteration: pull frame, detect, validate, derive the
    /// two-hands feedback, delegate overlay drawing to the detector.
    /// Strictly sequential; the host schedules the next iteration on the
    /// next display frame.
    fn poll_frame(&mut self, events: &mut Vec<TrialEvent>) {
        let Some(detector) = self.detector.as_mut() else {
            events.push(TrialEvent::Faulted("no model handle".into()));
            return;
        };

        let frame = match self.video.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                Self::frame_failure(
                    &mut self.consecutive_failures,
                    self.config.max_consecutive_detect_failures,
                    events,
                    &e.to_string(),
                );
                return;
            }
        };

        let raw = match detector.detect(&frame) {
            Ok(raw) => raw,
            Err(e) => {
                Self::frame_failure(
                    &mut self.consecutive_failures,
                    self.config.max_consecutive_detect_failures,
                    events,
                    &e.to_string(),
                );
                return;
            }
        };

        let predictions: Result<Vec<Prediction>, _> =
            raw.into_iter().map(Prediction::try_from).collect();
        let predictions = match predictions {
            Ok(predictions) => predictions,
            Err(e) => {
                Self::frame_failure(
                    &mut self.consecutive_failures,
                    self.config.max_consecutive_detect_failures,
                    events,
                    &e.to_string(),
                );
                return;
            }
        };
        self.consecutive_failures = 0;

        // Raw stream capture, independent of the overlay.
        if self.recording {
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.record_frame(&frame);
            }
        }

        let needs_canvas = self.canvas.as_ref().map(|c| (c.width(), c.height()))
            != Some(frame.size);
        if needs_canvas {
            match Pixmap::new(frame.size.0, frame.size.1) {
                Some(pixmap) => self.canvas = Some(pixmap),
                None => {
                    events.push(TrialEvent::Faulted("zero-sized video frame".into()));
                    return;
                }
            }
        }
        if !self.video_hidden {
            if let Some(canvas) = self.canvas.as_mut() {
                detector.render_predictions(&predictions, &frame, canvas);
            }
        }

        let two_hands = two_hands_visible(&predictions);
        self.feedback = match self.config.variant {
            TrialVariant::StaticImage => FeedbackState::Summary(summarize_labels(&predictions)),
            _ if two_hands => FeedbackState::TwoHands,
            _ => FeedbackState::HandsMissing,
        };
        self.frames_polled += 1;
        events.push(TrialEvent::FrameProcessed { two_hands });

        // Static analysis needs exactly one detection, then finalizes on
        // its own with no user interaction.
        if self.config.variant == TrialVariant::StaticImage {
            self.cancel.cancel();
        }
    }

    fn frame_failure(
        consecutive: &mut u32,
        max: u32,
        events: &mut Vec<TrialEvent>,
        message: &str,
    ) {
        *consecutive += 1;
        warn!(%message, failures = *consecutive, "detection frame skipped");
        if *consecutive >= max {
            events.push(TrialEvent::Faulted(format!(
                "{message} ({consecutive} consecutive detection failures)",
                consecutive = *consecutive
            )));
        }
    }

    /// Idle/recording toggle, guarded the way the UI affordance is:
    /// starting while recording is ignored.
    pub fn start_recording(&mut self) -> bool {
        if self.recording {
            return false;
        }
        let Some(recorder) = self.recorder.as_mut() else {
            return false;
        };
        match recorder.start_recording() {
            Ok(()) => {
                self.recording = true;
                true
            }
            Err(e) => {
                warn!(error = %e, "recorder failed to start");
                false
            }
        }
    }

    /// Finalizes the capture and hands back the blob for saving, then
    /// releases the recorder's buffers. Ignored while idle.
    pub fn stop_recording(&mut self) -> Option<Vec<u8>> {
        if !self.recording {
            return None;
        }
        self.recording = false;
        let recorder = self.recorder.as_mut()?;
        match recorder.stop_recording() {
            Ok(()) => {
                let blob = recorder.blob().map(|b| b.to_vec());
                recorder.destroy();
                blob
            }
            Err(e) => {
                warn!(error = %e, "recorder failed to finalize");
                recorder.destroy();
                None
            }
        }
    }

    pub fn toggle_video(&mut self) {
        self.video_hidden = !self.video_hidden;
        if self.video_hidden {
            if let Some(canvas) = self.canvas.as_mut() {
                canvas.fill(Color::from_rgba8(0, 0, 0, 255));
            }
        }
    }

    /// Teardown: stop the stream, dispose the model, destroy the recorder,
    /// then report the finalized record to the host exactly once. Further
    /// calls do nothing and return `None`.
    pub fn finish(&mut self) -> Option<TrialRecord> {
        if self.state == TrialState::Complete {
            return None;
        }

        self.cancel.cancel();
        self.video.stop();
        if let Some(detector) = self.detector.as_mut() {
            detector.dispose();
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.destroy();
        }
        self.recording = false;

        let outcome = if self.state == TrialState::Faulted {
            TrialOutcome::Faulted
        } else {
            TrialOutcome::Completed
        };
        self.state = TrialState::Complete;

        let record = TrialRecord {
            trial: self.config.trial.clone(),
            trial_duration_ms: self.timer.elapsed(self.started_at).as_millis() as u64,
            frames_polled: self.frames_polled,
            outcome,
        };
        info!(
            trial = %record.trial,
            duration_ms = record.trial_duration_ms,
            frames = record.frames_polled,
            "trial finished"
        );

        if let Some(completion) = self.completion.take() {
            completion(record.clone());
        }
        Some(record)
    }
}

/// Textual summary of every detected label, for the static-image variant.
pub fn summarize_labels(predictions: &[Prediction]) -> String {
    if predictions.is_empty() {
        return "no detections".to_string();
    }
    let labels: Vec<&str> = predictions.iter().map(|p| p.class.label()).collect();
    labels.join(", ")
}

/// Object seam the host drives frame by frame, independent of the concrete
/// provider types behind the controller.
pub trait RunningTrial {
    fn update(&mut self) -> Vec<TrialEvent>;
    fn handle_event(&mut self, event: TrialEvent) -> bool;
    fn state(&self) -> &TrialState;
    fn feedback(&self) -> &FeedbackState;
    fn canvas(&self) -> Option<&Pixmap>;
    fn frames_polled(&self) -> u64;
    fn is_recording(&self) -> bool;
    fn video_hidden(&self) -> bool;
    fn request_stop(&self);
    fn stop_pending(&self) -> bool;
    fn start_recording(&mut self) -> bool;
    fn stop_recording(&mut self) -> Option<Vec<u8>>;
    fn toggle_video(&mut self);
    fn finish(&mut self) -> Option<TrialRecord>;
}

impl std::fmt::Debug for dyn RunningTrial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn RunningTrial").finish_non_exhaustive()
    }
}

impl<L, V, R, T> RunningTrial for TrialController<L, V, R, T>
where
    L: DetectorLoader,
    V: VideoSource,
    R: Recorder,
    T: Timer,
{
    fn update(&mut self) -> Vec<TrialEvent> {
        TrialController::update(self)
    }
    fn handle_event(&mut self, event: TrialEvent) -> bool {
        TrialController::handle_event(self, event)
    }
    fn state(&self) -> &TrialState {
        TrialController::state(self)
    }
    fn feedback(&self) -> &FeedbackState {
        TrialController::feedback(self)
    }
    fn canvas(&self) -> Option<&Pixmap> {
        TrialController::canvas(self)
    }
    fn frames_polled(&self) -> u64 {
        TrialController::frames_polled(self)
    }
    fn is_recording(&self) -> bool {
        TrialController::is_recording(self)
    }
    fn video_hidden(&self) -> bool {
        TrialController::video_hidden(self)
    }
    fn request_stop(&self) {
        TrialController::request_stop(self)
    }
    fn stop_pending(&self) -> bool {
        TrialController::stop_pending(self)
    }
    fn start_recording(&mut self) -> bool {
        TrialController::start_recording(self)
    }
    fn stop_recording(&mut self) -> Option<Vec<u8>> {
        TrialController::stop_recording(self)
    }
    fn toggle_video(&mut self) {
        TrialController::toggle_video(self)
    }
    fn finish(&mut self) -> Option<TrialRecord> {
        TrialController::finish(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handex_core::RawPrediction;
    use handex_timing::CadenceStats;
    use handex_vision::{Frame, VisionError};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone)]
    struct ManualTimer {
        now_ns: Arc<AtomicU64>,
    }

    impl ManualTimer {
        fn new() -> Self {
            Self {
                now_ns: Arc::new(AtomicU64::new(0)),
            }
        }
        fn advance_ms(&self, ms: u64) {
            self.now_ns.fetch_add(ms * 1_000_000, Ordering::SeqCst);
        }
    }

    impl Timer for ManualTimer {
        type Timestamp = u64;
        fn now(&self) -> u64 {
            self.now_ns.load(Ordering::SeqCst)
        }
        fn elapsed(&self, ts: u64) -> Duration {
            Duration::from_nanos(self.now().saturating_sub(ts))
        }
        fn record_frame(&mut self, _d: Duration) {}
        fn cadence_stats(&self) -> CadenceStats {
            CadenceStats {
                average_frame_time_ns: 0.0,
                jitter_ns: 0.0,
                min_frame_time_ns: 0.0,
                max_frame_time_ns: 0.0,
                effective_fps: 0.0,
            }
        }
    }

    struct ScriptedDetector {
        script: VecDeque<Result<Vec<RawPrediction>, String>>,
        fallback: Vec<RawPrediction>,
        calls: Arc<AtomicUsize>,
        disposed: Arc<AtomicUsize>,
    }

    impl Detector for ScriptedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawPrediction>, VisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(Ok(preds)) => Ok(preds),
                Some(Err(msg)) => Err(VisionError::Detection(msg)),
                None => Ok(self.fallback.clone()),
            }
        }
        fn dispose(&mut self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedLoader {
        detector: Option<ScriptedDetector>,
        fail: Option<String>,
    }

    impl ScriptedLoader {
        fn ok(detector: ScriptedDetector) -> Self {
            Self {
                detector: Some(detector),
                fail: None,
            }
        }
        fn failing(msg: &str) -> Self {
            Self {
                detector: None,
                fail: Some(msg.to_string()),
            }
        }
    }

    impl DetectorLoader for ScriptedLoader {
        type Detector = ScriptedDetector;
        fn load(&mut self) -> Result<ScriptedDetector, VisionError> {
            if let Some(msg) = &self.fail {
                return Err(VisionError::ModelLoad(msg.clone()));
            }
            Ok(self.detector.take().expect("loader polled twice"))
        }
    }

    struct FakeCamera {
        started: bool,
        refuse: bool,
        frames_served: u64,
    }

    impl FakeCamera {
        fn new() -> Self {
            Self {
                started: false,
                refuse: false,
                frames_served: 0,
            }
        }
        fn refusing() -> Self {
            Self {
                started: false,
                refuse: true,
                frames_served: 0,
            }
        }
    }

    impl VideoSource for FakeCamera {
        fn start(&mut self) -> Result<bool, VisionError> {
            if self.refuse {
                return Ok(false);
            }
            self.started = true;
            Ok(true)
        }
        fn next_frame(&mut self) -> Result<Frame, VisionError> {
            if !self.started {
                return Err(VisionError::Camera("not started".into()));
            }
            let id = self.frames_served;
            self.frames_served += 1;
            Ok(Frame::new(id, id as f64 / 60.0, vec![8u8; 4 * 4 * 4], (4, 4)))
        }
        fn stop(&mut self) {
            self.started = false;
        }
    }

    #[derive(Default)]
    struct MemoryRecorder {
        recording: bool,
        frames: usize,
        blob: Option<Vec<u8>>,
    }

    impl Recorder for MemoryRecorder {
        fn start_recording(&mut self) -> Result<(), VisionError> {
            self.recording = true;
            self.frames = 0;
            self.blob = None;
            Ok(())
        }
        fn record_frame(&mut self, _frame: &Frame) {
            if self.recording {
                self.frames += 1;
            }
        }
        fn stop_recording(&mut self) -> Result<(), VisionError> {
            self.recording = false;
            if self.frames == 0 {
                return Err(VisionError::Recorder("no frames captured".into()));
            }
            self.blob = Some(vec![0xCA; self.frames]);
            Ok(())
        }
        fn blob(&self) -> Option<&[u8]> {
            self.blob.as_deref()
        }
        fn destroy(&mut self) {
            self.blob = None;
            self.recording = false;
        }
    }

    fn raw(class: u32) -> RawPrediction {
        RawPrediction {
            class,
            score: 0.8,
            region: None,
        }
    }

    struct Harness {
        controller: TrialController<ScriptedLoader, FakeCamera, MemoryRecorder, ManualTimer>,
        timer: ManualTimer,
        detect_calls: Arc<AtomicUsize>,
        completions: Arc<AtomicUsize>,
        last_record: Arc<Mutex<Option<TrialRecord>>>,
    }

    fn harness_with(
        config: TrialConfig,
        loader: ScriptedLoader,
        video: FakeCamera,
        recorder: Option<MemoryRecorder>,
        detect_calls: Arc<AtomicUsize>,
    ) -> Harness {
        let timer = ManualTimer::new();
        let completions = Arc::new(AtomicUsize::new(0));
        let last_record: Arc<Mutex<Option<TrialRecord>>> = Arc::new(Mutex::new(None));
        let completion = {
            let completions = Arc::clone(&completions);
            let last_record = Arc::clone(&last_record);
            Box::new(move |record: TrialRecord| {
                completions.fetch_add(1, Ordering::SeqCst);
                *last_record.lock().unwrap() = Some(record);
            })
        };
        let controller =
            TrialController::new(config, loader, video, recorder, timer.clone(), completion);
        Harness {
            controller,
            timer,
            detect_calls,
            completions,
            last_record,
        }
    }

    fn harness(script: Vec<Result<Vec<RawPrediction>, String>>) -> Harness {
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            script: script.into_iter().collect(),
            fallback: vec![raw(1), raw(1), raw(5)],
            calls: Arc::clone(&detect_calls),
            disposed: Arc::new(AtomicUsize::new(0)),
        };
        harness_with(
            TrialConfig::default(),
            ScriptedLoader::ok(detector),
            FakeCamera::new(),
            None,
            detect_calls,
        )
    }

    fn drive(controller: &mut impl RunningTrial) -> Vec<TrialEvent> {
        let events = controller.update();
        for event in events.clone() {
            controller.handle_event(event);
        }
        events
    }

    #[test]
    fn lifecycle_reaches_detection_with_feedback() {
        let mut h = harness(vec![
            Ok(vec![raw(1), raw(5), raw(1)]),
            Ok(vec![raw(1), raw(5)]),
        ]);

        assert_eq!(*h.controller.feedback(), FeedbackState::Loading);
        assert_eq!(drive(&mut h.controller), vec![TrialEvent::ModelLoaded]);
        assert_eq!(*h.controller.feedback(), FeedbackState::Acquiring);
        assert_eq!(drive(&mut h.controller), vec![TrialEvent::CameraStarted]);

        // Two non-sentinel entries: affirmative state.
        drive(&mut h.controller);
        assert_eq!(*h.controller.feedback(), FeedbackState::TwoHands);
        // One non-sentinel entry: negative state.
        drive(&mut h.controller);
        assert_eq!(*h.controller.feedback(), FeedbackState::HandsMissing);
        assert_eq!(h.controller.frames_polled(), 2);
    }

    #[test]
    fn completion_fires_exactly_once_with_duration() {
        let mut h = harness(vec![]);
        drive(&mut h.controller);
        drive(&mut h.controller);
        drive(&mut h.controller);

        h.timer.advance_ms(1500);
        h.controller.request_stop();
        let record = h.controller.finish().unwrap();
        assert_eq!(record.trial_duration_ms, 1500);
        assert_eq!(record.outcome, TrialOutcome::Completed);
        assert_eq!(h.completions.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.last_record.lock().unwrap().as_ref().unwrap().trial,
            "trial-0"
        );

        // Finalization happens once; later calls are inert.
        assert!(h.controller.finish().is_none());
        assert_eq!(h.completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_detection_after_stop_signal() {
        let mut h = harness(vec![]);
        drive(&mut h.controller);
        drive(&mut h.controller);
        drive(&mut h.controller);
        let calls_before = h.detect_calls.load(Ordering::SeqCst);
        assert_eq!(calls_before, 1);

        h.controller.request_stop();
        for _ in 0..5 {
            let events = h.controller.update();
            assert_eq!(events, vec![TrialEvent::StopRequested]);
        }
        h.controller.finish();
        h.controller.update();
        assert_eq!(h.detect_calls.load(Ordering::SeqCst), calls_before);
    }

    #[test]
    fn model_load_failure_surfaces_and_still_reports() {
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let mut h = harness_with(
            TrialConfig::default(),
            ScriptedLoader::failing("weights missing"),
            FakeCamera::new(),
            None,
            detect_calls,
        );

        let events = drive(&mut h.controller);
        assert!(matches!(events[0], TrialEvent::Faulted(_)));
        assert_eq!(*h.controller.state(), TrialState::Faulted);
        assert!(matches!(
            h.controller.feedback(),
            FeedbackState::Faulted(msg) if msg.contains("weights missing")
        ));

        let record = h.controller.finish().unwrap();
        assert_eq!(record.outcome, TrialOutcome::Faulted);
        assert_eq!(h.completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn camera_refusal_faults_the_trial() {
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            script: VecDeque::new(),
            fallback: vec![],
            calls: Arc::clone(&detect_calls),
            disposed: Arc::new(AtomicUsize::new(0)),
        };
        let mut h = harness_with(
            TrialConfig::default(),
            ScriptedLoader::ok(detector),
            FakeCamera::refusing(),
            None,
            detect_calls,
        );

        drive(&mut h.controller);
        let events = drive(&mut h.controller);
        assert!(matches!(events[0], TrialEvent::Faulted(_)));
        assert_eq!(*h.controller.state(), TrialState::Faulted);
        assert_eq!(h.detect_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn isolated_detection_failures_skip_frames() {
        let mut config = TrialConfig::default();
        config.max_consecutive_detect_failures = 3;
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            script: VecDeque::from([
                Err("transient".to_string()),
                Err("transient".to_string()),
                Ok(vec![raw(1), raw(1)]),
            ]),
            fallback: vec![raw(1), raw(1)],
            calls: Arc::clone(&detect_calls),
            disposed: Arc::new(AtomicUsize::new(0)),
        };
        let mut h = harness_with(
            config,
            ScriptedLoader::ok(detector),
            FakeCamera::new(),
            None,
            detect_calls,
        );

        drive(&mut h.controller);
        drive(&mut h.controller);
        // Two transient failures: frames skipped, trial still running.
        drive(&mut h.controller);
        drive(&mut h.controller);
        assert_eq!(*h.controller.state(), TrialState::Detecting);
        assert_eq!(h.controller.frames_polled(), 0);
        // Recovery resets the failure streak.
        drive(&mut h.controller);
        assert_eq!(*h.controller.feedback(), FeedbackState::TwoHands);
        assert_eq!(h.controller.frames_polled(), 1);
    }

    #[test]
    fn sustained_detection_failures_fault() {
        let mut config = TrialConfig::default();
        config.max_consecutive_detect_failures = 2;
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            script: VecDeque::from([
                Err("broken".to_string()),
                Err("broken".to_string()),
            ]),
            fallback: vec![],
            calls: Arc::clone(&detect_calls),
            disposed: Arc::new(AtomicUsize::new(0)),
        };
        let mut h = harness_with(
            config,
            ScriptedLoader::ok(detector),
            FakeCamera::new(),
            None,
            detect_calls,
        );

        drive(&mut h.controller);
        drive(&mut h.controller);
        drive(&mut h.controller);
        let events = drive(&mut h.controller);
        assert!(matches!(events[0], TrialEvent::Faulted(_)));
        assert_eq!(*h.controller.state(), TrialState::Faulted);
    }

    #[test]
    fn invalid_predictions_count_as_frame_failures() {
        let mut config = TrialConfig::default();
        config.max_consecutive_detect_failures = 1;
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            script: VecDeque::from([Ok(vec![raw(99)])]),
            fallback: vec![],
            calls: Arc::clone(&detect_calls),
            disposed: Arc::new(AtomicUsize::new(0)),
        };
        let mut h = harness_with(
            config,
            ScriptedLoader::ok(detector),
            FakeCamera::new(),
            None,
            detect_calls,
        );

        drive(&mut h.controller);
        drive(&mut h.controller);
        let events = drive(&mut h.controller);
        assert!(matches!(events[0], TrialEvent::Faulted(_)));
    }

    #[test]
    fn recording_toggle_respects_affordance_guard() {
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            script: VecDeque::new(),
            fallback: vec![raw(1), raw(1)],
            calls: Arc::clone(&detect_calls),
            disposed: Arc::new(AtomicUsize::new(0)),
        };
        let mut config = TrialConfig::default();
        config.variant = TrialVariant::Recording;
        let mut h = harness_with(
            config,
            ScriptedLoader::ok(detector),
            FakeCamera::new(),
            Some(MemoryRecorder::default()),
            detect_calls,
        );

        drive(&mut h.controller);
        drive(&mut h.controller);

        // Stop while idle is a no-op.
        assert!(h.controller.stop_recording().is_none());

        assert!(h.controller.start_recording());
        // Double-start ignored.
        assert!(!h.controller.start_recording());

        drive(&mut h.controller);
        drive(&mut h.controller);
        assert!(h.controller.is_recording());

        let blob = h.controller.stop_recording().unwrap();
        assert_eq!(blob.len(), 2);
        assert!(!h.controller.is_recording());
        assert!(h.controller.stop_recording().is_none());
    }

    #[test]
    fn static_variant_detects_once_and_finalizes_itself() {
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let detector = ScriptedDetector {
            script: VecDeque::new(),
            fallback: vec![raw(1), raw(5), raw(4)],
            calls: Arc::clone(&detect_calls),
            disposed: Arc::new(AtomicUsize::new(0)),
        };
        let mut config = TrialConfig::default();
        config.variant = TrialVariant::StaticImage;
        let mut h = harness_with(
            config,
            ScriptedLoader::ok(detector),
            FakeCamera::new(),
            None,
            detect_calls,
        );

        drive(&mut h.controller);
        drive(&mut h.controller);
        drive(&mut h.controller);
        assert!(matches!(
            h.controller.feedback(),
            FeedbackState::Summary(s) if s == "open, face, point"
        ));
        assert!(h.controller.stop_pending());

        // No further detection once finalization is pending.
        h.controller.update();
        h.controller.update();
        assert_eq!(h.detect_calls.load(Ordering::SeqCst), 1);

        let record = h.controller.finish().unwrap();
        assert_eq!(record.frames_polled, 1);
        assert_eq!(h.completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn summarize_labels_handles_empty_input() {
        assert_eq!(summarize_labels(&[]), "no detections");
    }
}
