//! Host-framework integration: the trial types this binary registers and
//! the providers each one is wired to.

use handex_timing::MonotonicTimer;
use handex_trial::{
    CompletionCallback, PluginInfo, Registry, RunningTrial, TrialConfig, TrialController,
    TrialError, TrialPlugin,
};
use handex_vision::{
    Frame, GifRecorder, LumaDetectorLoader, StillSource, SyntheticCamera, VideoSource,
};

pub const LIVE_TRIAL: &str = "hands-live";
pub const RECORDING_TRIAL: &str = "hands-recording";
pub const STATIC_TRIAL: &str = "hands-static";

pub const FEED_WIDTH: u32 = 640;
pub const FEED_HEIGHT: u32 = 480;

struct LiveTrialPlugin {
    info: PluginInfo,
}

impl TrialPlugin for LiveTrialPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn begin(
        &mut self,
        config: TrialConfig,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn RunningTrial>, TrialError> {
        let controller = TrialController::new(
            config,
            LumaDetectorLoader::default(),
            SyntheticCamera::new(FEED_WIDTH, FEED_HEIGHT),
            None::<GifRecorder>,
            MonotonicTimer::new(),
            on_complete,
        );
        Ok(Box::new(controller))
    }
}

struct RecordingTrialPlugin {
    info: PluginInfo,
}

impl TrialPlugin for RecordingTrialPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn begin(
        &mut self,
        config: TrialConfig,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn RunningTrial>, TrialError> {
        let controller = TrialController::new(
            config,
            LumaDetectorLoader::default(),
            SyntheticCamera::new(FEED_WIDTH, FEED_HEIGHT),
            Some(GifRecorder::new()),
            MonotonicTimer::new(),
            on_complete,
        );
        Ok(Box::new(controller))
    }
}

struct StaticImagePlugin {
    info: PluginInfo,
    frame: Frame,
}

impl TrialPlugin for StaticImagePlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn begin(
        &mut self,
        config: TrialConfig,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn RunningTrial>, TrialError> {
        let controller = TrialController::new(
            config,
            LumaDetectorLoader::default(),
            StillSource::new(self.frame.clone()),
            None::<GifRecorder>,
            MonotonicTimer::new(),
            on_complete,
        );
        Ok(Box::new(controller))
    }
}

/// Fixed analysis image for the static variant when none is supplied: one
/// frame of the synthetic feed.
pub fn test_pattern_frame() -> Frame {
    let mut camera = SyntheticCamera::new(FEED_WIDTH, FEED_HEIGHT);
    camera
        .start()
        .and_then(|_| camera.next_frame())
        .expect("synthetic camera cannot fail to start")
}

pub fn build_registry(static_frame: Frame) -> Registry {
    let mut registry = Registry::new();
    registry.register(Box::new(LiveTrialPlugin {
        info: PluginInfo::new(LIVE_TRIAL),
    }));
    registry.register(Box::new(RecordingTrialPlugin {
        info: PluginInfo::new(RECORDING_TRIAL),
    }));
    registry.register(Box::new(StaticImagePlugin {
        info: PluginInfo::new(STATIC_TRIAL),
        frame: static_frame,
    }));
    registry
}
