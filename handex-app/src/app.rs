use anyhow::Result;
use handex_timing::{MonotonicTimer, Timer};
use handex_trial::{RunningTrial, TrialConfig, TrialVariant};
use handex_vision::{save_blob, Frame};
use handex_render::SkiaRenderer;
use pixels::{Pixels, SurfaceTexture};
use serde_json::to_string_pretty;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::plugins::{
    self, LIVE_TRIAL, RECORDING_TRIAL, STATIC_TRIAL,
};

const CADENCE_LOG_FRAMES: u64 = 300;

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub trial_type: String,
    pub trial_id: String,
    pub image: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            trial_type: LIVE_TRIAL.to_string(),
            trial_id: "trial-0".to_string(),
            image: None,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl AppOptions {
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut options = AppOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--variant" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--variant needs a value"))?;
                    options.trial_type = match value.as_str() {
                        "live" => LIVE_TRIAL.to_string(),
                        "recording" => RECORDING_TRIAL.to_string(),
                        "static" => STATIC_TRIAL.to_string(),
                        other => other.to_string(),
                    };
                }
                "--trial" => {
                    options.trial_id = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--trial needs a value"))?;
                }
                "--image" => {
                    options.image = Some(PathBuf::from(
                        args.next()
                            .ok_or_else(|| anyhow::anyhow!("--image needs a path"))?,
                    ));
                }
                "--out" => {
                    options.output_dir = PathBuf::from(
                        args.next()
                            .ok_or_else(|| anyhow::anyhow!("--out needs a path"))?,
                    );
                }
                other => anyhow::bail!("unknown argument: {other}"),
            }
        }
        Ok(options)
    }

    fn variant(&self) -> TrialVariant {
        match self.trial_type.as_str() {
            RECORDING_TRIAL => TrialVariant::Recording,
            STATIC_TRIAL => TrialVariant::StaticImage,
            _ => TrialVariant::Live,
        }
    }
}

pub struct App {
    options: AppOptions,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    trial: Box<dyn RunningTrial>,
    render_timer: MonotonicTimer,
    frames_rendered: u64,
    current_size: Option<PhysicalSize<u32>>,
    should_exit: bool,
}

impl App {
    pub fn new(options: AppOptions) -> Result<Self> {
        let static_frame = match &options.image {
            Some(path) => Frame::decode(&std::fs::read(path)?)?,
            None => plugins::test_pattern_frame(),
        };
        let mut registry = plugins::build_registry(static_frame);

        std::fs::create_dir_all(&options.output_dir)?;
        let record_path = options
            .output_dir
            .join(format!("{}.json", options.trial_id));
        let on_complete = Box::new(move |record: handex_core::TrialRecord| {
            match to_string_pretty(&record)
                .map_err(anyhow::Error::from)
                .and_then(|json| std::fs::write(&record_path, json).map_err(Into::into))
            {
                Ok(()) => info!(path = %record_path.display(), "trial record written"),
                Err(e) => error!(error = %e, "failed to persist trial record"),
            }
        });

        let config = TrialConfig {
            trial: options.trial_id.clone(),
            variant: options.variant(),
            ..TrialConfig::default()
        };
        let trial = registry.begin_by_name(&options.trial_type, config, on_complete)?;

        Ok(Self {
            options,
            window: None,
            pixels: None,
            renderer: None,
            trial,
            render_timer: MonotonicTimer::new(),
            frames_rendered: 0,
            current_size: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            trial_type = %self.options.trial_type,
            trial = %self.options.trial_id,
            "starting trial host"
        );
        info!("SPACE stops the trial, R toggles recording, H hides the feed, ESC quits");
        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("Handex")
            .with_inner_size(LogicalSize::new(
                plugins::FEED_WIDTH + 160,
                plugins::FEED_HEIGHT + 160,
            ));

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.current_size = Some(physical_size);
        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale = window.scale_factor(),
            "display configured"
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let font = handex_render::load_system_font();
        if font.is_none() {
            warn!("no system font found; status banner disabled");
        }
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            font,
        ));

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// One poll-loop iteration plus the frame render. Scheduling the next
    /// iteration is the trailing `request_redraw`: detection stays
    /// strictly sequential at display cadence.
    fn render_and_update(&mut self) -> Result<()> {
        let events = self.trial.update();
        for event in events {
            self.trial.handle_event(event);
        }

        if self.trial.stop_pending() {
            if let Some(record) = self.trial.finish() {
                info!(
                    duration_ms = record.trial_duration_ms,
                    frames = record.frames_polled,
                    outcome = ?record.outcome,
                    "trial complete"
                );
            }
            self.should_exit = true;
        }

        let pix = self.pixels.as_mut().expect("surface missing");
        let renderer = self.renderer.as_mut().expect("renderer missing");
        renderer.render_frame(
            self.trial.feedback(),
            self.trial.canvas(),
            self.trial.is_recording(),
            pix.frame_mut(),
            &mut self.render_timer,
        )?;
        pix.render()?;

        self.frames_rendered += 1;
        if self.frames_rendered % CADENCE_LOG_FRAMES == 0 {
            let stats = self.render_timer.cadence_stats();
            debug!(
                fps = format!("{:.1}", stats.effective_fps),
                jitter_ms = format!("{:.3}", stats.jitter_ns / 1e6),
                "render cadence"
            );
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
        Ok(())
    }

    fn handle_input(&mut self, key: winit::keyboard::PhysicalKey) {
        use winit::keyboard::{KeyCode, PhysicalKey};
        let PhysicalKey::Code(code) = key else {
            return;
        };
        match code {
            KeyCode::Space => self.trial.request_stop(),
            KeyCode::KeyR => self.toggle_recording(),
            KeyCode::KeyH => self.trial.toggle_video(),
            KeyCode::Escape => self.trial.request_stop(),
            _ => {}
        }
    }

    fn toggle_recording(&mut self) {
        if self.trial.is_recording() {
            match self.trial.stop_recording() {
                Some(blob) => {
                    let path = self
                        .options
                        .output_dir
                        .join(format!("{}.gif", self.options.trial_id));
                    match save_blob(&blob, &path) {
                        Ok(()) => info!(path = %path.display(), "capture offered for download"),
                        Err(e) => error!(error = %e, "failed to save capture"),
                    }
                }
                None => warn!("recording stop produced no capture"),
            }
        } else if !self.trial.start_recording() {
            debug!("recording unavailable for this trial type");
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size.width, new_size.height);
        }
    }

    fn finalize_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.trial.request_stop();
        if self.trial.finish().is_some() {
            info!("trial finalized on window close");
        }
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.finalize_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render_and_update() {
                    error!(error = %e, "render failed");
                    self.finalize_and_exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(event.physical_key);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
