use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::content::{compile_element_catalog, ContentCompileError};
use crate::world::{FarmWorld, GridError, Viewport, WorldConfig};
use crate::{resolve_app_paths, StartupError};

use super::input::InputCollector;
use super::metrics::MetricsAccumulator;
use super::scene::SceneRuntime;
use super::{HudLine, LoopMetricsSnapshot, MetricsHandle, Renderer, Scene, SceneCommand};

pub const SLOW_FRAME_ENV_VAR: &str = "FARMSIM_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
    pub world: WorldConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Farm".to_string(),
            window_width: 1056,
            window_height: 704,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
            world: WorldConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("failed to compile element content: {0}")]
    Content(#[from] ContentCompileError),
    #[error("failed to generate world: {0}")]
    World(#[from] GridError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, scene: Box<dyn Scene>) -> Result<(), AppError> {
    run_app_with_metrics(config, scene, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        cache_dir = %app_paths.cache_dir.display(),
        "startup"
    );
    let catalog = Arc::new(compile_element_catalog(&app_paths)?);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), app_paths.sprite_dir.clone())
        .map_err(AppError::CreateRenderer)?;

    let size = window.inner_size();
    let world = FarmWorld::generate(
        config.world.clone(),
        catalog,
        Viewport::new(size.width, size.height),
    )?;
    let mut runtime = SceneRuntime::new(scene, world);

    event_loop.set_control_flow(ControlFlow::Poll);

    let tps = config.target_tps.max(1);
    let frame_delta_cap =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let tick_cap = config.max_ticks_per_frame.max(1);
    let report_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let step = Duration::from_secs_f64(1.0 / f64::from(tps));
    let step_seconds = step.as_secs_f32();
    let injected_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let render_cap = normalize_render_fps_cap(config.max_render_fps);
    let present_interval = target_frame_duration(render_cap);
    let mut input = InputCollector::new(size.width, size.height);
    runtime.load();

    info!(
        target_tps = tps,
        max_frame_delta_ms = frame_delta_cap.as_millis() as u64,
        max_ticks_per_frame = tick_cap,
        metrics_interval_ms = report_interval.as_millis() as u64,
        injected_delay_ms = injected_delay.as_millis() as u64,
        render_cap = %format_render_cap(render_cap),
        "loop_config"
    );

    let mut owed = Duration::ZERO;
    let mut frame_started = Instant::now();
    let mut presented_at = Instant::now();
    let mut metrics = MetricsAccumulator::new(report_interval);
    let mut shown_title: Option<String> = None;
    let mut hud_visible = true;

    event_loop
        .run(move |event, target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    target.exit();
                }
                WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                    let inner = window.inner_size();
                    input.set_window_size(inner.width, inner.height);
                    runtime
                        .world_mut()
                        .set_viewport(Viewport::new(inner.width, inner.height));
                    if let Err(error) = renderer.resize(inner.width, inner.height) {
                        warn!(error = %error, "surface_resize_failed");
                        target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => input.clear_cursor_position(),
                WindowEvent::MouseInput { state, button, .. } => input.handle_mouse_input(button, state),
                WindowEvent::MouseWheel { delta, .. } => input.handle_mouse_wheel(delta),
                WindowEvent::KeyboardInput { event, .. } => {
                    input.handle_keyboard_input(&event);
                    if input.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if input.take_hud_toggle_pressed() {
                        hud_visible = !hud_visible;
                        info!(hud_visible, "hud_toggled");
                    }
                    if !injected_delay.is_zero() {
                        thread::sleep(injected_delay);
                    }

                    let now = Instant::now();
                    let elapsed = now.saturating_duration_since(frame_started);
                    frame_started = now;
                    owed = owed.saturating_add(clamp_frame_delta(elapsed, frame_delta_cap));

                    let plan = plan_sim_steps(owed, step, tick_cap);
                    for _ in 0..plan.ticks_to_run {
                        let snapshot = input.snapshot_for_tick();
                        let command = runtime.update(step_seconds, &snapshot);
                        let advanced = runtime.world_mut().advance(step);
                        if !advanced.is_empty() {
                            debug!(stages_advanced = advanced.len(), "growth_tick");
                        }
                        metrics.record_tick();
                        if command == SceneCommand::Quit {
                            info!(reason = "scene_command", "shutdown_requested");
                            target.exit();
                            break;
                        }
                    }
                    owed = plan.remaining_accumulator;
                    if !plan.dropped_backlog.is_zero() {
                        metrics.record_clamp();
                        warn!(
                            dropped_ms = plan.dropped_backlog.as_millis() as u64,
                            tick_cap,
                            "sim_clamp_triggered"
                        );
                    }

                    let pause = compute_cap_sleep(
                        Instant::now().saturating_duration_since(presented_at),
                        present_interval,
                    );
                    if !pause.is_zero() {
                        thread::sleep(pause);
                    }

                    let hud = hud_visible.then(|| {
                        let mut lines = metrics_hud_lines(&metrics_handle.snapshot());
                        lines.extend(runtime.hud_lines());
                        lines
                    });
                    if let Err(error) = renderer.render(runtime.world(), hud.as_deref()) {
                        warn!(error = %error, "frame_present_failed");
                        target.exit();
                    }
                    presented_at = Instant::now();

                    let title = runtime.debug_title();
                    if title != shown_title {
                        window.set_title(title.as_deref().unwrap_or(&config.window_title));
                        shown_title = title;
                    }
                    metrics.record_frame(elapsed);

                    if let Some(snapshot) = metrics.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            clamped_frames = snapshot.clamped_frames,
                            structures = runtime.world().registry().len(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => {
                runtime.shutdown();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn metrics_hud_lines(metrics: &LoopMetricsSnapshot) -> Vec<HudLine> {
    let mut lines = vec![HudLine::plain(format!(
        "FPS {:.0}  TPS {:.0}  FRAME {:.1}MS",
        metrics.fps, metrics.tps, metrics.frame_time_ms
    ))];
    if metrics.clamped_frames > 0 {
        lines.push(HudLine::alert(format!(
            "SIM CLAMPED {} FRAMES",
            metrics.clamped_frames
        )));
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

/// Runs whole fixed steps up to the cap. Backlog still owed past the cap is
/// dropped rather than carried into the next frame.
fn plan_sim_steps(accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let owed = if fixed_dt.is_zero() {
        0
    } else {
        accumulator.as_nanos() / fixed_dt.as_nanos()
    };
    let ticks_to_run = owed.min(u128::from(max_ticks_per_frame)) as u32;
    let remaining = accumulator.saturating_sub(fixed_dt.saturating_mul(ticks_to_run));
    if remaining >= fixed_dt && !fixed_dt.is_zero() {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: remaining,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: remaining,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|fps| *fps > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    target.map_or(Duration::ZERO, |frame_target| frame_target.saturating_sub(elapsed))
}

fn format_render_cap(cap: Option<u32>) -> String {
    cap.map_or_else(|| "off".to_string(), |fps| fps.to_string())
}

/// Debug-only frame delay; the env var wins over config when it parses.
fn resolve_slow_frame_delay(configured_ms: u64) -> Duration {
    let configured = Duration::from_millis(configured_ms);
    let raw = match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return configured,
        Err(error) => {
            warn!(var = SLOW_FRAME_ENV_VAR, error = %error, "slow_frame_env_unreadable");
            return configured;
        }
    };
    raw.trim().parse::<u64>().map(Duration::from_millis).unwrap_or_else(|_| {
        warn!(var = SLOW_FRAME_ENV_VAR, value = raw.as_str(), "slow_frame_env_invalid");
        configured
    })
}
