use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use super::*;

pub mod background_star;
pub mod config;
pub mod constellation;
mod error;
pub mod particles;
pub mod renderer;
pub mod scheduler;
pub mod surface;
mod viewport;

pub use background_star::{BackgroundStar, StarColor, Z_MAX};
pub use config::StarfieldConfig;
pub use constellation::Constellation;
pub use error::StarfieldError;
pub use particles::{FrameTime, Particle, ParticleField};
pub use renderer::{render, RenderStyle};
pub use scheduler::{
    FrameCallback, FrameHandle, FrameScheduler, ManualScheduler, ManualViewportObserver,
    ManualVisibilityObserver, Subscription, ViewportObserver, Visibility, VisibilityObserver,
};
pub use surface::{Color, DrawCommand, Glow, RecordingSurface, Surface};
pub use viewport::Viewport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Running,
    Paused,
    Destroyed,
}

/// Host services the engine is wired to at construction.
pub struct HostBindings<'a> {
    pub scheduler: Rc<dyn FrameScheduler>,
    pub viewport: &'a dyn ViewportObserver,
    pub visibility: &'a dyn VisibilityObserver,
    /// Window focus, reported as visible on focus and hidden on blur.
    pub focus: &'a dyn VisibilityObserver,
}

struct Engine<S> {
    state: LifecycleState,
    surface: S,
    field: ParticleField,
    config: StarfieldConfig,
    style: RenderStyle,
    scheduler: Rc<dyn FrameScheduler>,
    pending_frame: Option<FrameHandle>,
    last_timestamp: Option<f64>,
    last_frame: Option<FrameTime>,
    frame_count: u64,
    subscriptions: Vec<Subscription>,
}

impl<S: Surface> Engine<S> {
    /// Sizes the backing store for the current geometry and returns it.
    fn bind_surface(&mut self) -> Viewport {
        let viewport = Viewport::from_surface(&self.surface);
        let (width, height) = viewport.physical_size();
        self.surface.bind(width, height, viewport.dpr);
        viewport
    }

    fn apply_speed_baseline(&mut self) {
        if self.config.speed_multiplier != 1. {
            self.field.scale_drift_speeds(self.config.speed_multiplier);
        }
    }
}

/// The animation engine: owns the particle field and drives it through the
/// `Idle -> Running <-> Paused -> Destroyed` lifecycle.
pub struct Starfield<S: Surface + 'static> {
    engine: Rc<RefCell<Engine<S>>>,
}

impl<S: Surface + 'static> Starfield<S> {
    pub fn new(
        mut surface: S,
        bindings: HostBindings<'_>,
        config: StarfieldConfig,
    ) -> Result<Self, StarfieldError> {
        config.validate()?;
        let style = RenderStyle::from_config(&config)?;

        let viewport = Viewport::from_surface(&surface);
        let (width, height) = viewport.physical_size();
        surface.bind(width, height, viewport.dpr);
        if viewport.is_degenerate() {
            warn!("Starfield surface has no area ({}x{})", viewport.width(), viewport.height());
        }

        let field = ParticleField::generate(
            viewport,
            config.star_count,
            config.constellation_count,
            config.rng(),
        );

        let mut engine = Engine {
            state: LifecycleState::Idle,
            surface,
            field,
            config,
            style,
            scheduler: bindings.scheduler,
            pending_frame: None,
            last_timestamp: None,
            last_frame: None,
            frame_count: 0,
            subscriptions: vec![],
        };
        engine.apply_speed_baseline();

        let engine = Rc::new(RefCell::new(engine));
        let subscriptions = vec![
            bindings
                .viewport
                .observe_resize(Self::resize_listener(Rc::downgrade(&engine))),
            bindings
                .visibility
                .observe_visibility(Self::visibility_listener(Rc::downgrade(&engine))),
            bindings
                .focus
                .observe_visibility(Self::visibility_listener(Rc::downgrade(&engine))),
        ];
        engine.borrow_mut().subscriptions = subscriptions;

        info!(
            "Starfield ready: {}x{} @{}x, {} stars, {} constellations",
            viewport.width(),
            viewport.height(),
            viewport.dpr,
            engine.borrow().field.stars().len(),
            engine.borrow().field.constellations().len()
        );
        Ok(Self { engine })
    }

    pub fn start(&self) {
        Self::start_engine(&self.engine);
    }

    pub fn pause(&self) {
        Self::pause_engine(&self.engine);
    }

    pub fn resume(&self) {
        Self::resume_engine(&self.engine);
    }

    pub fn destroy(&self) {
        let subscriptions = {
            let mut engine = self.engine.borrow_mut();
            if engine.state == LifecycleState::Destroyed {
                warn!("Starfield already destroyed");
                return;
            }
            if let Some(handle) = engine.pending_frame.take() {
                engine.scheduler.cancel_frame(handle);
            }
            engine.state = LifecycleState::Destroyed;
            engine.surface.release();
            std::mem::take(&mut engine.subscriptions)
        };
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        debug!("Starfield destroyed");
    }

    /// Regenerates the stars at the new count; constellations are kept.
    pub fn set_particle_count(&self, count: usize) {
        let mut engine = self.engine.borrow_mut();
        if engine.state == LifecycleState::Destroyed {
            warn!("Ignoring particle count change on destroyed starfield");
            return;
        }
        engine.config.star_count = count;
        engine.field.regenerate_stars(count);
        engine.apply_speed_baseline();
    }

    /// Scales the drift speed of every current star in place.
    pub fn set_speed_multiplier(&self, multiplier: f32) {
        let mut engine = self.engine.borrow_mut();
        if engine.state == LifecycleState::Destroyed {
            warn!("Ignoring speed change on destroyed starfield");
            return;
        }
        if !(multiplier.is_finite() && multiplier > 0.) {
            warn!("Ignoring non-positive speed multiplier {}", multiplier);
            return;
        }
        engine.field.scale_drift_speeds(multiplier);
    }

    /// Re-reads the surface geometry; the field is regenerated when the
    /// logical size changed.
    pub fn handle_resize(&self) {
        Self::resize_engine(&self.engine);
    }

    pub fn state(&self) -> LifecycleState {
        self.engine.borrow().state
    }

    pub fn frame_count(&self) -> u64 {
        self.engine.borrow().frame_count
    }

    /// Timing of the most recently rendered frame.
    pub fn last_frame(&self) -> Option<FrameTime> {
        self.engine.borrow().last_frame
    }

    pub fn has_pending_frame(&self) -> bool {
        self.engine.borrow().pending_frame.is_some()
    }

    pub fn config(&self) -> Ref<'_, StarfieldConfig> {
        Ref::map(self.engine.borrow(), |engine| &engine.config)
    }

    pub fn field(&self) -> Ref<'_, ParticleField> {
        Ref::map(self.engine.borrow(), |engine| &engine.field)
    }

    pub fn field_mut(&self) -> RefMut<'_, ParticleField> {
        RefMut::map(self.engine.borrow_mut(), |engine| &mut engine.field)
    }

    pub fn surface(&self) -> Ref<'_, S> {
        Ref::map(self.engine.borrow(), |engine| &engine.surface)
    }

    pub fn surface_mut(&self) -> RefMut<'_, S> {
        RefMut::map(self.engine.borrow_mut(), |engine| &mut engine.surface)
    }

    fn start_engine(engine: &Rc<RefCell<Engine<S>>>) {
        let mut guard = engine.borrow_mut();
        match guard.state {
            LifecycleState::Running => {
                debug!("Starfield already running");
                return;
            }
            LifecycleState::Destroyed => {
                warn!("Ignoring start on destroyed starfield");
                return;
            }
            LifecycleState::Idle | LifecycleState::Paused => {}
        }
        guard.state = LifecycleState::Running;
        guard.last_timestamp = None;
        if Self::schedule_next(engine, &mut guard) {
            debug!("Starfield running");
        }
    }

    /// Requests the next frame; without one the engine drops to `Paused` so
    /// a later `resume()` can retry.
    fn schedule_next(engine: &Rc<RefCell<Engine<S>>>, guard: &mut Engine<S>) -> bool {
        guard.pending_frame = guard
            .scheduler
            .schedule_frame(Self::frame_callback(Rc::downgrade(engine)));
        if guard.pending_frame.is_none() {
            error!("Frame scheduler refused a frame, starfield paused");
            guard.state = LifecycleState::Paused;
        }
        guard.pending_frame.is_some()
    }

    fn pause_engine(engine: &Rc<RefCell<Engine<S>>>) {
        let mut guard = engine.borrow_mut();
        match guard.state {
            LifecycleState::Running => {}
            LifecycleState::Destroyed => {
                warn!("Ignoring pause on destroyed starfield");
                return;
            }
            LifecycleState::Idle | LifecycleState::Paused => {
                debug!("Starfield not running, nothing to pause");
                return;
            }
        }
        if let Some(handle) = guard.pending_frame.take() {
            guard.scheduler.cancel_frame(handle);
        }
        guard.state = LifecycleState::Paused;
        debug!("Starfield paused after {} frames", guard.frame_count);
    }

    fn resume_engine(engine: &Rc<RefCell<Engine<S>>>) {
        let state = engine.borrow().state;
        match state {
            LifecycleState::Paused => Self::start_engine(engine),
            LifecycleState::Destroyed => warn!("Ignoring resume on destroyed starfield"),
            LifecycleState::Idle | LifecycleState::Running => {}
        }
    }

    fn resize_engine(engine: &Rc<RefCell<Engine<S>>>) {
        let mut guard = engine.borrow_mut();
        if guard.state == LifecycleState::Destroyed {
            return;
        }
        let viewport = guard.bind_surface();
        if viewport.size == guard.field.viewport().size {
            return;
        }
        let (star_count, constellation_count) =
            (guard.config.star_count, guard.config.constellation_count);
        guard
            .field
            .regenerate(viewport, star_count, constellation_count);
        guard.apply_speed_baseline();
        debug!(
            "Starfield regenerated for {}x{}",
            viewport.width(),
            viewport.height()
        );
    }

    fn frame_callback(engine: Weak<RefCell<Engine<S>>>) -> FrameCallback {
        Box::new(move |timestamp| {
            if let Some(engine) = engine.upgrade() {
                Self::on_frame(&engine, timestamp);
            }
        })
    }

    fn on_frame(engine: &Rc<RefCell<Engine<S>>>, timestamp: f64) {
        let mut guard = engine.borrow_mut();
        let engine_state = &mut *guard;
        engine_state.pending_frame = None;
        if engine_state.state != LifecycleState::Running {
            return;
        }

        let elapsed = engine_state
            .last_timestamp
            .map_or(0., |last| ((timestamp - last) / 1000.).max(0.)) as f32;
        engine_state.last_timestamp = Some(timestamp);

        let frame = FrameTime::new(elapsed, timestamp / 1000.);
        engine_state.field.update(frame);
        engine_state.last_frame = Some(frame);
        render(
            &mut engine_state.surface,
            &engine_state.field,
            &engine_state.style,
        );
        engine_state.frame_count += 1;

        if engine_state.state == LifecycleState::Running {
            Self::schedule_next(engine, engine_state);
        }
    }

    fn resize_listener(engine: Weak<RefCell<Engine<S>>>) -> Box<dyn FnMut()> {
        Box::new(move || {
            if let Some(engine) = engine.upgrade() {
                Self::resize_engine(&engine);
            }
        })
    }

    fn visibility_listener(engine: Weak<RefCell<Engine<S>>>) -> Box<dyn FnMut(Visibility)> {
        Box::new(move |visibility| {
            if let Some(engine) = engine.upgrade() {
                match visibility {
                    Visibility::Hidden => Self::pause_engine(&engine),
                    Visibility::Visible => Self::resume_engine(&engine),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        scheduler: ManualScheduler,
        resize: ManualViewportObserver,
        visibility: ManualVisibilityObserver,
        focus: ManualVisibilityObserver,
        starfield: Starfield<RecordingSurface>,
    }

    fn harness(config: StarfieldConfig) -> Harness {
        let scheduler = ManualScheduler::new();
        let resize = ManualViewportObserver::new();
        let visibility = ManualVisibilityObserver::new();
        let focus = ManualVisibilityObserver::new();
        let starfield = Starfield::new(
            RecordingSurface::new(800., 600., 2.),
            HostBindings {
                scheduler: Rc::new(scheduler.clone()),
                viewport: &resize,
                visibility: &visibility,
                focus: &focus,
            },
            config,
        )
        .unwrap();
        Harness {
            scheduler,
            resize,
            visibility,
            focus,
            starfield,
        }
    }

    struct RefusingScheduler;

    impl FrameScheduler for RefusingScheduler {
        fn schedule_frame(&self, _callback: FrameCallback) -> Option<FrameHandle> {
            None
        }

        fn cancel_frame(&self, _handle: FrameHandle) {}
    }

    fn seeded() -> StarfieldConfig {
        StarfieldConfig {
            seed: Some(5),
            ..Default::default()
        }
    }

    #[test]
    fn construction_binds_surface_at_device_scale() {
        let h = harness(seeded());
        assert_eq!(h.starfield.state(), LifecycleState::Idle);
        assert_eq!(
            h.starfield.surface().commands(),
            &[DrawCommand::Bind {
                physical_width: 1600,
                physical_height: 1200,
                scale: 2.,
            }]
        );
        assert_eq!(h.starfield.field().stars().len(), 200);
        assert_eq!(h.starfield.field().constellations().len(), 3);
        assert_eq!(h.resize.listener_count(), 1);
        assert_eq!(h.visibility.listener_count(), 1);
        assert_eq!(h.focus.listener_count(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let scheduler = ManualScheduler::new();
        let resize = ManualViewportObserver::new();
        let visibility = ManualVisibilityObserver::new();
        let result = Starfield::new(
            RecordingSurface::new(800., 600., 1.),
            HostBindings {
                scheduler: Rc::new(scheduler),
                viewport: &resize,
                visibility: &visibility,
                focus: &visibility,
            },
            StarfieldConfig {
                accent_color: "teal".into(),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StarfieldError::InvalidConfig(_))));
    }

    #[test]
    fn frames_render_and_reschedule_while_running() {
        let h = harness(seeded());
        h.starfield.start();
        assert_eq!(h.scheduler.pending_count(), 1);

        for _ in 0..5 {
            assert_eq!(h.scheduler.advance(16.), 1);
        }
        assert_eq!(h.starfield.frame_count(), 5);
        assert_eq!(h.scheduler.pending_count(), 1);
    }

    #[test]
    fn start_twice_keeps_single_callback() {
        let h = harness(seeded());
        h.starfield.start();
        h.starfield.start();
        assert_eq!(h.scheduler.pending_count(), 1);
    }

    #[test]
    fn paused_engine_does_no_work() {
        let h = harness(seeded());
        h.starfield.start();
        h.scheduler.advance(16.);
        h.starfield.pause();
        h.starfield.surface_mut().take_commands();

        for _ in 0..10 {
            assert_eq!(h.scheduler.advance(16.), 0);
        }
        assert_eq!(h.starfield.frame_count(), 1);
        assert!(h.starfield.surface().commands().is_empty());
        assert_eq!(h.starfield.state(), LifecycleState::Paused);
    }

    #[test]
    fn pause_resume_resume_leaves_one_callback() {
        let h = harness(seeded());
        h.starfield.start();
        h.starfield.pause();
        h.starfield.resume();
        h.starfield.resume();
        assert_eq!(h.starfield.state(), LifecycleState::Running);
        assert_eq!(h.scheduler.pending_count(), 1);
        assert!(h.starfield.has_pending_frame());
    }

    #[test]
    fn resume_does_not_start_idle_engine() {
        let h = harness(seeded());
        h.starfield.resume();
        h.starfield.pause();
        assert_eq!(h.starfield.state(), LifecycleState::Idle);
        assert_eq!(h.scheduler.pending_count(), 0);
    }

    #[test]
    fn first_frame_after_resume_has_no_elapsed_jump() {
        let h = harness(seeded());
        h.starfield.start();
        h.scheduler.advance(16.);
        h.starfield.pause();
        h.scheduler.advance(60_000.);
        h.starfield.resume();
        h.scheduler.advance(16.);
        assert_eq!(h.starfield.frame_count(), 2);
        let frame = h.starfield.last_frame().unwrap();
        assert_eq!(frame.elapsed, 0.);
        assert_eq!(frame.clock, h.scheduler.now_ms() / 1000.);

        h.scheduler.advance(20.);
        let elapsed = h.starfield.last_frame().unwrap().elapsed;
        assert!((elapsed - 0.02).abs() < 1e-6);
    }

    #[test]
    fn visibility_drives_pause_and_resume() {
        let h = harness(seeded());
        h.starfield.start();
        h.visibility.notify(Visibility::Hidden);
        assert_eq!(h.starfield.state(), LifecycleState::Paused);
        assert_eq!(h.scheduler.pending_count(), 0);

        h.visibility.notify(Visibility::Visible);
        assert_eq!(h.starfield.state(), LifecycleState::Running);
        assert_eq!(h.scheduler.pending_count(), 1);
    }

    #[test]
    fn window_blur_pauses_and_focus_resumes() {
        let h = harness(seeded());
        h.starfield.start();
        h.scheduler.advance(16.);

        h.focus.notify(Visibility::Hidden);
        assert_eq!(h.starfield.state(), LifecycleState::Paused);
        for _ in 0..5 {
            assert_eq!(h.scheduler.advance(16.), 0);
        }
        assert_eq!(h.starfield.frame_count(), 1);

        h.focus.notify(Visibility::Visible);
        assert_eq!(h.starfield.state(), LifecycleState::Running);
        assert_eq!(h.scheduler.pending_count(), 1);
        h.scheduler.advance(16.);
        assert_eq!(h.starfield.frame_count(), 2);
    }

    #[test]
    fn refused_frame_leaves_engine_paused() {
        let resize = ManualViewportObserver::new();
        let visibility = ManualVisibilityObserver::new();
        let starfield = Starfield::new(
            RecordingSurface::new(320., 200., 1.),
            HostBindings {
                scheduler: Rc::new(RefusingScheduler),
                viewport: &resize,
                visibility: &visibility,
                focus: &visibility,
            },
            seeded(),
        )
        .unwrap();

        starfield.start();
        assert_eq!(starfield.state(), LifecycleState::Paused);
        assert!(!starfield.has_pending_frame());

        starfield.resume();
        assert_eq!(starfield.state(), LifecycleState::Paused);
        visibility.notify(Visibility::Visible);
        assert_eq!(starfield.state(), LifecycleState::Paused);
    }

    #[test]
    fn resize_regenerates_without_touching_state() {
        let h = harness(seeded());
        h.starfield.start();
        h.starfield.pause();

        h.starfield.surface_mut().set_logical_size(400., 300.);
        h.resize.notify();

        let field = h.starfield.field();
        assert_eq!(field.viewport().size, vec2(400., 300.));
        assert_eq!(field.stars().len(), 200);
        assert!(field.stars().iter().all(|s| field.viewport().contains(s.pos)));
        drop(field);
        assert_eq!(h.starfield.state(), LifecycleState::Paused);
    }

    #[test]
    fn resize_to_same_size_keeps_stars() {
        let h = harness(seeded());
        let before = h.starfield.field().stars().to_vec();
        h.resize.notify();
        assert_eq!(h.starfield.field().stars(), before.as_slice());
    }

    #[test]
    fn particle_count_survives_resize() {
        let h = harness(seeded());
        h.starfield.set_particle_count(40);
        let constellations = h.starfield.field().constellations().to_vec();
        assert_eq!(h.starfield.field().stars().len(), 40);
        assert_eq!(h.starfield.field().constellations(), constellations.as_slice());

        h.starfield.surface_mut().set_logical_size(1024., 768.);
        h.starfield.handle_resize();
        assert_eq!(h.starfield.field().stars().len(), 40);
    }

    #[test]
    fn speed_multiplier_scales_in_place() {
        let h = harness(seeded());
        let before = h.starfield.field().stars().to_vec();
        h.starfield.set_speed_multiplier(2.);
        h.starfield.set_speed_multiplier(-1.);
        h.starfield.set_speed_multiplier(f32::NAN);
        for (old, new) in before.iter().zip(h.starfield.field().stars()) {
            assert_eq!(new.drift_speed, old.drift_speed * 2.);
            assert_eq!(new.pos, old.pos);
            assert_eq!(new.depth, old.depth);
        }
    }

    #[test]
    fn configured_speed_applies_to_generated_stars() {
        let plain = harness(seeded());
        let fast = harness(StarfieldConfig {
            speed_multiplier: 3.,
            ..seeded()
        });
        for (a, b) in plain
            .starfield
            .field()
            .stars()
            .iter()
            .zip(fast.starfield.field().stars())
        {
            assert_eq!(b.drift_speed, a.drift_speed * 3.);
        }
    }

    #[test]
    fn destroy_cancels_and_detaches() {
        let h = harness(seeded());
        h.starfield.start();
        h.starfield.destroy();

        assert_eq!(h.starfield.state(), LifecycleState::Destroyed);
        assert_eq!(h.scheduler.pending_count(), 0);
        assert_eq!(h.resize.listener_count(), 0);
        assert_eq!(h.visibility.listener_count(), 0);
        assert_eq!(h.focus.listener_count(), 0);
        assert_eq!(h.starfield.surface().commands().last(), Some(&DrawCommand::Release));

        h.starfield.start();
        h.starfield.resume();
        h.visibility.notify(Visibility::Visible);
        assert_eq!(h.starfield.state(), LifecycleState::Destroyed);
        assert_eq!(h.scheduler.pending_count(), 0);
    }

    #[test]
    fn dropped_engine_ignores_stale_frame() {
        let h = harness(seeded());
        h.starfield.start();
        let Harness {
            scheduler,
            starfield,
            ..
        } = h;
        drop(starfield);
        assert_eq!(scheduler.advance(16.), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn state_names_are_snake_case() {
        assert_eq!(LifecycleState::Running.to_string(), "running");
        assert_eq!(LifecycleState::Destroyed.to_string(), "destroyed");
    }
}
