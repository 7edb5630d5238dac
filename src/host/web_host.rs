use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use super::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    console, CanvasRenderingContext2d, Document, EventTarget, HtmlCanvasElement, Window,
};

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => console::error_1(&line),
            log::Level::Warn => console::warn_1(&line),
            log::Level::Info => console::info_1(&line),
            log::Level::Debug | log::Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

pub fn init_logging(level: log::LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn unavailable(reason: impl Into<String>) -> StarfieldError {
    StarfieldError::SurfaceUnavailable(reason.into())
}

pub struct CanvasSurface {
    window: Window,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    pub fn from_element_id(id: &str) -> Result<Self, StarfieldError> {
        let window = web_sys::window().ok_or_else(|| unavailable("no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| unavailable("window has no document"))?;
        let canvas = document
            .get_element_by_id(id)
            .ok_or_else(|| unavailable(format!("no element with id {id:?}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| unavailable(format!("element {id:?} is not a canvas")))?;
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .ok_or_else(|| unavailable("canvas has no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| unavailable("unexpected 2d context type"))?;

        Ok(Self {
            window,
            canvas,
            ctx,
        })
    }

    fn hide(&self) {
        if let Err(err) = self.canvas.style().set_property("display", "none") {
            warn!("Could not hide starfield canvas: {:?}", err);
        }
    }

    fn set_fill(&self, color: Color) {
        self.ctx.set_global_alpha(color.a as f64);
        self.ctx
            .set_fill_style(&JsValue::from_str(&color.to_css_hex()));
    }
}

impl Surface for CanvasSurface {
    fn logical_size(&self) -> Vec2 {
        let rect = self.canvas.get_bounding_client_rect();
        vec2(rect.width() as f32, rect.height() as f32)
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.window.device_pixel_ratio() as f32
    }

    fn bind(&mut self, physical_width: u32, physical_height: u32, scale: f32) {
        let logical = self.logical_size();
        self.canvas.set_width(physical_width);
        self.canvas.set_height(physical_height);

        let style = self.canvas.style();
        for (property, value) in [("width", logical.x), ("height", logical.y)] {
            if let Err(err) = style.set_property(property, &format!("{value}px")) {
                warn!("Could not set canvas {}: {:?}", property, err);
            }
        }

        // resizing the backing store resets the context state
        let scale = scale as f64;
        if let Err(err) = self.ctx.set_transform(scale, 0., 0., scale, 0., 0.) {
            error!("Could not scale canvas context: {:?}", err);
        }
        self.ctx.set_image_smoothing_enabled(true);
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        self.ctx.save();
        self.set_fill(color);
        self.ctx.fill_rect(
            origin.x as f64,
            origin.y as f64,
            size.x as f64,
            size.y as f64,
        );
        self.ctx.restore();
    }

    fn stroke_polyline(&mut self, points: &[Vec2], color: Color, line_width: f32) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.ctx.save();
        self.ctx.set_global_alpha(color.a as f64);
        self.ctx
            .set_stroke_style(&JsValue::from_str(&color.to_css_hex()));
        self.ctx.set_line_width(line_width as f64);

        self.ctx.begin_path();
        self.ctx.move_to(first.x as f64, first.y as f64);
        for point in rest {
            self.ctx.line_to(point.x as f64, point.y as f64);
        }
        self.ctx.stroke();
        self.ctx.restore();
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color, glow: Option<Glow>) {
        self.ctx.save();
        self.set_fill(color);
        if let Some(glow) = glow {
            self.ctx.set_shadow_color(&glow.color.to_css_hex());
            self.ctx.set_shadow_blur(glow.blur as f64);
        }
        self.ctx.begin_path();
        if self
            .ctx
            .arc(center.x as f64, center.y as f64, radius as f64, 0., TAU)
            .is_ok()
        {
            self.ctx.fill();
        }
        self.ctx.restore();
    }

    fn release(&mut self) {
        let size = self.logical_size();
        self.ctx
            .clear_rect(0., 0., size.x as f64, size.y as f64);
    }
}

/// Frames driven by `requestAnimationFrame`.
pub struct AnimationFrameScheduler {
    window: Window,
}

impl FrameScheduler for AnimationFrameScheduler {
    fn schedule_frame(&self, callback: FrameCallback) -> Option<FrameHandle> {
        // one-shot closure; freed by wasm-bindgen once it has run
        let js_callback = Closure::once_into_js(move |timestamp: f64| callback(timestamp));
        match self
            .window
            .request_animation_frame(js_callback.unchecked_ref())
        {
            Ok(id) => Some(FrameHandle(id as u64)),
            Err(err) => {
                error!("requestAnimationFrame failed: {:?}", err);
                None
            }
        }
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Err(err) = self.window.cancel_animation_frame(handle.0 as i32) {
            warn!("cancelAnimationFrame failed: {:?}", err);
        }
    }
}

fn listen(target: &EventTarget, event: &'static str, closure: Closure<dyn FnMut()>) -> Subscription {
    if let Err(err) =
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
    {
        error!("Could not listen for {}: {:?}", event, err);
    }
    let target = target.clone();
    Subscription::new(move || {
        if let Err(err) =
            target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        {
            warn!("Could not remove {} listener: {:?}", event, err);
        }
    })
}

pub struct WindowResizeObserver {
    window: Window,
}

impl ViewportObserver for WindowResizeObserver {
    fn observe_resize(&self, mut on_resize: Box<dyn FnMut()>) -> Subscription {
        let closure = Closure::<dyn FnMut()>::new(move || on_resize());
        listen(&self.window, "resize", closure)
    }
}

pub struct DocumentVisibilityObserver {
    document: Document,
}

impl VisibilityObserver for DocumentVisibilityObserver {
    fn observe_visibility(&self, mut on_change: Box<dyn FnMut(Visibility)>) -> Subscription {
        let document = self.document.clone();
        let closure = Closure::<dyn FnMut()>::new(move || {
            on_change(if document.hidden() {
                Visibility::Hidden
            } else {
                Visibility::Visible
            })
        });
        listen(&self.document, "visibilitychange", closure)
    }
}

/// Window `focus` and `blur`, reported as visible and hidden.
pub struct WindowFocusObserver {
    window: Window,
}

impl VisibilityObserver for WindowFocusObserver {
    fn observe_visibility(&self, on_change: Box<dyn FnMut(Visibility)>) -> Subscription {
        let on_change = Rc::new(RefCell::new(on_change));

        let on_focus = on_change.clone();
        let focus = listen(
            &self.window,
            "focus",
            Closure::<dyn FnMut()>::new(move || (*on_focus.borrow_mut())(Visibility::Visible)),
        );
        let blur = listen(
            &self.window,
            "blur",
            Closure::<dyn FnMut()>::new(move || (*on_change.borrow_mut())(Visibility::Hidden)),
        );
        Subscription::new(move || {
            focus.unsubscribe();
            blur.unsubscribe();
        })
    }
}

fn prefers_reduced_motion(window: &Window) -> bool {
    window
        .match_media("(prefers-reduced-motion: reduce)")
        .ok()
        .flatten()
        .map_or(false, |query| query.matches())
}

fn to_js(err: StarfieldError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct StarfieldHandle {
    starfield: Starfield<CanvasSurface>,
}

impl StarfieldHandle {
    fn build(surface: CanvasSurface, config: StarfieldConfig) -> Result<Self, StarfieldError> {
        let window = surface.window.clone();
        let document = window
            .document()
            .ok_or_else(|| unavailable("window has no document"))?;
        let resize = WindowResizeObserver {
            window: window.clone(),
        };
        let visibility = DocumentVisibilityObserver { document };
        let focus = WindowFocusObserver {
            window: window.clone(),
        };

        let starfield = Starfield::new(
            surface,
            HostBindings {
                scheduler: Rc::new(AnimationFrameScheduler { window }),
                viewport: &resize,
                visibility: &visibility,
                focus: &focus,
            },
            config,
        )?;
        Ok(Self { starfield })
    }
}

#[wasm_bindgen]
impl StarfieldHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str) -> Result<StarfieldHandle, JsValue> {
        let surface = CanvasSurface::from_element_id(canvas_id).map_err(to_js)?;
        Self::build(surface, StarfieldConfig::default()).map_err(to_js)
    }

    /// Like the constructor, with a JSON [`StarfieldConfig`].
    pub fn with_config(canvas_id: &str, config_json: &str) -> Result<StarfieldHandle, JsValue> {
        let config = StarfieldConfig::from_json(config_json).map_err(to_js)?;
        let surface = CanvasSurface::from_element_id(canvas_id).map_err(to_js)?;
        Self::build(surface, config).map_err(to_js)
    }

    pub fn start(&self) {
        self.starfield.start();
    }

    pub fn pause(&self) {
        self.starfield.pause();
    }

    pub fn resume(&self) {
        self.starfield.resume();
    }

    pub fn destroy(&self) {
        self.starfield.destroy();
    }

    pub fn set_particle_count(&self, count: usize) {
        self.starfield.set_particle_count(count);
    }

    pub fn set_speed_multiplier(&self, multiplier: f32) {
        self.starfield.set_speed_multiplier(multiplier);
    }

    pub fn state(&self) -> String {
        self.starfield.state().to_string()
    }
}

/// Finds the canvas, honours the reduced-motion preference, and starts the
/// animation. Returns `None` when no animation should run.
#[wasm_bindgen]
pub fn initialize_starfield(canvas_id: &str) -> Option<StarfieldHandle> {
    let surface = match CanvasSurface::from_element_id(canvas_id) {
        Ok(surface) => surface,
        Err(err) => {
            warn!("Starfield canvas not found: {}", err);
            return None;
        }
    };

    if prefers_reduced_motion(&surface.window) {
        info!("Reduced motion preferred, starfield disabled");
        surface.hide();
        return None;
    }

    match StarfieldHandle::build(surface, StarfieldConfig::default()) {
        Ok(handle) => {
            handle.start();
            Some(handle)
        }
        Err(err) => {
            error!("Starfield failed to start: {}", err);
            None
        }
    }
}

#[wasm_bindgen(start)]
pub fn run() {
    init_logging(log::LevelFilter::Info);
}
