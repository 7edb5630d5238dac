//! Seams between the engine and the host's event loop.
//!
//! The engine never touches a display loop or a window directly: frames are
//! requested through a [`FrameScheduler`] and environment changes arrive
//! through observers that hand back a [`Subscription`]. The `Manual*` types
//! are driven explicitly, which is how tests and the headless binary run the
//! engine.

use std::cell::RefCell;
use std::rc::Rc;

use super::*;

/// Receives the frame timestamp in milliseconds.
pub type FrameCallback = Box<dyn FnOnce(f64)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait FrameScheduler {
    /// `None` when the host could not schedule the frame.
    fn schedule_frame(&self, callback: FrameCallback) -> Option<FrameHandle>;
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Keeps an observer registration alive; unsubscribes when consumed or dropped.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

pub trait ViewportObserver {
    fn observe_resize(&self, on_resize: Box<dyn FnMut()>) -> Subscription;
}

pub trait VisibilityObserver {
    fn observe_visibility(&self, on_change: Box<dyn FnMut(Visibility)>) -> Subscription;
}

#[derive(Default)]
struct FrameQueue {
    next_id: u64,
    now_ms: f64,
    pending: Vec<(FrameHandle, FrameCallback)>,
}

/// Frame scheduler that only fires when told to.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<FrameQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    pub fn now_ms(&self) -> f64 {
        self.queue.borrow().now_ms
    }

    /// Fires every callback pending at call time with `timestamp_ms`.
    /// Callbacks scheduled while firing wait for the next call.
    pub fn fire(&self, timestamp_ms: f64) -> usize {
        let due = {
            let mut queue = self.queue.borrow_mut();
            queue.now_ms = timestamp_ms;
            std::mem::take(&mut queue.pending)
        };
        let fired = due.len();
        for (_, callback) in due {
            callback(timestamp_ms);
        }
        fired
    }

    pub fn advance(&self, dt_ms: f64) -> usize {
        let now = self.now_ms() + dt_ms;
        self.fire(now)
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule_frame(&self, callback: FrameCallback) -> Option<FrameHandle> {
        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        let handle = FrameHandle(queue.next_id);
        queue.pending.push((handle, callback));
        Some(handle)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.queue
            .borrow_mut()
            .pending
            .retain(|(pending, _)| *pending != handle);
    }
}

type Listeners<T> = Rc<RefCell<Vec<(u64, Rc<RefCell<T>>)>>>;

struct ListenerSet<T: ?Sized> {
    next_id: u64,
    listeners: Listeners<Box<T>>,
}

impl<T: ?Sized + 'static> ListenerSet<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Rc::new(RefCell::new(vec![])),
        }
    }

    fn add(&mut self, listener: Box<T>) -> Subscription {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(listener))));

        let listeners = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(other, _)| *other != id);
            }
        })
    }

    /// Listener list snapshot, so listeners may unsubscribe while notified.
    fn snapshot(&self) -> Vec<Rc<RefCell<Box<T>>>> {
        self.listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// Resize source driven by the host calling [`ManualViewportObserver::notify`].
#[derive(Clone)]
pub struct ManualViewportObserver {
    set: Rc<RefCell<ListenerSet<dyn FnMut()>>>,
}

impl Default for ManualViewportObserver {
    fn default() -> Self {
        Self {
            set: Rc::new(RefCell::new(ListenerSet::new())),
        }
    }
}

impl ManualViewportObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let listeners = self.set.borrow().snapshot();
        for listener in listeners {
            let mut listener = listener.borrow_mut();
            (*listener)();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.set.borrow().len()
    }
}

impl ViewportObserver for ManualViewportObserver {
    fn observe_resize(&self, on_resize: Box<dyn FnMut()>) -> Subscription {
        self.set.borrow_mut().add(on_resize)
    }
}

/// Visibility source driven by the host calling [`ManualVisibilityObserver::notify`].
#[derive(Clone)]
pub struct ManualVisibilityObserver {
    set: Rc<RefCell<ListenerSet<dyn FnMut(Visibility)>>>,
}

impl Default for ManualVisibilityObserver {
    fn default() -> Self {
        Self {
            set: Rc::new(RefCell::new(ListenerSet::new())),
        }
    }
}

impl ManualVisibilityObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self, visibility: Visibility) {
        let listeners = self.set.borrow().snapshot();
        for listener in listeners {
            let mut listener = listener.borrow_mut();
            (*listener)(visibility);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.set.borrow().len()
    }
}

impl VisibilityObserver for ManualVisibilityObserver {
    fn observe_visibility(&self, on_change: Box<dyn FnMut(Visibility)>) -> Subscription {
        self.set.borrow_mut().add(on_change)
    }
}
