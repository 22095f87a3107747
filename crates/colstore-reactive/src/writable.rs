use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tracing::trace;

/// Identifier of a registered listener.
pub type ListenerId = u64;

/// Closure type for store listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

type Pending<T> = (Arc<ListenerFn<T>>, Arc<T>);

struct Inner<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn<T>>)>>,
    queue: Mutex<VecDeque<Pending<T>>>,
    draining: AtomicBool,
    next_id: AtomicU64,
}

impl<T> Inner<T> {
    fn remove(&self, id: ListenerId) {
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .retain(|(lid, _)| *lid != id);
        trace!(listener = id, "listener removed");
    }

    /// Queue `value` for every current listener.
    ///
    /// Callers hold the value write lock, so queue order is write order.
    fn enqueue(&self, value: Arc<T>) {
        let listeners = self.listeners.lock().expect("listener lock poisoned");
        let mut queue = self.queue.lock().expect("queue lock poisoned");
        for (_, listener) in listeners.iter() {
            queue.push_back((Arc::clone(listener), Arc::clone(&value)));
        }
    }

    /// Deliver queued values unless a caller further up the stack, or on
    /// another thread, is already draining.
    ///
    /// A `set` made from inside a listener is delivered after the current
    /// value has reached every listener.
    fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            {
                let _guard = DrainGuard(&self.draining);
                loop {
                    let next = self.queue.lock().expect("queue lock poisoned").pop_front();
                    match next {
                        Some((listener, value)) => listener(&value),
                        None => break,
                    }
                }
            }
            if self.queue.lock().expect("queue lock poisoned").is_empty() {
                return;
            }
        }
    }
}

/// Clears the draining flag even if a listener panics.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Observable value container with synchronous change notification.
///
/// Cloning a `Writable` yields another handle to the same value and
/// listener set.
///
/// Listeners are called without any internal lock held, so a listener may
/// call [`set`](Self::set), [`subscribe`](Self::subscribe), or
/// [`Unsubscriber::unsubscribe`] on the same store. Notifications triggered
/// from inside a listener, including the initial call of a nested
/// `subscribe`, are queued and delivered once the current round finishes.
/// Concurrent writers are delivered in the order their writes landed, so
/// every listener's last value is the stored value.
pub struct Writable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Writable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(initial),
                listeners: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `listener`. It is called with the current value right away
    /// and again after every change.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscriber {
        subscribe_inner(&self.inner, Arc::new(listener))
    }

    /// Replace the value and notify every listener.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.write().expect("value lock poisoned");
            let shared = Arc::new(value.clone());
            *current = value;
            self.inner.enqueue(shared);
        }
        self.inner.drain();
    }

    /// Replace the value with `f(current)` and notify every listener.
    ///
    /// `f` runs while the value is locked and must not touch this store.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        {
            let mut current = self.inner.value.write().expect("value lock poisoned");
            let next = f(&current);
            *current = next.clone();
            self.inner.enqueue(Arc::new(next));
        }
        self.inner.drain();
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().expect("value lock poisoned").clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().expect("listener lock poisoned").len()
    }

    /// Read-only view sharing this store's value and listeners.
    pub fn readable(&self) -> Readable<T> {
        Readable {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Writable<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Writable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_inner("Writable", &self.inner, f)
    }
}

/// Read-only handle to a [`Writable`].
pub struct Readable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Readable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Unsubscriber {
        subscribe_inner(&self.inner, Arc::new(listener))
    }

    pub fn get(&self) -> T {
        self.inner.value.read().expect("value lock poisoned").clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().expect("listener lock poisoned").len()
    }
}

impl<T: fmt::Debug> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_inner("Readable", &self.inner, f)
    }
}

fn debug_inner<T: fmt::Debug>(
    name: &str,
    inner: &Inner<T>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let listeners = inner.listeners.lock().map(|l| l.len()).unwrap_or(0);
    match inner.value.try_read() {
        Ok(value) => f
            .debug_struct(name)
            .field("value", &*value)
            .field("listeners", &listeners)
            .finish(),
        Err(_) => f
            .debug_struct(name)
            .field("value", &"<locked>")
            .field("listeners", &listeners)
            .finish(),
    }
}

fn subscribe_inner<T>(inner: &Arc<Inner<T>>, listener: Arc<ListenerFn<T>>) -> Unsubscriber
where
    T: Clone + Send + Sync + 'static,
{
    let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
    {
        // Registering under the value lock orders the initial delivery
        // against concurrent sets.
        let current = inner.value.read().expect("value lock poisoned");
        inner
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .push((id, Arc::clone(&listener)));
        inner
            .queue
            .lock()
            .expect("queue lock poisoned")
            .push_back((listener, Arc::new(current.clone())));
    }
    trace!(listener = id, "listener added");
    inner.drain();

    let weak: Weak<Inner<T>> = Arc::downgrade(inner);
    Unsubscriber {
        id,
        detach: Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        }),
    }
}

/// Removes a listener from its store.
///
/// Dropping an `Unsubscriber` without calling
/// [`unsubscribe`](Self::unsubscribe) leaves the listener registered.
#[must_use = "dropping an Unsubscriber keeps the listener registered"]
pub struct Unsubscriber {
    id: ListenerId,
    detach: Box<dyn FnOnce() + Send + Sync>,
}

impl Unsubscriber {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Stop delivering changes to the listener. A no-op if the store is gone.
    pub fn unsubscribe(self) {
        (self.detach)();
    }
}

impl fmt::Debug for Unsubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscriber").field("id", &self.id).finish()
    }
}
