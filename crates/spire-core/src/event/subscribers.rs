// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<E> = Box<dyn FnMut(&E) + Send>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(u64, Callback<E>)>,
    emitting: usize,
    detached_while_emitting: Vec<u64>,
}

impl<E> Registry<E> {
    fn detach(&mut self, id: u64) {
        self.listeners.retain(|(listener, _)| *listener != id);
        if self.emitting > 0 {
            self.detached_while_emitting.push(id);
        }
    }
}

fn lock<E>(registry: &Mutex<Registry<E>>) -> MutexGuard<'_, Registry<E>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An ordered list of callbacks for events of type `E`.
///
/// Callbacks run synchronously, in subscription order, on the thread that
/// calls [`emit`](Subscribers::emit). A callback may subscribe or unsubscribe
/// while an emission is in progress; new callbacks first run on the next
/// emission. A nested `emit` on the same list from inside a callback reaches
/// no listeners.
pub struct Subscribers<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> Subscribers<E> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
                emitting: 0,
                detached_while_emitting: Vec::new(),
            })),
        }
    }

    /// Registers `callback` and returns the disposer that detaches it.
    #[must_use = "dropping the Subscription immediately unsubscribes the callback"]
    pub fn subscribe(&self, callback: impl FnMut(&E) + Send + 'static) -> Subscription {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Box::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    lock(&registry).detach(id);
                }
            })),
        }
    }

    /// Invokes every callback with `event`.
    pub fn emit(&self, event: &E) {
        let mut listeners = {
            let mut registry = lock(&self.registry);
            registry.emitting += 1;
            std::mem::take(&mut registry.listeners)
        };

        for (_, callback) in listeners.iter_mut() {
            callback(event);
        }

        let mut registry = lock(&self.registry);
        registry.emitting -= 1;
        let added = std::mem::take(&mut registry.listeners);
        listeners.extend(added);
        if registry.emitting == 0 {
            let detached = std::mem::take(&mut registry.detached_while_emitting);
            listeners.retain(|(id, _)| !detached.contains(id));
        }
        registry.listeners = listeners;
    }

    /// Number of attached callbacks.
    pub fn len(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    /// Returns `true` if no callback is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detaches every callback. Outstanding [`Subscription`]s become inert.
    pub fn clear(&self) {
        lock(&self.registry).listeners.clear();
    }
}

impl<E: 'static> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = lock(&self.registry).listeners.len();
        f.debug_struct("Subscribers")
            .field("listeners", &count)
            .finish()
    }
}

/// Disposer returned by [`Subscribers::subscribe`].
///
/// Dropping it detaches the callback. Call [`forget`](Subscription::forget) to
/// keep the callback attached for the lifetime of the list instead.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Detaches the callback now.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    /// Leaves the callback attached until the list itself is dropped or cleared.
    pub fn forget(mut self) {
        self.detach = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callbacks_run_in_subscription_order() {
        let subscribers = Subscribers::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = Arc::clone(&log);
            subscribers.subscribe(move |v| log.lock().unwrap().push(("first", *v)))
        };
        let second = {
            let log = Arc::clone(&log);
            subscribers.subscribe(move |v| log.lock().unwrap().push(("second", *v)))
        };

        subscribers.emit(&7);
        assert_eq!(*log.lock().unwrap(), vec![("first", 7), ("second", 7)]);
        drop((first, second));
    }

    #[test]
    fn dropping_subscription_detaches() {
        let subscribers = Subscribers::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let sub = {
            let hits = Arc::clone(&hits);
            subscribers.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        subscribers.emit(&());
        drop(sub);
        subscribers.emit(&());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn forgotten_subscription_stays_attached() {
        let subscribers = Subscribers::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            subscribers
                .subscribe(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
                .forget();
        }
        subscribers.emit(&());
        subscribers.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscription_outliving_list_is_harmless() {
        let subscribers = Subscribers::<()>::new();
        let sub = subscribers.subscribe(|_| {});
        drop(subscribers);
        sub.unsubscribe();
    }

    #[test]
    fn unsubscribe_from_inside_callback() {
        let subscribers = Arc::new(Subscribers::<()>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sub = {
            let hits = Arc::clone(&hits);
            let slot = Arc::clone(&slot);
            subscribers.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(own) = slot.lock().unwrap().take() {
                    own.unsubscribe();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        subscribers.emit(&());
        subscribers.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn clear_detaches_everything() {
        let subscribers = Subscribers::<()>::new();
        let _a = subscribers.subscribe(|_| {});
        let _b = subscribers.subscribe(|_| {});
        assert_eq!(subscribers.len(), 2);
        subscribers.clear();
        assert!(subscribers.is_empty());
    }
}
