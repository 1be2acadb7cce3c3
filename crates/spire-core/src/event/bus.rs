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

use log;

/// Manages a generic, thread-safe event channel.
///
/// The bus is generic over the event type `T` so that each layer can define
/// its own messages. The owner keeps the receiving end and drains it from its
/// event loop; producers hold clones of the sender.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a new EventBus with an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("EventBus initialized.");
        Self { sender, receiver }
    }

    /// Returns a clone of the sender end of the channel.
    /// Use this to allow other parts of the system to send events.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Removes and returns every event currently queued, in send order.
    pub fn drain(&self) -> Vec<T> {
        let events: Vec<T> = self.receiver.try_iter().collect();
        if !events.is_empty() {
            log::trace!("Drained {} event(s).", events.len());
        }
        events
    }
}

impl<T: Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TrackingCommand;
    use crate::resource::ResourceType;
    use flume::SendError;
    use std::{thread, time::Duration};

    fn track(url: &str) -> TrackingCommand {
        TrackingCommand::TrackResource {
            url: url.to_string(),
            weight: 0.5,
            resource_type: ResourceType::Critical,
        }
    }

    fn mark(url: &str) -> TrackingCommand {
        TrackingCommand::MarkResourceLoaded {
            url: url.to_string(),
        }
    }

    #[test]
    fn event_bus_creation() {
        let bus = EventBus::<TrackingCommand>::new();
        let _sender = bus.sender();
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn drain_preserves_send_order() {
        let bus = EventBus::<TrackingCommand>::new();
        let sender = bus.sender();

        sender.send(track("/app.css")).expect("Send 1 should succeed");
        sender.send(mark("/app.css")).expect("Send 2 should succeed");
        bus.sender().send(track("/app.js")).expect("Send 3 should succeed");

        let drained = bus.drain();
        assert_eq!(
            drained,
            vec![track("/app.css"), mark("/app.css"), track("/app.js")]
        );
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn send_from_thread() {
        let bus = EventBus::<TrackingCommand>::new();
        let sender_clone = bus.sender();
        let event_to_send = mark("/hero.webp");
        let event_clone = event_to_send.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender_clone
                .send(event_clone)
                .expect("Send from thread failed");
        });

        handle.join().expect("Thread join failed");

        assert_eq!(bus.drain(), vec![event_to_send]);
    }

    #[test]
    fn send_error_on_receiver_drop() {
        let bus = EventBus::<TrackingCommand>::new();
        let sender = bus.sender();

        drop(bus);

        match sender.send(mark("/late.js")) {
            Err(SendError(_)) => {}
            Ok(()) => panic!("Send unexpectedly succeeded after receiver drop"),
        }
    }
}
