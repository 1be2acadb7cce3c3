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

//! Background thread that drives a [`LoadingContext`].

use crate::context::LoadingContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for the [`LoadingService`].
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Time between two ticks. `None` uses the context's
    /// `progress_update_interval`.
    pub tick_interval: Option<Duration>,
    /// Stop the thread once a session has completed.
    pub stop_when_complete: bool,
}

/// Ticks a [`LoadingContext`] from its own thread until stopped.
pub struct LoadingService {
    config: ServiceConfig,
    context: LoadingContext,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LoadingService {
    /// Creates a stopped service for `context`.
    pub fn new(context: LoadingContext, config: ServiceConfig) -> Self {
        Self {
            config,
            context,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Starts the background thread. Does nothing if already running.
    pub fn start(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let context = self.context.clone();
        let tick_duration = self
            .config
            .tick_interval
            .unwrap_or_else(|| context.config().progress_update_interval)
            .max(Duration::from_millis(1));
        let stop_when_complete = self.config.stop_when_complete;

        let handle = thread::spawn(move || {
            log::info!("Loading service thread started ({tick_duration:?} per tick).");
            let mut was_loading = false;

            while running.load(Ordering::Relaxed) {
                let start_time = Instant::now();

                context.tick();

                let loading = context.is_loading();
                if stop_when_complete && was_loading && !loading {
                    log::debug!("Session complete; stopping loading service");
                    running.store(false, Ordering::Relaxed);
                    break;
                }
                was_loading = loading;

                let elapsed = start_time.elapsed();
                if elapsed < tick_duration {
                    thread::sleep(tick_duration - elapsed);
                }
            }
            log::info!("Loading service thread stopped.");
        });

        self.handle = Some(handle);
    }

    /// Stops the background thread and waits for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// `true` while the thread is ticking.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Blocks until the thread exits on its own or `timeout` elapses.
    /// Returns `true` if the thread exited.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        if self.is_running() {
            return false;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        true
    }

    /// The driven context.
    pub fn context(&self) -> &LoadingContext {
        &self.context
    }
}

impl Drop for LoadingService {
    fn drop(&mut self) {
        self.stop();
    }
}
