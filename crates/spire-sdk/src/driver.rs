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

//! Async driver for applications already running a tokio runtime.

use crate::context::LoadingContext;
use spire_control::CompletionInfo;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};

/// Ticks `context` every `period` until the running session completes, and
/// returns its completion info.
///
/// Returns `None` if no session is running, or if the session ended through
/// a reset rather than completion.
pub async fn run_until_complete(
    context: LoadingContext,
    period: Duration,
) -> Option<CompletionInfo> {
    if !context.is_loading() {
        return None;
    }

    let (tx, mut rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let _subscription = context.on_loading_complete(move |info| {
        if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(info.clone());
        }
    });

    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        context.tick();
        if let Ok(info) = rx.try_recv() {
            return Some(info);
        }
        if !context.is_loading() {
            log::debug!("Loading session ended without completing");
            return None;
        }
    }
}

/// Spawns [`run_until_complete`] on the current runtime, ticking at the
/// context's `progress_update_interval`.
pub fn spawn(context: LoadingContext) -> tokio::task::JoinHandle<Option<CompletionInfo>> {
    let period = context.config().progress_update_interval;
    tokio::spawn(run_until_complete(context, period))
}
