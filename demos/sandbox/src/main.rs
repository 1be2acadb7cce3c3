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

use anyhow::Result;
use rand::Rng;
use spire_sdk::prelude::*;
use std::io::Write;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// A resource of the simulated page: where it lives, how it is classified,
/// and how long it takes to arrive. `None` never arrives.
struct PageResource {
    url: &'static str,
    resource_type: ResourceType,
    latency_ms: Option<u64>,
}

const PAGE: &[PageResource] = &[
    PageResource {
        url: "/_next/static/css/app.css",
        resource_type: ResourceType::Critical,
        latency_ms: Some(120),
    },
    PageResource {
        url: "/_next/static/chunks/main.js",
        resource_type: ResourceType::Critical,
        latency_ms: Some(340),
    },
    PageResource {
        url: "/fonts/display.woff2",
        resource_type: ResourceType::Fonts,
        latency_ms: Some(600),
    },
    PageResource {
        url: "/images/hero.webp",
        resource_type: ResourceType::Images,
        latency_ms: Some(900),
    },
    PageResource {
        url: "/images/partners.webp",
        resource_type: ResourceType::Images,
        latency_ms: None,
    },
];

fn render_splash(progress: f64) {
    const WIDTH: usize = 40;
    let filled = ((progress / 100.0) * WIDTH as f64).round() as usize;
    print!(
        "\r[{}{}] {:>3.0}%",
        "#".repeat(filled.min(WIDTH)),
        " ".repeat(WIDTH - filled.min(WIDTH)),
        progress
    );
    let _ = std::io::stdout().flush();
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let overrides = LoadingConfigOverrides {
        maximum_loading_time: Some(4000),
        ..LoadingConfigOverrides::default()
    };
    let context = LoadingContext::new(Arc::new(SystemClock::new()), &overrides)?;
    let resource_weights = context.config().resource_weights;

    let _progress = context.on_progress_update(|progress| render_splash(*progress));
    let (done_tx, done_rx) = mpsc::channel();
    let _complete = context.on_loading_complete(move |info| {
        let _ = done_tx.send(info.clone());
    });

    context.start_loading()?;
    let tracking = ResourceTracking::new(context.clone());
    for resource in PAGE {
        let weight = resource_weights.for_type(resource.resource_type);
        tracking.track(resource.url, weight, resource.resource_type);
    }

    let mut service = LoadingService::new(context.clone(), ServiceConfig::default());
    service.start();

    // Loaders report over the tracking channel, like code running off the
    // main thread would.
    let mut loaders = Vec::new();
    for resource in PAGE {
        let Some(latency) = resource.latency_ms else {
            continue;
        };
        let sender = context.tracking_sender();
        let url = resource.url.to_string();
        loaders.push(thread::spawn(move || {
            let jitter = rand::thread_rng().gen_range(0..80);
            thread::sleep(Duration::from_millis(latency + jitter));
            let _ = sender.send(TrackingCommand::MarkResourceLoaded { url });
        }));
    }

    let integration = context.animation_integration();
    let engine = EngineProbe::new(integration.clone(), "particle-field", 0.3);
    let canvas = CanvasProbe::new(integration, "liquid-background", 0.3);
    loaders.push(thread::spawn(move || {
        thread::sleep(Duration::from_millis(450));
        if let Err(e) = engine.initialize(|| Ok::<_, String>(())) {
            log::error!("Particle engine failed: {e}");
        }
        thread::sleep(Duration::from_millis(200));
        canvas.context_created(ContextKind::WebGl2);
    }));

    let info = done_rx.recv_timeout(Duration::from_secs(15))?;
    println!();
    service.stop();
    for loader in loaders {
        let _ = loader.join();
    }

    println!(
        "Loaded in {:?} ({} error(s), {} retr(ies), fallback: {})",
        info.loading_time, info.error_count, info.retry_count, info.fallback_mode
    );
    if let Some(reason) = info.fallback_reason {
        println!("Fallback: {:?} ({})", reason.reason, reason.details);
    }
    let stats = context.error_statistics();
    if stats.total_errors > 0 || stats.timeout_count > 0 {
        println!(
            "Degraded resources: {} timed out, {} failed",
            stats.timeout_count, stats.failed_resources
        );
    }
    Ok(())
}
