//! Port Traffic Watcher
//!
//! Watches forwarded local ports, keeps a rolling traffic history for each,
//! and logs a throughput summary at a fixed interval.

mod settings;
mod summary;

use std::time::{Duration, SystemTime};

use settings::Settings;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use traffic_buffer::{BufferEvent, TrafficBuffer};
use traffic_sim::SimulatedSource;

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trafficwatch=info,traffic_buffer=info,traffic_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting trafficwatch");

    let mut settings = Settings::load();
    if Settings::settings_path().is_some_and(|p| !p.exists()) {
        // Write defaults so there is a file to edit
        if let Err(e) = settings.save() {
            warn!("{}", e);
        }
    }
    for arg in settings.apply_port_args(std::env::args().skip(1)) {
        warn!("Ignoring argument {:?}: not a port number", arg);
    }

    let source = SimulatedSource::new();
    for port in &settings.ports {
        source.add_port(port.key(), port.profile);
    }

    let buffer = TrafficBuffer::with_config(source, settings.buffer.clone()).map_err(|e| {
        error!("{}", e);
        e.to_string()
    })?;
    let mut events = buffer.subscribe();

    for port in &settings.ports {
        buffer.start_monitoring(port.key()).map_err(|e| e.to_string())?;
    }

    let summary_every = Duration::from_secs(settings.summary_interval_secs.max(1));
    let mut summary_timer = interval(summary_every);
    summary_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutdown requested");
                break;
            }

            _ = summary_timer.tick() => {
                let now = SystemTime::now();
                for port in &settings.ports {
                    let name = port.display_name();
                    if let Some(line) = buffer.with_record(&port.key(), |record| {
                        summary::summarize(&name, record, now, summary_every)
                    }) {
                        info!("{}", line);
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(BufferEvent::FetchFailed { key, message }) => {
                        debug!("Tick for {} failed: {}", key, message);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        debug!("Event stream lagged, skipped {} events", n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    buffer.stop_all();
    info!("trafficwatch stopped");
    Ok(())
}
