use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use common_kafka::kafka_producer::{create_kafka_producer, TopicProducer};
use envconfig::Envconfig;
use health::HealthRegistry;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::Config;
use crate::generator::EventGenerator;

mod config;
mod generator;

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

fn cancel_on_signal(shutdown: CancellationToken) -> std::io::Result<()> {
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("received SIGINT"),
                Err(e) => error!(error = %e, "failed to listen for SIGINT, shutting down"),
            },
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        shutdown.cancel();
    });
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_from_env().context("failed to load configuration from env")?;

    let liveness = HealthRegistry::new("liveness");
    let producer = create_kafka_producer(
        &config.kafka,
        liveness.register("rdkafka", Duration::from_secs(30)),
    )
    .await?;
    let publisher = TopicProducer::new(
        producer,
        &config.ingest_topic,
        config.kafka.kafka_producer_ack_policy,
    );

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone())?;

    let mut generator = EventGenerator::from_entropy();
    let mut sent: u64 = 0;
    info!(topic = %config.ingest_topic, limit = ?config.event_count, "generating events");

    loop {
        if config.event_count.is_some_and(|limit| sent >= limit) {
            break;
        }

        let event = generator.next_event(Utc::now());
        match publisher.send_json(&event).await {
            Ok(()) => {
                sent += 1;
                debug!(id = event.id, event_type = %event.event_type, "sent event");
            }
            Err(e) => warn!(id = event.id, error = %e, "failed to send event"),
        }

        let delay = generator.delay(config.max_delay.0);
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    if let Err(e) = publisher.flush(config.shutdown_timeout_ms.0) {
        warn!(error = %e, "failed to flush pending events before exit");
    }
    info!(sent, "Shut down");
    Ok(())
}
