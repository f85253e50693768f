use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use common_kafka::kafka_consumer::SingleTopicConsumer;
use common_kafka::kafka_producer::{create_kafka_producer, TopicProducer};
use enrichment_pipeline::{
    api::add_routes,
    app_context::AppContext,
    config::Config,
    event::Event,
    server::{serve, setup_metrics_routes},
    stage::{Publisher, Stage},
};
use envconfig::Envconfig;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// A stage or the kafka client must report at least this often to stay live
const LIVENESS_DEADLINE: Duration = Duration::from_secs(30);

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("received SIGINT");
        }
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_from_env().context("failed to load configuration from env")?;
    let stages = config.pipeline_stages.stages.clone();
    if stages.is_empty() {
        anyhow::bail!("PIPELINE_STAGES must name at least one stage");
    }
    info!(?stages, "configured pipeline stages");

    let context = Arc::new(AppContext::new(&config).await?);
    let shutdown = CancellationToken::new();

    let needs_producer = stages
        .iter()
        .any(|stage| config.topics.route(*stage).1.is_some());
    let producer = if needs_producer {
        let handle = context.liveness.register("rdkafka", LIVENESS_DEADLINE);
        Some(create_kafka_producer(&config.kafka, handle).await?)
    } else {
        None
    };

    let mut running = Vec::with_capacity(stages.len());
    let mut publishers = Vec::new();
    for kind in stages {
        let (input, output) = config.topics.route(kind);
        let consumer = SingleTopicConsumer::new(
            &config.kafka,
            &config.consumer,
            &config.consumer.group_for(kind.as_str()),
            input,
        )?;

        let publisher: Option<Arc<dyn Publisher>> = match (output, &producer) {
            (Some(topic), Some(producer)) => {
                let publisher = TopicProducer::new(
                    producer.clone(),
                    topic,
                    config.kafka.kafka_producer_ack_policy,
                );
                publishers.push(publisher.clone());
                Some(Arc::new(publisher))
            }
            _ => None,
        };

        let stage = Stage::new(
            context.enrichment(kind)?,
            publisher,
            config.stage_poll_interval_ms.0,
            context.liveness.register(kind.as_str(), LIVENESS_DEADLINE),
        );
        info!(stage = %kind, input, output, "starting stage");
        let source = consumer.json_stream::<Event>();
        running.push((kind, tokio::spawn(stage.run(source, shutdown.clone()))));
    }

    let router = setup_metrics_routes(add_routes(Router::new(), context.clone()))?;
    let bind = config.bind();
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = serve(router, &bind, server_shutdown.cancelled_owned()).await {
            error!(error = %e, "http server failed");
        }
    });
    info!(bind = config.bind(), "listening");

    if let Err(e) = wait_for_shutdown_signal().await {
        error!(error = %e, "failed to wait for shutdown signals, shutting down");
    }
    shutdown.cancel();

    for (kind, handle) in running {
        match handle.await {
            Ok(summary) => info!(stage = %kind, ?summary, "stage finished"),
            Err(e) => error!(stage = %kind, error = %e, "stage task failed"),
        }
    }
    if let Err(e) = server.await {
        error!(error = %e, "http server task failed");
    }

    // All topic producers share one client, flushing any of them flushes it
    if let Some(publisher) = publishers.first() {
        if let Err(e) = publisher.flush(config.shutdown_timeout_ms.0) {
            warn!(error = %e, "failed to flush pending events before exit");
        }
    }

    info!("Shut down");
    Ok(())
}
