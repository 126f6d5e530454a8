use reportq::prelude::*;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> ReportResult<()> {
    let mut config = ReporterConfig::development();
    config.delivery = DeliveryConfig::default().with_queue_name("error-queue");
    init_logging(&config.logging)?;

    let queues = QueueFactory::from_config(&config).await?;

    let client = Client::builder(Dsn::new("https://public@reports.example.com/1")?)
        .with_transport(TracingTransport)
        .with_extension(
            TaskQueueExtension::from_config(queues.queue.clone(), &config)
                .with_identity(StaticPlatformIdentity::new("demo-1").with_instance_id("local")),
        )
        .build()?;

    let mut pool = WorkerPool::from_config(&config, queues.source.clone());
    pool.start(
        config
            .delivery
            .queue_name
            .as_deref()
            .unwrap_or(DEFAULT_QUEUE_NAME),
    )?;

    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(2));
        for n in 1.. {
            interval.tick().await;
            let builder = EventBuilder::new()
                .with_message(format!("simulated failure #{}", n))
                .with_level(Level::Warning);
            if let Err(error) = client.capture(builder).await {
                tracing::error!("Could not capture event: {}", error);
            }
        }
    });

    println!("Reporting a simulated failure every 2s. Press Ctrl+C to stop...");
    if let Err(error) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", error);
    }

    // Stop the workers before the client goes away with the ticker, so no
    // task runs against an unregistered connection.
    pool.stop().await?;
    ticker.abort();

    println!("Stopped: {:?}", pool.stats().await);
    Ok(())
}
