//! Publisher and subscriber loops behind `micronet publisher` and
//! `micronet subscriber`.

use anyhow::{Context, Result};
use micronet_client::ReconnectPolicy;
use micronet_common::Address;
use micronet_observer::{Publisher, Subscriber};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Serves subscriptions on `listen` and publishes every line of `input` as a
/// JSON string, until `input` ends or `shutdown` resolves.
pub async fn run_publisher<R, S>(listen: Address, input: R, shutdown: S) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let publisher = Publisher::new(listen.clone()).await?;
    let running = publisher.clone();
    let server = tokio::spawn(async move { running.start().await });

    let bound = publisher
        .wait_listening()
        .await
        .with_context(|| format!("publisher could not listen on {}", listen))?;
    tracing::info!("Publisher {} ready on {}", listen, bound);

    let outcome = publish_lines(&publisher, input, shutdown).await;

    publisher.stop().await;
    server.await??;
    outcome
}

async fn publish_lines<R, S>(publisher: &Publisher, input: R, shutdown: S) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("End of input");
                    return Ok(());
                };
                let delivered = publisher.publish(&line).await?;
                let subscribers = publisher.registry().subscriber_count().await;
                tracing::info!(delivered, subscribers, "Published line");
            }
            _ = &mut shutdown => {
                tracing::info!("Interrupted");
                return Ok(());
            }
        }
    }
}

/// Subscriber flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberOptions {
    pub listen: Address,
    pub publisher: Address,
    pub policy: ReconnectPolicy,
}

/// Subscribes to `options.publisher` and writes every update to `output` as
/// one JSON document per line, until `shutdown` resolves.
///
/// Unsubscribes before returning.
pub async fn run_subscriber<W, S>(options: SubscriberOptions, output: W, shutdown: S) -> Result<()>
where
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let subscriber = Subscriber::new(options.listen.clone(), options.publisher.clone()).await?;
    subscriber.set_reconnection_policy(options.policy);

    let running = subscriber.clone();
    let server = tokio::spawn(async move { running.start().await });
    subscriber
        .wait_listening()
        .await
        .with_context(|| format!("subscriber could not listen on {}", options.listen))?;

    let outcome = print_updates(&subscriber, &options, output, shutdown).await;

    let closed = subscriber.close().await;
    server.await??;
    outcome?;
    closed?;
    Ok(())
}

async fn print_updates<W, S>(
    subscriber: &Subscriber,
    options: &SubscriberOptions,
    mut output: W,
    shutdown: S,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    subscriber
        .dial()
        .await
        .with_context(|| format!("could not reach publisher {}", options.publisher))?;
    subscriber.subscribe(&options.publisher).await?;
    tracing::info!("Subscribed to {} as {}", options.publisher, subscriber.advertised_address());

    let channel = subscriber.channel();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            payload = channel.recv() => {
                let Some(payload) = payload else { break };
                let mut line = serde_json::to_vec(&payload)?;
                line.push(b'\n');
                output.write_all(&line).await?;
                output.flush().await?;
            }
            _ = &mut shutdown => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    if let Err(e) = subscriber.unsubscribe(&options.publisher).await {
        tracing::warn!(error = %e, "Unsubscribe failed");
    }
    Ok(())
}
