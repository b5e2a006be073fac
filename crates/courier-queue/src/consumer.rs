//! Concurrent consumer pool.
//!
//! One reader task long-polls the broker and feeds a bounded channel; a
//! fixed pool of worker tasks drains it. A message is deleted (acked) when
//! its handler returns `Ok`; on error the receipt is left to time out so
//! the broker redelivers. Undecodable payloads are acked immediately so a
//! poison message cannot loop forever.
//!
//! Shutdown: cancelling the token stops the reader, which closes the
//! channel; workers drain what was already fetched and exit. Callers bound
//! the drain with a timeout.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, ReceiveOptions, ReceivedMessage};

/// Error type handlers report back to the pool. The pool only cares
/// whether handling succeeded, so any error works.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Pool sizing and receive parameters.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerOptions {
    pub receive: ReceiveOptions,
    /// Number of concurrent worker tasks.
    pub concurrency: usize,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            receive: ReceiveOptions::default(),
            concurrency: 20,
        }
    }
}

/// Reader + worker-pool consumer over a [`Broker`].
pub struct ConsumerPool {
    broker: Arc<dyn Broker>,
    options: ConsumerOptions,
    shutdown: CancellationToken,
}

impl ConsumerPool {
    #[must_use]
    pub fn new(
        broker: Arc<dyn Broker>,
        options: ConsumerOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            options,
            shutdown,
        }
    }

    /// Run until the shutdown token fires and in-flight work drains.
    ///
    /// `handler` is invoked once per decoded payload; it must be
    /// idempotent because the broker redelivers on missed acks.
    pub async fn run<T, H, Fut>(self, handler: H)
    where
        T: DeserializeOwned + Send + 'static,
        H: Fn(T) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = Result<(), HandlerError>> + Send,
    {
        let concurrency = self.options.concurrency.max(1);
        let (tx, rx) = mpsc::channel::<ReceivedMessage>(concurrency * 2);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let rx = Arc::clone(&rx);
            let broker = Arc::clone(&self.broker);
            let handler = handler.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    // Hold the lock only for the dequeue itself.
                    let message = { rx.lock().await.recv().await };
                    let Some(message) = message else {
                        break; // channel closed: reader is gone, drain done
                    };

                    match serde_json::from_str::<T>(&message.body) {
                        Err(e) => {
                            // Bad payload: ack so it cannot redrive forever.
                            tracing::warn!(
                                target: "queue_consumer",
                                error = %e,
                                "Dropping undecodable message"
                            );
                            ack(&*broker, &message.receipt).await;
                        }
                        Ok(payload) => match handler(payload).await {
                            Ok(()) => ack(&*broker, &message.receipt).await,
                            Err(e) => {
                                // No ack: the broker redelivers after the
                                // visibility timeout.
                                tracing::error!(
                                    target: "queue_consumer",
                                    error = %e,
                                    "Handler failed; leaving message for redelivery"
                                );
                            }
                        },
                    }
                }
            }));
        }

        self.read_loop(tx).await;

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(target: "queue_consumer", error = %e, "Worker task panicked");
            }
        }
    }

    /// Fetch messages and feed the worker channel until shutdown.
    async fn read_loop(&self, tx: mpsc::Sender<ReceivedMessage>) {
        loop {
            let batch = tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::info!(target: "queue_consumer", "Reader shutting down");
                    return;
                }
                result = self.broker.receive(&self.options.receive) => result,
            };

            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(target: "queue_consumer", error = %e, "Receive failed");
                    tokio::select! {
                        () = self.shutdown.cancelled() => return,
                        () = tokio::time::sleep(Duration::from_millis(500)) => continue,
                    }
                }
            };

            for message in batch {
                tokio::select! {
                    () = self.shutdown.cancelled() => return,
                    sent = tx.send(message) => {
                        if sent.is_err() {
                            return; // all workers gone
                        }
                    }
                }
            }
        }
    }
}

async fn ack(broker: &dyn Broker, receipt: &str) {
    if let Err(e) = broker.delete(receipt).await {
        tracing::error!(target: "queue_consumer", error = %e, "Failed to ack message");
    }
}
