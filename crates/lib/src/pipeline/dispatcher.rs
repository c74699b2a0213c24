//! Bounded relay worker pool.
//!
//! Webhook handlers submit messages into a bounded queue; a dispatch loop runs each message
//! (generate, then reply) as its own task, at most `workers` at a time. Tasks are detached
//! from the HTTP request that submitted them. Each finished task publishes a [`DispatchOutcome`].

use crate::channels::Message;
use crate::config::DispatchConfig;
use crate::llm::{GenerationRequest, GenerationResult, Generator};
use crate::pipeline::reply::{ReplyOutcome, ReplySender};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

const OUTCOME_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch queue is full")]
    Saturated,
    #[error("dispatcher is shut down")]
    Closed,
}

/// Result of relaying one message.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub message_id: String,
    pub recipient_id: String,
    pub result: GenerationResult,
    pub reply: ReplyOutcome,
}

/// Submission side of the pool. Cheap to clone; the loop stops once every clone is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Message>,
    outcomes: broadcast::Sender<DispatchOutcome>,
}

impl Dispatcher {
    /// Spawn the dispatch loop. The returned handle completes after the queue is closed and
    /// every in-flight message has been relayed.
    pub fn start(
        config: &DispatchConfig,
        generator: Arc<dyn Generator>,
        replies: ReplySender,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (outcomes, _) = broadcast::channel(OUTCOME_BUFFER);
        let workers = Arc::new(Semaphore::new(config.workers.max(1)));
        let handle = tokio::spawn(run_dispatch_loop(
            rx,
            workers,
            generator,
            replies,
            outcomes.clone(),
        ));
        (Self { tx, outcomes }, handle)
    }

    /// Queue every message of one delivery, or none of them.
    pub fn submit(&self, messages: Vec<Message>) -> Result<usize, DispatchError> {
        let mut permits = Vec::with_capacity(messages.len());
        for _ in 0..messages.len() {
            match self.tx.try_reserve() {
                Ok(permit) => permits.push(permit),
                Err(TrySendError::Full(())) => return Err(DispatchError::Saturated),
                Err(TrySendError::Closed(())) => return Err(DispatchError::Closed),
            }
        }
        let count = messages.len();
        for (permit, message) in permits.into_iter().zip(messages) {
            permit.send(message);
        }
        Ok(count)
    }

    /// Observe finished relays.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchOutcome> {
        self.outcomes.subscribe()
    }
}

async fn run_dispatch_loop(
    mut rx: mpsc::Receiver<Message>,
    workers: Arc<Semaphore>,
    generator: Arc<dyn Generator>,
    replies: ReplySender,
    outcomes: broadcast::Sender<DispatchOutcome>,
) {
    let mut tasks = JoinSet::new();
    while let Some(message) = rx.recv().await {
        let Ok(permit) = workers.clone().acquire_owned().await else {
            break;
        };
        let generator = generator.clone();
        let replies = replies.clone();
        let outcomes = outcomes.clone();
        tasks.spawn(async move {
            let outcome = relay_message(message, generator.as_ref(), &replies).await;
            drop(permit);
            let _ = outcomes.send(outcome);
        });
        while let Some(done) = tasks.try_join_next() {
            log_join_error(done);
        }
    }
    while let Some(done) = tasks.join_next().await {
        log_join_error(done);
    }
    log::info!("dispatcher: queue closed, all relays finished");
}

fn log_join_error(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        log::warn!("dispatcher: relay task failed: {}", e);
    }
}

/// Generate a reply for one message and send it. History is always empty.
async fn relay_message(
    message: Message,
    generator: &dyn Generator,
    replies: &ReplySender,
) -> DispatchOutcome {
    let request = GenerationRequest {
        user_id: message.sender_id.clone(),
        message_text: message.text,
        history: Vec::new(),
    };
    let result = generator.generate(&request).await;
    let reply = replies.reply(&message.sender_id, &result).await;
    DispatchOutcome {
        message_id: message.id,
        recipient_id: message.sender_id,
        result,
        reply,
    }
}
