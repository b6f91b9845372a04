use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    classifier::{classify, normalize_body, Action},
    domain::InboundMessage,
    messaging::types::DeliveryStatus,
    responder::{GreetOutcome, Responder},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyBatch,
    NoContent,
    FromSelf,
    NotPrivate,
}

/// What the dispatcher did with one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    Ignored(IgnoreReason),
    /// First contact: welcome and menu were sent; classification was skipped.
    Greeted {
        welcome: DeliveryStatus,
        menu: DeliveryStatus,
    },
    Replied {
        action: Action,
        deliveries: Vec<DeliveryStatus>,
    },
}

/// Routes inbound private messages to the responder.
pub struct Dispatcher {
    responder: Arc<Responder>,
}

impl Dispatcher {
    pub fn new(responder: Arc<Responder>) -> Self {
        Self { responder }
    }

    /// Only the first message of a batch is handled.
    pub async fn handle_batch(&self, batch: &[InboundMessage]) -> Dispatched {
        match batch.first() {
            Some(m) => self.handle_message(m).await,
            None => Dispatched::Ignored(IgnoreReason::EmptyBatch),
        }
    }

    pub async fn handle_message(&self, msg: &InboundMessage) -> Dispatched {
        if !msg.has_content() {
            return Dispatched::Ignored(IgnoreReason::NoContent);
        }
        if msg.key.from_me {
            return Dispatched::Ignored(IgnoreReason::FromSelf);
        }
        let to = msg.conversation();
        if !to.is_private() {
            return Dispatched::Ignored(IgnoreReason::NotPrivate);
        }

        // First contact takes precedence over whatever the message says.
        if let GreetOutcome::Handled { welcome, menu } =
            self.responder.greet_if_first_time(&to, msg).await
        {
            return Dispatched::Greeted { welcome, menu };
        }

        let action = classify(&normalize_body(msg));
        tracing::info!(conversation = %to, action = action.as_str(), "replying");

        let deliveries = match action {
            Action::Eligible => vec![self.responder.send_eligible(&to, msg).await],
            Action::Ineligible => vec![self.responder.send_ineligible(&to, msg).await],
            Action::ClarifyThenMenu => vec![
                self.responder.send_numeric_notice(&to, msg).await,
                self.responder.send_menu(&to, msg).await,
            ],
            Action::Menu => vec![self.responder.send_menu(&to, msg).await],
        };

        Dispatched::Replied { action, deliveries }
    }

    /// Handle a batch on its own task.
    ///
    /// A panic inside the handler is logged here and only ends that task;
    /// later batches are unaffected.
    pub fn spawn_batch(self: &Arc<Self>, batch: Vec<InboundMessage>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let inner = tokio::spawn(async move { this.handle_batch(&batch).await });
        tokio::spawn(async move {
            match inner.await {
                Ok(Dispatched::Ignored(reason)) => {
                    tracing::debug!(?reason, "inbound message ignored");
                }
                Ok(_) => {}
                Err(e) => tracing::error!("message handler failed: {e}"),
            }
        })
    }
}
