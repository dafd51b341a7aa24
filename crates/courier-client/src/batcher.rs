//! Request coalescing.
//!
//! Batchable descriptors submitted during one scheduling turn share a single
//! envelope. The turn ends when the submitting task yields: the flush runs as
//! a spawned task, so on a current-thread runtime every synchronous
//! `submit` before the next `.await` lands in the same envelope. A worker
//! thread of a multi-threaded runtime would pick the flush up while the
//! submitter is still running, so batchable descriptors are refused there.
//! Singleton descriptors go out on their own wire call immediately, on any
//! runtime.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    task::{Context, Poll},
};

use courier_core::{
    BatchEnvelope, RawResponse, RequestContext, RequestDescriptor, ResponseHeader, ResponseItem,
    UserAgent,
};
use serde_json::Value;
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    sync::oneshot,
};

use crate::{
    ClientError, TransportError, notifier::Notifier, session::SessionTracker, transport::Transport,
};

/// Operation that must not carry the anti-forgery token.
const AUTH_OPERATION: &str = "Auth";

type Reply = oneshot::Sender<Result<Value, ClientError>>;

/// Credentials and identification attached to every wire call.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub jwt_token: Option<String>,
    pub csrf_token: Option<String>,
    pub user_agent: Option<UserAgent>,
}

/// Resolves with the business payload of one submitted descriptor.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<Result<Value, ClientError>>,
}

impl PendingResponse {
    fn ready(result: Result<Value, ClientError>) -> Self {
        let (reply, rx) = oneshot::channel();
        let _ = reply.send(result);
        Self { rx }
    }
}

impl Future for PendingResponse {
    type Output = Result<Value, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::Canceled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct Queued {
    descriptor: RequestDescriptor,
    reply: Reply,
}

/// Coalesces submissions into envelopes and fans results back out.
#[derive(Clone)]
pub struct RequestBatcher {
    inner: Arc<BatcherInner>,
}

struct BatcherInner {
    transport: Arc<dyn Transport>,
    notifier: Arc<Notifier>,
    session: Arc<SessionTracker>,
    credentials: RwLock<Credentials>,
    max_batch_size: Option<usize>,
    queue: Mutex<Vec<Queued>>,
}

impl RequestBatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifier: Arc<Notifier>,
        session: Arc<SessionTracker>,
        credentials: Credentials,
        max_batch_size: Option<usize>,
    ) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                transport,
                notifier,
                session,
                credentials: RwLock::new(credentials),
                max_batch_size: max_batch_size.filter(|size| *size > 0),
                queue: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queues `descriptor` and returns a future for its own result.
    ///
    /// The descriptor is enqueued before this returns; awaiting the future is
    /// not needed for it to be sent.
    pub fn submit(&self, descriptor: RequestDescriptor) -> PendingResponse {
        let Ok(runtime) = Handle::try_current() else {
            return PendingResponse::ready(Err(ClientError::NoRuntime));
        };

        let (reply, rx) = oneshot::channel();
        let queued = Queued { descriptor, reply };

        if queued.descriptor.is_batchable() {
            if runtime.runtime_flavor() != RuntimeFlavor::CurrentThread {
                tracing::warn!(
                    operation = %queued.descriptor.name,
                    "batchable request refused outside a current-thread runtime"
                );
                return PendingResponse::ready(Err(ClientError::UnsupportedRuntime));
            }
            let first_in_turn = {
                let mut queue = self.inner.queue_lock();
                queue.push(queued);
                queue.len() == 1
            };
            if first_in_turn {
                let inner = Arc::clone(&self.inner);
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    inner.flush().await;
                });
            }
        } else {
            let inner = Arc::clone(&self.inner);
            runtime.spawn(async move { inner.dispatch_single(queued).await });
        }

        PendingResponse { rx }
    }

    /// Dispatches whatever is queued now instead of waiting for the turn to end.
    pub async fn flush(&self) {
        Arc::clone(&self.inner).flush().await;
    }

    /// Replaces the credentials used by every wire call built from now on.
    pub fn update_credentials(&self, update: impl FnOnce(&mut Credentials)) {
        let mut credentials = self
            .inner
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut credentials);
    }
}

impl BatcherInner {
    fn queue_lock(&self) -> MutexGuard<'_, Vec<Queued>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(self: Arc<Self>) {
        let mut queued = std::mem::take(&mut *self.queue_lock());
        if queued.is_empty() {
            return;
        }

        let chunk_size = self.max_batch_size.unwrap_or(queued.len());
        let mut chunks = Vec::new();
        while queued.len() > chunk_size {
            let rest = queued.split_off(chunk_size);
            chunks.push(std::mem::replace(&mut queued, rest));
        }
        chunks.push(queued);

        let last = chunks.pop();
        for chunk in chunks {
            let inner = Arc::clone(&self);
            tokio::spawn(async move { inner.dispatch_batch(chunk).await });
        }
        if let Some(chunk) = last {
            self.dispatch_batch(chunk).await;
        }
    }

    async fn dispatch_batch(&self, queued: Vec<Queued>) {
        let (requests, replies): (Vec<_>, Vec<_>) = queued
            .into_iter()
            .map(|queued| (queued.descriptor, queued.reply))
            .unzip();
        let envelope = BatchEnvelope::new(requests);
        let context = self.context(None, true);

        tracing::debug!(
            size = envelope.len(),
            sequence = ?context.sequence,
            "dispatching batch"
        );
        let result = self.transport.dispatch(&envelope, &context).await;
        self.complete(&envelope, replies, result);
    }

    async fn dispatch_single(&self, queued: Queued) {
        let Queued { descriptor, reply } = queued;
        let include_csrf = descriptor.name != AUTH_OPERATION;
        let context = self.context(descriptor.account.clone(), include_csrf);

        tracing::debug!(
            operation = %descriptor.name,
            sequence = ?context.sequence,
            "dispatching single request"
        );
        let result = self.transport.dispatch_single(&descriptor, &context).await;
        self.complete(&BatchEnvelope::new(vec![descriptor]), vec![reply], result);
    }

    /// Reads session, sequence and credential state at construction time.
    fn context(&self, account: Option<String>, include_csrf: bool) -> RequestContext {
        let credentials = self
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        RequestContext {
            session_id: self.session.session_id(),
            sequence: self.notifier.current_sequence(),
            jwt_token: credentials.jwt_token.clone(),
            csrf_token: credentials.csrf_token.clone().filter(|_| include_csrf),
            user_agent: credentials.user_agent.clone(),
            account,
        }
    }

    fn complete(
        &self,
        envelope: &BatchEnvelope,
        replies: Vec<Reply>,
        result: Result<RawResponse, TransportError>,
    ) {
        match result {
            Ok(response) => {
                self.reconcile(&response.header);
                let results = align_items(envelope, response.items);
                for (reply, result) in replies.into_iter().zip(results) {
                    let _ = reply.send(result);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, size = envelope.len(), "wire call failed");
                let err = Arc::new(err);
                for reply in replies {
                    let _ = reply.send(Err(ClientError::Transport(Arc::clone(&err))));
                }
            }
        }
    }

    /// Routes header metadata before any caller is answered.
    fn reconcile(&self, header: &ResponseHeader) {
        self.session.reconcile(header.session_id.as_ref());
        if let Some(delta) = &header.notify {
            self.notifier.handle_delta(delta);
        }
        if let Some(refresh) = &header.refresh {
            self.notifier.handle_refresh(refresh);
        }
    }
}

/// Places items at their envelope position; gaps become malformed-response errors.
fn align_items(
    envelope: &BatchEnvelope,
    items: Vec<ResponseItem>,
) -> Vec<Result<Value, ClientError>> {
    let mut slots: Vec<Option<Result<Value, ClientError>>> =
        (0..envelope.len()).map(|_| None).collect();

    for item in items {
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.result.map_err(ClientError::Fault)),
            Some(_) => {
                tracing::warn!(index = item.index, "duplicate response item ignored");
            }
            None => {
                tracing::warn!(
                    index = item.index,
                    size = envelope.len(),
                    "response item outside envelope ignored"
                );
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                let operation = envelope
                    .requests
                    .get(index)
                    .map(|descriptor| descriptor.name.as_str())
                    .unwrap_or_default();
                tracing::warn!(index, operation, "response is missing item");
                Err(ClientError::MalformedResponse {
                    index,
                    detail: format!("no response item for {operation}"),
                })
            })
        })
        .collect()
}
