use std::sync::Arc;

use courier_core::{RequestDescriptor, Sequence, SessionId, UserAgent};

use crate::{
    TransportError,
    batcher::{Credentials, PendingResponse, RequestBatcher},
    config::ClientConfig,
    http::HttpTransport,
    notifier::{Notifier, SequenceReader},
    session::{SessionReader, SessionStore, SessionTracker},
    transport::Transport,
};

/// One client instance: batcher plus the session and sequence state it owns.
#[derive(Clone)]
pub struct CourierClient {
    batcher: RequestBatcher,
    notifier: Arc<Notifier>,
    session: Arc<SessionTracker>,
}

impl CourierClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session_store: Option<Arc<dyn SessionStore>>,
    ) -> Self {
        let notifier = Arc::new(Notifier::new());
        let session = Arc::new(SessionTracker::new(session_store));
        let credentials = Credentials {
            jwt_token: config.jwt_token,
            csrf_token: config.csrf_token,
            user_agent: config.user_agent,
        };
        let batcher = RequestBatcher::new(
            transport,
            Arc::clone(&notifier),
            Arc::clone(&session),
            credentials,
            config.max_batch_size,
        );

        Self {
            batcher,
            notifier,
            session,
        }
    }

    /// Builds a client talking to `config.origin` over HTTP.
    pub fn connect(
        config: ClientConfig,
        session_store: Option<Arc<dyn SessionStore>>,
    ) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport), session_store))
    }

    pub fn submit(&self, descriptor: RequestDescriptor) -> PendingResponse {
        self.batcher.submit(descriptor)
    }

    pub async fn flush(&self) {
        self.batcher.flush().await;
    }

    /// Installs the token returned by `Auth` for every later call.
    pub fn set_jwt_token(&self, token: Option<String>) {
        self.batcher
            .update_credentials(|credentials| credentials.jwt_token = token);
    }

    pub fn set_csrf_token(&self, token: Option<String>) {
        self.batcher
            .update_credentials(|credentials| credentials.csrf_token = token);
    }

    pub fn set_user_agent(&self, user_agent: Option<UserAgent>) {
        self.batcher
            .update_credentials(|credentials| credentials.user_agent = user_agent);
    }

    pub fn current_sequence(&self) -> Option<Sequence> {
        self.notifier.current_sequence()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.session_id()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn sequence_reader(&self) -> SequenceReader {
        self.notifier.sequence_reader()
    }

    pub fn session_reader(&self) -> SessionReader {
        self.session.reader()
    }
}
