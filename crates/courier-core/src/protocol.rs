use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Fault, Sequence, SessionId};

/// Logical API area a request belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Mailbox operations.
    #[default]
    Mail,
    /// Account and preference operations.
    Account,
    /// Administrative operations.
    Admin,
    /// Device sync operations.
    Sync,
    /// Voice mail operations.
    Voice,
}

impl Namespace {
    /// Returns the `_jsns` urn used on the wire.
    pub fn urn(self) -> &'static str {
        match self {
            Namespace::Mail => "urn:zimbraMail",
            Namespace::Account => "urn:zimbraAccount",
            Namespace::Admin => "urn:zimbraAdmin",
            Namespace::Sync => "urn:zimbraSync",
            Namespace::Voice => "urn:zimbraVoice",
        }
    }
}

/// Per-call transport knobs; the core never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Overall timeout applied by the transport.
    pub timeout: Option<Duration>,
}

/// A single remote call as shaped by an operation builder.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Remote verb without the `Request` suffix, e.g. `GetFolder`.
    pub name: String,
    /// Target API area.
    pub namespace: Namespace,
    /// Opaque request body.
    pub body: Value,
    /// Forces a dedicated wire call.
    pub single_request: bool,
    /// Account to act as; forces a dedicated wire call.
    pub account: Option<String>,
    /// Extra HTTP headers.
    pub headers: BTreeMap<String, String>,
    /// Transport options for this call.
    pub transport_options: Option<TransportOptions>,
}

impl RequestDescriptor {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            namespace: Namespace::default(),
            body,
            single_request: false,
            account: None,
            headers: BTreeMap::new(),
            transport_options: None,
        }
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn single(mut self) -> Self {
        self.single_request = true;
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn transport_options(mut self, options: TransportOptions) -> Self {
        self.transport_options = Some(options);
        self
    }

    /// True when the descriptor may share an envelope with others.
    pub fn is_batchable(&self) -> bool {
        !self.single_request && self.account.is_none()
    }
}

/// Descriptors dispatched together as one wire call.
///
/// Transports must answer with items aligned positionally to `requests`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchEnvelope {
    pub requests: Vec<RequestDescriptor>,
}

impl BatchEnvelope {
    pub fn new(requests: Vec<RequestDescriptor>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestDescriptor> {
        self.requests.iter()
    }
}

/// Client identification sent in the request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Metadata attached to one outgoing wire call.
///
/// Built immediately before dispatch from the current session and sequence
/// state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Sticky session to echo.
    pub session_id: Option<SessionId>,
    /// Last notification sequence observed; `None` asks for a full baseline.
    pub sequence: Option<Sequence>,
    /// Opaque bearer credential.
    pub jwt_token: Option<String>,
    /// Anti-forgery token; omitted for authentication calls.
    pub csrf_token: Option<String>,
    /// Client identification.
    pub user_agent: Option<UserAgent>,
    /// Account to act as, for delegated single calls.
    pub account: Option<String>,
}

/// One incremental change carried by a notification delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeRecord {
    /// A new object appeared.
    Created {
        /// Wire object kind, e.g. `m` or `folder`.
        kind: String,
        /// Raw object payload.
        object: Value,
    },
    /// An existing object changed.
    Modified {
        /// Wire object kind.
        kind: String,
        /// Raw object payload carrying only changed fields.
        object: Value,
    },
    /// Objects were removed.
    Deleted {
        /// Removed object ids.
        ids: Vec<String>,
    },
}

/// Incremental notification tagged with a sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDelta {
    /// Server sequence number of this delta.
    pub sequence: Sequence,
    /// Changes in application order.
    pub changes: Vec<ChangeRecord>,
}

/// Full-baseline notification that supersedes every prior delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSnapshot {
    /// Sequence number the baseline corresponds to.
    pub sequence: Sequence,
    /// Raw replacement state.
    pub state: Value,
}

/// Reconciliation metadata extracted from a response header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseHeader {
    pub session_id: Option<SessionId>,
    pub notify: Option<NotificationDelta>,
    pub refresh: Option<RefreshSnapshot>,
}

/// Outcome for the descriptor at `index` within its envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseItem {
    pub index: usize,
    pub result: Result<Value, Fault>,
}

impl ResponseItem {
    pub fn body(index: usize, body: Value) -> Self {
        Self {
            index,
            result: Ok(body),
        }
    }

    pub fn fault(index: usize, fault: Fault) -> Self {
        Self {
            index,
            result: Err(fault),
        }
    }
}

/// Decoded transport response: header metadata plus per-item outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub header: ResponseHeader,
    pub items: Vec<ResponseItem>,
}
