pub mod errors;
pub mod ids;
pub mod paths;
pub mod protocol;

pub use errors::Fault;
pub use ids::{Sequence, SessionId};
pub use paths::default_state_dir;
pub use protocol::{
    BatchEnvelope, ChangeRecord, Namespace, NotificationDelta, RawResponse, RefreshSnapshot,
    RequestContext, RequestDescriptor, ResponseHeader, ResponseItem, TransportOptions, UserAgent,
};
