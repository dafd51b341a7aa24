use courier_core::UserAgent;

/// Default server origin.
pub const DEFAULT_ORIGIN: &str = "https://localhost";
/// Default SOAP service path.
pub const DEFAULT_SOAP_PATH: &str = "/service/soap";

/// Settings shared by every request a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme and host of the server.
    pub origin: String,
    /// SOAP service path appended to the origin.
    pub soap_path: String,
    /// Opaque bearer credential sent in every header.
    pub jwt_token: Option<String>,
    /// Anti-forgery token sent on all calls except authentication.
    pub csrf_token: Option<String>,
    /// Client identification sent in every header.
    pub user_agent: Option<UserAgent>,
    /// Upper bound on requests per envelope; `None` is unbounded.
    pub max_batch_size: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            soap_path: DEFAULT_SOAP_PATH.to_string(),
            jwt_token: None,
            csrf_token: None,
            user_agent: None,
            max_batch_size: None,
        }
    }
}
