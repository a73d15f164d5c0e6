//! Shared constants used across the client

/// Maximum number of words accepted in a single chat message.
/// The backend enforces the same cap, so rejecting locally saves a round trip.
pub const MAX_CHAT_INPUT_WORDS: usize = 100;

/// Number of trailing history entries sent with each chat request.
/// Local history is never truncated; only the transmitted slice is.
pub const CHAT_CONTEXT_WINDOW: usize = 10;

/// Key under which the active session record is persisted.
pub const SESSION_STORAGE_KEY: &str = "jarvis_session";

/// Request header carrying the caller's persona id.
pub const IDENTITY_HEADER: &str = "X-Persona";

/// Identity sent when no session is active.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Route the navigator is sent to when a session is required but absent.
pub const LOGIN_ROUTE: &str = "/login";

/// Channel id prefix for agent run streams (`agent/<run id>`).
pub const RUN_CHANNEL_PREFIX: &str = "agent";

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_REALTIME_BASE: &str = "ws://localhost:8000/ws";

/// Declared retry budget for requests. Loaded into config but not applied by
/// `ApiClient::request`, which always makes a single attempt.
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Declared request timeout in milliseconds. Not applied; see `DEFAULT_MAX_RETRY`.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
