pub const APP_NAME: &str = "PairChat";

// Limits
pub const MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 32;
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_EMOJI_LENGTH: usize = 32;

pub const HISTORY_LIMIT: i64 = 100;

// Delivery
pub const RECONCILE_WINDOW_MS: i64 = 5_000;
pub const TYPING_TIMEOUT_MS: u64 = 3_000;
pub const TEMP_ID_PREFIX: &str = "temp_";

// Placeholder shown in reply snapshots of attachment-only messages
pub const REPLY_ATTACHMENT_PLACEHOLDER: &str = "[attachment]";

// WebSocket
pub const WS_RECONNECT_ATTEMPTS: u32 = 5;
pub const WS_RECONNECT_BASE_DELAY_MS: u64 = 1_000;
pub const WS_RECONNECT_MAX_DELAY_MS: u64 = 5_000;
