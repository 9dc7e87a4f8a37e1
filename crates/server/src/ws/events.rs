pub use pairchat_shared::events::{ClientEvent, ConnectionId, ReactionAction, ServerEvent};
