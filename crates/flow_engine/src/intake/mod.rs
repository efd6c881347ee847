mod adapter;
mod recent_ids;
mod types;

pub use adapter::{derive_message_id, normalize_event};
pub use recent_ids::{RecentIds, RECENT_IDS_CAPACITY, RECENT_IDS_EVICT_BATCH};
pub use types::{ChatMessage, Fragment, InboundEvent, InboundFragment, Rank, StreamId};
