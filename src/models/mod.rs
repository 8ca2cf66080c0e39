pub mod order;
pub mod queue_item;
pub mod row;
pub mod store;

pub use order::{LineItem, OrderPayload};
pub use queue_item::{FailedOrder, NewQueueItem, QueueAction, QueueItem};
pub use row::OrderRow;
pub use store::Store;
