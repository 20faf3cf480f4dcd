pub mod gateway;
pub mod models;

pub use gateway::{LogGateway, MemoryGateway, NotificationGateway, WebhookGateway};
pub use models::{NotificationError, NotificationEvent, NotificationKind};
