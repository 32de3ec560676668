pub mod bus;

pub use bus::{Callback, EventBus, SubscriptionId};
