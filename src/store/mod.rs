//! Record collection kept under a single key of a [KeyValueStore](crate::storage::KeyValueStore).
//! See [record_store::RecordStore].

pub mod notify;
pub mod record_store;

pub use notify::{ChangeEvent, ChangeNotifier, Subscription, RECORD_UPDATED};
pub use record_store::RecordStore;
