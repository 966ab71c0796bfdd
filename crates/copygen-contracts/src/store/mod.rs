mod draft;
mod history;
mod kv;

pub use draft::{DraftStore, DRAFT_KEY};
pub use history::{HistoryEntry, HistoryStore, HISTORY_KEY, MAX_HISTORY};
pub use kv::KvStore;
