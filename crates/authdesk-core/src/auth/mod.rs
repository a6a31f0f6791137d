mod credential;
mod error;
mod events;
mod session;
pub mod storage;

pub use credential::Credential;
pub use error::{ErrorKind, SessionError, CONNECT_FAILED, TIMED_OUT};
pub use events::SessionEvent;
pub use session::{Session, SessionStatus, SessionStore};
pub use storage::{DurableStorage, FileStorage, KeyringStorage, MemoryStorage, StorageKey};

pub(crate) use session::SessionCell;
