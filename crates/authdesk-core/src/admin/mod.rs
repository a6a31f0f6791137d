//! Admin user-management console.

pub mod users;

pub use users::{AdminUsers, AdminUsersState, DEFAULT_PAGE_SIZE};
