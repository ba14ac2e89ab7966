pub mod account;
pub use account::{Account, Deletion, DeletionReport};
