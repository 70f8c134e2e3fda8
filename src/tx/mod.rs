//! Transaction construction, submission and confirmation

pub mod broadcaster;
pub mod builder;
pub mod fees;
pub mod poller;

pub use broadcaster::Broadcaster;
pub use builder::{TransactionAssembler, TransactionSigner};
pub use fees::FeeStrategy;
pub use poller::ConfirmationPoller;
