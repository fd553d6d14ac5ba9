pub mod approval_service;
pub mod ledger_service;
pub mod sync_service;

pub use approval_service::ApprovalService;
pub use ledger_service::LedgerService;
pub use sync_service::SyncService;
