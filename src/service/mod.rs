pub mod deposit_service;
pub mod registry_service;
pub mod transfer_service;
pub mod wallet_service;
pub mod withdrawal_workflow;

pub use deposit_service::{DepositService, ObservedDeposit};
pub use registry_service::{NetworkLinkSpec, NewAsset, RegistryService};
pub use transfer_service::TransferService;
pub use wallet_service::{WalletService, WithdrawalRequest};
pub use withdrawal_workflow::WithdrawalWorkflow;
