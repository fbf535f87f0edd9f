//! 领域错误
//!
//! 所有账本操作返回 `WalletError`；持久化适配器负责把驱动错误翻译为这里的类型，
//! 交付层只根据 `kind()` / `code()` 做映射。

use thiserror::Error;

pub type WalletResult<T> = Result<T, WalletError>;

/// 错误大类（稳定值，供 HTTP 层映射）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    InsufficientFunds,
    Internal,
    NotImplemented,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    // 资产 / 网络
    #[error("asset not found")]
    AssetNotFound,
    #[error("asset is not supported on the specified network")]
    AssetNotSupportedOnNetwork,
    #[error("asset symbol and name are required")]
    AssetFieldsRequired,
    #[error("asset type must be CRYPTO or FIAT")]
    InvalidAssetType,
    #[error("asset precision must be between 0 and 18")]
    InvalidPrecision,
    #[error("asset is not active")]
    AssetInactive,
    #[error("asset with the same symbol or name already exists")]
    DuplicateAsset,
    #[error("asset is already linked to this network")]
    DuplicateAssetNetwork,
    #[error("network not found")]
    NetworkNotFound,
    #[error("network name and rpc_url are required")]
    NetworkFieldsRequired,
    #[error("network with the same name already exists")]
    DuplicateNetwork,

    // 账户 / 余额
    #[error("account not found")]
    AccountNotFound,
    #[error("user id cannot be empty")]
    UserIdRequired,
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient locked balance")]
    InsufficientLockedBalance,

    // 充值
    #[error("deposit not found")]
    DepositNotFound,
    #[error("deposit with the same on-chain transaction already recorded")]
    DuplicateDeposit,
    #[error("on-chain transaction id cannot be empty")]
    TxIdRequired,
    #[error("address cannot be empty")]
    AddressRequired,
    #[error("deposit address not found")]
    DepositAddressNotFound,
    #[error("account already has a deposit address, or the address is taken")]
    DuplicateDepositAddress,

    // 提现
    #[error("withdrawal not found")]
    WithdrawalNotFound,
    #[error("withdrawal amount is below the minimum limit")]
    WithdrawalAmountTooLow,
    #[error("withdrawal address cannot be empty")]
    WithdrawalAddressRequired,
    #[error("approver cannot be empty")]
    ApproverRequired,
    #[error("invalid withdrawal transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("withdrawal already broadcasted with a different transaction id")]
    TxIdMismatch,

    // 内部转账
    #[error("cannot transfer to the same account")]
    CannotTransferToSameAccount,
    #[error("internal transfer not found")]
    TransferNotFound,
    #[error("internal transfer with the same reference already exists")]
    DuplicateTransfer,

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        use WalletError::*;

        match self {
            AssetNotFound | NetworkNotFound | AccountNotFound | DepositNotFound
            | DepositAddressNotFound | WithdrawalNotFound | TransferNotFound => ErrorKind::NotFound,

            AssetNotSupportedOnNetwork | AssetFieldsRequired | InvalidAssetType
            | InvalidPrecision | AssetInactive | NetworkFieldsRequired | UserIdRequired
            | InvalidAmount | TxIdRequired | AddressRequired | WithdrawalAmountTooLow
            | WithdrawalAddressRequired | ApproverRequired | CannotTransferToSameAccount => {
                ErrorKind::Validation
            }

            DuplicateAsset | DuplicateAssetNetwork | DuplicateNetwork | DuplicateDeposit
            | DuplicateDepositAddress | DuplicateTransfer | InvalidTransition { .. }
            | TxIdMismatch => ErrorKind::Conflict,

            InsufficientBalance | InsufficientLockedBalance => ErrorKind::InsufficientFunds,

            NotImplemented(_) => ErrorKind::NotImplemented,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// 稳定的错误码（snake_case）
    pub fn code(&self) -> &'static str {
        use WalletError::*;

        match self {
            AssetNotFound => "asset_not_found",
            AssetNotSupportedOnNetwork => "asset_not_supported_on_network",
            AssetFieldsRequired => "asset_fields_required",
            InvalidAssetType => "invalid_asset_type",
            InvalidPrecision => "invalid_precision",
            AssetInactive => "asset_inactive",
            DuplicateAsset => "duplicate_asset",
            DuplicateAssetNetwork => "duplicate_asset_network",
            NetworkNotFound => "network_not_found",
            NetworkFieldsRequired => "network_fields_required",
            DuplicateNetwork => "duplicate_network",
            AccountNotFound => "account_not_found",
            UserIdRequired => "user_id_required",
            InvalidAmount => "invalid_amount",
            InsufficientBalance => "insufficient_balance",
            InsufficientLockedBalance => "insufficient_locked_balance",
            DepositNotFound => "deposit_not_found",
            DuplicateDeposit => "duplicate_deposit",
            TxIdRequired => "tx_id_required",
            AddressRequired => "address_required",
            DepositAddressNotFound => "deposit_address_not_found",
            DuplicateDepositAddress => "duplicate_deposit_address",
            WithdrawalNotFound => "withdrawal_not_found",
            WithdrawalAmountTooLow => "withdrawal_amount_too_low",
            WithdrawalAddressRequired => "withdrawal_address_required",
            ApproverRequired => "approver_required",
            InvalidTransition { .. } => "invalid_transition",
            TxIdMismatch => "tx_id_mismatch",
            CannotTransferToSameAccount => "cannot_transfer_to_same_account",
            TransferNotFound => "transfer_not_found",
            DuplicateTransfer => "duplicate_transfer",
            NotImplemented(_) => "not_implemented",
            Internal(_) => "internal",
        }
    }
}
