//! Token payments on the Tempo blockchain.
//!
//! Takes a USD-priced order and settles it in either a stable token or a
//! custom token through two dependent TIP-20 (ERC-20 compatible) calls:
//! an `approve` up to a fixed ceiling when the payer's allowance is short,
//! then a `transfer` of the converted amount.
//!
//! # Layers
//!
//! - [`units`]: USD to fixed-point token units, hex rendering
//! - [`calldata`]: selector + 32-byte word call data
//! - [`allowance`]: allowance reads against the approval ceiling
//! - [`machine`]: the [`PaymentMachine`] phase machine
//! - [`gateway`]: the injected [`RpcGateway`] capability
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::network::EthereumWallet;
//! use alloy::providers::ProviderBuilder;
//! use alloy::signers::local::PrivateKeySigner;
//! use rust_decimal::Decimal;
//! use tokenpay::{Currency, PaymentConfig, PaymentIntent, PaymentMachine, ProviderGateway};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tokenpay::PayError> {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let payer = signer.address();
//! let spender = tokenpay::calldata::parse_address("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC")?;
//! let config = PaymentConfig {
//!     spender: Some(spender),
//!     ..PaymentConfig::default()
//! };
//! let provider = ProviderBuilder::new()
//!     .wallet(EthereumWallet::from(signer))
//!     .connect_http(config.chain.rpc_url.parse().unwrap());
//!
//! let intent = PaymentIntent::new(
//!     Decimal::new(1000, 2),
//!     Currency::StableToken,
//!     tokenpay::calldata::parse_address("0x70997970C51812dc3A010C7d01b50e0d17dc79C8")?,
//!     config.token_for(Currency::StableToken)?,
//!     payer,
//!     "order-1",
//! );
//!
//! let mut machine =
//!     PaymentMachine::connect(ProviderGateway::new(provider), intent, config).await?;
//! if !machine.sufficient() {
//!     machine.request_approval().await?;
//! }
//! let tx = machine.request_payment().await?;
//! # Ok(())
//! # }
//! ```

pub mod allowance;
pub mod calldata;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod machine;
pub mod units;

use alloy::sol;

// TIP-20 (ERC-20 compatible) surface the payment flow encodes against.
sol! {
    interface TIP20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

// Re-exports
pub use allowance::{AllowanceInspector, AllowanceState};
pub use config::PaymentConfig;
pub use constants::*;
pub use error::PayError;
pub use gateway::RpcGateway;
pub use intent::{Currency, PaymentIntent};
pub use machine::{
    Failure, FailureReason, PaymentMachine, PaymentObserver, PaymentPhase, TransactionKind,
    TransactionRecord,
};
pub use units::{ConverterConfig, ExchangeRate};

#[cfg(feature = "full")]
pub use gateway::ProviderGateway;
