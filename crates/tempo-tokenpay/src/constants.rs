use alloy::primitives::{Address, TxHash};
use rust_decimal::Decimal;

/// Tempo Moderato chain ID.
pub const TEMPO_CHAIN_ID: u64 = 42431;

/// pathUSD token address on Tempo Moderato testnet. The default stable token.
pub const DEFAULT_STABLE_TOKEN: Address = Address::new([
    0x20, 0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
]);

/// Payload precision for stable-token transfers (pathUSD has 6 decimal places).
pub const STABLE_DECIMALS: u32 = 6;

/// Payload precision for custom-token transfers.
pub const DISPLAY_DECIMALS: u32 = 6;

/// Base-unit precision of the custom token. The approval ceiling is expressed
/// in these units.
pub const CUSTOM_TOKEN_BASE_DECIMALS: u32 = 18;

/// Whole tokens granted by a single approval.
pub const APPROVAL_CEILING_TOKENS: u64 = 1_000_000_000;

/// USD per custom token: 0.00019962222061040273.
pub const DEFAULT_EXCHANGE_RATE: Decimal = Decimal::from_parts(48_247_441, 4_647_817, 0, false, 20);

/// Default RPC endpoint for Tempo Moderato.
pub const RPC_URL: &str = "https://rpc.moderato.tempo.xyz";

/// Block explorer base URL.
pub const EXPLORER_BASE: &str = "https://explore.moderato.tempo.xyz";

/// Runtime chain configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub stable_token: Address,
    pub rpc_url: String,
    pub explorer_base: String,
}

impl ChainConfig {
    /// Explorer page for a submitted transaction.
    pub fn explorer_tx_url(&self, tx: &TxHash) -> String {
        format!("{}/tx/{tx}", self.explorer_base.trim_end_matches('/'))
    }
}

impl Default for ChainConfig {
    /// Defaults to Tempo Moderato configuration.
    fn default() -> Self {
        Self {
            chain_id: TEMPO_CHAIN_ID,
            stable_token: DEFAULT_STABLE_TOKEN,
            rpc_url: RPC_URL.to_string(),
            explorer_base: EXPLORER_BASE.to_string(),
        }
    }
}
