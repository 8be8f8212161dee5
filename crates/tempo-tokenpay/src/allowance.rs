use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::calldata::{decode_uint256, encode_allowance_query};
use crate::gateway::RpcGateway;
use crate::PayError;

/// Result of one allowance read against the ceiling. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceState {
    pub current: U256,
    /// `current >= ceiling`
    pub sufficient: bool,
}

/// Reads `allowance(owner, spender)` on a token and compares it to the
/// approval ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceInspector {
    token: Address,
    owner: Address,
    spender: Address,
    ceiling: U256,
}

impl AllowanceInspector {
    pub fn new(token: Address, owner: Address, spender: Address, ceiling: U256) -> Self {
        Self {
            token,
            owner,
            spender,
            ceiling,
        }
    }

    pub fn ceiling(&self) -> U256 {
        self.ceiling
    }

    pub fn spender(&self) -> Address {
        self.spender
    }

    pub fn assess(&self, current: U256) -> AllowanceState {
        AllowanceState {
            current,
            sufficient: current >= self.ceiling,
        }
    }

    /// Query the current allowance. Read-only and safe to repeat; any gateway
    /// or decoding failure comes back as [`PayError::Query`].
    pub async fn query<G: RpcGateway>(&self, gateway: &G) -> Result<AllowanceState, PayError> {
        let data = encode_allowance_query(self.owner, self.spender);
        let raw = gateway
            .call(self.token, data)
            .await
            .map_err(|e| PayError::Query(e.to_string()))?;
        let current = decode_uint256(&raw)?;

        let state = self.assess(current);
        tracing::debug!(
            token = %self.token,
            owner = %self.owner,
            spender = %self.spender,
            current = %state.current,
            sufficient = state.sufficient,
            "allowance read"
        );
        Ok(state)
    }
}
