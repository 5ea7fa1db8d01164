//! Chain identifiers on the wire
//!
//! The domain carries chain ids as string tokens (`SUI_TESTNET`); the ledger
//! encodes them as enum integers. Conversion happens only here.

use super::LedgerError;

const CHAINS: &[(&str, i32)] = &[
    ("SUI_DEVNET", 0),
    ("SUI_TESTNET", 1),
    ("SUI_MAINNET", 2),
    ("APTOS_TESTNET", 3),
    ("APTOS_MAINNET", 4),
    ("ETH_TESTNET", 5),
    ("ETH_MAINNET", 6),
    ("BSC_TESTNET", 7),
    ("BSC_MAINNET", 8),
];

pub fn known_chains() -> impl Iterator<Item = &'static str> {
    CHAINS.iter().map(|(name, _)| *name)
}

pub fn chain_to_wire(chain: &str) -> Result<i32, LedgerError> {
    CHAINS
        .iter()
        .find(|(name, _)| *name == chain)
        .map(|(_, value)| *value)
        .ok_or_else(|| LedgerError::UnknownChain(chain.to_string()))
}

pub fn chain_from_wire(value: i32) -> Result<&'static str, LedgerError> {
    CHAINS
        .iter()
        .find(|(_, v)| *v == value)
        .map(|(name, _)| *name)
        .ok_or(LedgerError::UnknownChainValue(value))
}

pub fn chains_to_wire<S: AsRef<str>>(chains: &[S]) -> Result<Vec<i32>, LedgerError> {
    chains.iter().map(|c| chain_to_wire(c.as_ref())).collect()
}

pub fn chains_from_wire(values: &[i32]) -> Result<Vec<String>, LedgerError> {
    values
        .iter()
        .map(|v| chain_from_wire(*v).map(str::to_string))
        .collect()
}
