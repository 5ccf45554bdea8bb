//! Lottery contract bindings
//!
//! The contract interface is fixed, so calldata is encoded by hand from the
//! function signatures below and return data is decoded word by word.
//!
//! ```text
//! getBalance()            -> uint256
//! getParticipantsCount()  -> uint256
//! manager()               -> address
//! participants(uint256)   -> address
//! selectWinner()
//! receive() payable
//! ```

use alloy_primitives::{Address, U256};
use tiny_keccak::{Hasher, Keccak};

/// ABI word size in bytes
pub const WORD: usize = 32;

/// `getBalance()`
pub const GET_BALANCE: &str = "getBalance()";
/// `getParticipantsCount()`
pub const GET_PARTICIPANTS_COUNT: &str = "getParticipantsCount()";
/// `manager()`
pub const MANAGER: &str = "manager()";
/// `participants(uint256)`
pub const PARTICIPANTS: &str = "participants(uint256)";
/// `selectWinner()`
pub const SELECT_WINNER: &str = "selectWinner()";

/// Errors decoding contract return data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    /// Return data was not valid hex
    #[error("invalid hex in return data: {0}")]
    Hex(String),
    /// Return data shorter than one word
    #[error("return data too short: {0} bytes")]
    Short(usize),
    /// Address word has non-zero upper bytes
    #[error("dirty address padding")]
    DirtyAddress,
}

/// Compute keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Four-byte function selector for a canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for `getBalance()`
pub fn get_balance_call() -> Vec<u8> {
    selector(GET_BALANCE).to_vec()
}

/// Calldata for `getParticipantsCount()`
pub fn get_participants_count_call() -> Vec<u8> {
    selector(GET_PARTICIPANTS_COUNT).to_vec()
}

/// Calldata for `manager()`
pub fn manager_call() -> Vec<u8> {
    selector(MANAGER).to_vec()
}

/// Calldata for `participants(index)`
pub fn participants_call(index: U256) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(4 + WORD);
    calldata.extend_from_slice(&selector(PARTICIPANTS));
    calldata.extend_from_slice(&index.to_be_bytes::<WORD>());
    calldata
}

/// Calldata for `selectWinner()`
pub fn select_winner_call() -> Vec<u8> {
    selector(SELECT_WINNER).to_vec()
}

/// Format bytes as 0x-prefixed hex for JSON-RPC
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decode 0x-prefixed hex returned by `eth_call`
pub fn from_hex(data: &str) -> Result<Vec<u8>, AbiError> {
    hex::decode(data.trim_start_matches("0x")).map_err(|e| AbiError::Hex(e.to_string()))
}

/// Decode a single `uint256` return value
pub fn decode_uint(data: &[u8]) -> Result<U256, AbiError> {
    let word = first_word(data)?;
    Ok(U256::from_be_slice(word))
}

/// Decode a single `address` return value
pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    let word = first_word(data)?;
    if word[..12].iter().any(|&b| b != 0) {
        return Err(AbiError::DirtyAddress);
    }
    Ok(Address::from_slice(&word[12..]))
}

fn first_word(data: &[u8]) -> Result<&[u8], AbiError> {
    data.get(..WORD).ok_or(AbiError::Short(data.len()))
}
