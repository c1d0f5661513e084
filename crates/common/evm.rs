use ethereum_types::{Address, H256};
use rlp::RlpStream;

use crate::utils::keccak;

/// Address of a contract deployed by `sender` with the given account nonce:
/// `keccak256(rlp([sender, nonce]))[12..]`.
pub fn calculate_create_address(sender: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender);
    stream.append(&nonce);
    let hash: H256 = keccak(stream.out());
    Address::from_slice(&hash.as_bytes()[12..])
}
