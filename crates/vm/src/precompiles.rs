use bytes::Bytes;
use fuzzvm_common::{Address, H160};
use ripemd::Ripemd160;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::call_frame::CallFrame;
use crate::constants::WORD_SIZE_IN_BYTES_U64;
use crate::errors::{ExceptionalHalt, VMError};

pub const SHA2_256_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x02,
]);

pub const RIPEMD_160_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x03,
]);

pub const IDENTITY_ADDRESS: H160 = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x04,
]);

pub const SHA2_256_STATIC_COST: u64 = 60;
pub const SHA2_256_DYNAMIC_BASE: u64 = 12;
pub const RIPEMD_160_STATIC_COST: u64 = 600;
pub const RIPEMD_160_DYNAMIC_BASE: u64 = 120;
pub const IDENTITY_STATIC_COST: u64 = 15;
pub const IDENTITY_DYNAMIC_BASE: u64 = 3;

/// A built-in contract selected by address instead of bytecode.
pub trait Precompile: Send + Sync {
    fn name(&self) -> &'static str;
    fn required_gas(&self, input: &[u8]) -> Result<u64, VMError>;
    fn run(&self, input: &[u8]) -> Result<Bytes, VMError>;
}

/// Precompiles known to a VM, keyed by address.
#[derive(Default)]
pub struct PrecompileSet {
    contracts: FxHashMap<Address, Box<dyn Precompile>>,
}

impl PrecompileSet {
    /// No precompiles at all: every address runs bytecode.
    pub fn empty() -> Self {
        Self::default()
    }

    /// SHA-256, RIPEMD-160 and identity at 0x02..=0x04.
    pub fn standard() -> Self {
        let mut set = Self::empty();
        set.insert(SHA2_256_ADDRESS, Box::new(Sha2_256));
        set.insert(RIPEMD_160_ADDRESS, Box::new(Ripemd160Precompile));
        set.insert(IDENTITY_ADDRESS, Box::new(Identity));
        set
    }

    pub fn insert(&mut self, address: Address, precompile: Box<dyn Precompile>) {
        self.contracts.insert(address, precompile);
    }

    pub fn get(&self, address: &Address) -> Option<&dyn Precompile> {
        self.contracts.get(address).map(|precompile| precompile.as_ref())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl std::fmt::Debug for PrecompileSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self
            .contracts
            .iter()
            .map(|(address, precompile)| (*address, precompile.name()))
            .collect();
        names.sort();
        f.debug_struct("PrecompileSet")
            .field("contracts", &names)
            .finish()
    }
}

/// Charge the precompile's gas from `frame`, then run it.
pub fn run_precompile(
    precompile: &dyn Precompile,
    frame: &mut CallFrame,
    input: &[u8],
) -> Result<Bytes, VMError> {
    let gas_cost = precompile.required_gas(input)?;
    if !frame.use_gas(gas_cost) {
        return Err(ExceptionalHalt::OutOfGas.into());
    }
    precompile.run(input)
}

fn word_priced(data_size: usize, static_cost: u64, dynamic_base: u64) -> Result<u64, VMError> {
    let data_size: u64 = data_size
        .try_into()
        .map_err(|_| ExceptionalHalt::OutOfGas)?;

    let data_word_cost = data_size
        .checked_add(WORD_SIZE_IN_BYTES_U64 - 1)
        .ok_or(ExceptionalHalt::OutOfGas)?
        / WORD_SIZE_IN_BYTES_U64;

    let dynamic_gas = dynamic_base
        .checked_mul(data_word_cost)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    static_cost
        .checked_add(dynamic_gas)
        .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
}

/// Returns the calldata hashed by sha2-256 algorithm
pub struct Sha2_256;

impl Precompile for Sha2_256 {
    fn name(&self) -> &'static str {
        "SHA256"
    }

    fn required_gas(&self, input: &[u8]) -> Result<u64, VMError> {
        word_priced(input.len(), SHA2_256_STATIC_COST, SHA2_256_DYNAMIC_BASE)
    }

    fn run(&self, input: &[u8]) -> Result<Bytes, VMError> {
        Ok(Bytes::copy_from_slice(&Sha256::digest(input)))
    }
}

/// Returns the calldata hashed by ripemd-160 algorithm, padded by zeros at left
pub struct Ripemd160Precompile;

impl Precompile for Ripemd160Precompile {
    fn name(&self) -> &'static str {
        "RIPEMD160"
    }

    fn required_gas(&self, input: &[u8]) -> Result<u64, VMError> {
        word_priced(input.len(), RIPEMD_160_STATIC_COST, RIPEMD_160_DYNAMIC_BASE)
    }

    fn run(&self, input: &[u8]) -> Result<Bytes, VMError> {
        let digest = Ripemd160::digest(input);
        let mut output = [0u8; 32];
        output[12..].copy_from_slice(&digest);
        Ok(Bytes::copy_from_slice(&output))
    }
}

pub struct Identity;

impl Precompile for Identity {
    fn name(&self) -> &'static str {
        "ID"
    }

    fn required_gas(&self, input: &[u8]) -> Result<u64, VMError> {
        word_priced(input.len(), IDENTITY_STATIC_COST, IDENTITY_DYNAMIC_BASE)
    }

    fn run(&self, input: &[u8]) -> Result<Bytes, VMError> {
        Ok(Bytes::copy_from_slice(input))
    }
}
