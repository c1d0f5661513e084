/// Maximum depth of nested call primitives.
pub const CALL_CREATE_DEPTH: usize = 1024;

/// Largest runtime code a creation may deploy (EIP-170).
pub const MAX_CODE_SIZE: usize = 24576;

/// Gas charged per byte of deployed runtime code.
pub const CREATE_DATA_GAS: u64 = 200;

pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;
