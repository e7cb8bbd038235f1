//! Per-input execution budgets for the May-2025 VM limits.
//!
//! Budgets scale with the size of the unlocking script: every byte a
//! spender pays for buys `OP_COST_PER_INPUT_BYTE` units of op cost and half
//! a hash iteration (three and a half when evaluated under consensus rules
//! only).

/// Hash-iteration multiplier when evaluating under consensus rules only.
pub const HASH_ITER_BONUS_NONSTD: u64 = 7;
/// Op-cost credit per byte of unlocking script.
pub const OP_COST_PER_INPUT_BYTE: u64 = 800;
/// Extra weight of a hash iteration under standardness rules.
pub const HASH_COST_PENALTY_STD: u64 = 3;
/// Compression function block size of the supported hash functions.
pub const HASH_BLOCK_SIZE: u64 = 64;
/// Fixed serialized size credited to every input besides its unlocking script.
pub const INPUT_SCRIPT_FIXED_CREDIT: u64 = 41;
/// Op cost charged per signature check.
pub const SIG_CHECK_COST_FACTOR: u64 = 26_000;

/// Hash iterations charged for hashing a message of `message_length` bytes:
/// one per started 64-byte block of the length-padded message, plus one per
/// hashing round (two for HASH160/HASH256).
pub fn calculate_hash_iters(message_length: u64, is_two_round_hash: bool) -> u64 {
    let blocks = (message_length + 8 + HASH_BLOCK_SIZE - 1) / HASH_BLOCK_SIZE;
    u64::from(is_two_round_hash) + 1 + blocks
}

/// Op cost of one hash iteration.
pub fn hash_iter_op_cost_factor(standard: bool) -> u64 {
    if standard {
        HASH_BLOCK_SIZE * HASH_COST_PENALTY_STD
    } else {
        HASH_BLOCK_SIZE
    }
}

/// Budgets derived from one input's unlocking script size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    op_cost_limit: u64,
    hash_iters_limit: u64,
}

impl ScriptLimits {
    pub fn new(standard: bool, script_sig_size: u64) -> Self {
        let credited = script_sig_size + INPUT_SCRIPT_FIXED_CREDIT;
        let bonus = if standard { 1 } else { HASH_ITER_BONUS_NONSTD };
        ScriptLimits {
            op_cost_limit: credited * OP_COST_PER_INPUT_BYTE,
            hash_iters_limit: credited * bonus / 2,
        }
    }

    pub fn op_cost_limit(&self) -> u64 {
        self.op_cost_limit
    }

    pub fn hash_iters_limit(&self) -> u64 {
        self.hash_iters_limit
    }
}
