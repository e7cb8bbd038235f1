//! Machine limits and the runtime rule set.

use serde::{Deserialize, Serialize};

use crate::ScriptError;

/// Maximum number of counted (non-push) operations per script.
pub const MAX_COUNTED_OPS: usize = 201;
/// Maximum combined size of the primary and alternate stacks.
pub const MAX_STACK_SIZE: usize = 1000;
/// Maximum script length in bytes.
pub const MAX_SCRIPT_SIZE: usize = 10_000;
/// Maximum stack element size before the May-2025 VM limits.
pub const MAX_PUSH_DATA_SIZE: usize = 520;
/// Maximum stack element size under the May-2025 VM limits.
pub const MAY2025_MAX_SCRIPT_ELEMENT_SIZE: usize = 10_000;
/// Maximum number of public keys in a multisig.
pub const MAX_SCRIPT_PUBLIC_KEYS: usize = 20;
/// Maximum byte length of numeric operands (legacy).
pub const MAX_NUMBER_SIZE: usize = 4;
/// Maximum byte length of numeric operands once 64-bit integers are active.
pub const MAX_NUMBER_SIZE_64_BIT: usize = 8;
/// Byte length allowed for CHECKLOCKTIMEVERIFY / CHECKSEQUENCEVERIFY operands.
pub const MAX_CHECK_LOCKTIME_VERIFY_NUMBER_SIZE: usize = 5;
pub const MAX_CHECK_SEQUENCE_VERIFY_NUMBER_SIZE: usize = 5;
/// Maximum depth of nested conditionals under the May-2025 VM limits.
pub const MAX_CONDITIONAL_STACK_DEPTH: usize = 100;
/// Base cost of every evaluated instruction under the May-2025 VM limits.
pub const OPCODE_COST: u64 = 100;

/// Lock times below this are block heights, above are timestamps.
pub const LOCKTIME_THRESHOLD: i64 = 500_000_000;
/// Sequence value that finalizes an input.
pub const MAX_INPUT_SEQUENCE: u32 = 0xffff_ffff;
pub const RELATIVE_LOCKTIME_DISABLE_BIT: u32 = 1 << 31;
pub const RELATIVE_LOCKTIME_TIME_LOCKED_BIT: u32 = 1 << 22;
pub const RELATIVE_LOCKTIME_MASK: u32 = 0x0000_ffff;
/// Minimum transaction version for relative lock times.
pub const RELATIVE_LOCKTIME_MIN_VERSION: u32 = 2;

/// The currency whose consensus rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    Bch,
    Btc,
    Ltc,
}

/// Runtime selection of the rule set a program runs under.
///
/// One binary validates any supported network; the rule set travels with
/// each program instead of being fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ruleset {
    pub currency: Currency,
    /// Fail scripts whose composite op cost exceeds the per-input limit.
    /// Off by default: only the hash-iteration limit is fatal otherwise.
    #[serde(default)]
    pub enforce_op_cost_limit: bool,
}

impl Ruleset {
    pub const fn new(currency: Currency) -> Self {
        Ruleset {
            currency,
            enforce_op_cost_limit: false,
        }
    }

    pub const fn bch() -> Self {
        Self::new(Currency::Bch)
    }

    pub const fn btc() -> Self {
        Self::new(Currency::Btc)
    }

    pub const fn ltc() -> Self {
        Self::new(Currency::Ltc)
    }

    /// Return a copy with op-cost enforcement switched on or off.
    pub const fn with_op_cost_limit(mut self, enforce: bool) -> Self {
        self.enforce_op_cost_limit = enforce;
        self
    }

    /// Parse a rule set from JSON, e.g. `{"currency":"btc"}`.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(json)?)
    }
}
