//! Running cost accounting for one script evaluation.

use super::script_limits::{
    calculate_hash_iters, hash_iter_op_cost_factor, ScriptLimits, SIG_CHECK_COST_FACTOR,
};

/// Accumulated costs of an evaluation, with optional budgets.
///
/// Accumulators only grow. While no [`ScriptLimits`] is set the limit
/// checks report false whatever has been accumulated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    sig_checks: u32,
    op_cost: u64,
    hash_digest_iterations: u64,
    script_limits: Option<ScriptLimits>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from fresh counters, keeping `limits`.
    pub(crate) fn with_limits(limits: Option<ScriptLimits>) -> Self {
        Metrics {
            script_limits: limits,
            ..Self::default()
        }
    }

    pub fn sig_checks(&self) -> u32 {
        self.sig_checks
    }

    pub fn op_cost(&self) -> u64 {
        self.op_cost
    }

    pub fn hash_digest_iterations(&self) -> u64 {
        self.hash_digest_iterations
    }

    pub fn add_op_cost(&mut self, cost: u64) {
        self.op_cost = self.op_cost.saturating_add(cost);
    }

    pub fn add_sig_checks(&mut self, n_checks: u32) {
        self.sig_checks = self.sig_checks.saturating_add(n_checks);
    }

    pub fn add_hash_iterations(&mut self, message_length: u64, is_two_round_hash: bool) {
        self.hash_digest_iterations = self
            .hash_digest_iterations
            .saturating_add(calculate_hash_iters(message_length, is_two_round_hash));
    }

    /// Op cost including the weighted hash iterations and signature checks.
    pub fn composite_op_cost(&self, standard: bool) -> u64 {
        self.op_cost
            .saturating_add(
                self.hash_digest_iterations
                    .saturating_mul(hash_iter_op_cost_factor(standard)),
            )
            .saturating_add(u64::from(self.sig_checks).saturating_mul(SIG_CHECK_COST_FACTOR))
    }

    pub fn is_over_op_cost_limit(&self, standard: bool) -> bool {
        match &self.script_limits {
            Some(limits) => self.composite_op_cost(standard) > limits.op_cost_limit(),
            None => false,
        }
    }

    pub fn is_over_hash_iters_limit(&self) -> bool {
        match &self.script_limits {
            Some(limits) => self.hash_digest_iterations > limits.hash_iters_limit(),
            None => false,
        }
    }

    pub fn has_valid_script_limits(&self) -> bool {
        self.script_limits.is_some()
    }

    pub fn script_limits(&self) -> Option<&ScriptLimits> {
        self.script_limits.as_ref()
    }

    pub fn set_script_limits(&mut self, standard: bool, script_sig_size: u64) {
        self.script_limits = Some(ScriptLimits::new(standard, script_sig_size));
    }
}
