//! Execution state of one script evaluation.

use crate::operation::Operation;
use crate::Script;

use super::config::{
    Ruleset, MAX_COUNTED_OPS, MAX_PUSH_DATA_SIZE, MAX_SCRIPT_PUBLIC_KEYS, MAX_SCRIPT_SIZE,
    MAX_STACK_SIZE, MAY2025_MAX_SCRIPT_ELEMENT_SIZE,
};
use super::error::{InterpreterError, InterpreterErrorCode};
use super::interpreter::Interpreter;
use super::metrics::Metrics;
use super::rule_fork::{ActiveRules, RuleFork};
use super::scriptnum::ScriptNumber;
use super::stack::{as_bool, ConditionStack, Stack};
use super::{TxContext, EMPTY_TRANSACTION};

/// Script version tag carried by a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptVersion {
    #[default]
    Unversioned,
    Zero,
    Reserved,
}

/// The state of one script evaluation.
///
/// A program borrows its script and transaction context, so it cannot
/// outlive either. It is built fresh for every script; chained evaluations
/// derive a new program with [`Program::from_program`] or
/// [`Program::from_program_moved`], which carry the primary stack and the
/// input context but reset every other register.
pub struct Program<'a> {
    script: &'a Script,
    context: &'a dyn TxContext,
    input_index: usize,
    forks: RuleFork,
    ruleset: Ruleset,
    rules: ActiveRules,
    value: u64,
    version: ScriptVersion,

    primary: Stack,
    alternate: Stack,
    condition: ConditionStack,
    operation_count: usize,
    position: usize,
    jump: usize,
    metrics: Metrics,
}

impl<'a> Program<'a> {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// A program over a bare script, without a transaction to sign against.
    pub fn new(script: &'a Script) -> Self {
        Self::with_stack(
            script,
            &EMPTY_TRANSACTION,
            0,
            RuleFork::NO_RULES,
            Stack::new(),
            u64::MAX,
            ScriptVersion::Unversioned,
        )
    }

    /// A program validating input `input_index` of `context`, with empty
    /// stacks and the value unused.
    pub fn with_transaction(
        script: &'a Script,
        context: &'a dyn TxContext,
        input_index: usize,
        forks: RuleFork,
    ) -> Self {
        Self::with_stack(
            script,
            context,
            input_index,
            forks,
            Stack::new(),
            u64::MAX,
            ScriptVersion::Unversioned,
        )
    }

    /// A program starting from an explicit stack.
    pub fn with_stack(
        script: &'a Script,
        context: &'a dyn TxContext,
        input_index: usize,
        forks: RuleFork,
        stack: Stack,
        value: u64,
        version: ScriptVersion,
    ) -> Self {
        let ruleset = Ruleset::default();
        let mut program = Program {
            script,
            context,
            input_index,
            forks,
            ruleset,
            rules: ActiveRules::new(&ruleset, forks),
            value,
            version,
            primary: stack,
            alternate: Stack::new(),
            condition: ConditionStack::new(),
            operation_count: 0,
            position: 0,
            jump: 0,
            metrics: Metrics::new(),
        };
        program.reserve_stacks();
        program
    }

    /// Derive a program for `script` starting from a copy of `other`'s
    /// primary stack.
    pub fn from_program(script: &'a Script, other: &Program<'a>) -> Self {
        Self::derive(script, other, other.primary.clone())
    }

    /// Derive a program for `script`, taking `other`'s primary stack.
    pub fn from_program_moved(script: &'a Script, mut other: Program<'a>) -> Self {
        let stack = std::mem::take(&mut other.primary);
        Self::derive(script, &other, stack)
    }

    fn derive(script: &'a Script, other: &Program<'a>, stack: Stack) -> Self {
        let mut program = Program {
            script,
            context: other.context,
            input_index: other.input_index,
            forks: other.forks,
            ruleset: other.ruleset,
            rules: other.rules,
            value: other.value,
            version: other.version,
            primary: stack,
            alternate: Stack::new(),
            condition: ConditionStack::new(),
            operation_count: 0,
            position: 0,
            jump: 0,
            metrics: Metrics::with_limits(other.metrics.script_limits().copied()),
        };
        program.reserve_stacks();
        program
    }

    /// Select the currency rule set (BCH unless set).
    pub fn with_ruleset(mut self, ruleset: Ruleset) -> Self {
        self.ruleset = ruleset;
        self.rules = ActiveRules::new(&ruleset, self.forks);
        self
    }

    /// Size the stacks up front so evaluation never reallocates them.
    pub fn reserve_stacks(&mut self) {
        self.primary.reserve(MAX_STACK_SIZE);
        self.alternate.reserve(MAX_STACK_SIZE);
        self.condition.reserve(MAX_COUNTED_OPS);
    }

    // -----------------------------------------------------------------------
    // Instructions
    // -----------------------------------------------------------------------

    /// Evaluate the whole script.
    pub fn evaluate(&mut self) -> Result<(), InterpreterError> {
        Interpreter::run(self)
    }

    /// Run a single operation against the current state.
    pub fn evaluate_operation(&mut self, op: &Operation) -> Result<(), InterpreterError> {
        Interpreter::run_operation(op, self)
    }

    /// Yield the next operation of the script, advancing the cursor.
    pub fn next_operation(&mut self) -> Option<&'a Operation> {
        let script: &'a Script = self.script;
        let op = script.operations().get(self.position)?;
        self.position += 1;
        Some(op)
    }

    /// Count `op` against the operation limit. False once over the limit.
    pub fn increment_operation_count(&mut self, op: &Operation) -> bool {
        if op.is_counted() {
            self.operation_count += 1;
        }
        self.operation_count <= MAX_COUNTED_OPS
    }

    /// Count the keys of a multisig against the operation limit.
    pub fn increment_operation_count_by(&mut self, public_keys: i64) -> bool {
        if public_keys < 0 || public_keys > MAX_SCRIPT_PUBLIC_KEYS as i64 {
            return false;
        }
        self.operation_count += public_keys as usize;
        self.operation_count <= MAX_COUNTED_OPS
    }

    /// Mark the operations after the current one as the signing subscript.
    pub fn set_jump_register(&mut self) {
        self.jump = self.position;
    }

    // -----------------------------------------------------------------------
    // Registers
    // -----------------------------------------------------------------------

    /// True if the script decoded completely and is within the size limit.
    pub fn is_valid(&self) -> bool {
        self.script.is_valid() && self.script.len() <= MAX_SCRIPT_SIZE
    }

    /// The script under evaluation.
    pub fn script(&self) -> &'a Script {
        self.script
    }

    /// The transaction being validated.
    pub fn context(&self) -> &'a dyn TxContext {
        self.context
    }

    /// The raw rule-fork mask.
    pub fn forks(&self) -> RuleFork {
        self.forks
    }

    /// Capabilities resolved from the mask and ruleset.
    pub fn rules(&self) -> &ActiveRules {
        &self.rules
    }

    /// The ruleset the capabilities were resolved against.
    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    /// Index of the input being verified.
    pub fn input_index(&self) -> usize {
        self.input_index
    }

    /// Value in satoshis of the output being spent.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Script version of the input.
    pub fn version(&self) -> ScriptVersion {
        self.version
    }

    /// Counted (non-push) operations executed so far.
    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    /// Number of operations evaluated, including the current one.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Operation index just after the last OP_CODESEPARATOR.
    pub fn jump(&self) -> usize {
        self.jump
    }

    /// Cost accounting for this input.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Mutable cost accounting, for handlers.
    pub fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    /// Largest element a push or an operation may produce.
    pub fn max_script_element_size(&self) -> usize {
        if self.rules.vm_limits() {
            MAY2025_MAX_SCRIPT_ELEMENT_SIZE
        } else {
            MAX_PUSH_DATA_SIZE
        }
    }

    /// Largest numeric operand in bytes.
    pub fn max_integer_size(&self) -> usize {
        self.rules.max_integer_size()
    }

    /// VM limits are active for this evaluation.
    pub fn is_chip_vm_limits_enabled(&self) -> bool {
        self.rules.vm_limits()
    }

    /// Seed the per-input budgets from the unlocking script size.
    ///
    /// Does nothing unless VM limits are enabled, or if budgets already
    /// exist.
    pub fn initialize_script_limits(&mut self, script_sig_size: usize) {
        if self.is_chip_vm_limits_enabled() && !self.metrics.has_valid_script_limits() {
            self.metrics
                .set_script_limits(self.rules.vm_limits_standard, script_sig_size as u64);
        }
    }

    /// The script after the last executed OP_CODESEPARATOR.
    pub fn subscript(&self) -> Script {
        let ops = self.script.operations();
        let start = self.jump.min(ops.len());
        Script::from_operations(ops[start..].to_vec())
    }

    // -----------------------------------------------------------------------
    // Stack queries
    // -----------------------------------------------------------------------

    /// The primary stack.
    pub fn stack(&self) -> &Stack {
        &self.primary
    }

    /// The alternate stack.
    pub fn alternate(&self) -> &Stack {
        &self.alternate
    }

    /// Consume the program, keeping the primary stack.
    pub fn into_stack(self) -> Stack {
        self.primary
    }

    /// Combined primary and alternate depth exceeds the limit.
    pub fn is_stack_overflow(&self) -> bool {
        self.primary.len() + self.alternate.len() > MAX_STACK_SIZE
    }

    /// True if the top item is true (and, when `clean`, the only item).
    pub fn stack_true(&self, clean: bool) -> bool {
        match self.primary.top() {
            Ok(top) => !(clean && self.primary.len() != 1) && as_bool(top),
            Err(_) => false,
        }
    }

    /// Classify the end state of an input evaluation.
    pub fn stack_result(&self, clean: bool) -> Result<(), InterpreterError> {
        if self.primary.is_empty() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::EmptyStack,
                "stack empty at end of script execution".to_string(),
            ));
        }
        if clean && self.primary.len() != 1 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::CleanStack,
                format!("stack contains {} unexpected items", self.primary.len() - 1),
            ));
        }
        if !self.stack_true(false) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::EvalFalse,
                "false stack entry at end of script execution".to_string(),
            ));
        }
        Ok(())
    }

    /// True if `op` must run: conditionals always do, everything else only
    /// inside executed branches.
    pub fn if_(&self, op: &Operation) -> bool {
        op.is_conditional() || self.condition.succeeded()
    }

    /// Every IF has been matched by an ENDIF.
    pub fn closed(&self) -> bool {
        self.condition.closed()
    }

    /// The current branch is executing.
    pub fn succeeded(&self) -> bool {
        self.condition.succeeded()
    }

    /// Current IF nesting depth.
    pub fn conditional_stack_size(&self) -> usize {
        self.condition.depth()
    }

    // -----------------------------------------------------------------------
    // Handler state access
    // -----------------------------------------------------------------------

    pub(crate) fn primary_mut(&mut self) -> &mut Stack {
        &mut self.primary
    }

    pub(crate) fn alternate_mut(&mut self) -> &mut Stack {
        &mut self.alternate
    }

    pub(crate) fn condition_mut(&mut self) -> &mut ConditionStack {
        &mut self.condition
    }

    /// Charge the byte length of the top `n` items as op cost.
    pub(crate) fn tally_top(&mut self, n: usize) {
        if !self.rules.vm_limits() {
            return;
        }
        let cost: usize = self.primary.items().iter().rev().take(n).map(Vec::len).sum();
        self.metrics.add_op_cost(cost as u64);
    }

    /// Push a new item, charging its size under VM limits.
    pub(crate) fn push(&mut self, data: Vec<u8>) {
        if self.rules.vm_limits() {
            self.metrics.add_op_cost(data.len() as u64);
        }
        self.primary.push(data);
    }

    pub(crate) fn push_bool(&mut self, value: bool) {
        self.push(super::stack::from_bool(value));
    }

    /// Push a numeric result, rejecting values outside the active range.
    pub(crate) fn push_number(&mut self, n: &ScriptNumber) -> Result<(), InterpreterError> {
        if self.rules.vm_limits() {
            if n.byte_len() > self.max_integer_size() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::NumberOverflow,
                    format!(
                        "result of {} bytes exceeds the max of {}",
                        n.byte_len(),
                        self.max_integer_size()
                    ),
                ));
            }
        } else if self.rules.gauss && !n.is_valid_64_bit() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberOverflow,
                "result is out of the 64-bit integer range".to_string(),
            ));
        }
        self.push(n.to_bytes());
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Vec<u8>, InterpreterError> {
        self.primary.pop()
    }

    pub(crate) fn pop_number(&mut self) -> Result<ScriptNumber, InterpreterError> {
        self.pop_number_sized(self.max_integer_size())
    }

    pub(crate) fn pop_number_sized(
        &mut self,
        max_len: usize,
    ) -> Result<ScriptNumber, InterpreterError> {
        let data = self.primary.pop()?;
        ScriptNumber::from_bytes(&data, max_len, self.rules.minimal_data())
    }

    pub(crate) fn top_number_sized(&self, max_len: usize) -> Result<ScriptNumber, InterpreterError> {
        ScriptNumber::from_bytes(self.primary.top()?, max_len, self.rules.minimal_data())
    }

    /// Pop a stack index operand (PICK, ROLL).
    pub(crate) fn pop_index(&mut self) -> Result<usize, InterpreterError> {
        let n = self.pop_number()?;
        if n.is_negative() || !n.less_than_int(self.primary.len() as i64) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidStackOperation,
                format!(
                    "index {} is invalid for stack size {}",
                    n.to_i64(),
                    self.primary.len()
                ),
            ));
        }
        Ok(n.to_i64() as usize)
    }
}
