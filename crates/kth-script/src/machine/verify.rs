//! Input verification: unlocking script, locking script and P2SH redeem
//! script, evaluated in sequence over a shared primary stack.

use crate::Script;

use super::config::{Ruleset, MAX_SCRIPT_SIZE};
use super::error::{InterpreterError, InterpreterErrorCode};
use super::program::{Program, ScriptVersion};
use super::rule_fork::RuleFork;
use super::stack::Stack;
use super::TxContext;

/// Verify input `input_index` of `context`, spending an output of `value`
/// locked by `prevout_script`.
pub fn verify(
    context: &dyn TxContext,
    input_index: usize,
    forks: RuleFork,
    ruleset: Ruleset,
    script_sig: &Script,
    prevout_script: &Script,
    value: u64,
) -> Result<(), InterpreterError> {
    let result = verify_input(
        context,
        input_index,
        forks,
        ruleset,
        script_sig,
        prevout_script,
        value,
    );
    match &result {
        Ok(()) => tracing::debug!(input_index, "input verified"),
        Err(e) => tracing::debug!(input_index, code = %e.code, "input failed: {}", e),
    }
    result
}

fn verify_input(
    context: &dyn TxContext,
    input_index: usize,
    forks: RuleFork,
    ruleset: Ruleset,
    script_sig: &Script,
    prevout_script: &Script,
    value: u64,
) -> Result<(), InterpreterError> {
    for script in [script_sig, prevout_script] {
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ScriptTooBig,
                format!(
                    "script size {} is larger than the max allowed size {}",
                    script.len(),
                    MAX_SCRIPT_SIZE
                ),
            ));
        }
    }

    let mut input = Program::with_stack(
        script_sig,
        context,
        input_index,
        forks,
        Stack::new(),
        value,
        ScriptVersion::Unversioned,
    )
    .with_ruleset(ruleset);
    let rules = *input.rules();

    if rules.sig_push_only() && !script_sig.is_push_only() {
        return Err(InterpreterError::new(
            InterpreterErrorCode::NotPushOnly,
            "unlocking script is not push only".to_string(),
        ));
    }

    input.initialize_script_limits(script_sig.len());
    input.evaluate()?;

    let mut prevout = Program::from_program(prevout_script, &input);
    prevout.evaluate()?;
    if !prevout.stack_true(false) {
        return Err(InterpreterError::new(
            InterpreterErrorCode::EvalFalse,
            "false stack entry at end of locking script".to_string(),
        ));
    }

    if rules.bip16 && prevout_script.is_pay_to_script_hash() {
        if !script_sig.is_push_only() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidScriptEmbed,
                "p2sh unlocking script is not push only".to_string(),
            ));
        }

        // The stack holds the serialized redeem script on top of its
        // arguments; the locking script has already matched its hash.
        let serialized = input.primary_mut().pop()?;
        let redeem = Script::from_bytes(&serialized);
        let mut embedded = Program::from_program_moved(&redeem, input);
        embedded.evaluate()?;
        return embedded.stack_result(rules.clean_stack());
    }

    prevout.stack_result(rules.clean_stack())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::EMPTY_TRANSACTION;
    use kth_primitives::hash::hash160;

    fn asm(s: &str) -> Script {
        Script::from_asm(s).unwrap()
    }

    fn run(forks: RuleFork, sig: &Script, prevout: &Script) -> Result<(), InterpreterErrorCode> {
        verify(&EMPTY_TRANSACTION, 0, forks, Ruleset::bch(), sig, prevout, 0).map_err(|e| e.code)
    }

    fn p2sh(redeem: &Script) -> Script {
        let hash = hash160(redeem.to_bytes());
        asm(&format!("OP_HASH160 {} OP_EQUAL", hex::encode(hash)))
    }

    fn push_of(redeem: &Script) -> String {
        hex::encode(redeem.to_bytes())
    }

    #[test]
    fn test_simple_spend() {
        assert_eq!(
            run(RuleFork::NO_RULES, &asm("OP_2 OP_3"), &asm("OP_ADD OP_5 OP_EQUAL")),
            Ok(())
        );
        assert_eq!(
            run(RuleFork::NO_RULES, &asm("OP_2 OP_2"), &asm("OP_ADD OP_5 OP_EQUAL")),
            Err(InterpreterErrorCode::EvalFalse)
        );
        assert_eq!(
            run(RuleFork::NO_RULES, &asm(""), &asm("")),
            Err(InterpreterErrorCode::EvalFalse)
        );
    }

    #[test]
    fn test_unlocking_failure_stops_early() {
        assert_eq!(
            run(RuleFork::NO_RULES, &asm("OP_RETURN"), &asm("OP_1")),
            Err(InterpreterErrorCode::OpReturn)
        );
    }

    #[test]
    fn test_script_too_big() {
        let big = Script::from_bytes(&vec![crate::opcodes::OP_NOP; MAX_SCRIPT_SIZE + 1]);
        assert_eq!(
            run(RuleFork::NO_RULES, &big, &asm("OP_1")),
            Err(InterpreterErrorCode::ScriptTooBig)
        );
        assert_eq!(
            run(RuleFork::NO_RULES, &asm("OP_1"), &big),
            Err(InterpreterErrorCode::ScriptTooBig)
        );
    }

    #[test]
    fn test_sig_push_only() {
        let sig = asm("OP_1 OP_DUP");
        let prevout = asm("OP_EQUAL");
        assert_eq!(run(RuleFork::NO_RULES, &sig, &prevout), Ok(()));
        assert_eq!(
            run(RuleFork::BCH_MAGNETIC_ANOMALY, &sig, &prevout),
            Err(InterpreterErrorCode::NotPushOnly)
        );
    }

    #[test]
    fn test_clean_stack() {
        let sig = asm("OP_1 OP_1");
        let prevout = asm("OP_1");
        assert_eq!(run(RuleFork::NO_RULES, &sig, &prevout), Ok(()));
        assert_eq!(
            run(RuleFork::BCH_MAGNETIC_ANOMALY, &sig, &prevout),
            Err(InterpreterErrorCode::CleanStack)
        );
    }

    #[test]
    fn test_segwit_rules_allow_extra_items() {
        let forks = RuleFork::BIP16_RULE | RuleFork::BIP141_RULE;
        let result = verify(
            &EMPTY_TRANSACTION,
            0,
            forks,
            Ruleset::btc(),
            &asm("OP_1 OP_1"),
            &asm("OP_1"),
            0,
        );
        assert!(result.is_ok());

        let redeem = asm("OP_1");
        let sig = asm(&format!("OP_1 {}", push_of(&redeem)));
        let result = verify(&EMPTY_TRANSACTION, 0, forks, Ruleset::btc(), &sig, &p2sh(&redeem), 0);
        assert!(result.is_ok());
    }

    #[test]
    fn test_p2sh_evaluates_redeem_script() {
        let redeem = asm("OP_ADD OP_5 OP_EQUAL");
        let prevout = p2sh(&redeem);
        let good = asm(&format!("OP_2 OP_3 {}", push_of(&redeem)));
        let bad = asm(&format!("OP_2 OP_2 {}", push_of(&redeem)));

        assert_eq!(run(RuleFork::BIP16_RULE, &good, &prevout), Ok(()));
        assert_eq!(
            run(RuleFork::BIP16_RULE, &bad, &prevout),
            Err(InterpreterErrorCode::EvalFalse)
        );
        // Without bip16 only the hash is checked.
        assert_eq!(run(RuleFork::NO_RULES, &bad, &prevout), Ok(()));
    }

    #[test]
    fn test_p2sh_requires_push_only() {
        let redeem = asm("OP_1");
        let prevout = p2sh(&redeem);
        let sig = asm(&format!("OP_1 OP_DROP {}", push_of(&redeem)));
        assert_eq!(
            run(RuleFork::BIP16_RULE, &sig, &prevout),
            Err(InterpreterErrorCode::InvalidScriptEmbed)
        );
    }

    #[test]
    fn test_p2sh_clean_stack() {
        let redeem = asm("OP_1");
        let prevout = p2sh(&redeem);
        let sig = asm(&format!("OP_1 {}", push_of(&redeem)));
        let forks = RuleFork::BIP16_RULE | RuleFork::BCH_MAGNETIC_ANOMALY;
        assert_eq!(run(RuleFork::BIP16_RULE, &sig, &prevout), Ok(()));
        assert_eq!(
            run(forks, &sig, &prevout),
            Err(InterpreterErrorCode::CleanStack)
        );
    }
}
