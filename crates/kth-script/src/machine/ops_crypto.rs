//! Hashing and signature operations.

use std::cmp::Ordering;

use kth_primitives::hash;

use super::config::MAX_SCRIPT_PUBLIC_KEYS;
use super::error::{InterpreterError, InterpreterErrorCode};
use super::program::Program;

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_FORKID: u8 = 0x40;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Length of a Schnorr signature without its sighash byte.
const SCHNORR_SIGNATURE_SIZE: usize = 64;

/// Half the secp256k1 group order, big-endian.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

pub(crate) enum HashType {
    Ripemd160,
    Sha1,
    Sha256,
    Hash160,
    Hash256,
}

impl HashType {
    fn is_two_round(&self) -> bool {
        matches!(self, HashType::Hash160 | HashType::Hash256)
    }
}

impl<'a> Program<'a> {
    pub(crate) fn op_hash(&mut self, hash_type: HashType) -> Result<(), InterpreterError> {
        let data = self.pop()?;
        if self.is_chip_vm_limits_enabled() {
            self.metrics_mut()
                .add_hash_iterations(data.len() as u64, hash_type.is_two_round());
        }
        let digest = match hash_type {
            HashType::Ripemd160 => hash::ripemd160(&data).to_vec(),
            HashType::Sha1 => hash::sha1(&data).to_vec(),
            HashType::Sha256 => hash::sha256(&data).to_vec(),
            HashType::Hash160 => hash::hash160(&data).to_vec(),
            HashType::Hash256 => hash::sha256d(&data).to_vec(),
        };
        self.push(digest);
        Ok(())
    }

    /// True if the endorsement commits with the fork id sighash algorithm.
    fn is_forkid(&self, endorsement: &[u8]) -> bool {
        self.rules().uahf
            && endorsement
                .last()
                .map_or(false, |sighash| sighash & SIGHASH_FORKID != 0)
    }

    pub(crate) fn op_checksig(&mut self) -> Result<(), InterpreterError> {
        let pub_key = self.pop()?;
        let endorsement = self.pop()?;

        let Some((&sighash, sig)) = endorsement.split_last() else {
            self.push_bool(false);
            return Ok(());
        };

        self.check_hash_type_encoding(sighash)?;
        self.check_signature_encoding(sig, true)?;
        self.check_pub_key_encoding(&pub_key)?;

        let mut script_code = self.subscript();
        if !self.is_forkid(&endorsement) {
            script_code = script_code.without_pushes_of(&endorsement);
        }

        self.metrics_mut().add_sig_checks(1);
        let valid = self
            .context()
            .verify_signature(
                &endorsement,
                &pub_key,
                &script_code,
                self.input_index(),
                self.value(),
                self.forks(),
            )
            .unwrap_or(false);

        if !valid && self.rules().null_fail() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NullFail,
                "signature not empty on failed checksig".to_string(),
            ));
        }
        self.push_bool(valid);
        Ok(())
    }

    pub(crate) fn op_checkmultisig(&mut self) -> Result<(), InterpreterError> {
        let key_count = self.pop_number()?;
        if key_count.is_negative() || key_count.greater_than_int(MAX_SCRIPT_PUBLIC_KEYS as i64) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidPubKeyCount,
                format!(
                    "number of pubkeys {} is outside [0, {}]",
                    key_count.to_i64(),
                    MAX_SCRIPT_PUBLIC_KEYS
                ),
            ));
        }
        let key_count = key_count.to_i64();
        if !self.increment_operation_count_by(key_count) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidOperationCount,
                format!("exceeded max operation limit of {}", super::MAX_COUNTED_OPS),
            ));
        }
        let key_count = key_count as usize;

        let mut pub_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            pub_keys.push(self.pop()?);
        }

        let sig_count = self.pop_number()?;
        if sig_count.is_negative() || sig_count.greater_than_int(key_count as i64) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidSignatureCount,
                format!(
                    "number of signatures {} is outside [0, {}]",
                    sig_count.to_i64(),
                    key_count
                ),
            ));
        }
        let sig_count = sig_count.to_i64() as usize;

        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            signatures.push(self.pop()?);
        }

        let dummy = self.pop()?;
        if self.rules().null_dummy() && !dummy.is_empty() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigNullDummy,
                format!(
                    "multisig dummy argument has length {} instead of 0",
                    dummy.len()
                ),
            ));
        }

        let mut script_code = self.subscript();
        for endorsement in &signatures {
            if !self.is_forkid(endorsement) {
                script_code = script_code.without_pushes_of(endorsement);
            }
        }

        let any_signature = signatures.iter().any(|s| !s.is_empty());
        if any_signature {
            self.metrics_mut().add_sig_checks(key_count as u32);
        }

        // Keys and signatures are both matched from the top of the stack
        // down; a key that fails is never tried again.
        let context = self.context();
        let mut success = true;
        let mut key_idx = 0;
        let mut sig_idx = 0;
        while sig_idx < sig_count {
            if sig_count - sig_idx > key_count - key_idx {
                success = false;
                break;
            }

            let endorsement = &signatures[sig_idx];
            let pub_key = &pub_keys[key_idx];
            key_idx += 1;

            let Some((&sighash, sig)) = endorsement.split_last() else {
                continue;
            };

            self.check_hash_type_encoding(sighash)?;
            if self.rules().schnorr() && sig.len() == SCHNORR_SIGNATURE_SIZE {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::SigBadLength,
                    "schnorr signatures are not allowed in multisig".to_string(),
                ));
            }
            self.check_signature_encoding(sig, false)?;
            self.check_pub_key_encoding(pub_key)?;

            let valid = context
                .verify_signature(
                    endorsement,
                    pub_key,
                    &script_code,
                    self.input_index(),
                    self.value(),
                    self.forks(),
                )
                .unwrap_or(false);
            if valid {
                sig_idx += 1;
            }
        }

        if !success && self.rules().null_fail() && any_signature {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NullFail,
                "not all signatures empty on failed checkmultisig".to_string(),
            ));
        }
        self.push_bool(success);
        Ok(())
    }

    pub(crate) fn op_check_data_sig(&mut self) -> Result<(), InterpreterError> {
        let pub_key = self.pop()?;
        let message = self.pop()?;
        let sig = self.pop()?;

        self.check_signature_encoding(&sig, true)?;
        self.check_pub_key_encoding(&pub_key)?;

        let mut valid = false;
        if !sig.is_empty() {
            if self.is_chip_vm_limits_enabled() {
                self.metrics_mut()
                    .add_hash_iterations(message.len() as u64, false);
            }
            let digest = hash::sha256(&message);
            self.metrics_mut().add_sig_checks(1);
            valid = self
                .context()
                .verify_data_signature(&sig, &pub_key, &digest)
                .unwrap_or(false);
        }

        if !valid && self.rules().null_fail() && !sig.is_empty() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NullFail,
                "signature not empty on failed checkdatasig".to_string(),
            ));
        }
        self.push_bool(valid);
        Ok(())
    }

    pub(crate) fn check_hash_type_encoding(&self, sighash: u8) -> Result<(), InterpreterError> {
        if !self.rules().strict_encoding() {
            return Ok(());
        }

        let base = sighash & !(SIGHASH_FORKID | SIGHASH_ANYONECANPAY);
        if !(SIGHASH_ALL..=SIGHASH_SINGLE).contains(&base) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidSigHashType,
                format!("invalid hash type 0x{:x}", sighash),
            ));
        }
        if sighash & SIGHASH_FORKID == 0 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::IllegalForkId,
                format!("hash type 0x{:x} does not contain the fork id", sighash),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_pub_key_encoding(&self, pub_key: &[u8]) -> Result<(), InterpreterError> {
        if !self.rules().strict_encoding() {
            return Ok(());
        }
        if pub_key.len() == 33 && (pub_key[0] == 0x02 || pub_key[0] == 0x03) {
            return Ok(());
        }
        if pub_key.len() == 65 && pub_key[0] == 0x04 {
            return Ok(());
        }
        Err(InterpreterError::new(
            InterpreterErrorCode::PubKeyType,
            "unsupported public key type".to_string(),
        ))
    }

    /// Check a signature (without its sighash byte) against the active
    /// encoding rules. `allow_schnorr` admits 64-byte signatures once
    /// Schnorr is active.
    pub(crate) fn check_signature_encoding(
        &self,
        sig: &[u8],
        allow_schnorr: bool,
    ) -> Result<(), InterpreterError> {
        if sig.is_empty() {
            return Ok(());
        }
        if allow_schnorr && self.rules().schnorr() && sig.len() == SCHNORR_SIGNATURE_SIZE {
            return Ok(());
        }
        if !self.rules().der_signatures() && !self.rules().low_s() {
            return Ok(());
        }

        let s = check_der_encoding(sig)?;
        if self.rules().low_s() && !is_low_s(s) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::SigHighS,
                "signature is not canonical due to unnecessarily high S value".to_string(),
            ));
        }
        Ok(())
    }
}

/// Strict DER check of an ECDSA signature. Returns the S value.
fn check_der_encoding(sig: &[u8]) -> Result<&[u8], InterpreterError> {
    let sig_len = sig.len();
    if sig_len < 8 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigTooShort,
            format!("malformed signature: too short: {} < 8", sig_len),
        ));
    }
    if sig_len > 72 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigTooLong,
            format!("malformed signature: too long: {} > 72", sig_len),
        ));
    }
    if sig[0] != 0x30 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigInvalidSeqId,
            format!("malformed signature: format has wrong type: {:#x}", sig[0]),
        ));
    }
    if sig[1] as usize != sig_len - 2 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigInvalidDataLen,
            format!(
                "malformed signature: bad length: {} != {}",
                sig[1],
                sig_len - 2
            ),
        ));
    }

    let r_len = sig[3] as usize;
    let s_type_offset = 4 + r_len;
    let s_len_offset = s_type_offset + 1;
    if s_type_offset >= sig_len {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigMissingSTypeId,
            "malformed signature: S type indicator missing".to_string(),
        ));
    }
    if s_len_offset >= sig_len {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigMissingSLen,
            "malformed signature: S length missing".to_string(),
        ));
    }

    let s_offset = s_len_offset + 1;
    let s_len = sig[s_len_offset] as usize;
    if s_offset + s_len != sig_len {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigInvalidSLen,
            "malformed signature: invalid S length".to_string(),
        ));
    }

    if sig[2] != 0x02 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigInvalidRIntId,
            format!(
                "malformed signature: R integer marker: {:#x} != 0x02",
                sig[2]
            ),
        ));
    }
    if r_len == 0 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigZeroRLen,
            "malformed signature: R length is zero".to_string(),
        ));
    }
    if sig[4] & 0x80 != 0 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigNegativeR,
            "malformed signature: R is negative".to_string(),
        ));
    }
    if r_len > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigTooMuchRPadding,
            "malformed signature: R value has too much padding".to_string(),
        ));
    }

    if sig[s_type_offset] != 0x02 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigInvalidSIntId,
            format!(
                "malformed signature: S integer marker: {:#x} != 0x02",
                sig[s_type_offset]
            ),
        ));
    }
    if s_len == 0 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigZeroSLen,
            "malformed signature: S length is zero".to_string(),
        ));
    }
    if sig[s_offset] & 0x80 != 0 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigNegativeS,
            "malformed signature: S is negative".to_string(),
        ));
    }
    if s_len > 1 && sig[s_offset] == 0x00 && sig[s_offset + 1] & 0x80 == 0 {
        return Err(InterpreterError::new(
            InterpreterErrorCode::SigTooMuchSPadding,
            "malformed signature: S value has too much padding".to_string(),
        ));
    }

    Ok(&sig[s_offset..])
}

/// True if the big-endian S value is at most half the group order.
fn is_low_s(s: &[u8]) -> bool {
    let start = s.iter().position(|&b| b != 0).unwrap_or(s.len());
    let s = &s[start..];
    match s.len().cmp(&HALF_ORDER.len()) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => s <= &HALF_ORDER[..],
    }
}
