//! Consensus rule-fork flags and the capability record derived from them.
//!
//! [`RuleFork`] is the persisted bitmask; its bit positions must not change.
//! Bits 11 to 13 are shared: they select UAHF, DAA and Monolith on BCH and
//! BIP141, BIP143 and BIP147 elsewhere. [`ActiveRules`] resolves the mask
//! against a [`Ruleset`] once, so handlers test named booleans.
//!
//! Each upgrade bit is resolved on its own: setting a later BCH upgrade does
//! not imply the earlier ones. Masks describing a real chain state set every
//! activated upgrade; [`RuleFork::bch_through`] builds such a mask.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use super::config::{Currency, Ruleset};

/// Rule-fork activation bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RuleFork(pub u32);

impl RuleFork {
    pub const NO_RULES: RuleFork = RuleFork(0);

    /// Allow minimum difficulty blocks (testnet).
    pub const EASY_BLOCKS: RuleFork = RuleFork(1 << 0);
    /// Pay-to-script-hash enabled.
    pub const BIP16_RULE: RuleFork = RuleFork(1 << 1);
    /// No duplicated unspent transaction ids.
    pub const BIP30_RULE: RuleFork = RuleFork(1 << 2);
    /// Coinbase must include height.
    pub const BIP34_RULE: RuleFork = RuleFork(1 << 3);
    /// Strict DER signatures required.
    pub const BIP66_RULE: RuleFork = RuleFork(1 << 4);
    /// Operation nop2 becomes check locktime verify.
    pub const BIP65_RULE: RuleFork = RuleFork(1 << 5);
    /// Hard code bip34-based activation heights.
    pub const BIP90_RULE: RuleFork = RuleFork(1 << 6);
    /// Assume hash collisions cannot happen.
    pub const ALLOW_COLLISIONS: RuleFork = RuleFork(1 << 7);
    /// Enforce relative locktime.
    pub const BIP68_RULE: RuleFork = RuleFork(1 << 8);
    /// Operation nop3 becomes check sequence verify.
    pub const BIP112_RULE: RuleFork = RuleFork(1 << 9);
    /// Use median time past for locktime.
    pub const BIP113_RULE: RuleFork = RuleFork(1 << 10);

    // BCH upgrades.
    pub const BCH_UAHF: RuleFork = RuleFork(1 << 11);
    pub const BCH_DAA: RuleFork = RuleFork(1 << 12);
    pub const BCH_MONOLITH: RuleFork = RuleFork(1 << 13);
    pub const BCH_MAGNETIC_ANOMALY: RuleFork = RuleFork(1 << 14);
    pub const BCH_GREAT_WALL: RuleFork = RuleFork(1 << 15);
    pub const BCH_GRAVITON: RuleFork = RuleFork(1 << 16);
    pub const BCH_PHONON: RuleFork = RuleFork(1 << 17);
    pub const BCH_REPLAY_PROTECTION: RuleFork = RuleFork(1 << 18);
    /// 2022-May: native introspection, 64-bit integers, OP_MUL.
    pub const BCH_GAUSS: RuleFork = RuleFork(1 << 19);
    /// 2023-May: CashTokens.
    pub const BCH_DESCARTES: RuleFork = RuleFork(1 << 20);
    /// 2024-May: adaptive block size.
    pub const BCH_LOBACHEVSKI: RuleFork = RuleFork(1 << 21);
    /// 2025-May: VM limits and big integers.
    pub const BCH_GALOIS: RuleFork = RuleFork(1 << 22);

    // Segregated witness (BTC, LTC); same bits as the first BCH upgrades.
    pub const BIP141_RULE: RuleFork = RuleFork(1 << 11);
    pub const BIP143_RULE: RuleFork = RuleFork(1 << 12);
    pub const BIP147_RULE: RuleFork = RuleFork(1 << 13);

    /// Evaluate VM-limits costs against the standard (relay) budget.
    pub const VM_LIMITS_STANDARD: RuleFork = RuleFork(1 << 29);
    /// Perform difficulty retargeting.
    pub const RETARGET: RuleFork = RuleFork(1 << 30);
    /// Sentinel bit to indicate tx has not been validated.
    pub const UNVERIFIED: RuleFork = RuleFork(1 << 31);

    /// Rules that use bip34-based activation.
    pub const BIP34_ACTIVATIONS: RuleFork =
        RuleFork(Self::BIP34_RULE.0 | Self::BIP65_RULE.0 | Self::BIP66_RULE.0);

    /// Rules that use BIP9 bit zero first time activation.
    pub const BIP9_BIT0_GROUP: RuleFork =
        RuleFork(Self::BIP68_RULE.0 | Self::BIP112_RULE.0 | Self::BIP113_RULE.0);

    /// Rules that use BIP9 bit one first time activation.
    pub const BIP9_BIT1_GROUP: RuleFork =
        RuleFork(Self::BIP141_RULE.0 | Self::BIP143_RULE.0 | Self::BIP147_RULE.0);

    /// Every BCH upgrade bit, UAHF through Galois.
    pub const BCH_UPGRADES: RuleFork = RuleFork(0x007f_f800);

    /// Simple mask to set all rule bits.
    pub const ALL_RULES: RuleFork = RuleFork(0xffff_ffff);

    /// Every BCH upgrade up to and including `upgrade`, as activated on the
    /// BCH chain.
    pub const fn bch_through(upgrade: RuleFork) -> RuleFork {
        RuleFork(Self::BCH_UPGRADES.0 & (upgrade.0 | upgrade.0.wrapping_sub(1)))
    }

    pub fn has_flag(self, flag: RuleFork) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn has_any(self, flags: &[RuleFork]) -> bool {
        flags.iter().any(|f| self.has_flag(*f))
    }

    pub fn add_flag(&mut self, flag: RuleFork) {
        self.0 |= flag.0;
    }
}

impl BitOr for RuleFork {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        RuleFork(self.0 | rhs.0)
    }
}

impl BitOrAssign for RuleFork {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RuleFork {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        RuleFork(self.0 & rhs.0)
    }
}

/// The script-relevant capabilities of one validation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveRules {
    pub currency: Currency,
    pub bip16: bool,
    pub bip65: bool,
    pub bip66: bool,
    pub bip112: bool,
    pub bip141: bool,
    pub bip143: bool,
    pub bip147: bool,
    pub uahf: bool,
    pub daa: bool,
    pub monolith: bool,
    pub magnetic_anomaly: bool,
    pub great_wall: bool,
    pub graviton: bool,
    pub phonon: bool,
    pub gauss: bool,
    pub galois: bool,
    pub vm_limits_standard: bool,
    pub enforce_op_cost_limit: bool,
}

impl ActiveRules {
    /// Resolve `forks` for `ruleset`. Upgrade bits are independent, so a
    /// mask carrying only `BCH_GALOIS` leaves OP_MUL and introspection off.
    pub fn new(ruleset: &Ruleset, forks: RuleFork) -> Self {
        let bch = ruleset.currency == Currency::Bch;
        let on = |flag: RuleFork| forks.has_flag(flag);
        ActiveRules {
            currency: ruleset.currency,
            bip16: on(RuleFork::BIP16_RULE),
            bip65: on(RuleFork::BIP65_RULE),
            bip66: on(RuleFork::BIP66_RULE),
            bip112: on(RuleFork::BIP112_RULE),
            bip141: !bch && on(RuleFork::BIP141_RULE),
            bip143: !bch && on(RuleFork::BIP143_RULE),
            bip147: !bch && on(RuleFork::BIP147_RULE),
            uahf: bch && on(RuleFork::BCH_UAHF),
            daa: bch && on(RuleFork::BCH_DAA),
            monolith: bch && on(RuleFork::BCH_MONOLITH),
            magnetic_anomaly: bch && on(RuleFork::BCH_MAGNETIC_ANOMALY),
            great_wall: bch && on(RuleFork::BCH_GREAT_WALL),
            graviton: bch && on(RuleFork::BCH_GRAVITON),
            phonon: bch && on(RuleFork::BCH_PHONON),
            gauss: bch && on(RuleFork::BCH_GAUSS),
            galois: bch && on(RuleFork::BCH_GALOIS),
            vm_limits_standard: on(RuleFork::VM_LIMITS_STANDARD),
            enforce_op_cost_limit: ruleset.enforce_op_cost_limit,
        }
    }

    /// May-2025 VM limits (cost accounting, 10 KB elements, big integers).
    pub fn vm_limits(&self) -> bool {
        self.galois
    }

    /// Signatures must be strict DER.
    pub fn der_signatures(&self) -> bool {
        self.bip66 || self.uahf
    }

    /// Public keys and sighash types must be strictly encoded, and the
    /// fork id is mandatory.
    pub fn strict_encoding(&self) -> bool {
        self.uahf
    }

    /// High-S signatures are rejected.
    pub fn low_s(&self) -> bool {
        self.daa
    }

    /// Failed signature checks require empty signatures.
    pub fn null_fail(&self) -> bool {
        self.daa
    }

    /// The multisig dummy element must be empty.
    pub fn null_dummy(&self) -> bool {
        self.bip147 || self.graviton
    }

    /// Pushes and numeric operands must be minimally encoded.
    pub fn minimal_data(&self) -> bool {
        self.graviton
    }

    /// 64-byte Schnorr signatures are accepted by CHECKSIG and CHECKDATASIG.
    pub fn schnorr(&self) -> bool {
        self.great_wall
    }

    /// Unlocking scripts must be push-only.
    pub fn sig_push_only(&self) -> bool {
        self.magnetic_anomaly
    }

    /// Exactly one element may remain after a successful evaluation.
    ///
    /// Consensus only on BCH; segwit chains enforce it for witness programs,
    /// which this machine does not evaluate.
    pub fn clean_stack(&self) -> bool {
        self.magnetic_anomaly
    }

    /// Maximum size of numeric operands in bytes.
    pub fn max_integer_size(&self) -> usize {
        if self.galois {
            super::config::MAY2025_MAX_SCRIPT_ELEMENT_SIZE
        } else if self.gauss {
            super::config::MAX_NUMBER_SIZE_64_BIT
        } else {
            super::config::MAX_NUMBER_SIZE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout() {
        assert_eq!(RuleFork::BIP16_RULE.0, 2);
        assert_eq!(RuleFork::BIP113_RULE.0, 1024);
        assert_eq!(RuleFork::BCH_UAHF.0, 1 << 11);
        assert_eq!(RuleFork::BCH_REPLAY_PROTECTION.0, 1 << 18);
        assert_eq!(RuleFork::BIP141_RULE, RuleFork::BCH_UAHF);
        assert_eq!(RuleFork::VM_LIMITS_STANDARD.0, 1 << 29);
        assert_eq!(RuleFork::UNVERIFIED.0, 0x8000_0000);
        assert_eq!(RuleFork::ALL_RULES.0, 0xffff_ffff);
        assert!(RuleFork::ALL_RULES.has_flag(RuleFork::UNVERIFIED));
        assert!(RuleFork::ALL_RULES.has_flag(RuleFork::RETARGET));
    }

    #[test]
    fn test_groups() {
        assert!(RuleFork::BIP34_ACTIVATIONS.has_flag(RuleFork::BIP65_RULE));
        assert!(RuleFork::BIP9_BIT0_GROUP.has_flag(RuleFork::BIP112_RULE));
        assert!(RuleFork::BIP9_BIT1_GROUP.has_flag(RuleFork::BIP147_RULE));
        assert!(RuleFork::BIP9_BIT0_GROUP.has_any(&[RuleFork::BIP16_RULE, RuleFork::BIP68_RULE]));
    }

    #[test]
    fn test_flag_ops() {
        let mut forks = RuleFork::BIP16_RULE | RuleFork::BIP65_RULE;
        assert!(forks.has_flag(RuleFork::BIP65_RULE));
        assert!(!forks.has_flag(RuleFork::BIP66_RULE));
        forks.add_flag(RuleFork::BIP66_RULE);
        forks |= RuleFork::BIP112_RULE;
        assert_eq!(forks & RuleFork::BIP66_RULE, RuleFork::BIP66_RULE);
        assert!(forks.has_flag(RuleFork::BIP112_RULE));
    }

    #[test]
    fn test_shared_bits_resolve_by_currency() {
        let forks = RuleFork::BCH_UAHF | RuleFork::BCH_MONOLITH;

        let bch = ActiveRules::new(&Ruleset::bch(), forks);
        assert!(bch.uahf && bch.monolith);
        assert!(!bch.bip141 && !bch.bip147);

        let btc = ActiveRules::new(&Ruleset::btc(), forks);
        assert!(btc.bip141 && btc.bip147);
        assert!(!btc.uahf && !btc.monolith);
        assert!(btc.null_dummy());
    }

    #[test]
    fn test_max_integer_size() {
        let legacy = ActiveRules::new(&Ruleset::bch(), RuleFork::NO_RULES);
        assert_eq!(legacy.max_integer_size(), 4);
        let gauss = ActiveRules::new(&Ruleset::bch(), RuleFork::BCH_GAUSS);
        assert_eq!(gauss.max_integer_size(), 8);
        let galois = ActiveRules::new(&Ruleset::bch(), RuleFork::BCH_GAUSS | RuleFork::BCH_GALOIS);
        assert_eq!(galois.max_integer_size(), 10_000);
        assert!(galois.vm_limits());
    }

    #[test]
    fn test_standard_flag_is_explicit() {
        let consensus = ActiveRules::new(&Ruleset::bch(), RuleFork::BCH_GALOIS);
        assert!(!consensus.vm_limits_standard);
        let standard = ActiveRules::new(
            &Ruleset::bch(),
            RuleFork::BCH_GALOIS | RuleFork::VM_LIMITS_STANDARD,
        );
        assert!(standard.vm_limits_standard);
    }

    #[test]
    fn test_upgrades_are_independent() {
        let galois = ActiveRules::new(&Ruleset::bch(), RuleFork::BCH_GALOIS);
        assert!(galois.galois);
        assert!(!galois.gauss && !galois.monolith && !galois.uahf);

        let chain = ActiveRules::new(&Ruleset::bch(), RuleFork::bch_through(RuleFork::BCH_GALOIS));
        assert!(chain.uahf && chain.monolith && chain.graviton);
        assert!(chain.gauss && chain.galois);
    }

    #[test]
    fn test_bch_through() {
        assert_eq!(
            RuleFork::bch_through(RuleFork::BCH_MONOLITH),
            RuleFork::BCH_UAHF | RuleFork::BCH_DAA | RuleFork::BCH_MONOLITH
        );
        assert_eq!(
            RuleFork::bch_through(RuleFork::BCH_GALOIS),
            RuleFork::BCH_UPGRADES
        );
        let gauss = RuleFork::bch_through(RuleFork::BCH_GAUSS);
        assert!(gauss.has_flag(RuleFork::BCH_PHONON));
        assert!(!gauss.has_flag(RuleFork::BCH_DESCARTES));
        assert!(!gauss.has_flag(RuleFork::BIP16_RULE));
    }

    #[test]
    fn test_clean_stack_is_bch_only() {
        let segwit = RuleFork::BIP16_RULE | RuleFork::BIP141_RULE;
        assert!(!ActiveRules::new(&Ruleset::btc(), segwit).clean_stack());
        assert!(!ActiveRules::new(&Ruleset::bch(), segwit).clean_stack());
        let anomaly = ActiveRules::new(&Ruleset::bch(), RuleFork::BCH_MAGNETIC_ANOMALY);
        assert!(anomaly.clean_stack());
    }
}
