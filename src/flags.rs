//! Bitfield flags surfaced by the host and carried on rule objects.
//!
//! Both flag sets expose the same `{set, clear, or}` update triple rather
//! than a `mode + mask` tuple, so call sites state their intent explicitly
//! instead of picking a mode out of a combined parameter.

use bitflags::bitflags;

bitflags! {
    /// TX lifecycle flags surfaced by the host intermediary.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TxFlags: u16 {
        /// Bypass all inspection for this transaction.
        const ALLOW_ALL        = 1 << 0;
        /// Bypass inspection of the request only.
        const ALLOW_REQUEST    = 1 << 1;
        /// Request headers are subject to inspection.
        const INSPECT_REQHDR   = 1 << 2;
        /// Request body is subject to inspection.
        const INSPECT_REQBODY  = 1 << 3;
        /// Response headers are subject to inspection.
        const INSPECT_RESHDR   = 1 << 4;
        /// Response body is subject to inspection.
        const INSPECT_RESBODY  = 1 << 5;
        /// The request side of the transaction has completed.
        const REQ_FINISHED     = 1 << 6;
        /// The response side of the transaction has completed.
        const RES_FINISHED     = 1 << 7;
        /// Postprocess phase has already fired for this transaction.
        const POSTPROCESS_DONE = 1 << 8;
        /// Logging phase has already fired for this transaction.
        const LOGGING_DONE     = 1 << 9;
    }
}

bitflags! {
    /// Per-rule behaviour flags (spec data model §3).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u8 {
        /// The engine bypasses input extraction and passes a null field to
        /// the operator; the operator fetches its own inputs.
        const EXTERNAL    = 1 << 0;
        /// This rule participates in a chain as a producer.
        const CHAIN       = 1 << 1;
        /// This rule only fires if the preceding chain member produced
        /// true for this TX.
        const CHAINED_TO  = 1 << 2;
    }
}

/// The three explicit flag-update operations kept in place of a
/// `mode + mask` parameter, per the design note on flag updates.
pub trait FlagUpdate: Sized {
    /// Replace the flag set entirely.
    fn set(&mut self, value: Self);
    /// Clear the given bits, leaving the rest untouched.
    fn clear(&mut self, mask: Self);
    /// Set the given bits in addition to whatever is already set.
    fn or(&mut self, mask: Self);
}

impl FlagUpdate for TxFlags {
    fn set(&mut self, value: Self) { *self = value; }

    fn clear(&mut self, mask: Self) { self.remove(mask); }

    fn or(&mut self, mask: Self) { self.insert(mask); }
}

impl FlagUpdate for RuleFlags {
    fn set(&mut self, value: Self) { *self = value; }

    fn clear(&mut self, mask: Self) { self.remove(mask); }

    fn or(&mut self, mask: Self) { self.insert(mask); }
}

impl TxFlags {
    /// Whether inspection of the request body is both enabled and not
    /// overridden by an allow-all bypass.
    #[must_use]
    pub const fn inspects_request_body(self) -> bool {
        !self.contains(Self::ALLOW_ALL)
            && !self.contains(Self::ALLOW_REQUEST)
            && self.contains(Self::INSPECT_REQBODY)
    }

    /// Whether inspection of the response body is both enabled and not
    /// overridden by an allow-all bypass.
    #[must_use]
    pub const fn inspects_response_body(self) -> bool {
        !self.contains(Self::ALLOW_ALL) && self.contains(Self::INSPECT_RESBODY)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(TxFlags::INSPECT_REQBODY, true)]
    #[case(TxFlags::INSPECT_REQBODY | TxFlags::ALLOW_ALL, false)]
    #[case(TxFlags::INSPECT_REQBODY | TxFlags::ALLOW_REQUEST, false)]
    #[case(TxFlags::empty(), false)]
    fn request_body_inspection_honours_bypass(#[case] flags: TxFlags, #[case] expected: bool) {
        assert_eq!(flags.inspects_request_body(), expected);
    }

    #[test]
    fn flag_update_triple() {
        let mut flags = RuleFlags::CHAIN;
        flags.or(RuleFlags::EXTERNAL);
        assert!(flags.contains(RuleFlags::CHAIN) && flags.contains(RuleFlags::EXTERNAL));
        flags.clear(RuleFlags::CHAIN);
        assert!(!flags.contains(RuleFlags::CHAIN));
        flags.set(RuleFlags::CHAINED_TO);
        assert_eq!(flags, RuleFlags::CHAINED_TO);
    }
}
