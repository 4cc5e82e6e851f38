/// Tag constants.
const FIXNUM_MASK: u64 = 0b1;
const TAG_MASK: u64 = 0b11;
const REF_TAG: u64 = 0b01;

/// A tagged 64-bit word as seen by the interpreter and the collector.
///
/// Encoding:
/// - **Fixnum**:    `...XXXXX0`: 63-bit signed integer (low bit 0).
/// - **Reference**: `...XXXX01`: heap pointer (mask low 2 bits).
/// - **Header**:    `...XXXX11`: only valid as the first word of a heap object.
///
/// Code addresses are word aligned, so a raw code pointer stored in a
/// `Value` reads as a fixnum and is never traced by the collector.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    /// Sentinel stored in global slots that have not been bound yet.
    pub const UNBOUND: Value = Value(0);

    // ── Fixnum ─────────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_fixnum(self) -> bool {
        self.0 & FIXNUM_MASK == 0
    }

    #[inline(always)]
    pub fn from_i64(n: i64) -> Self {
        debug_assert!(
            (-(1i64 << 62)..(1i64 << 62)).contains(&n),
            "fixnum overflow: {n}"
        );
        Self((n << 1) as u64)
    }

    /// # Safety
    ///
    /// The value must be a fixnum.
    #[inline(always)]
    pub unsafe fn to_i64(self) -> i64 {
        debug_assert!(self.is_fixnum());
        (self.0 as i64) >> 1
    }

    /// Returns the fixnum payload, or `None` for any other kind of word.
    #[inline]
    pub fn as_i64(self) -> Option<i64> {
        // SAFETY: checked right before
        self.is_fixnum().then(|| unsafe { self.to_i64() })
    }

    // ── Reference ──────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_ref(self) -> bool {
        self.0 & TAG_MASK == REF_TAG
    }

    #[inline(always)]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        let addr = ptr as u64;
        debug_assert!(addr & TAG_MASK == 0, "pointer not aligned");
        Self(addr | REF_TAG)
    }

    #[inline(always)]
    pub const fn ref_bits(self) -> u64 {
        self.0 & !TAG_MASK
    }

    // ── Code pointers ──────────────────────────────────────────────

    /// Wraps the address of a bytecode instruction.
    #[inline(always)]
    pub fn from_code_addr(addr: usize) -> Self {
        debug_assert!(addr & TAG_MASK as usize == 0, "code address not aligned");
        Self(addr as u64)
    }

    #[inline(always)]
    pub const fn code_addr(self) -> usize {
        self.0 as usize
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::UNBOUND
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_fixnum() {
            write!(f, "Fixnum({})", unsafe { self.to_i64() })
        } else if self.is_ref() {
            write!(f, "Ref(0x{:x})", self.ref_bits())
        } else {
            write!(f, "Header(0x{:016x})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_sentinel_is_fixnum_zero() {
        assert!(Value::UNBOUND.is_fixnum());
        assert_eq!(Value::UNBOUND, Value::from_i64(0));
        assert_eq!(Value::default(), Value::UNBOUND);
    }

    #[test]
    fn references_are_not_fixnums() {
        let word = 0u64;
        let v = Value::from_ptr(&word as *const u64);
        assert!(v.is_ref());
        assert!(!v.is_fixnum());
        assert_eq!(v.as_i64(), None);
        assert_eq!(v.ref_bits(), &word as *const u64 as u64);
    }

    #[test]
    fn code_addresses_look_like_fixnums_to_the_collector() {
        let code = [0u32; 4];
        let addr = code.as_ptr() as usize;
        let v = Value::from_code_addr(addr);
        assert!(v.is_fixnum());
        assert!(!v.is_ref());
        assert_eq!(v.code_addr(), addr);
    }

    #[test]
    fn negative_fixnums_round_trip() {
        assert_eq!(Value::from_i64(-17).as_i64(), Some(-17));
    }
}
