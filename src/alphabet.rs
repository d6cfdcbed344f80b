use std::fmt;

/// Number of symbols every automaton in this crate is defined over.
///
/// Symbols are the ASCII codes `0..128`. Input containing anything else has no
/// transition and is rejected.
pub const NUM_SYMBOLS: usize = 128;

/// Convert a byte into a symbol, if it is inside the alphabet.
pub fn symbol(b: u8) -> Option<usize> {
    let sym = usize::from(b);
    (sym < NUM_SYMBOLS).then_some(sym)
}

/// A set of symbols, stored as a 128-bit mask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SymbolSet(u128);

impl SymbolSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn full() -> Self {
        Self(u128::MAX)
    }

    /// Every symbol except the newline. This is what `.` matches.
    pub const fn any_but_newline() -> Self {
        Self(u128::MAX & !(1u128 << b'\n'))
    }

    pub fn single(sym: u8) -> Self {
        let mut set = Self::empty();
        set.insert(sym);
        set
    }

    /// Add `sym`. Symbols outside the alphabet are ignored.
    pub fn insert(&mut self, sym: u8) {
        if usize::from(sym) < NUM_SYMBOLS {
            self.0 |= 1u128 << sym;
        }
    }

    /// Insert every symbol in `lo..=hi`.
    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for sym in lo..=hi {
            self.insert(sym);
        }
    }

    pub fn contains(&self, sym: u8) -> bool {
        usize::from(sym) < NUM_SYMBOLS && self.0 & (1u128 << sym) != 0
    }

    pub fn negate(self) -> Self {
        Self(!self.0)
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..NUM_SYMBOLS as u8).filter(move |&sym| self.contains(sym))
    }
}

impl fmt::Debug for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for sym in self.iter() {
            write!(f, "{}", escape(sym))?;
        }
        f.write_str("]")
    }
}

/// Render a symbol the way automaton dumps print it.
pub fn escape(sym: u8) -> String {
    match sym {
        b'\n' => "\\n".to_string(),
        b'\t' => "\\t".to_string(),
        b'\r' => "\\r".to_string(),
        0x20..=0x7e => (sym as char).to_string(),
        _ => format!("\\x{:02x}", sym),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ranges_and_negation() {
        let mut set = SymbolSet::empty();
        set.insert_range(b'a', b'z');
        assert_eq!(set.len(), 26);
        assert!(set.contains(b'q'));
        assert!(!set.contains(b'Q'));

        let neg = set.negate();
        assert!(!neg.contains(b'q'));
        assert!(neg.contains(b'Q'));
        assert_eq!(neg.len(), NUM_SYMBOLS - 26);
    }

    #[test]
    fn dot_skips_newline() {
        let dot = SymbolSet::any_but_newline();
        assert!(!dot.contains(b'\n'));
        assert!(dot.contains(b'x'));
        assert_eq!(dot.len(), NUM_SYMBOLS - 1);
    }

    #[test]
    fn outside_alphabet() {
        assert_eq!(symbol(b'a'), Some(97));
        assert_eq!(symbol(200), None);
        assert!(!SymbolSet::full().contains(200));

        let mut set = SymbolSet::empty();
        set.insert(200);
        assert!(set.is_empty());
        assert!(!set.contains(b'H'));
    }
}
