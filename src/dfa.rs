use std::fmt;

use crate::alphabet::{self, NUM_SYMBOLS};
use crate::nfa::StateId;

/// A deterministic finite automaton over [`NUM_SYMBOLS`] symbols.
///
/// State 0 is the start state. Transitions need not be total: a missing
/// transition rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    trans: Vec<[Option<StateId>; NUM_SYMBOLS]>,
    stop: Vec<Option<u32>>,
}

impl Default for Dfa {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Dfa {
    pub fn new(num_states: usize) -> Self {
        Self {
            trans: vec![[None; NUM_SYMBOLS]; num_states],
            stop: vec![None; num_states],
        }
    }

    pub fn len(&self) -> usize {
        self.trans.len()
    }

    pub fn add_state(&mut self) -> StateId {
        self.trans.push([None; NUM_SYMBOLS]);
        self.stop.push(None);
        self.trans.len() - 1
    }

    pub fn set_transition(&mut self, from: StateId, to: StateId, sym: u8) {
        assert!(to < self.len(), "state {} out of range", to);
        self.trans[from][usize::from(sym)] = Some(to);
    }

    pub fn set_stop(&mut self, state: StateId, tag: u32) {
        self.stop[state] = Some(tag);
    }

    pub fn is_stop(&self, state: StateId) -> bool {
        self.stop[state].is_some()
    }

    pub fn stop(&self, state: StateId) -> Option<u32> {
        self.stop[state]
    }

    /// Outgoing transitions of `state`, indexed by symbol.
    pub fn transitions(&self, state: StateId) -> &[Option<StateId>; NUM_SYMBOLS] {
        &self.trans[state]
    }

    pub fn next(&self, state: StateId, sym: u8) -> Option<StateId> {
        self.trans
            .get(state)
            .and_then(|t| t.get(usize::from(sym)).copied().flatten())
    }

    /// [`Dfa::next`] using `-1` for "no state". Feeding `-1` yields `-1`.
    pub fn next_raw(&self, state: i64, sym: u8) -> i64 {
        usize::try_from(state)
            .ok()
            .and_then(|s| self.next(s, sym))
            .map_or(-1, |s| s as i64)
    }

    /// Run `text` from `state`, returning where it ends up.
    pub fn next_str(&self, mut state: StateId, text: &str) -> Option<StateId> {
        for b in text.bytes() {
            state = self.next(state, b)?;
        }
        Some(state)
    }

    /// True if `state` refers to a live state.
    pub fn is_active(&self, state: i64) -> bool {
        state >= 0 && (state as usize) < self.len()
    }

    /// True if the whole of `text` is accepted.
    pub fn test(&self, text: &str) -> bool {
        self.next_str(0, text).map_or(false, |s| self.is_stop(s))
    }

    /// The longest accepted prefix of `input` as `(length, stop tag)`.
    ///
    /// Empty matches are never reported.
    pub fn longest_match(&self, input: &[u8]) -> Option<(usize, u32)> {
        let mut state = 0;
        let mut best = None;
        for (i, &b) in input.iter().enumerate() {
            match self.next(state, b) {
                Some(next) => state = next,
                None => break,
            }
            if let Some(tag) = self.stop(state) {
                best = Some((i + 1, tag));
            }
        }
        best
    }
}

impl fmt::Display for Dfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Num states = {}", self.len())?;
        write!(f, "Stop IDs:")?;
        for state in (0..self.len()).filter(|&s| self.is_stop(s)) {
            write!(f, " {}", state)?;
        }
        writeln!(f)?;
        for (id, trans) in self.trans.iter().enumerate() {
            write!(f, " {} ->", id)?;
            for (sym, to) in trans.iter().enumerate() {
                if let Some(to) = to {
                    write!(f, " '{}':{}", alphabet::escape(sym as u8), to)?;
                }
            }
            if let Some(tag) = self.stop[id] {
                write!(f, " [STOP={}]", tag)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
