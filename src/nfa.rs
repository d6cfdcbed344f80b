use std::collections::BTreeSet;
use std::fmt;

use crate::alphabet::{self, SymbolSet, NUM_SYMBOLS};

pub type StateId = usize;

/// Set of NFA states. Ordered so it can key the subset construction map.
pub type StateSet = BTreeSet<StateId>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct State {
    /// Destinations reachable on each symbol.
    trans: Vec<(u8, StateId)>,
    /// Destinations reachable without consuming input.
    free: BTreeSet<StateId>,
    stop: Option<u32>,
}

/// A nondeterministic finite automaton over [`NUM_SYMBOLS`] symbols.
///
/// States are dense ids `0..len()`. Free transitions may appear while a regex
/// is being compiled; every query follows them, and [`crate::to_dfa`] removes
/// them entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nfa {
    states: Vec<State>,
    start: StateSet,
}

impl Nfa {
    /// Create an NFA with `num_states` states. State 0 is the start state.
    pub fn new(num_states: usize) -> Self {
        let mut nfa = Self {
            states: vec![State::default(); num_states],
            start: StateSet::new(),
        };
        if num_states > 0 {
            nfa.start.insert(0);
        }
        nfa
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Append a fresh state and return its id.
    pub fn add_state(&mut self) -> StateId {
        self.states.push(State::default());
        self.states.len() - 1
    }

    /// Append `n` fresh states and return the id of the first one.
    pub fn add_states(&mut self, n: usize) -> StateId {
        let first = self.states.len();
        self.states.resize(first + n, State::default());
        first
    }

    pub fn add_start(&mut self, state: StateId) {
        assert!(state < self.len(), "start state {} out of range", state);
        self.start.insert(state);
    }

    /// The raw start states, without free-closure.
    pub fn starts(&self) -> &StateSet {
        &self.start
    }

    pub fn add_transition(&mut self, from: StateId, to: StateId, sym: u8) {
        assert!(usize::from(sym) < NUM_SYMBOLS, "symbol {} outside alphabet", sym);
        assert!(to < self.len(), "state {} out of range", to);
        let trans = &mut self.states[from].trans;
        if !trans.contains(&(sym, to)) {
            trans.push((sym, to));
        }
    }

    pub fn add_transition_symbols(&mut self, from: StateId, to: StateId, syms: &SymbolSet) {
        for sym in syms.iter() {
            self.add_transition(from, to, sym);
        }
    }

    pub fn add_free_transition(&mut self, from: StateId, to: StateId) {
        assert!(to < self.len(), "state {} out of range", to);
        self.states[from].free.insert(to);
    }

    pub fn set_stop(&mut self, state: StateId, tag: u32) {
        self.states[state].stop = Some(tag);
    }

    pub fn is_stop(&self, state: StateId) -> bool {
        self.states[state].stop.is_some()
    }

    pub fn stop(&self, state: StateId) -> Option<u32> {
        self.states[state].stop
    }

    /// True if `state` can only be left through free transitions (or not at
    /// all) and does not accept.
    pub fn is_empty(&self, state: StateId) -> bool {
        let s = &self.states[state];
        s.trans.is_empty() && s.stop.is_none()
    }

    pub fn has_free_transitions(&self) -> bool {
        self.states.iter().any(|s| !s.free.is_empty())
    }

    /// Destinations of `state` on `sym`, ignoring free transitions.
    pub fn transitions(&self, state: StateId, sym: u8) -> impl Iterator<Item = StateId> + '_ {
        self.states[state]
            .trans
            .iter()
            .filter(move |&&(s, _)| s == sym)
            .map(|&(_, to)| to)
    }

    /// Extend `set` with everything reachable through free transitions.
    pub fn free_closure(&self, set: &mut StateSet) {
        let mut stack: Vec<StateId> = set.iter().copied().collect();
        while let Some(state) = stack.pop() {
            for &to in &self.states[state].free {
                if set.insert(to) {
                    stack.push(to);
                }
            }
        }
    }

    /// The start states together with their free-closure.
    pub fn start_set(&self) -> StateSet {
        let mut set = self.start.clone();
        self.free_closure(&mut set);
        set
    }

    /// Every state reachable from `from` on `sym`, free-closed on both sides.
    pub fn next(&self, sym: u8, from: &StateSet) -> StateSet {
        let mut from = from.clone();
        self.free_closure(&mut from);

        let mut next = StateSet::new();
        for &state in &from {
            next.extend(self.transitions(state, sym));
        }
        self.free_closure(&mut next);
        next
    }

    /// [`Nfa::next`] for every symbol at once, in a single pass over `from`.
    pub fn next_all(&self, from: &StateSet) -> Vec<StateSet> {
        let mut from = from.clone();
        self.free_closure(&mut from);

        let mut next = vec![StateSet::new(); NUM_SYMBOLS];
        for &state in &from {
            for &(sym, to) in &self.states[state].trans {
                next[usize::from(sym)].insert(to);
            }
        }
        for set in next.iter_mut() {
            self.free_closure(set);
        }
        next
    }
}

impl fmt::Display for Nfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Num states = {}", self.len())?;
        write!(f, "Start IDs:")?;
        for state in &self.start {
            write!(f, " {}", state)?;
        }
        writeln!(f)?;
        for (id, state) in self.states.iter().enumerate() {
            write!(f, " {} ->", id)?;
            for &(sym, to) in &state.trans {
                write!(f, " '{}':{}", alphabet::escape(sym), to)?;
            }
            for &to in &state.free {
                write!(f, " free:{}", to)?;
            }
            if let Some(tag) = state.stop {
                write!(f, " [STOP={}]", tag)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Simulates an [`Nfa`] one symbol at a time.
#[derive(Debug, Clone)]
pub struct NfaRunner<'a> {
    nfa: &'a Nfa,
    states: StateSet,
}

impl<'a> NfaRunner<'a> {
    pub fn new(nfa: &'a Nfa) -> Self {
        Self {
            nfa,
            states: nfa.start_set(),
        }
    }

    pub fn reset(&mut self) {
        self.states = self.nfa.start_set();
    }

    pub fn states(&self) -> &StateSet {
        &self.states
    }

    /// True while at least one state is still alive.
    pub fn is_active(&self) -> bool {
        !self.states.is_empty()
    }

    pub fn is_stop(&self) -> bool {
        self.states.iter().any(|&s| self.nfa.is_stop(s))
    }

    /// The lowest stop tag among the current states.
    pub fn stop(&self) -> Option<u32> {
        self.states.iter().filter_map(|&s| self.nfa.stop(s)).min()
    }

    pub fn next(&mut self, sym: u8) {
        self.states = self.nfa.next(sym, &self.states);
    }

    pub fn next_str(&mut self, text: &str) {
        for b in text.bytes() {
            self.next(b);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn free_transitions_are_followed() {
        // 0 -free-> 1 -a-> 2 -free-> 3(stop)
        let mut nfa = Nfa::new(4);
        nfa.add_free_transition(0, 1);
        nfa.add_transition(1, 2, b'a');
        nfa.add_free_transition(2, 3);
        nfa.set_stop(3, 0);

        assert_eq!(nfa.start_set(), StateSet::from([0, 1]));
        assert_eq!(nfa.next(b'a', &nfa.start_set()), StateSet::from([2, 3]));
        assert!(nfa.next(b'b', &nfa.start_set()).is_empty());
        assert!(nfa.is_empty(0));
        assert!(!nfa.is_empty(1));
        assert!(!nfa.is_empty(3));
        assert!(nfa.has_free_transitions());
    }

    #[test]
    fn runner() {
        // (a|b)*c with explicit nondeterminism on 'a'.
        let mut nfa = Nfa::new(3);
        nfa.add_transition(0, 0, b'a');
        nfa.add_transition(0, 1, b'a');
        nfa.add_transition(0, 0, b'b');
        nfa.add_transition(1, 2, b'c');
        nfa.add_transition(0, 2, b'c');
        nfa.set_stop(2, 7);

        let mut run = NfaRunner::new(&nfa);
        run.next_str("abac");
        assert!(run.is_active());
        assert!(run.is_stop());
        assert_eq!(run.stop(), Some(7));

        run.next(b'c');
        assert!(!run.is_active());

        run.reset();
        run.next(b'a');
        assert_eq!(run.states(), &StateSet::from([0, 1]));
    }

    #[test]
    fn several_start_states() {
        let mut nfa = Nfa::new(1);
        let first = nfa.add_states(3);
        assert_eq!(first, 1);
        assert_eq!(nfa.len(), 4);

        nfa.add_start(2);
        nfa.add_free_transition(2, 3);
        assert_eq!(nfa.starts(), &StateSet::from([0, 2]));
        assert_eq!(nfa.start_set(), StateSet::from([0, 2, 3]));
    }

    #[test]
    fn display() {
        let mut nfa = Nfa::new(2);
        nfa.add_transition(0, 1, b'x');
        nfa.add_free_transition(1, 0);
        nfa.set_stop(1, 0);
        assert_eq!(
            nfa.to_string(),
            "Num states = 2\nStart IDs: 0\n 0 -> 'x':1\n 1 -> free:0 [STOP=0]\n"
        );
    }
}
