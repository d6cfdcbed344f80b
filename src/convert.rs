//! Conversions between regexes, NFAs and DFAs.
//!
//! Every conversion allocates a new automaton; none of them modify their
//! input.

use std::collections::BTreeMap;

use crate::alphabet::NUM_SYMBOLS;
use crate::codegen;
use crate::dfa::Dfa;
use crate::nfa::{Nfa, StateId, StateSet};
use crate::parser::Ast;

/// Determinize `nfa` by subset construction, dropping dead transitions.
pub fn to_dfa(nfa: &Nfa) -> Dfa {
    determinize(nfa, false)
}

/// Like [`to_dfa`], but transitions into the empty set are kept and lead to
/// an explicit dead state.
pub fn to_dfa_keep_invalid(nfa: &Nfa) -> Dfa {
    determinize(nfa, true)
}

/// Remove states that can only be left through free transitions. Their
/// closure has already been taken, so they add nothing to the set.
fn drop_free_only(nfa: &Nfa, set: &mut StateSet) {
    set.retain(|&s| !nfa.is_empty(s));
}

fn determinize(nfa: &Nfa, keep_invalid: bool) -> Dfa {
    let mut dfa = Dfa::new(1);
    let mut id_map: BTreeMap<StateSet, StateId> = BTreeMap::new();
    let mut worklist: Vec<StateSet> = Vec::new();

    let mut start = nfa.start_set();
    drop_free_only(nfa, &mut start);
    id_map.insert(start.clone(), 0);
    worklist.push(start);

    while let Some(cur_set) = worklist.pop() {
        let cur_id = id_map[&cur_set];

        // The lowest tag among the members wins.
        if let Some(tag) = cur_set.iter().filter_map(|&s| nfa.stop(s)).min() {
            dfa.set_stop(cur_id, tag);
        }

        for (sym, mut next_set) in nfa.next_all(&cur_set).into_iter().enumerate() {
            drop_free_only(nfa, &mut next_set);
            if next_set.is_empty() && !keep_invalid {
                continue;
            }

            let next_id = match id_map.get(&next_set) {
                Some(&id) => id,
                None => {
                    let id = dfa.add_state();
                    id_map.insert(next_set.clone(), id);
                    worklist.push(next_set);
                    id
                }
            };
            debug_assert!(sym < NUM_SYMBOLS);
            dfa.set_transition(cur_id, next_id, sym as u8);
        }
    }

    log::debug!("determinized {} NFA states into {} DFA states", nfa.len(), dfa.len());
    dfa
}

impl Dfa {
    /// Up-convert into an equivalent NFA with the same state ids.
    pub fn to_nfa(&self) -> Nfa {
        let mut nfa = Nfa::new(self.len());
        for from in 0..self.len() {
            for (sym, to) in self.transitions(from).iter().enumerate() {
                if let Some(to) = *to {
                    nfa.add_transition(from, to, sym as u8);
                }
            }
            if let Some(tag) = self.stop(from) {
                nfa.set_stop(from, tag);
            }
        }
        nfa
    }
}

/// Compile a regex into a fresh NFA: state 0 starts, state 1 accepts with tag 0.
pub fn regex_to_nfa(ast: &Ast) -> Nfa {
    let mut nfa = Nfa::new(2);
    nfa.set_stop(1, 0);
    codegen::compile_into(&mut nfa, ast, 0, 1);
    nfa
}

pub fn regex_to_dfa(ast: &Ast) -> Dfa {
    to_dfa(&regex_to_nfa(ast))
}

/// Anything that can produce a DFA.
pub trait ToDfa {
    fn to_dfa(&self) -> Dfa;
}

/// Anything that can produce an NFA.
pub trait ToNfa {
    fn to_nfa(&self) -> Nfa;
}

impl ToDfa for Dfa {
    fn to_dfa(&self) -> Dfa {
        self.clone()
    }
}

impl ToDfa for Nfa {
    fn to_dfa(&self) -> Dfa {
        to_dfa(self)
    }
}

impl ToDfa for Ast {
    fn to_dfa(&self) -> Dfa {
        regex_to_dfa(self)
    }
}

impl ToNfa for Nfa {
    fn to_nfa(&self) -> Nfa {
        self.clone()
    }
}

impl ToNfa for Dfa {
    fn to_nfa(&self) -> Nfa {
        Dfa::to_nfa(self)
    }
}

impl ToNfa for Ast {
    fn to_nfa(&self) -> Nfa {
        regex_to_nfa(self)
    }
}
