use crate::alphabet::SymbolSet;
use crate::nfa::{Nfa, StateId};
use crate::notify::Notify;
use crate::parser::{self, Ast, RegexError};

/// Emits Thompson fragments into an existing NFA.
///
/// Every fragment is built between an `entry` and an `exit` state supplied by
/// the caller. New states are only ever appended, so ids below the ones a
/// fragment allocates are left untouched.
struct CodeGenerator<'a> {
    nfa: &'a mut Nfa,
}

impl<'a> CodeGenerator<'a> {
    fn expr(&mut self, ast: &Ast, entry: StateId, exit: StateId) {
        match ast {
            Ast::Char(c) => self.nfa.add_transition(entry, exit, *c),
            Ast::Class(set) => self.class(set, entry, exit),
            Ast::Concat(concat) => self.concat(concat, entry, exit),
            Ast::Or(lhs, rhs) => self.or(lhs, rhs, entry, exit),
            Ast::Question(e) => self.question(e, entry, exit),
            Ast::Star(e) => self.star(e, entry, exit),
            Ast::Plus(e) => self.plus(e, entry, exit),
        }
    }

    fn class(&mut self, set: &SymbolSet, entry: StateId, exit: StateId) {
        self.nfa.add_transition_symbols(entry, exit, set);
    }

    /// Generate code for Concatenation operator.
    ///
    /// e1e2
    /// ```txt
    /// entry -e1-> m -e2-> exit
    /// ```
    fn concat(&mut self, concat: &[Ast], entry: StateId, exit: StateId) {
        let Some((last, init)) = concat.split_last() else {
            self.nfa.add_free_transition(entry, exit);
            return;
        };

        let mut cur = entry;
        for ast in init {
            let next = self.nfa.add_state();
            self.expr(ast, cur, next);
            cur = next;
        }
        self.expr(last, cur, exit);
    }

    /// Generate code for OR operator.
    ///
    /// e1|e2
    /// ```txt
    /// entry -free-> L1 -e1-> L2 -free-> exit
    ///               L1 -e2-> L2
    /// ```
    fn or(&mut self, lhs: &Ast, rhs: &Ast, entry: StateId, exit: StateId) {
        let l1 = self.nfa.add_state();
        let l2 = self.nfa.add_state();
        self.nfa.add_free_transition(entry, l1);
        self.expr(lhs, l1, l2);
        self.expr(rhs, l1, l2);
        self.nfa.add_free_transition(l2, exit);
    }

    /// Generate code for Question operator.
    ///
    /// e?
    /// ```txt
    /// entry -e----> exit
    /// entry -free-> exit
    /// ```
    fn question(&mut self, e: &Ast, entry: StateId, exit: StateId) {
        self.expr(e, entry, exit);
        self.nfa.add_free_transition(entry, exit);
    }

    /// Generate code for Star operator.
    ///
    /// e*
    /// ```txt
    /// entry -free-> L1 -e-> L2 -free-> exit
    ///               L1 <-free- L2
    /// entry -free-> exit
    /// ```
    fn star(&mut self, e: &Ast, entry: StateId, exit: StateId) {
        self.plus(e, entry, exit);
        self.nfa.add_free_transition(entry, exit);
    }

    /// Generate code for Plus operator.
    ///
    /// e+
    /// ```txt
    /// entry -free-> L1 -e-> L2 -free-> exit
    ///               L1 <-free- L2
    /// ```
    fn plus(&mut self, e: &Ast, entry: StateId, exit: StateId) {
        let l1 = self.nfa.add_state();
        let l2 = self.nfa.add_state();
        self.nfa.add_free_transition(entry, l1);
        self.expr(e, l1, l2);
        self.nfa.add_free_transition(l2, l1);
        self.nfa.add_free_transition(l2, exit);
    }
}

/// Add states and transitions to `nfa` so that the paths from `entry` to
/// `exit` spell exactly the language of `ast`.
pub fn compile_into(nfa: &mut Nfa, ast: &Ast, entry: StateId, exit: StateId) {
    let before = nfa.len();
    CodeGenerator { nfa }.expr(ast, entry, exit);
    log::trace!("regex fragment {}->{} added {} states", entry, exit, nfa.len() - before);
}

/// Parse `pattern` and compile it into `nfa` between `entry` and `exit`.
///
/// A syntax error is reported to `sink` and returned; `nfa` is not modified
/// in that case.
pub fn compile_pattern(
    nfa: &mut Nfa,
    pattern: &str,
    entry: StateId,
    exit: StateId,
    sink: &dyn Notify,
) -> Result<(), RegexError> {
    let ast = parser::parse(pattern).map_err(|err| {
        sink.notify("regex::syntax", &format!("invalid pattern {:?}: {}", pattern, err));
        err
    })?;
    compile_into(nfa, &ast, entry, exit);
    Ok(())
}
