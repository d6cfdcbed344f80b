//! Finite automata over ASCII, a regex-driven lexer built on them, and an
//! expression compiler that turns formulas over named record fields into
//! reusable closures.

pub mod alphabet;
pub mod codegen;
pub mod convert;
pub mod datum;
pub mod dfa;
pub mod expr;
pub mod functions;
pub mod lexer;
pub mod nfa;
pub mod notify;
pub mod parser;
pub mod record;

use thiserror::Error;

pub use crate::alphabet::{SymbolSet, NUM_SYMBOLS};
pub use crate::convert::{regex_to_dfa, regex_to_nfa, to_dfa, to_dfa_keep_invalid, ToDfa, ToNfa};
pub use crate::datum::Datum;
pub use crate::dfa::Dfa;
pub use crate::expr::{CompiledExpr, ExprCompiler, ExprError, ValueFn};
pub use crate::functions::{Function, RandomSource};
pub use crate::lexer::{Cursor, LexError, Lexer, Token, TokenId, TokenStream};
pub use crate::nfa::{Nfa, NfaRunner, StateId, StateSet};
pub use crate::notify::{CollectNotify, LogNotify, Notify, SharedNotify};
pub use crate::parser::{Ast, RegexError};
pub use crate::record::{Accessor, DataLayout, DataMap, Record, Schema};

/// Any error produced by this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Regex(#[from] RegexError),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Expr(#[from] ExprError),
}

/// A compiled regular expression.
///
/// The DFA is built once in [`Regex::new`]; matching never allocates.
#[derive(Debug, Clone)]
pub struct Regex {
    pattern: String,
    ast: Ast,
    dfa: Dfa,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Self, RegexError> {
        let ast = parser::parse(pattern)?;
        let dfa = convert::regex_to_dfa(&ast);
        log::debug!("regex {:?} compiled to {} DFA states", pattern, dfa.len());
        Ok(Regex {
            pattern: pattern.to_string(),
            ast,
            dfa,
        })
    }

    /// Like [`Regex::new`], also reporting a syntax error to `sink`.
    pub fn with_notify(pattern: &str, sink: &dyn Notify) -> Result<Self, RegexError> {
        Self::new(pattern).map_err(|err| {
            sink.notify("regex::syntax", &format!("invalid pattern {:?}: {}", pattern, err));
            err
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    /// True if the whole of `text` matches.
    pub fn is_match(&self, text: &str) -> bool {
        self.dfa.test(text)
    }

    /// The leftmost-longest match in `text` as a byte range.
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        let bytes = text.as_bytes();
        let empty_ok = self.dfa.is_stop(0);
        for start in 0..=bytes.len() {
            if let Some((len, _)) = self.dfa.longest_match(&bytes[start..]) {
                return Some((start, start + len));
            }
            if empty_ok {
                return Some((start, start));
            }
        }
        None
    }
}

impl ToDfa for Regex {
    fn to_dfa(&self) -> Dfa {
        self.dfa.clone()
    }
}

impl ToNfa for Regex {
    fn to_nfa(&self) -> Nfa {
        convert::regex_to_nfa(&self.ast)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whole_match() {
        let re = Regex::new("ab(cd|ef)*").unwrap();
        assert_eq!(re.as_str(), "ab(cd|ef)*");
        assert!(re.is_match("ab"));
        assert!(re.is_match("abcdefcd"));
        assert!(!re.is_match("abc"));
        assert!(!re.is_match("xab"));

        let re = Regex::new("[0-9]+(\\.[0-9]+)?").unwrap();
        assert!(re.is_match("3.14"));
        assert!(!re.is_match("3."));
    }

    #[test]
    fn find() {
        let re = Regex::new("[0-9]+").unwrap();
        assert_eq!(re.find("abc 123 45"), Some((4, 7)));
        assert_eq!(re.find("none"), None);

        let re = Regex::new("x*").unwrap();
        assert_eq!(re.find("abxx"), Some((0, 0)));
    }

    #[test]
    fn conversions_agree() {
        let re = Regex::new("a(b|c)*d").unwrap();
        let from_nfa = re.to_nfa().to_dfa();
        assert_eq!(from_nfa, re.to_dfa());
        for text in ["ad", "abcbd", "abd", "a", "abca"] {
            assert_eq!(from_nfa.test(text), re.is_match(text), "{}", text);
        }
    }

    #[test]
    fn errors() {
        let sink = CollectNotify::new();
        let err = Regex::with_notify("a|", &*sink).unwrap_err();
        assert_eq!(err, RegexError::MissingOperand);
        assert_eq!(sink.messages()[0].0, "regex::syntax");

        let err: Error = err.into();
        assert!(matches!(err, Error::Regex(RegexError::MissingOperand)));
        assert_eq!(err.to_string(), "missing operand");
    }
}
