use std::cell::OnceCell;
use std::fmt;

use thiserror::Error;

use crate::codegen;
use crate::convert;
use crate::dfa::Dfa;
use crate::nfa::Nfa;
use crate::notify::{self, SharedNotify};
use crate::parser::{self, Ast, RegexError};

/// Index of a token rule, in registration order.
pub type TokenId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: TokenId,
    pub lexeme: String,
    /// 1-based line the lexeme starts on.
    pub line: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("{name}: no token matches {found:?} at line {line}, column {column}")]
    NoMatch {
        name: String,
        found: String,
        line: usize,
        column: usize,
    },
}

#[derive(Debug, Clone)]
struct TokenRule {
    name: String,
    pattern: String,
    ast: Ast,
    ignore: bool,
}

/// A tokenizer driven by a prioritized list of regex rules.
///
/// All rules are merged into one scanning DFA whose stop tags are rule ids.
/// At each position the longest match wins; among equally long matches the
/// rule registered first wins. The DFA is rebuilt lazily after the rule set
/// changes.
pub struct Lexer {
    rules: Vec<TokenRule>,
    dfa: OnceCell<Dfa>,
    sink: SharedNotify,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lexer")
            .field("rules", &self.rules)
            .field("built", &self.dfa.get().is_some())
            .finish()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self::with_notify(notify::default_sink())
    }

    /// A lexer that reports diagnostics to `sink`.
    pub fn with_notify(sink: SharedNotify) -> Self {
        Self {
            rules: Vec::new(),
            dfa: OnceCell::new(),
            sink,
        }
    }

    /// Register a rule whose matches are emitted as tokens.
    pub fn add_token(&mut self, name: &str, pattern: &str) -> Result<TokenId, RegexError> {
        self.add_rule(name, pattern, false)
    }

    /// Register a rule whose matches are consumed but never emitted.
    pub fn ignore_token(&mut self, name: &str, pattern: &str) -> Result<TokenId, RegexError> {
        self.add_rule(name, pattern, true)
    }

    fn add_rule(&mut self, name: &str, pattern: &str, ignore: bool) -> Result<TokenId, RegexError> {
        let ast = parser::parse(pattern).map_err(|err| {
            self.sink.notify(
                "lexer::regex",
                &format!("token {:?} has invalid pattern {:?}: {}", name, pattern, err),
            );
            err
        })?;

        self.rules.push(TokenRule {
            name: name.to_string(),
            pattern: pattern.to_string(),
            ast,
            ignore,
        });
        self.dfa.take();
        Ok(self.rules.len() - 1)
    }

    pub fn num_tokens(&self) -> usize {
        self.rules.len()
    }

    pub fn token_name(&self, id: TokenId) -> Option<&str> {
        self.rules.get(id).map(|r| r.name.as_str())
    }

    pub fn token_pattern(&self, id: TokenId) -> Option<&str> {
        self.rules.get(id).map(|r| r.pattern.as_str())
    }

    pub fn token_id(&self, name: &str) -> Option<TokenId> {
        self.rules.iter().position(|r| r.name == name)
    }

    pub fn is_ignored(&self, id: TokenId) -> bool {
        self.rules.get(id).map_or(false, |r| r.ignore)
    }

    /// The merged scanning DFA, building it if needed.
    pub fn dfa(&self) -> &Dfa {
        self.dfa.get_or_init(|| self.build())
    }

    fn build(&self) -> Dfa {
        let mut nfa = Nfa::new(1);
        for (id, rule) in self.rules.iter().enumerate() {
            let exit = nfa.add_state();
            nfa.set_stop(exit, id as u32);
            codegen::compile_into(&mut nfa, &rule.ast, 0, exit);
        }
        let dfa = convert::to_dfa(&nfa);
        log::debug!(
            "built lexer DFA: {} rules, {} NFA states, {} DFA states",
            self.rules.len(),
            nfa.len(),
            dfa.len()
        );
        dfa
    }

    /// Split `input` into tokens. `name` identifies the input in errors.
    pub fn tokenize(&self, input: &str, name: &str) -> Result<TokenStream, LexError> {
        let dfa = self.dfa();
        let bytes = input.as_bytes();
        let mut tokens = Vec::new();
        let mut pos = 0;
        let mut line = 1;
        let mut line_start = 0;

        while pos < bytes.len() {
            let Some((len, tag)) = dfa.longest_match(&bytes[pos..]) else {
                let err = LexError::NoMatch {
                    name: name.to_string(),
                    found: input[pos..].chars().take(16).collect(),
                    line,
                    column: input[line_start..pos].chars().count() + 1,
                };
                self.sink.notify("lexer::no_match", &err.to_string());
                return Err(err);
            };

            // Only ASCII symbols can match, so `len` ends on a char boundary.
            let lexeme = &input[pos..pos + len];
            let id = tag as TokenId;
            if !self.rules[id].ignore {
                tokens.push(Token {
                    id,
                    lexeme: lexeme.to_string(),
                    line,
                });
            }

            for (i, b) in lexeme.bytes().enumerate() {
                if b == b'\n' {
                    line += 1;
                    line_start = pos + i + 1;
                }
            }
            pos += len;
        }

        Ok(TokenStream {
            name: name.to_string(),
            tokens,
        })
    }
}

/// The immutable result of [`Lexer::tokenize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    name: String,
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// A fresh cursor at the first token.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            tokens: &self.tokens,
            index: 0,
        }
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

/// A position inside a [`TokenStream`].
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> Cursor<'a> {
    pub fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    /// Lexeme of the current token, or `""` past the end.
    pub fn lexeme(&self) -> &'a str {
        self.current().map_or("", |t| t.lexeme.as_str())
    }

    pub fn peek(&self, ahead: usize) -> Option<&'a Token> {
        self.tokens.get(self.index + ahead)
    }

    pub fn advance(&mut self) {
        if self.index < self.tokens.len() {
            self.index += 1;
        }
    }

    pub fn is_valid(&self) -> bool {
        self.index < self.tokens.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::notify::CollectNotify;

    fn ids(stream: &TokenStream) -> Vec<(TokenId, &str)> {
        stream.iter().map(|t| (t.id, t.lexeme.as_str())).collect()
    }

    #[test]
    fn longest_match_wins() {
        let mut lexer = Lexer::new();
        let a = lexer.add_token("A", "ab").unwrap();
        let b = lexer.add_token("B", "a").unwrap();
        let stream = lexer.tokenize("ab", "test").unwrap();
        assert_eq!(ids(&stream), vec![(a, "ab")]);

        let stream = lexer.tokenize("aab", "test").unwrap();
        assert_eq!(ids(&stream), vec![(b, "a"), (a, "ab")]);
    }

    #[test]
    fn ties_go_to_the_earliest_rule() {
        let mut lexer = Lexer::new();
        let star = lexer.add_token("R1", "a*").unwrap();
        lexer.add_token("R2", "a").unwrap();
        assert_eq!(ids(&lexer.tokenize("aa", "test").unwrap()), vec![(star, "aa")]);
        assert_eq!(ids(&lexer.tokenize("a", "test").unwrap()), vec![(star, "a")]);

        let mut lexer = Lexer::new();
        let single = lexer.add_token("R2", "a").unwrap();
        let star = lexer.add_token("R1", "a*").unwrap();
        assert_eq!(ids(&lexer.tokenize("aa", "test").unwrap()), vec![(star, "aa")]);
        assert_eq!(ids(&lexer.tokenize("a", "test").unwrap()), vec![(single, "a")]);
    }

    #[test]
    fn keywords_before_identifiers() {
        let mut lexer = Lexer::new();
        lexer.ignore_token("Whitespace", "[ \t\n]+").unwrap();
        let kw = lexer.add_token("If", "if").unwrap();
        let id = lexer.add_token("Identifier", "[a-z]+").unwrap();
        let stream = lexer.tokenize("if iffy\n if", "test").unwrap();
        assert_eq!(ids(&stream), vec![(kw, "if"), (id, "iffy"), (kw, "if")]);
        assert_eq!(stream.get(2).unwrap().line, 2);
    }

    #[test]
    fn ignored_rules_are_dropped() {
        let mut lexer = Lexer::new();
        let ws = lexer.ignore_token("Whitespace", "[ ]+").unwrap();
        let num = lexer.add_token("Number", "[0-9]+").unwrap();
        assert!(lexer.is_ignored(ws));
        assert!(!lexer.is_ignored(num));

        let stream = lexer.tokenize("  12 3  ", "nums").unwrap();
        assert_eq!(ids(&stream), vec![(num, "12"), (num, "3")]);
        assert_eq!(stream.name(), "nums");
    }

    #[test]
    fn no_match_is_reported() {
        let sink = CollectNotify::new();
        let mut lexer = Lexer::with_notify(sink.clone());
        lexer.add_token("Number", "[0-9]+").unwrap();
        lexer.ignore_token("Newline", "\n").unwrap();

        let err = lexer.tokenize("12\n3x4", "input").unwrap_err();
        assert_eq!(
            err,
            LexError::NoMatch {
                name: "input".to_string(),
                found: "x4".to_string(),
                line: 2,
                column: 2,
            }
        );
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.messages()[0].0, "lexer::no_match");

        // Characters outside the alphabet never match.
        assert!(lexer.tokenize("1é", "input").is_err());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn bad_pattern_is_reported() {
        let sink = CollectNotify::new();
        let mut lexer = Lexer::with_notify(sink.clone());
        assert_eq!(lexer.add_token("Bad", "(a"), Err(RegexError::UnclosedParenthesis));
        assert_eq!(lexer.num_tokens(), 0);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn rules_take_effect_on_next_tokenize() {
        let mut lexer = Lexer::new();
        lexer.add_token("Letters", "[a-z]+").unwrap();
        assert!(lexer.tokenize("ab1", "test").is_err());

        let digits = lexer.add_token("Digits", "[0-9]+").unwrap();
        let stream = lexer.tokenize("ab1", "test").unwrap();
        assert_eq!(stream.get(1).map(|t| t.id), Some(digits));
        assert_eq!(lexer.token_name(digits), Some("Digits"));
        assert_eq!(lexer.token_id("Letters"), Some(0));
        assert_eq!(lexer.token_pattern(digits), Some("[0-9]+"));
        assert_eq!(lexer.token_id("Nope"), None);
    }

    #[test]
    fn cursor() {
        let mut lexer = Lexer::new();
        lexer.ignore_token("Whitespace", " +").unwrap();
        lexer.add_token("Word", "[a-z]+").unwrap();
        let stream = lexer.tokenize("one two", "test").unwrap();

        let mut pos = stream.cursor();
        assert!(pos.is_valid());
        assert_eq!(pos.lexeme(), "one");
        assert_eq!(pos.peek(1).map(|t| t.lexeme.as_str()), Some("two"));
        pos.advance();
        assert_eq!(pos.lexeme(), "two");
        pos.advance();
        assert!(!pos.is_valid());
        assert_eq!(pos.lexeme(), "");
        assert_eq!(pos.index(), 2);

        // A new cursor starts over.
        assert_eq!(stream.cursor().lexeme(), "one");
        assert_eq!((&stream).into_iter().count(), 2);
    }
}
