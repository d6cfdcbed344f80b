//! Compiles arithmetic expressions over record fields into closures.
//!
//! ```
//! use std::sync::Arc;
//! use lexcalc::{DataLayout, DataMap, ExprCompiler};
//!
//! let layout = Arc::new(DataLayout::from_iter(["x"]));
//! let mut record = DataMap::new(layout.clone());
//! record.set("x", 3.0);
//!
//! let compiler = ExprCompiler::new();
//! let expr = compiler.compile(&*layout, "x * 2 + 1", &[]).unwrap();
//! assert_eq!(expr.eval(&record), 7.0);
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::datum::Datum;
use crate::functions::{
    self, BinaryFn, BinaryOperator, Function, Overloads, RandomSource, SharedRandom, UnaryFn,
    MAX_ARGS,
};
use crate::lexer::{Cursor, LexError, Lexer, Token, TokenId, TokenStream};
use crate::notify::{self, SharedNotify};
use crate::record::{Record, Schema};

/// A compiled expression body: record in, value out.
pub type ValueFn<R> = Arc<dyn Fn(&R) -> Datum + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')', but found {0:?}")]
    ExpectedClose(String),
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("operator {0:?} not found")]
    UnknownOperator(String),
    #[error("call to unknown function {0:?}")]
    UnknownFunction(String),
    #[error("function {name:?} cannot take {args} arguments")]
    WrongArity { name: String, args: usize },
    #[error("too many arguments for function {0:?}")]
    TooManyArgs(String),
    #[error("unknown data map entry {0:?}")]
    UnknownField(String),
    #[error("invalid access into external value ${index}: {available} provided")]
    BadExternal { index: String, available: usize },
    #[error("invalid literal {0}")]
    BadLiteral(String),
}

/// The fixed token grammar of expressions.
struct ExprLexer {
    lexer: Lexer,
    identifier: TokenId,
    number: TokenId,
    string: TokenId,
    character: TokenId,
    external: TokenId,
    symbol: TokenId,
}

impl ExprLexer {
    fn new(sink: SharedNotify) -> Self {
        let mut lexer = Lexer::with_notify(sink);
        let mut builtin = |ignore: bool, name: &str, pattern: &str| {
            let id = if ignore {
                lexer.ignore_token(name, pattern)
            } else {
                lexer.add_token(name, pattern)
            };
            id.unwrap_or_else(|err| unreachable!("built-in token {:?} is invalid: {}", name, err))
        };

        // Whitespace and comments are dropped before anything else.
        builtin(true, "Whitespace", "[ \t\n\r]+");
        builtin(true, "//-Comments", "//.*");
        builtin(true, "/*...*/-Comments", "/[*]([^*]|([*]+[^*/]))*[*]+/");

        let identifier = builtin(false, "Identifier", r"[a-zA-Z_.][a-zA-Z0-9_.[\]]*");
        let number = builtin(false, "Literal Number", r"[0-9]+(\.[0-9]+)?");
        let string = builtin(false, "Literal String", r#"\"([^"\\]|\\.)*\""#);
        let character = builtin(false, "Literal Character", r"'([^'\n\\]|\\.)+'");
        let external = builtin(false, "External Value", "[$][0-9]+");

        // Any other single character, or one of the compound operators.
        let symbol = builtin(
            false,
            "Symbol",
            r#".|"=="|"!="|"<="|">="|"~=="|"~!="|"~<"|"~>"|"~<="|"~>="|"&&"|"||"|"**"|"%%""#,
        );

        Self {
            lexer,
            identifier,
            number,
            string,
            character,
            external,
            symbol,
        }
    }

    fn is_id(&self, token: &Token) -> bool {
        token.id == self.identifier
    }

    fn is_number(&self, token: &Token) -> bool {
        token.id == self.number
    }

    fn is_string(&self, token: &Token) -> bool {
        token.id == self.string
    }

    fn is_char(&self, token: &Token) -> bool {
        token.id == self.character
    }

    fn is_external(&self, token: &Token) -> bool {
        token.id == self.external
    }

    fn is_symbol(&self, token: &Token) -> bool {
        token.id == self.symbol
    }
}

/// Intermediate parse result: a value known now, or one that needs a record.
enum Value<R> {
    Immediate(Datum),
    Deferred(ValueFn<R>),
}

impl<R: 'static> Value<R> {
    fn into_fn(self) -> ValueFn<R> {
        match self {
            Value::Immediate(v) => Arc::new(move |_: &R| v.clone()),
            Value::Deferred(f) => f,
        }
    }

    fn apply_unary(self, op: UnaryFn) -> Self {
        match self {
            Value::Immediate(v) => Value::Immediate(op(v)),
            Value::Deferred(f) => Value::Deferred(Arc::new(move |r: &R| op(f(r)))),
        }
    }

    /// Combine two operands, folding when neither needs a record.
    fn apply_binary(self, op: BinaryFn, rhs: Self) -> Self {
        match (self, rhs) {
            (Value::Immediate(a), Value::Immediate(b)) => Value::Immediate(op(a, b)),
            (Value::Immediate(a), Value::Deferred(g)) => {
                Value::Deferred(Arc::new(move |r: &R| op(a.clone(), g(r))))
            }
            (Value::Deferred(f), Value::Immediate(b)) => {
                Value::Deferred(Arc::new(move |r: &R| op(f(r), b.clone())))
            }
            (Value::Deferred(f), Value::Deferred(g)) => {
                Value::Deferred(Arc::new(move |r: &R| op(f(r), g(r))))
            }
        }
    }
}

/// Decode backslash escapes inside a quoted literal.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Strip the first and last character of a quoted lexeme.
fn quoted_body(lexeme: &str) -> &str {
    lexeme.get(1..lexeme.len().saturating_sub(1)).unwrap_or("")
}

/// State for a single compilation.
struct Parser<'a, S> {
    compiler: &'a ExprCompiler,
    schema: &'a S,
    externals: &'a [Datum],
    expression: &'a str,
    names: BTreeSet<String>,
}

impl<'a, S> Parser<'a, S>
where
    S: Schema,
    S::Record: 'static,
{
    /// Report `err` and hand it back as the parse result.
    fn fail<T>(&self, err: ExprError) -> Result<T, ExprError> {
        self.compiler
            .sink
            .notify("expr::parse", &format!("{:?}: {}", self.expression, err));
        Err(err)
    }

    fn parse_value(&mut self, pos: &mut Cursor<'_>) -> Result<Value<S::Record>, ExprError> {
        let Some(token) = pos.current() else {
            return self.fail(ExprError::UnexpectedEnd);
        };
        let lexeme = token.lexeme.as_str();
        let compiler = self.compiler;
        let lexer = &compiler.lexer;
        log::trace!("parse_value at {}: {:?}", pos.index(), lexeme);

        if let Some(op) = compiler.unary_ops.get(lexeme) {
            let op = op.clone();
            pos.advance();
            return Ok(self.parse_value(pos)?.apply_unary(op));
        }

        if lexeme == "(" {
            pos.advance();
            let value = self.parse_math(pos, 0)?;
            if pos.lexeme() != ")" {
                let found = pos.current().map(|t| t.lexeme.clone());
                return match found {
                    Some(found) => self.fail(ExprError::ExpectedClose(found)),
                    None => self.fail(ExprError::UnexpectedEnd),
                };
            }
            pos.advance();
            return Ok(value);
        }

        if lexer.is_number(token) {
            let Ok(v) = lexeme.parse::<f64>() else {
                return self.fail(ExprError::BadLiteral(lexeme.to_string()));
            };
            pos.advance();
            return Ok(Value::Immediate(Datum::Num(v)));
        }

        if lexer.is_string(token) {
            pos.advance();
            return Ok(Value::Immediate(Datum::Str(unescape(quoted_body(lexeme)))));
        }

        // A character literal stands for its character code.
        if lexer.is_char(token) {
            let body = unescape(quoted_body(lexeme));
            let mut chars = body.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return self.fail(ExprError::BadLiteral(lexeme.to_string()));
            };
            pos.advance();
            return Ok(Value::Immediate(Datum::Num(f64::from(u32::from(c)))));
        }

        if lexer.is_external(token) {
            let index = &lexeme[1..];
            let Some(value) = index.parse::<usize>().ok().and_then(|i| self.externals.get(i))
            else {
                return self.fail(ExprError::BadExternal {
                    index: index.to_string(),
                    available: self.externals.len(),
                });
            };
            pos.advance();
            return Ok(Value::Immediate(value.clone()));
        }

        if !lexer.is_id(token) {
            return self.fail(ExprError::UnexpectedToken(lexeme.to_string()));
        }

        let name = lexeme.to_string();
        pos.advance();

        // An identifier followed by a parenthesis is a function call.
        if pos.lexeme() == "(" {
            return self.parse_call(name, pos);
        }

        if !self.schema.has_name(&name) {
            return self.fail(ExprError::UnknownField(name));
        }
        let Some(accessor) = self.schema.accessor(&name) else {
            return self.fail(ExprError::UnknownField(name));
        };
        self.names.insert(name);
        Ok(Value::Deferred(accessor))
    }

    fn parse_call(
        &mut self,
        name: String,
        pos: &mut Cursor<'_>,
    ) -> Result<Value<S::Record>, ExprError> {
        let compiler = self.compiler;
        let Some(overloads) = compiler.functions.get(&name) else {
            return self.fail(ExprError::UnknownFunction(name));
        };
        pos.advance();

        let mut args = Vec::new();
        if pos.lexeme() != ")" {
            loop {
                args.push(self.parse_math(pos, 0)?);
                match pos.current().map(|t| t.lexeme.as_str()) {
                    Some(",") => pos.advance(),
                    Some(")") => break,
                    Some(other) => return self.fail(ExprError::UnexpectedToken(other.to_string())),
                    None => return self.fail(ExprError::UnexpectedEnd),
                }
            }
        }
        pos.advance();

        if args.len() > MAX_ARGS {
            return self.fail(ExprError::TooManyArgs(name));
        }
        let Some(fun) = overloads.get(args.len()).cloned() else {
            return self.fail(ExprError::WrongArity {
                name,
                args: args.len(),
            });
        };

        // Calls are never folded: RAND and user functions need not be pure.
        let args: Vec<ValueFn<S::Record>> = args.into_iter().map(Value::into_fn).collect();
        let call: ValueFn<S::Record> = match (fun, args.as_slice()) {
            (Function::Nullary(f), []) => Arc::new(move |_: &S::Record| f()),
            (Function::Unary(f), [a0]) => {
                let a0 = a0.clone();
                Arc::new(move |r: &S::Record| f(a0(r)))
            }
            (Function::Binary(f), [a0, a1]) => {
                let (a0, a1) = (a0.clone(), a1.clone());
                Arc::new(move |r: &S::Record| f(a0(r), a1(r)))
            }
            (Function::Ternary(f), [a0, a1, a2]) => {
                let (a0, a1, a2) = (a0.clone(), a1.clone(), a2.clone());
                Arc::new(move |r: &S::Record| f(a0(r), a1(r), a2(r)))
            }
            (fun, args) => unreachable!(
                "overload of arity {} selected for {} arguments",
                fun.arity(),
                args.len()
            ),
        };
        Ok(Value::Deferred(call))
    }

    /// Precedence climbing: only operators binding tighter than `prec_limit`
    /// are consumed here.
    fn parse_math(
        &mut self,
        pos: &mut Cursor<'_>,
        prec_limit: usize,
    ) -> Result<Value<S::Record>, ExprError> {
        let compiler = self.compiler;
        let mut lhs = self.parse_value(pos)?;

        while let Some(token) = pos.current() {
            let lexeme = token.lexeme.as_str();
            if lexeme == ")" || lexeme == "," {
                break;
            }

            let Some(op) = compiler.binary_ops.get(lexeme) else {
                return self.fail(ExprError::UnknownOperator(lexeme.to_string()));
            };
            if prec_limit >= op.prec {
                break;
            }
            let BinaryOperator { prec, fun } = op.clone();
            log::trace!("parse_math at {}: operator {:?} (prec {})", pos.index(), lexeme, prec);
            pos.advance();

            let rhs = self.parse_math(pos, prec)?;
            lhs = lhs.apply_binary(fun, rhs);
        }

        Ok(lhs)
    }
}

/// The result of [`ExprCompiler::compile`].
pub struct CompiledExpr<R> {
    fun: ValueFn<R>,
    constant: Option<Datum>,
    fields: BTreeSet<String>,
}

impl<R> Clone for CompiledExpr<R> {
    fn clone(&self) -> Self {
        Self {
            fun: self.fun.clone(),
            constant: self.constant.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl<R> fmt::Debug for CompiledExpr<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("constant", &self.constant)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<R> CompiledExpr<R> {
    pub fn eval(&self, record: &R) -> Datum {
        (self.fun)(record)
    }

    /// Record fields the expression reads.
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    /// The folded value, if the expression reads no fields and calls nothing.
    pub fn constant(&self) -> Option<&Datum> {
        self.constant.as_ref()
    }

    pub fn into_fn(self) -> ValueFn<R> {
        self.fun
    }
}

/// Expression compiler with its own operator and function tables.
pub struct ExprCompiler {
    lexer: ExprLexer,
    unary_ops: HashMap<String, UnaryFn>,
    binary_ops: HashMap<String, BinaryOperator>,
    functions: HashMap<String, Overloads>,
    sink: SharedNotify,
}

impl Default for ExprCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExprCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut unary: Vec<_> = self.unary_ops.keys().collect();
        let mut binary: Vec<_> = self.binary_ops.keys().collect();
        let mut functions: Vec<_> = self.functions.keys().collect();
        unary.sort();
        binary.sort();
        functions.sort();
        f.debug_struct("ExprCompiler")
            .field("unary_ops", &unary)
            .field("binary_ops", &binary)
            .field("functions", &functions)
            .finish()
    }
}

impl ExprCompiler {
    /// A compiler with the default operators and functions.
    pub fn new() -> Self {
        let mut compiler = Self::empty();
        compiler.unary_ops = functions::default_unary_ops();
        compiler.binary_ops = functions::default_binary_ops();
        compiler.functions = functions::default_functions();
        compiler
    }

    /// A compiler with no operators or functions at all.
    pub fn empty() -> Self {
        let sink = notify::default_sink();
        Self {
            lexer: ExprLexer::new(sink.clone()),
            unary_ops: HashMap::new(),
            binary_ops: HashMap::new(),
            functions: HashMap::new(),
            sink,
        }
    }

    /// Send diagnostics to `sink` instead of the log.
    pub fn with_notify(mut self, sink: SharedNotify) -> Self {
        self.lexer = ExprLexer::new(sink.clone());
        self.sink = sink;
        self
    }

    /// Register `RAND()`, `RAND(max)` and `RAND(min, max)` drawing from `random`.
    pub fn with_random(mut self, random: impl RandomSource + Send + 'static) -> Self {
        self.add_random_functions(Arc::new(Mutex::new(random)));
        self
    }

    pub fn add_random_functions(&mut self, random: SharedRandom) {
        for fun in functions::random_functions(random) {
            self.register_function("RAND", fun);
        }
    }

    pub fn register_unary(
        &mut self,
        op: &str,
        fun: impl Fn(Datum) -> Datum + Send + Sync + 'static,
    ) {
        self.unary_ops.insert(op.to_string(), Arc::new(fun));
    }

    /// Register a binary operator. `prec` must be at least 1; higher binds
    /// tighter. The operator must lex as a single token.
    pub fn register_operator(
        &mut self,
        op: &str,
        prec: usize,
        fun: impl Fn(Datum, Datum) -> Datum + Send + Sync + 'static,
    ) {
        let op_info = BinaryOperator {
            prec: prec.max(1),
            fun: Arc::new(fun),
        };
        self.binary_ops.insert(op.to_string(), op_info);
    }

    /// Register one overload of `name`; an existing overload of the same
    /// arity is replaced.
    pub fn register_function(&mut self, name: &str, fun: Function) {
        self.functions.entry(name.to_string()).or_default().set(fun);
    }

    /// Compile `expression` against `schema`. `$0`, `$1`, ... are replaced by
    /// the corresponding entries of `extras` at compile time.
    pub fn compile<S>(
        &self,
        schema: &S,
        expression: &str,
        extras: &[Datum],
    ) -> Result<CompiledExpr<S::Record>, ExprError>
    where
        S: Schema,
        S::Record: 'static,
    {
        let tokens = self.tokenize(expression)?;

        let mut parser = Parser {
            compiler: self,
            schema,
            externals: extras,
            expression,
            names: BTreeSet::new(),
        };
        let mut pos = tokens.cursor();
        let value = parser.parse_math(&mut pos, 0)?;
        if let Some(token) = pos.current() {
            return parser.fail(ExprError::UnexpectedToken(token.lexeme.clone()));
        }

        let constant = match &value {
            Value::Immediate(v) => Some(v.clone()),
            Value::Deferred(_) => None,
        };
        log::debug!(
            "compiled {:?}: constant={:?} fields={:?}",
            expression,
            constant,
            parser.names
        );
        Ok(CompiledExpr {
            fun: value.into_fn(),
            constant,
            fields: parser.names,
        })
    }

    /// Compile `expression` against the record's schema and run it once.
    pub fn evaluate<R>(
        &self,
        record: &R,
        expression: &str,
        extras: &[Datum],
    ) -> Result<Datum, ExprError>
    where
        R: Record + 'static,
    {
        let compiled = self.compile(record.schema(), expression, extras)?;
        Ok(compiled.eval(record))
    }

    /// Names of the record fields `expression` refers to. Identifiers that are
    /// immediately followed by `(` are function calls and are left out.
    pub fn fields_referenced(&self, expression: &str) -> Result<BTreeSet<String>, ExprError> {
        let tokens = self.tokenize(expression)?;

        let mut names = BTreeSet::new();
        let mut pos = tokens.cursor();
        while let Some(token) = pos.current() {
            let is_call = pos.peek(1).map_or(false, |next| next.lexeme == "(");
            if self.lexer.is_id(token) && !is_call {
                names.insert(token.lexeme.clone());
            }
            pos.advance();
        }
        Ok(names)
    }

    /// True if `token` is an identifier in the expression grammar.
    pub fn is_identifier(&self, token: &Token) -> bool {
        self.lexer.is_id(token)
    }

    /// True if `token` is a plain symbol (operator or punctuation).
    pub fn is_symbol(&self, token: &Token) -> bool {
        self.lexer.is_symbol(token)
    }

    /// Tokenize `expression` with the expression grammar.
    pub fn tokenize(&self, expression: &str) -> Result<TokenStream, ExprError> {
        Ok(self
            .lexer
            .lexer
            .tokenize(expression, &format!("Expression: {}", expression))?)
    }
}
