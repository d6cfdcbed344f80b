use std::iter::Peekable;
use std::mem;
use std::str::Chars;

use thiserror::Error;

use crate::alphabet::{SymbolSet, NUM_SYMBOLS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    Char(u8),
    Class(SymbolSet),
    Concat(Vec<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Question(Box<Ast>),
    Star(Box<Ast>),
    Plus(Box<Ast>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    #[error("missing operand")]
    MissingOperand,
    #[error("unclosed parenthesis")]
    UnclosedParenthesis,
    #[error("unexpected parenthesis")]
    UnexpectedParenthesis,
    #[error("invalid escape character {0}")]
    InvalidEscape(char),
    #[error("unclosed character class")]
    UnclosedClass,
    #[error("empty character class")]
    EmptyClass,
    #[error("invalid character range {0}-{1}")]
    InvalidRange(char, char),
    #[error("unclosed quoted literal")]
    UnclosedQuote,
    #[error("character {0:?} is outside the ASCII alphabet")]
    NonAscii(char),
    #[error("empty expression")]
    Empty,
}

/// Extract `concat` as an operand of the Or operator and append it to `concat_or`.
fn append_concat(ctx: &mut Context) {
    let mut concat = mem::take(&mut ctx.concat);
    match concat.len() {
        1 => ctx.concat_or.extend(concat.pop()),
        _ => ctx.concat_or.push(Ast::Concat(concat)),
    }
}

/// Construct an AST for the Or operator.
fn or_ast(mut concat_or: Vec<Ast>) -> Option<Ast> {
    let mut ast = concat_or.pop()?;
    // There is no Or operator at this level. e.g. ab(c|d)ef.
    if concat_or.is_empty() {
        return Some(ast);
    }

    concat_or.reverse();
    for operand in concat_or {
        ast = Ast::Or(Box::new(operand), Box::new(ast));
    }
    Some(ast)
}

#[derive(Debug, Default)]
struct Context {
    concat: Vec<Ast>,
    concat_or: Vec<Ast>,
    // Stack that holds the previous context `(concat, concat_or)`.
    stack: Vec<(Vec<Ast>, Vec<Ast>)>,
}

fn ascii(c: char) -> Result<u8, RegexError> {
    if (c as usize) < NUM_SYMBOLS {
        Ok(c as u8)
    } else {
        Err(RegexError::NonAscii(c))
    }
}

/// Decode the character following a backslash.
fn escaped(c: char) -> Result<u8, RegexError> {
    match c {
        'n' => Ok(b'\n'),
        't' => Ok(b'\t'),
        'r' => Ok(b'\r'),
        'f' => Ok(0x0c),
        'v' => Ok(0x0b),
        '0' => Ok(0),
        c if c.is_ascii_punctuation() => Ok(c as u8),
        c => Err(RegexError::InvalidEscape(c)),
    }
}

/// Next member of a class, or `None` at the closing bracket.
fn class_member(chars: &mut Peekable<Chars>) -> Result<Option<u8>, RegexError> {
    match chars.next() {
        None => Err(RegexError::UnclosedClass),
        Some(']') => Ok(None),
        Some('\\') => {
            let c = chars.next().ok_or(RegexError::UnclosedClass)?;
            escaped(c).map(Some)
        }
        Some(c) => ascii(c).map(Some),
    }
}

/// Parse the body of a `[...]` class; the opening bracket is already consumed.
fn class(chars: &mut Peekable<Chars>) -> Result<SymbolSet, RegexError> {
    let negated = chars.next_if_eq(&'^').is_some();
    let mut set = SymbolSet::empty();

    while let Some(lo) = class_member(chars)? {
        // A '-' right before the closing bracket is literal.
        let is_range = chars.peek() == Some(&'-') && chars.clone().nth(1) != Some(']');
        if !is_range {
            set.insert(lo);
            continue;
        }
        chars.next();
        let hi = class_member(chars)?.ok_or(RegexError::UnclosedClass)?;
        if hi < lo {
            return Err(RegexError::InvalidRange(lo as char, hi as char));
        }
        set.insert_range(lo, hi);
    }

    let set = if negated { set.negate() } else { set };
    if set.is_empty() {
        return Err(RegexError::EmptyClass);
    }
    Ok(set)
}

/// Parse the body of a `"..."` literal; the opening quote is already consumed.
fn quoted(chars: &mut Peekable<Chars>) -> Result<Ast, RegexError> {
    let mut literal = Vec::new();
    loop {
        match chars.next() {
            None => return Err(RegexError::UnclosedQuote),
            Some('"') => break,
            Some('\\') => {
                let c = chars.next().ok_or(RegexError::UnclosedQuote)?;
                literal.push(Ast::Char(escaped(c)?));
            }
            Some(c) => literal.push(Ast::Char(ascii(c)?)),
        }
    }

    match literal.len() {
        0 => Err(RegexError::Empty),
        1 => Ok(literal.remove(0)),
        _ => Ok(Ast::Concat(literal)),
    }
}

/// Parse a regular expression pattern into an abstraction syntax tree (AST).
pub fn parse(pattern: &str) -> Result<Ast, RegexError> {
    let mut ctx = Context::default();
    let mut chars = pattern.chars().peekable();

    macro_rules! quantifier {
        ($operator:expr) => {
            if let Some(prev_ast) = ctx.concat.pop() {
                ctx.concat.push($operator(Box::new(prev_ast)));
            } else {
                return Err(RegexError::MissingOperand);
            }
        };
    }

    while let Some(c) = chars.next() {
        match c {
            '|' => {
                if ctx.concat.is_empty() {
                    return Err(RegexError::MissingOperand);
                }

                // Append the left operand to `concat_or`.
                append_concat(&mut ctx);
            }
            '?' => quantifier!(Ast::Question),
            '*' => quantifier!(Ast::Star),
            '+' => quantifier!(Ast::Plus),
            '(' => {
                // Epilogue: push the current context.
                let prev = (mem::take(&mut ctx.concat), mem::take(&mut ctx.concat_or));
                ctx.stack.push(prev);
            }
            ')' => {
                let Some((mut prev_concat, prev_concat_or)) = ctx.stack.pop() else {
                    return Err(RegexError::UnexpectedParenthesis);
                };

                if ctx.concat.is_empty() {
                    // `(a|)` is missing its right operand.
                    if !ctx.concat_or.is_empty() {
                        return Err(RegexError::MissingOperand);
                    }
                } else {
                    // Construct the AST of the expression in parentheses.
                    append_concat(&mut ctx);
                    if let Some(inner_ast) = or_ast(mem::take(&mut ctx.concat_or)) {
                        prev_concat.push(inner_ast);
                    }
                }

                // Prologue: Rewind the context.
                ctx.concat = prev_concat;
                ctx.concat_or = prev_concat_or;
            }
            '[' => ctx.concat.push(Ast::Class(class(&mut chars)?)),
            '"' => ctx.concat.push(quoted(&mut chars)?),
            '.' => ctx.concat.push(Ast::Class(SymbolSet::any_but_newline())),
            '\\' => {
                let c = chars.next().ok_or(RegexError::InvalidEscape('\\'))?;
                ctx.concat.push(Ast::Char(escaped(c)?));
            }
            _ => ctx.concat.push(Ast::Char(ascii(c)?)),
        }
    }

    // Check if there are unclosed parentheses.
    if !ctx.stack.is_empty() {
        return Err(RegexError::UnclosedParenthesis);
    }

    // Process the last operand.
    if ctx.concat.is_empty() {
        // Despite the presence of the Or operator, the right operand is missing.
        if !ctx.concat_or.is_empty() {
            return Err(RegexError::MissingOperand);
        }
    } else {
        // After going through all characters, append the right(=last) operand to `concat_or`.
        append_concat(&mut ctx);
    }

    or_ast(ctx.concat_or).ok_or(RegexError::Empty)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ch(c: char) -> Ast {
        Ast::Char(c as u8)
    }

    fn class_of(s: &str) -> Ast {
        let mut set = SymbolSet::empty();
        for b in s.bytes() {
            set.insert(b);
        }
        Ast::Class(set)
    }

    #[test]
    fn concat_or() {
        let ast = Ast::Concat(vec![ch('a'), ch('b'), ch('c')]);
        assert_eq!(parse("abc").unwrap(), ast);

        let ast = Ast::Or(ch('a').into(), Ast::Or(ch('b').into(), ch('c').into()).into());
        assert_eq!(parse("a|b|c").unwrap(), ast);

        let ast = Ast::Or(
            Ast::Concat(vec![ch('x'), ch('y'), ch('z')]).into(),
            Ast::Or(ch('b').into(), ch('c').into()).into(),
        );
        assert_eq!(parse("xyz|b|c").unwrap(), ast);

        // Error
        assert_eq!(parse("|b"), Err(RegexError::MissingOperand));
        assert_eq!(parse("a|"), Err(RegexError::MissingOperand));
        assert_eq!(parse("|"), Err(RegexError::MissingOperand));

        // Empty expression
        assert_eq!(parse(""), Err(RegexError::Empty));
    }

    #[test]
    fn parenthesis() {
        let ast = Ast::Concat(vec![
            ch('a'),
            ch('b'),
            Ast::Or(
                Ast::Concat(vec![ch('c'), ch('d')]).into(),
                Ast::Concat(vec![ch('e'), ch('f')]).into(),
            ),
        ]);
        assert_eq!(parse("ab(cd|ef)").unwrap(), ast);

        // `()` is skipped but the outer context survives.
        assert_eq!(parse("a()b").unwrap(), Ast::Concat(vec![ch('a'), ch('b')]));

        // Error
        assert_eq!(parse("(ab"), Err(RegexError::UnclosedParenthesis));
        assert_eq!(parse("ab)"), Err(RegexError::UnexpectedParenthesis));
        assert_eq!(parse("("), Err(RegexError::UnclosedParenthesis));
        assert_eq!(parse(")"), Err(RegexError::UnexpectedParenthesis));
        assert_eq!(parse("(a|)"), Err(RegexError::MissingOperand));

        // Empty expression
        assert_eq!(parse("()"), Err(RegexError::Empty));
    }

    #[test]
    fn escape() {
        assert_eq!(parse(r"\+").unwrap(), ch('+'));

        let ast = Ast::Concat(vec![ch('*'), ch('b'), ch('?')]);
        assert_eq!(parse(r"\*b\?").unwrap(), ast);

        let ast = Ast::Concat(vec![ch('\\'), ch('\\'), ch('\\')]);
        assert_eq!(parse(r"\\\\\\").unwrap(), ast);

        assert_eq!(parse(r"\n").unwrap(), ch('\n'));

        // Error
        assert_eq!(parse(r"\a"), Err(RegexError::InvalidEscape('a')));
        assert_eq!(parse(r"a\bc"), Err(RegexError::InvalidEscape('b')));
    }

    #[test]
    fn quantifiers() {
        let ast = Ast::Concat(vec![Ast::Question(ch('a').into()), ch('b')]);
        assert_eq!(parse("a?b").unwrap(), ast);

        let ast = Ast::Concat(vec![
            ch('a'),
            Ast::Star(Ast::Concat(vec![ch('b'), ch('c')]).into()),
            Ast::Plus(ch('d').into()),
        ]);
        assert_eq!(parse("a(bc)*d+").unwrap(), ast);

        // Error
        assert_eq!(parse("?"), Err(RegexError::MissingOperand));
        assert_eq!(parse("*abc"), Err(RegexError::MissingOperand));
        assert_eq!(parse("a|+"), Err(RegexError::MissingOperand));
    }

    #[test]
    fn classes() {
        assert_eq!(parse("[abc]").unwrap(), class_of("abc"));
        assert_eq!(parse("[a-c]").unwrap(), class_of("abc"));
        assert_eq!(parse("[a-]").unwrap(), class_of("a-"));
        assert_eq!(parse(r"[.[\]]").unwrap(), class_of(".[]"));
        assert_eq!(parse("[$]").unwrap(), class_of("$"));

        let Ast::Class(neg) = parse("[^*]").unwrap() else {
            panic!("expected a class");
        };
        assert!(!neg.contains(b'*'));
        assert!(neg.contains(b'\n'));
        assert_eq!(neg.len(), NUM_SYMBOLS - 1);

        let Ast::Class(dot) = parse(".").unwrap() else {
            panic!("expected a class");
        };
        assert!(!dot.contains(b'\n'));

        // Error
        assert_eq!(parse("[]"), Err(RegexError::EmptyClass));
        assert_eq!(parse("[abc"), Err(RegexError::UnclosedClass));
        assert_eq!(parse("[z-a]"), Err(RegexError::InvalidRange('z', 'a')));
    }

    #[test]
    fn quotes() {
        assert_eq!(parse(r#""**""#).unwrap(), Ast::Concat(vec![ch('*'), ch('*')]));
        assert_eq!(
            parse(r#".|"==""#).unwrap(),
            Ast::Or(
                Ast::Class(SymbolSet::any_but_newline()).into(),
                Ast::Concat(vec![ch('='), ch('=')]).into(),
            )
        );
        assert_eq!(parse(r#"\"a\""#).unwrap(), Ast::Concat(vec![ch('"'), ch('a'), ch('"')]));

        // Error
        assert_eq!(parse(r#""ab"#), Err(RegexError::UnclosedQuote));
        assert_eq!(parse("é"), Err(RegexError::NonAscii('é')));
    }
}
