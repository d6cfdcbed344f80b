//! Operator and function tables used by the expression compiler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::datum::Datum;

pub type UnaryFn = Arc<dyn Fn(Datum) -> Datum + Send + Sync>;
pub type BinaryFn = Arc<dyn Fn(Datum, Datum) -> Datum + Send + Sync>;

/// Functions can take at most this many arguments.
pub const MAX_ARGS: usize = 3;

/// One overload of a named function, tagged by arity.
#[derive(Clone)]
pub enum Function {
    Nullary(Arc<dyn Fn() -> Datum + Send + Sync>),
    Unary(UnaryFn),
    Binary(BinaryFn),
    Ternary(Arc<dyn Fn(Datum, Datum, Datum) -> Datum + Send + Sync>),
}

impl Function {
    pub fn nullary(f: impl Fn() -> Datum + Send + Sync + 'static) -> Self {
        Function::Nullary(Arc::new(f))
    }

    pub fn unary(f: impl Fn(Datum) -> Datum + Send + Sync + 'static) -> Self {
        Function::Unary(Arc::new(f))
    }

    pub fn binary(f: impl Fn(Datum, Datum) -> Datum + Send + Sync + 'static) -> Self {
        Function::Binary(Arc::new(f))
    }

    pub fn ternary(f: impl Fn(Datum, Datum, Datum) -> Datum + Send + Sync + 'static) -> Self {
        Function::Ternary(Arc::new(f))
    }

    /// Lift an `f64 -> f64` math function.
    pub fn math1(f: fn(f64) -> f64) -> Self {
        Self::unary(move |x| Datum::Num(f(x.as_f64())))
    }

    pub fn math2(f: fn(f64, f64) -> f64) -> Self {
        Self::binary(move |x, y| Datum::Num(f(x.as_f64(), y.as_f64())))
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Nullary(_) => 0,
            Function::Unary(_) => 1,
            Function::Binary(_) => 2,
            Function::Ternary(_) => 3,
        }
    }
}

/// Binary operator with its precedence. Higher binds tighter.
#[derive(Clone)]
pub struct BinaryOperator {
    pub prec: usize,
    pub fun: BinaryFn,
}

/// Overloads of one function name, indexed by arity.
#[derive(Clone, Default)]
pub struct Overloads([Option<Function>; MAX_ARGS + 1]);

impl Overloads {
    pub fn set(&mut self, fun: Function) {
        let arity = fun.arity();
        self.0[arity] = Some(fun);
    }

    pub fn get(&self, arity: usize) -> Option<&Function> {
        self.0.get(arity).and_then(Option::as_ref)
    }
}

/// Source of random numbers for the `RAND` functions.
pub trait RandomSource {
    /// A value in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// A value in `[0, max)`.
    fn next_f64_max(&mut self, max: f64) -> f64 {
        self.next_f64() * max
    }

    /// A value in `[min, max)`.
    fn next_f64_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}

impl<R: rand::Rng> RandomSource for R {
    fn next_f64(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

pub type SharedRandom = Arc<Mutex<dyn RandomSource + Send>>;

/// `x` relative to `y`, treating values within `|y| / 8192` as equal.
pub fn approx_compare(x: f64, y: f64) -> i32 {
    const APPROX_FRACTION: f64 = 8192.0;
    let margin = y.abs() / APPROX_FRACTION;
    if x < y - margin {
        -1
    } else if x > y + margin {
        1
    } else {
        0
    }
}

/// Logarithm of `x` in base `base`.
fn log_base(x: f64, base: f64) -> f64 {
    x.ln() / base.ln()
}

/// A comparison operator over the result of [`approx_compare`].
fn approx_op(test: fn(i32) -> bool) -> BinaryFn {
    Arc::new(move |x: Datum, y: Datum| Datum::from(test(approx_compare(x.as_f64(), y.as_f64()))))
}

pub(crate) fn default_unary_ops() -> HashMap<String, UnaryFn> {
    let mut ops: HashMap<String, UnaryFn> = HashMap::new();
    ops.insert("+".into(), Arc::new(|x: Datum| x));
    ops.insert("-".into(), Arc::new(|x: Datum| -x));
    ops.insert("!".into(), Arc::new(|x: Datum| !x));
    ops
}

pub(crate) fn default_binary_ops() -> HashMap<String, BinaryOperator> {
    let mut ops = HashMap::new();
    let mut prec = 0;
    let mut add = |name: &str, prec: usize, fun: BinaryFn| {
        ops.insert(name.to_string(), BinaryOperator { prec, fun });
    };

    prec += 1;
    add(
        "||",
        prec,
        Arc::new(|x: Datum, y: Datum| Datum::from(x.as_bool() || y.as_bool())),
    );
    prec += 1;
    add(
        "&&",
        prec,
        Arc::new(|x: Datum, y: Datum| Datum::from(x.as_bool() && y.as_bool())),
    );
    prec += 1;
    add("==", prec, Arc::new(|x: Datum, y: Datum| Datum::from(x == y)));
    add("!=", prec, Arc::new(|x: Datum, y: Datum| Datum::from(x != y)));
    add("~==", prec, approx_op(|c| c == 0));
    add("~!=", prec, approx_op(|c| c != 0));
    prec += 1;
    add("<", prec, Arc::new(|x: Datum, y: Datum| Datum::from(x < y)));
    add("<=", prec, Arc::new(|x: Datum, y: Datum| Datum::from(x <= y)));
    add(">", prec, Arc::new(|x: Datum, y: Datum| Datum::from(x > y)));
    add(">=", prec, Arc::new(|x: Datum, y: Datum| Datum::from(x >= y)));
    add("~<", prec, approx_op(|c| c == -1));
    add("~<=", prec, approx_op(|c| c != 1));
    add("~>", prec, approx_op(|c| c == 1));
    add("~>=", prec, approx_op(|c| c != -1));
    prec += 1;
    add("+", prec, Arc::new(|x: Datum, y: Datum| x + y));
    add("-", prec, Arc::new(|x: Datum, y: Datum| x - y));
    prec += 1;
    add("*", prec, Arc::new(|x: Datum, y: Datum| x * y));
    add("/", prec, Arc::new(|x: Datum, y: Datum| x / y));
    add("%", prec, Arc::new(|x: Datum, y: Datum| x % y));
    prec += 1;
    add("**", prec, Arc::new(|x: Datum, y: Datum| Datum::Num(x.as_f64().powf(y.as_f64()))));
    add("%%", prec, Arc::new(|x: Datum, y: Datum| Datum::Num(log_base(x.as_f64(), y.as_f64()))));

    ops
}

pub(crate) fn default_functions() -> HashMap<String, Overloads> {
    let mut functions: HashMap<String, Overloads> = HashMap::new();
    let mut add = |name: &str, fun: Function| {
        functions.entry(name.to_string()).or_default().set(fun);
    };

    add("ABS", Function::math1(f64::abs));
    add("EXP", Function::math1(f64::exp));
    add("LOG", Function::math1(f64::ln));
    add("LOG2", Function::math1(f64::log2));
    add("LOG10", Function::math1(f64::log10));

    add("SQRT", Function::math1(f64::sqrt));
    add("CBRT", Function::math1(f64::cbrt));

    add("SIN", Function::math1(f64::sin));
    add("COS", Function::math1(f64::cos));
    add("TAN", Function::math1(f64::tan));
    add("ASIN", Function::math1(f64::asin));
    add("ACOS", Function::math1(f64::acos));
    add("ATAN", Function::math1(f64::atan));
    add("SINH", Function::math1(f64::sinh));
    add("COSH", Function::math1(f64::cosh));
    add("TANH", Function::math1(f64::tanh));
    add("ASINH", Function::math1(f64::asinh));
    add("ACOSH", Function::math1(f64::acosh));
    add("ATANH", Function::math1(f64::atanh));

    add("CEIL", Function::math1(f64::ceil));
    add("FLOOR", Function::math1(f64::floor));
    add("ROUND", Function::math1(f64::round));

    add("ISINF", Function::unary(|x| Datum::from(x.as_f64().is_infinite())));
    add("ISNAN", Function::unary(|x| Datum::from(x.as_f64().is_nan())));

    add("HYPOT", Function::math2(f64::hypot));
    add("EXP", Function::math2(f64::powf));
    add("LOG", Function::math2(log_base));
    add("MIN", Function::binary(|x, y| if x < y { x } else { y }));
    add("MAX", Function::binary(|x, y| if x > y { x } else { y }));
    add("POW", Function::math2(f64::powf));

    add("IF", Function::ternary(|x, y, z| if x.as_bool() { y } else { z }));
    add(
        "CLAMP",
        Function::ternary(|x, lo, hi| {
            if x < lo {
                lo
            } else if x > hi {
                hi
            } else {
                x
            }
        }),
    );
    add(
        "TO_SCALE",
        Function::ternary(|x, lo: Datum, hi: Datum| {
            let (x, lo, hi) = (x.as_f64(), lo.as_f64(), hi.as_f64());
            Datum::Num((hi - lo) * x + lo)
        }),
    );
    add(
        "FROM_SCALE",
        Function::ternary(|x: Datum, lo: Datum, hi: Datum| {
            let (x, lo, hi) = (x.as_f64(), lo.as_f64(), hi.as_f64());
            Datum::Num((x - lo) / (hi - lo))
        }),
    );

    functions
}

pub(crate) fn random_functions(random: SharedRandom) -> Vec<Function> {
    let r0 = random.clone();
    let r1 = random.clone();
    let r2 = random;
    vec![
        Function::nullary(move || Datum::Num(lock(&r0).next_f64())),
        Function::unary(move |max| Datum::Num(lock(&r1).next_f64_max(max.as_f64()))),
        Function::binary(move |min, max| {
            Datum::Num(lock(&r2).next_f64_range(min.as_f64(), max.as_f64()))
        }),
    ]
}

fn lock(random: &SharedRandom) -> std::sync::MutexGuard<'_, dyn RandomSource + Send + 'static> {
    random.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
