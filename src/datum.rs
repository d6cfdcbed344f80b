use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};

/// The single runtime value type of compiled expressions: a number or a
/// string.
///
/// Arithmetic works on numbers; a string that does not parse as a number
/// reads as `0`. `+` concatenates when either side is a string. Comparisons
/// between two strings are lexicographic, anything else compares numerically.
#[derive(Debug, Clone)]
pub enum Datum {
    Num(f64),
    Str(String),
}

impl Default for Datum {
    fn default() -> Self {
        Datum::Num(0.0)
    }
}

impl Datum {
    pub fn is_num(&self) -> bool {
        matches!(self, Datum::Num(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Datum::Str(_))
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Datum::Num(v) => *v,
            Datum::Str(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn as_bool(&self) -> bool {
        self.as_f64() != 0.0
    }

    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Num(v) => write!(f, "{}", v),
            Datum::Str(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Num(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Num(f64::from(v))
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Num(if v { 1.0 } else { 0.0 })
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Str(v.to_string())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Datum::Str(v)
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Str(a), Datum::Str(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialEq<f64> for Datum {
    fn eq(&self, other: &f64) -> bool {
        self.as_f64() == *other
    }
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Datum::Str(a), Datum::Str(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl Add for Datum {
    type Output = Datum;

    fn add(self, rhs: Datum) -> Datum {
        match (self, rhs) {
            (Datum::Num(a), Datum::Num(b)) => Datum::Num(a + b),
            (a, b) => Datum::Str(format!("{}{}", a, b)),
        }
    }
}

macro_rules! numeric_op {
    ($trait:ident, $method:ident, $f:expr) => {
        impl $trait for Datum {
            type Output = Datum;

            fn $method(self, rhs: Datum) -> Datum {
                let f: fn(f64, f64) -> f64 = $f;
                Datum::Num(f(self.as_f64(), rhs.as_f64()))
            }
        }
    };
}

numeric_op!(Sub, sub, |a, b| a - b);
numeric_op!(Mul, mul, |a, b| a * b);
numeric_op!(Div, div, |a, b| a / b);
// Floored modulus: the result takes the sign of the divisor.
numeric_op!(Rem, rem, |a, b| {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
});

impl Neg for Datum {
    type Output = Datum;

    fn neg(self) -> Datum {
        Datum::Num(-self.as_f64())
    }
}

impl Not for Datum {
    type Output = Datum;

    fn not(self) -> Datum {
        Datum::from(!self.as_bool())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        assert_eq!(Datum::from(3.0) + Datum::from(4.0), 7.0);
        assert_eq!(Datum::from(3.0) - Datum::from(4.0), -1.0);
        assert_eq!(Datum::from(3.0) * Datum::from(4.0), 12.0);
        assert_eq!(Datum::from(3.0) / Datum::from(4.0), 0.75);
        assert_eq!(Datum::from(7.0) % Datum::from(3.0), 1.0);
        assert_eq!(Datum::from(-7.0) % Datum::from(3.0), 2.0);
        assert_eq!(-Datum::from(2.5), -2.5);
        assert_eq!(!Datum::from(0.0), 1.0);
        assert_eq!(!Datum::from(2.0), 0.0);
    }

    #[test]
    fn strings() {
        let joined = Datum::from("ab") + Datum::from(1.0);
        assert!(joined.is_str());
        assert!(!joined.is_num());
        assert!((Datum::from("2") * Datum::from(1.0)).is_num());
        assert_eq!(joined.as_string(), "ab1");
        assert_eq!(Datum::from("2.5") * Datum::from(2.0), 5.0);
        assert_eq!(Datum::from("junk").as_f64(), 0.0);
        assert!(Datum::from("abc") < Datum::from("abd"));
        assert_eq!(Datum::from("3"), Datum::from(3.0));
        assert_ne!(Datum::from("3.0"), Datum::from("3"));
    }

    #[test]
    fn display() {
        assert_eq!(Datum::from(7.0).to_string(), "7");
        assert_eq!(Datum::from(0.5).to_string(), "0.5");
        assert_eq!(Datum::from("hi").to_string(), "hi");
    }
}
