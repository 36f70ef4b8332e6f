//! The tagged cell model for the interpreter. The main enum, [`Cell`], covers
//! every runtime datum: integers, reals, symbols, cons pairs, the empty list,
//! user-defined closures, and primitive procedures. Rendering follows Scheme
//! conventions, including dotted notation for improper pair chains, and
//! equality is structural except for procedures, which compare by identity.
//!
//! Cells are immutable once constructed. `Clone` produces a structurally
//! independent deep copy, which is what evaluation hands out whenever a value
//! crosses from the environment to a caller.

use crate::Error;
use crate::primitives::Primitive;
use std::fmt;

/// One tagged runtime datum.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Exact integer
    Integer(i64),
    /// Floating-point number, rendered with 6 significant digits
    Real(f64),
    /// Identifier; identity drives variable lookup and special-form dispatch
    Symbol(String),
    /// Cons pair (head, tail); the only recursive structure
    Pair(Box<Cell>, Box<Cell>),
    /// The empty list. A unit variant, so "is this nil" is a tag check and
    /// never a structural comparison.
    Empty,
    /// User-defined procedure: formal parameter spec plus a body sequence
    Closure {
        formals: Box<Cell>,
        body: Box<Cell>,
    },
    /// Built-in procedure; compares by table identity
    Primitive(&'static Primitive),
}

static EMPTY: Cell = Cell::Empty;

impl Cell {
    /// Build a cons pair.
    pub fn cons(head: Cell, tail: Cell) -> Cell {
        Cell::Pair(Box::new(head), Box::new(tail))
    }

    /// Build a symbol cell.
    pub fn symbol(name: impl Into<String>) -> Cell {
        Cell::Symbol(name.into())
    }

    /// Build a proper list from a vector of elements.
    pub fn list(elements: Vec<Cell>) -> Cell {
        let mut cell = Cell::Empty;
        for element in elements.into_iter().rev() {
            cell = Cell::cons(element, cell);
        }
        cell
    }

    /// Truth value in a conditional. Only integer 0 and real 0.0 are false;
    /// everything else, the empty list included, is true.
    pub fn truth(&self) -> bool {
        match self {
            Cell::Integer(0) => false,
            Cell::Real(r) => *r != 0.0,
            _ => true,
        }
    }

    pub fn as_integer(&self) -> Result<i64, Error> {
        match self {
            Cell::Integer(n) => Ok(*n),
            other => Err(Error::TypeMismatch(format!("expected an integer: {other}"))),
        }
    }

    pub fn as_real(&self) -> Result<f64, Error> {
        match self {
            Cell::Real(r) => Ok(*r),
            other => Err(Error::TypeMismatch(format!("expected a real: {other}"))),
        }
    }

    pub fn as_symbol(&self) -> Result<&str, Error> {
        match self {
            Cell::Symbol(name) => Ok(name),
            other => Err(Error::TypeMismatch(format!("expected a symbol: {other}"))),
        }
    }

    /// First element of a pair.
    pub fn head(&self) -> Result<&Cell, Error> {
        match self {
            Cell::Pair(head, _) => Ok(head),
            other => Err(Error::TypeMismatch(format!("cannot take car of {other}"))),
        }
    }

    /// Rest of a pair.
    pub fn tail(&self) -> Result<&Cell, Error> {
        match self {
            Cell::Pair(_, tail) => Ok(tail),
            other => Err(Error::TypeMismatch(format!("cannot take cdr of {other}"))),
        }
    }

    /// Formal parameter spec of a closure.
    pub fn formals(&self) -> Result<&Cell, Error> {
        match self {
            Cell::Closure { formals, .. } => Ok(formals),
            other => Err(Error::TypeMismatch(format!(
                "expected a closure, cannot take formals of {other}"
            ))),
        }
    }

    /// Body sequence of a closure.
    pub fn body(&self) -> Result<&Cell, Error> {
        match self {
            Cell::Closure { body, .. } => Ok(body),
            other => Err(Error::TypeMismatch(format!(
                "expected a closure, cannot take body of {other}"
            ))),
        }
    }

    /// Number of elements in a proper list. Zero for the empty list; fails
    /// with [`Error::MalformedList`] for improper chains and non-lists.
    pub fn list_len(&self) -> Result<usize, Error> {
        match self {
            Cell::Empty | Cell::Pair(..) => {
                let mut count = 0;
                for element in self.iter() {
                    element?;
                    count += 1;
                }
                Ok(count)
            }
            other => Err(Error::MalformedList(format!(
                "attempt length on a non-list: {other}"
            ))),
        }
    }

    /// Iterate over the elements of a list. An improper tail surfaces as an
    /// `Err` item at the offending link; the empty list yields nothing.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { rest: self }
    }
}

/// Iterator over the elements of a (possibly improper) list.
pub struct ListIter<'a> {
    rest: &'a Cell,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Result<&'a Cell, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rest {
            Cell::Empty => None,
            Cell::Pair(head, tail) => {
                self.rest = tail.as_ref();
                Some(Ok(head.as_ref()))
            }
            other => {
                let err = Error::MalformedList(format!(
                    "list terminated by {other} instead of ()"
                ));
                self.rest = &EMPTY;
                Some(Err(err))
            }
        }
    }
}

/// Render a real with 6 significant digits and a forced decimal point,
/// switching to scientific notation with a signed two-digit exponent when
/// the magnitude leaves the fixed range.
pub(crate) fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return format!("{value}");
    }

    // Normalize through scientific notation first so that rounding which
    // bumps the exponent (9.9999995 -> 1.00000e+01) is already settled
    // before choosing between fixed and scientific form.
    let sci = format!("{value:.5e}");
    let (mantissa, exponent) = sci
        .split_once('e')
        .unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }

    let decimals = (5 - exponent).max(0) as usize;
    let fixed = format!("{value:.decimals$}");
    if decimals == 0 {
        format!("{fixed}.")
    } else {
        fixed
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Integer(n) => write!(f, "{n}"),
            Cell::Real(r) => write!(f, "{}", format_real(*r)),
            Cell::Symbol(name) => write!(f, "{name}"),
            Cell::Empty => write!(f, "()"),
            Cell::Pair(head, tail) => {
                write!(f, "({head}")?;
                let mut rest: &Cell = tail.as_ref();
                while let Cell::Pair(head, tail) = rest {
                    write!(f, " {head}")?;
                    rest = tail.as_ref();
                }
                if !matches!(rest, Cell::Empty) {
                    write!(f, " . {rest}")?;
                }
                write!(f, ")")
            }
            Cell::Closure { .. } => write!(f, "#<function>"),
            Cell::Primitive(_) => write!(f, "#<primitive function>"),
        }
    }
}
