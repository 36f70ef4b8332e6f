//! The fixed table of primitive procedures registered into the global frame
//! at startup.
//!
//! Every primitive receives its already-evaluated argument list as a cell
//! chain plus the live environment. Most ignore the environment; `eval` and
//! `apply` need it because they re-enter the evaluator. Arity is declared in
//! the table and validated by the evaluator before the native call, so the
//! implementations here start from a list of the right shape.
//!
//! ## Numeric coercion
//!
//! Binary arithmetic and comparison steps are computed in floating point as
//! soon as either side is a real; integer op integer stays integer (`/`
//! truncates). Subtraction and division fold left to right, so
//! `(- a b c)` is `a - b - c` and `(/ a b c)` is `a / b / c`; the one-operand
//! forms compute `0 - a` and `1 / a`. The divisor of every division step is
//! the incoming operand, which makes `(/ 0)` a division by zero while
//! `(/ 0 5)` is plain integer 0.

use crate::cell::Cell;
use crate::evaluator::{Environment, apply, evaluate};
use crate::{Arity, Error};
use std::fmt;

/// Native implementation signature: evaluated argument list in, result out.
pub type PrimitiveFn = fn(&Cell, &mut Environment) -> Result<Cell, Error>;

/// One entry of the primitive procedure table.
pub struct Primitive {
    /// Name bound in the global frame
    pub name: &'static str,
    /// Operand count validated before `func` runs
    pub arity: Arity,
    pub func: PrimitiveFn,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({})", self.name)
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        // table entries are uniquely named; identity comparison by name
        self.name == other.name
    }
}

/// The full primitive table, in registration order.
pub fn table() -> &'static [Primitive] {
    &TABLE
}

static TABLE: [Primitive; 15] = [
    Primitive {
        name: "+",
        arity: Arity::AtLeast(0),
        func: prim_add,
    },
    Primitive {
        name: "*",
        arity: Arity::AtLeast(0),
        func: prim_mul,
    },
    Primitive {
        name: "/",
        arity: Arity::AtLeast(1),
        func: prim_div,
    },
    Primitive {
        name: "-",
        arity: Arity::AtLeast(1),
        func: prim_sub,
    },
    Primitive {
        name: "ceiling",
        arity: Arity::Exact(1),
        func: prim_ceiling,
    },
    Primitive {
        name: "floor",
        arity: Arity::Exact(1),
        func: prim_floor,
    },
    Primitive {
        name: "cons",
        arity: Arity::Exact(2),
        func: prim_cons,
    },
    Primitive {
        name: "car",
        arity: Arity::Exact(1),
        func: prim_car,
    },
    Primitive {
        name: "cdr",
        arity: Arity::Exact(1),
        func: prim_cdr,
    },
    Primitive {
        name: "nullp",
        arity: Arity::Exact(1),
        func: prim_nullp,
    },
    Primitive {
        name: "eval",
        arity: Arity::Exact(1),
        func: prim_eval,
    },
    Primitive {
        name: "print",
        arity: Arity::Exact(1),
        func: prim_print,
    },
    Primitive {
        name: "not",
        arity: Arity::Exact(1),
        func: prim_not,
    },
    Primitive {
        name: "<",
        arity: Arity::AtLeast(0),
        func: prim_less_than,
    },
    Primitive {
        name: "apply",
        arity: Arity::Exact(2),
        func: prim_apply,
    },
];

//
// Numeric plumbing
//

#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    fn cell(self) -> Cell {
        match self {
            Number::Integer(n) => Cell::Integer(n),
            Number::Real(r) => Cell::Real(r),
        }
    }

    fn as_real(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Real(r) => r,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Integer(n) => n == 0,
            Number::Real(r) => r == 0.0,
        }
    }
}

fn numeric_operand(cell: &Cell, op: &str) -> Result<Number, Error> {
    match cell {
        Cell::Integer(n) => Ok(Number::Integer(*n)),
        Cell::Real(r) => Ok(Number::Real(*r)),
        other => Err(Error::TypeMismatch(format!(
            "operand of {op} cannot be: {other}"
        ))),
    }
}

fn real_operand(cell: &Cell, op: &str) -> Result<f64, Error> {
    match cell {
        Cell::Real(r) => Ok(*r),
        other => Err(Error::TypeMismatch(format!(
            "bad argument type for {op}: {other}, expected a real"
        ))),
    }
}

// Integer arithmetic wraps rather than panics.
fn add(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => Number::Integer(a.wrapping_add(b)),
        _ => Number::Real(a.as_real() + b.as_real()),
    }
}

fn sub(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => Number::Integer(a.wrapping_sub(b)),
        _ => Number::Real(a.as_real() - b.as_real()),
    }
}

fn mul(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => Number::Integer(a.wrapping_mul(b)),
        _ => Number::Real(a.as_real() * b.as_real()),
    }
}

/// Quotient of `a / b`; the caller has already rejected a zero `b`.
fn div(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => Number::Integer(a.wrapping_div(b)),
        _ => Number::Real(a.as_real() / b.as_real()),
    }
}

fn less_than(a: Number, b: Number) -> bool {
    match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => a < b,
        _ => a.as_real() < b.as_real(),
    }
}

//
// Primitive implementations
//

fn prim_add(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let mut sum = Number::Integer(0);
    for operand in args.iter() {
        sum = add(numeric_operand(operand?, "+")?, sum);
    }
    Ok(sum.cell())
}

fn prim_mul(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let mut product = Number::Integer(1);
    for operand in args.iter() {
        product = mul(numeric_operand(operand?, "*")?, product);
    }
    Ok(product.cell())
}

fn prim_sub(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let first = numeric_operand(args.head()?, "-")?;
    let rest = args.tail()?;
    if matches!(rest, Cell::Empty) {
        return Ok(sub(Number::Integer(0), first).cell());
    }

    let mut result = first;
    for operand in rest.iter() {
        result = sub(result, numeric_operand(operand?, "-")?);
    }
    Ok(result.cell())
}

fn prim_div(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let first = numeric_operand(args.head()?, "/")?;
    let rest = args.tail()?;
    if matches!(rest, Cell::Empty) {
        // (/ a) is 1/a, so the sole operand is the divisor
        if first.is_zero() {
            return Err(Error::DivisionByZero);
        }
        return Ok(div(Number::Integer(1), first).cell());
    }

    let mut result = first;
    for operand in rest.iter() {
        let divisor = numeric_operand(operand?, "/")?;
        if divisor.is_zero() {
            return Err(Error::DivisionByZero);
        }
        result = div(result, divisor);
    }
    Ok(result.cell())
}

fn prim_ceiling(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let value = real_operand(args.head()?, "ceiling")?;
    Ok(Cell::Integer(value.ceil() as i64))
}

fn prim_floor(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let value = real_operand(args.head()?, "floor")?;
    Ok(Cell::Integer(value.floor() as i64))
}

fn prim_cons(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let head = args.head()?.clone();
    let tail = args.tail()?.head()?.clone();
    Ok(Cell::cons(head, tail))
}

fn prim_car(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    Ok(args.head()?.head()?.clone())
}

fn prim_cdr(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    Ok(args.head()?.tail()?.clone())
}

fn prim_nullp(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let answer = matches!(args.head()?, Cell::Empty);
    Ok(Cell::Integer(answer as i64))
}

/// Re-evaluate the (already evaluated) argument in the current environment.
fn prim_eval(args: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    evaluate(args.head()?, env)
}

/// Render the argument to stdout, followed by a newline.
fn prim_print(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    println!("{}", args.head()?);
    Ok(Cell::Empty)
}

fn prim_not(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let answer = !args.head()?.truth();
    Ok(Cell::Integer(answer as i64))
}

/// Chained ascending comparison yielding integer 1 or 0. All operands are
/// type-checked even after the answer is already known to be 0.
fn prim_less_than(args: &Cell, _env: &mut Environment) -> Result<Cell, Error> {
    let mut operands = args.iter();
    let mut previous = match operands.next() {
        None => return Ok(Cell::Integer(1)),
        Some(cell) => numeric_operand(cell?, "<")?,
    };

    let mut ascending = true;
    for operand in operands {
        let current = numeric_operand(operand?, "<")?;
        if !less_than(previous, current) {
            ascending = false;
        }
        previous = current;
    }
    Ok(Cell::Integer(ascending as i64))
}

/// Apply a procedure to an argument list without re-evaluating its elements.
fn prim_apply(args: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    let procedure = args.head()?;
    let arglist = args.tail()?.head()?;
    apply(procedure, arglist, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::init_environment;
    use crate::reader::parse_form;

    /// Expected outcome of one evaluated input.
    #[derive(Debug)]
    enum Expected {
        Int(i64),
        Real(f64),
        Renders(&'static str),
        SpecificError(&'static str),
    }
    use Expected::*;

    fn run_cases(test_cases: Vec<(&str, Expected)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let mut env = init_environment();
            let expr = parse_form(input)
                .unwrap_or_else(|e| panic!("test #{}: read error for '{input}': {e}", i + 1));
            let outcome = evaluate(&expr, &mut env);
            match (outcome, expected) {
                (Ok(actual), Int(n)) => {
                    assert_eq!(actual, Cell::Integer(*n), "test #{} for '{input}'", i + 1);
                }
                (Ok(actual), Real(r)) => {
                    assert_eq!(actual, Cell::Real(*r), "test #{} for '{input}'", i + 1);
                }
                (Ok(actual), Renders(text)) => {
                    assert_eq!(format!("{actual}"), *text, "test #{} for '{input}'", i + 1);
                }
                (Err(err), SpecificError(text)) => {
                    let message = format!("{err}");
                    assert!(
                        message.contains(text),
                        "test #{} for '{input}': error should contain '{text}', got: {message}",
                        i + 1
                    );
                }
                (Ok(actual), SpecificError(text)) => {
                    panic!(
                        "test #{} for '{input}': expected error containing '{text}', got {actual:?}",
                        i + 1
                    );
                }
                (Err(err), _) => {
                    panic!("test #{} for '{input}': unexpected error: {err}", i + 1);
                }
            }
        }
    }

    #[test]
    fn test_addition_and_multiplication() {
        run_cases(vec![
            ("(+)", Int(0)),
            ("(+ 42)", Int(42)),
            ("(+ 1 2 3)", Int(6)),
            ("(+ -5 10)", Int(5)),
            ("(*)", Int(1)),
            ("(* 7)", Int(7)),
            ("(* 2 3 4)", Int(24)),
            ("(* 0 100)", Int(0)),
            // real contamination makes the result real
            ("(+ 1 2.5)", Real(3.5)),
            ("(+ 0.5 0.5)", Real(1.0)),
            ("(* 2 2.5)", Real(5.0)),
            ("(+ 1 (quote x))", SpecificError("operand of + cannot be: x")),
            ("(* (quote (1)) 2)", SpecificError("operand of * cannot be")),
        ]);
    }

    #[test]
    fn test_subtraction() {
        run_cases(vec![
            ("(- 5)", Int(-5)),
            ("(- -5)", Int(5)),
            ("(- 0)", Int(0)),
            ("(- 10 3 2)", Int(5)),
            ("(- 100 50 25)", Int(25)),
            ("(- 2.5)", Real(-2.5)),
            ("(- 10 2.5)", Real(7.5)),
            ("(- 10.0 2 3)", Real(5.0)),
            ("(-)", SpecificError("too few")),
            ("(- (quote x) 1)", SpecificError("operand of - cannot be: x")),
            ("(- 1 (quote x))", SpecificError("operand of - cannot be: x")),
        ]);
    }

    #[test]
    fn test_division() {
        run_cases(vec![
            // integer division truncates
            ("(/ 100 10 2)", Int(5)),
            ("(/ 7 2)", Int(3)),
            ("(/ 5)", Int(0)),
            ("(/ 1)", Int(1)),
            ("(/ 0 5)", Int(0)),
            ("(/ 5.0)", Real(0.2)),
            ("(/ 7.0 2)", Real(3.5)),
            ("(/ 7 2.0)", Real(3.5)),
            // the divisor of each step is the incoming operand
            ("(/ 0)", SpecificError("division by zero")),
            ("(/ 1 0)", SpecificError("division by zero")),
            ("(/ 1.0 0.0)", SpecificError("division by zero")),
            ("(/ 0.0)", SpecificError("division by zero")),
            ("(/)", SpecificError("too few")),
            ("(/ (quote x) 2)", SpecificError("operand of / cannot be: x")),
        ]);
    }

    #[test]
    fn test_ceiling_and_floor() {
        run_cases(vec![
            ("(ceiling 1.2)", Int(2)),
            ("(ceiling -1.2)", Int(-1)),
            ("(ceiling 2.0)", Int(2)),
            ("(floor 1.8)", Int(1)),
            ("(floor -1.2)", Int(-2)),
            ("(floor 2.0)", Int(2)),
            // integers are rejected, only reals have a ceiling here
            ("(ceiling 5)", SpecificError("bad argument type for ceiling")),
            ("(floor 5)", SpecificError("bad argument type for floor")),
            ("(ceiling 1.0 2.0)", SpecificError("too many")),
        ]);
    }

    #[test]
    fn test_list_operations() {
        run_cases(vec![
            ("(cons 1 2)", Renders("(1 . 2)")),
            ("(cons 1 (quote ()))", Renders("(1)")),
            ("(cons 1 (quote (2 3)))", Renders("(1 2 3)")),
            ("(car (quote (1 2 3)))", Int(1)),
            ("(cdr (quote (1 2 3)))", Renders("(2 3)")),
            ("(cdr (quote (1)))", Renders("()")),
            ("(car (cons 1 2))", Int(1)),
            ("(cdr (cons 1 2))", Int(2)),
            ("(car (quote ()))", SpecificError("cannot take car of ()")),
            ("(car 5)", SpecificError("cannot take car of 5")),
            ("(cdr (quote ()))", SpecificError("cannot take cdr of ()")),
            ("(cons 1)", SpecificError("too few")),
        ]);
    }

    #[test]
    fn test_predicates() {
        run_cases(vec![
            ("(nullp (quote ()))", Int(1)),
            ("(nullp 5)", Int(0)),
            ("(nullp (quote (1)))", Int(0)),
            ("(not 0)", Int(1)),
            ("(not 0.0)", Int(1)),
            ("(not 3)", Int(0)),
            ("(not (quote ()))", Int(0)),
            ("(not (quote x))", Int(0)),
        ]);
    }

    #[test]
    fn test_less_than() {
        run_cases(vec![
            ("(<)", Int(1)),
            ("(< 5)", Int(1)),
            ("(< 1 2 3)", Int(1)),
            ("(< 1 3 2)", Int(0)),
            ("(< 2 2)", Int(0)),
            ("(< 1.5 2)", Int(1)),
            ("(< 2 1.5)", Int(0)),
            // operands after a failed comparison are still type-checked
            ("(< 2 1 (quote x))", SpecificError("operand of < cannot be: x")),
            ("(< (quote x))", SpecificError("operand of < cannot be: x")),
        ]);
    }

    #[test]
    fn test_eval_and_apply() {
        run_cases(vec![
            ("(eval (quote (+ 1 2)))", Int(3)),
            ("(eval (quote 5))", Int(5)),
            ("(eval (quote no-binding))", SpecificError("undefined variable")),
            ("(apply + (quote (1 2 3)))", Int(6)),
            ("(apply car (quote ((1 2))))", Int(1)),
            ("(apply (lambda (a b) (- a b)) (quote (10 4)))", Int(6)),
            // the argument list elements are not re-evaluated
            ("(apply car (quote ((x y))))", Renders("x")),
            ("(apply 5 (quote ()))", SpecificError("cannot call a value")),
            ("(apply + 5)", SpecificError("malformed list")),
            ("(apply +)", SpecificError("too few")),
        ]);
    }

    #[test]
    fn test_print_returns_empty() {
        run_cases(vec![
            ("(print 5)", Renders("()")),
            ("(print (quote (1 2 . 3)))", Renders("()")),
            ("(print 1 2)", SpecificError("too many")),
        ]);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        run_cases(vec![
            ("(+ 9223372036854775807 1)", Int(i64::MIN)),
            ("(- -9223372036854775808 1)", Int(i64::MAX)),
        ]);
    }
}
