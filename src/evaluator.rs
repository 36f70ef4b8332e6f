//! Frames, environments, and the recursive evaluator.
//!
//! An [`Environment`] is a stack of [`Frame`]s. The bottom frame is the
//! global frame created once by [`init_environment`]; it accumulates
//! `define`d bindings for the life of the interpreter and is never popped.
//! Non-global frames are pushed on closure application and `let` entry and
//! popped when the corresponding body finishes, on the error path included.
//!
//! Every new frame is parented off whatever frame is on top of the stack at
//! push time, so the parent chain and the stack order always coincide and
//! lookup is simply a top-down walk of the stack. This gives closures
//! dynamic-scope visibility into their callers; see the crate docs.

use crate::cell::Cell;
use crate::primitives;
use crate::{Arity, DEFAULT_STACK_DEPTH, Error};
use log::{debug, trace};
use std::collections::HashMap;

/// One scope's name -> value bindings. Single assignment per frame:
/// redefining a name bound in the same frame is an error, while shadowing a
/// binding from an enclosing frame is allowed and intended.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    bindings: HashMap<String, Cell>,
}

impl Frame {
    pub fn new() -> Self {
        Frame {
            bindings: HashMap::new(),
        }
    }

    /// Bind `name` in this frame only.
    pub fn define(&mut self, name: &str, value: Cell) -> Result<(), Error> {
        if self.bindings.contains_key(name) {
            return Err(Error::Redefinition(name.to_owned()));
        }
        self.bindings.insert(name.to_owned(), value);
        Ok(())
    }

    fn get(&self, name: &str) -> Option<&Cell> {
        self.bindings.get(name)
    }

    /// Build the frame for a procedure call. A symbol formal spec binds the
    /// whole (already evaluated) argument list to that one name; a list spec
    /// requires an exact length match and binds pairwise in order.
    pub fn bind_formals(formals: &Cell, args: &Cell) -> Result<Frame, Error> {
        let mut frame = Frame::new();

        if let Cell::Symbol(name) = formals {
            frame.define(name, args.clone())?;
            return Ok(frame);
        }

        let expected = formals.list_len()?;
        let got = args.list_len()?;
        if got != expected {
            return Err(Error::ArityMismatch {
                expected: Arity::Exact(expected),
                got,
            });
        }

        let mut names = formals.iter();
        let mut values = args.iter();
        while let (Some(name), Some(value)) = (names.next(), values.next()) {
            frame.define(name?.as_symbol()?, value?.clone())?;
        }
        Ok(frame)
    }
}

/// The runtime stack of frames, bottom = global.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment holding only an empty global frame, with the default
    /// depth ceiling. Use [`init_environment`] to get the primitives too.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_STACK_DEPTH)
    }

    /// Same, with a custom depth ceiling (counting the global frame).
    pub fn with_max_depth(max_depth: usize) -> Self {
        Environment {
            frames: vec![Frame::new()],
            max_depth,
        }
    }

    /// Current number of frames on the stack, the global frame included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), Error> {
        if self.frames.len() >= self.max_depth {
            return Err(Error::StackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Remove and discard the top frame.
    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "the global frame is never popped");
        self.frames.pop();
    }

    /// Walk the stack from the top frame down to the global frame and return
    /// an independent copy of the first binding found.
    pub fn lookup(&self, name: &str) -> Result<Cell, Error> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        Err(Error::UnboundVariable(name.to_owned()))
    }

    pub fn top_frame_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("environment always holds the global frame")
    }

    /// Run `f` with `frame` pushed, popping it again on both the success and
    /// the error path. Every push in the evaluator goes through here, which
    /// is what guarantees the stack is back at its pre-call depth by the
    /// time an error reaches the caller of [`evaluate`].
    pub(crate) fn with_frame<T>(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.push(frame)?;
        let result = f(self);
        self.pop();
        result
    }

    /// All visible bindings, inner frames shadowing outer ones, sorted by
    /// name. For interactive inspection.
    pub fn bindings(&self) -> Vec<(String, Cell)> {
        let mut merged: HashMap<&str, &Cell> = HashMap::new();
        for frame in &self.frames {
            for (name, value) in &frame.bindings {
                merged.insert(name, value);
            }
        }
        let mut result: Vec<(String, Cell)> = merged
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Construct the global frame and register the primitive procedure table.
pub fn init_environment() -> Environment {
    let mut env = Environment::new();
    for primitive in primitives::table() {
        env.top_frame_mut()
            .define(primitive.name, Cell::Primitive(primitive))
            .expect("primitive names are unique");
    }
    debug!(
        "registered {} primitives in the global frame",
        primitives::table().len()
    );
    env
}

/// Evaluate one expression cell against the environment.
pub fn evaluate(expr: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    match expr {
        Cell::Empty => Err(Error::MalformedList("cannot evaluate ()".to_owned())),

        // Variable lookup; the environment hands out an independent copy.
        Cell::Symbol(name) => env.lookup(name),

        Cell::Pair(head, tail) => {
            // Special-form dispatch is syntactic, on the head symbol, before
            // any lookup. The handlers receive the unevaluated tail.
            if let Cell::Symbol(form) = head.as_ref() {
                match form.as_str() {
                    "if" => return eval_if(tail, env),
                    "begin" => return eval_begin(tail, env),
                    "define" => return eval_define(tail, env),
                    "quote" => return eval_quote(tail),
                    "lambda" => return eval_lambda(tail),
                    "let" => return eval_let(tail, env),
                    _ => {}
                }
            }

            // Application: operands first, left to right, then the operator.
            let args = eval_each(tail, env)?;
            let procedure = evaluate(head, env)?;
            apply(&procedure, &args, env)
        }

        // Integers, reals, closures, and primitives self-evaluate.
        other => Ok(other.clone()),
    }
}

/// Evaluate every element of an argument list, left to right, into a new
/// list of results.
fn eval_each(exprs: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    match exprs {
        Cell::Empty => Ok(Cell::Empty),
        Cell::Pair(head, tail) => {
            let value = evaluate(head, env)?;
            let rest = eval_each(tail, env)?;
            Ok(Cell::cons(value, rest))
        }
        other => Err(Error::MalformedList(format!(
            "malformed argument list: {other}"
        ))),
    }
}

/// Apply a procedure value to an already-evaluated argument list.
pub(crate) fn apply(procedure: &Cell, args: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    match procedure {
        Cell::Primitive(primitive) => {
            primitive.arity.validate(args.list_len()?)?;
            (primitive.func)(args, env)
        }
        Cell::Closure { formals, body } => {
            // The frame is built before the push so that an arity failure
            // leaves the stack untouched.
            let frame = Frame::bind_formals(formals, args)?;
            trace!("applying closure at stack depth {}", env.depth());
            env.with_frame(frame, |env| eval_sequence(body, env))
        }
        other => Err(Error::NotCallable(format!("{other}"))),
    }
}

/// Evaluate a non-empty sequence of forms, discarding every result but the
/// last.
fn eval_sequence(body: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    let mut result = Cell::Empty;
    for expr in body.iter() {
        result = evaluate(expr?, env)?;
    }
    Ok(result)
}

fn eval_if(tail: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    let count = tail.list_len()?;
    Arity::Range(2, 3).validate(count)?;

    let condition = evaluate(tail.head()?, env)?;
    let clauses = tail.tail()?;
    if condition.truth() {
        evaluate(clauses.head()?, env)
    } else if count == 3 {
        evaluate(clauses.tail()?.head()?, env)
    } else {
        Ok(Cell::Empty)
    }
}

fn eval_begin(tail: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    Arity::AtLeast(1).validate(tail.list_len()?)?;
    eval_sequence(tail, env)
}

fn eval_define(tail: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    Arity::Exact(2).validate(tail.list_len()?)?;

    let name = match tail.head()? {
        Cell::Symbol(name) => name.clone(),
        other => {
            return Err(Error::TypeMismatch(format!(
                "cannot define non-symbol: {other}"
            )));
        }
    };
    let value = evaluate(tail.tail()?.head()?, env)?;
    env.top_frame_mut().define(&name, value)?;
    Ok(Cell::Empty)
}

fn eval_quote(tail: &Cell) -> Result<Cell, Error> {
    Arity::Exact(1).validate(tail.list_len()?)?;
    Ok(tail.head()?.clone())
}

fn eval_lambda(tail: &Cell) -> Result<Cell, Error> {
    Arity::AtLeast(2).validate(tail.list_len()?)?;

    let formals = tail.head()?.clone();
    check_formals(&formals)?;
    let body = tail.tail()?.clone();
    Ok(Cell::Closure {
        formals: Box::new(formals),
        body: Box::new(body),
    })
}

/// A formal parameter spec is either a single symbol (the whole argument
/// list binds to it) or a proper list of pairwise-distinct symbols.
fn check_formals(formals: &Cell) -> Result<(), Error> {
    if matches!(formals, Cell::Symbol(_)) {
        return Ok(());
    }
    if !matches!(formals, Cell::Empty | Cell::Pair(..)) {
        return Err(Error::InvalidFormal(format!("{formals}")));
    }

    let mut seen: Vec<&str> = Vec::new();
    for element in formals.iter() {
        let name = match element? {
            Cell::Symbol(name) => name.as_str(),
            other => return Err(Error::InvalidFormal(format!("{other}"))),
        };
        if seen.contains(&name) {
            return Err(Error::NameConflict(name.to_owned()));
        }
        seen.push(name);
    }
    Ok(())
}

fn eval_let(tail: &Cell, env: &mut Environment) -> Result<Cell, Error> {
    Arity::AtLeast(2).validate(tail.list_len()?)?;

    env.with_frame(Frame::new(), |env| {
        let bindings = tail.head()?;
        if !matches!(bindings, Cell::Empty | Cell::Pair(..)) {
            return Err(Error::TypeMismatch(format!(
                "unexpected expression in let form: {bindings}"
            )));
        }
        // Each (name expr) pair is processed exactly like a define in the
        // fresh frame: sequential, each binding visible to the next.
        for binding in bindings.iter() {
            eval_define(binding?, env)?;
        }
        eval_sequence(tail.tail()?, env)
    })
}
