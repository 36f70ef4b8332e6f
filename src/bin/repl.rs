//! Interactive REPL and file runner for the muscheme interpreter.
//!
//! With no arguments: a rustyline-backed prompt that reads one form per
//! line, evaluates it against a persistent environment, and prints the
//! rendered result. Errors are reported and the session continues.
//!
//! With file arguments: each file's top-level forms are evaluated in order
//! against the same environment, printing each result; the first error
//! aborts with a nonzero exit status.

use muscheme::cell::Cell;
use muscheme::evaluator::{self, Environment};
use muscheme::reader;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut env = evaluator::init_environment();

    if args.is_empty() {
        run_repl(&mut env);
        return;
    }

    for path in &args {
        if let Err(message) = run_file(path, &mut env) {
            eprintln!("{path}: {message}");
            process::exit(1);
        }
    }
}

fn run_file(path: &str, env: &mut Environment) -> Result<(), String> {
    let source = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let forms = reader::parse_forms(&source).map_err(|e| e.to_string())?;
    for form in &forms {
        let result = evaluator::evaluate(form, env).map_err(|e| e.to_string())?;
        println!("{result}");
    }
    Ok(())
}

fn run_repl(env: &mut Environment) {
    println!("muscheme micro-Scheme interpreter");
    println!("Enter forms like: (+ 1 2) or (define x 5)");
    println!("Type :help for commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("could not initialize line editing: {err}");
            return;
        }
    };

    loop {
        match rl.readline("muscheme> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match reader::parse_form(line)
                    .and_then(|expr| evaluator::evaluate(&expr, env))
                {
                    Ok(result) => println!("{result}"),
                    Err(err) => println!("error: {err}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("muscheme commands:");
    println!("  :help  - Show this help message");
    println!("  :env   - Show current environment bindings");
    println!("  :quit  - Exit the interpreter (:exit works too)");
    println!();
    println!("Special forms: if, begin, define, quote, lambda, let");
    println!("Primitives: + * / - ceiling floor cons car cdr nullp eval print not < apply");
    println!();
    println!("Examples:");
    println!("  (define square (lambda (x) (* x x)))");
    println!("  (square 7)");
    println!("  (let ((x 2) (y 3)) (+ x y))");
    println!("  (car '(1 2 3))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.bindings();

    let mut primitives = Vec::new();
    let mut user_defined = Vec::new();
    for (name, value) in bindings {
        match value {
            Cell::Primitive(_) => primitives.push(name),
            other => user_defined.push((name, other)),
        }
    }

    if !primitives.is_empty() {
        println!("Primitive procedures ({}):", primitives.len());
        let mut col = 0;
        for name in primitives {
            print!("  {name:<10}");
            col += 1;
            if col % 5 == 0 {
                println!();
            }
        }
        if col % 5 != 0 {
            println!();
        }
        println!();
    }

    if user_defined.is_empty() {
        println!("No user-defined bindings.");
    } else {
        println!("User-defined bindings ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
