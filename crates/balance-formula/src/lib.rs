//! # balance-formula
//!
//! Formula language for numeric balancing data such as damage or cost
//! curves.
//!
//! This crate provides:
//! - Symbol tables declaring the variables and methods a formula may use
//! - Formula parsing (text → AST)
//! - Formula evaluation (AST → `f64`) through prioritized resolvers
//! - Built-in constants, math functions and the `SUM` meta-function
//!
//! ## Example
//!
//! ```rust
//! use balance_formula::{parse_formula, Evaluator, SymbolTable};
//!
//! let mut symbols = SymbolTable::new();
//! symbols.add_variable("level").unwrap();
//! symbols.add_signatures(["BONUS(1)"]).unwrap();
//!
//! let ast = parse_formula("SUM(1,level,i*2)+BONUS(level)", &symbols).unwrap();
//!
//! let mut evaluator = Evaluator::new();
//! evaluator
//!     .add_variable_resolver(0, |name| (name == "level").then_some(3.0))
//!     .unwrap();
//! evaluator
//!     .add_method_resolver(0, |name, args| (name == "BONUS").then(|| args[0] * 10.0))
//!     .unwrap();
//!
//! assert_eq!(evaluator.evaluate(&ast).unwrap(), 42.0);
//! ```

pub mod ast;
pub mod builtins;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod references;
pub mod symbols;

pub use ast::{FormulaExpr, Leaf, LiteralKind, MethodCall, Operator, OperatorExpr, SymbolOrigin};
pub use builtins::BuiltinSymbols;
pub use error::{
    EvalError, EvalResult, FormulaError, FormulaResult, ParseError, ParseResult, SymbolError,
};
pub use evaluator::{Evaluator, MethodResolver, VariableResolver};
pub use parser::{parse_formula, try_parse_formula, FormulaParser};
pub use references::FormulaReferences;
pub use symbols::{Method, SymbolTable};

/// Parse and evaluate a formula in one step
///
/// Prefer parsing once and calling [`Evaluator::evaluate`] when the same
/// formula is evaluated repeatedly.
pub fn evaluate_formula(
    formula: &str,
    symbols: &SymbolTable,
    evaluator: &Evaluator<'_>,
) -> FormulaResult<f64> {
    let ast = parse_formula(formula, symbols)?;
    Ok(evaluator.evaluate(&ast)?)
}
