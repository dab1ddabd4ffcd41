//! Formula evaluator
//!
//! Walks formula ASTs and produces `f64` values. Symbol values come from a
//! chain of resolvers tried in ascending priority order. Two entries of the
//! chain are built in: loop variables of active meta-functions at
//! `i32::MIN`, built-in constants and functions at `i32::MAX`.

use crate::ast::{FormulaExpr, Leaf, MethodCall, Operator, OperatorExpr, Symbol, SymbolOrigin};
use crate::builtins::{BuiltinSymbols, MetaFunction};
use crate::error::{EvalError, EvalResult, SymbolError};

/// Priority of the loop variable lookup, tried first
pub const BOUND_VARIABLE_PRIORITY: i32 = i32::MIN;

/// Priority of the built-in symbol lookup, tried last
pub const BUILTIN_PRIORITY: i32 = i32::MAX;

/// Supplies values for variable names
pub trait VariableResolver {
    /// Value of `name`, or `None` to let the next resolver try
    fn resolve_variable(&self, name: &str) -> Option<f64>;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> Option<f64>,
{
    fn resolve_variable(&self, name: &str) -> Option<f64> {
        self(name)
    }
}

/// Supplies values for method calls
pub trait MethodResolver {
    /// Value of `name` called with the evaluated `args`, or `None` to let
    /// the next resolver try
    fn resolve_method(&self, name: &str, args: &[f64]) -> Option<f64>;
}

impl<F> MethodResolver for F
where
    F: Fn(&str, &[f64]) -> Option<f64>,
{
    fn resolve_method(&self, name: &str, args: &[f64]) -> Option<f64> {
        self(name, args)
    }
}

enum VariableSource<'r> {
    BoundVariables,
    Host(Box<dyn VariableResolver + 'r>),
    Builtins,
}

enum MethodSource<'r> {
    Host(Box<dyn MethodResolver + 'r>),
    Builtins,
}

struct Entry<S> {
    priority: i32,
    source: S,
}

/// Insert keeping ascending priority, after any entry of equal priority
fn insert_by_priority<S>(entries: &mut Vec<Entry<S>>, priority: i32, source: S) {
    let index = entries.partition_point(|entry| entry.priority <= priority);
    entries.insert(index, Entry { priority, source });
}

fn check_priority(priority: i32) -> Result<(), SymbolError> {
    if priority == BOUND_VARIABLE_PRIORITY || priority == BUILTIN_PRIORITY {
        return Err(SymbolError::ReservedPriority(priority));
    }
    Ok(())
}

/// Loop variable values of the meta-functions currently running.
///
/// Each meta-function owns a contiguous run of slots starting at the base
/// offset returned by `push`. A loop variable name refers to the slot at
/// its position in [`crate::builtins::BOUND_VARIABLE_NAMES`].
#[derive(Debug, Default)]
struct BoundScopes {
    slots: Vec<f64>,
}

impl BoundScopes {
    fn push(&mut self, count: usize) -> usize {
        let base = self.slots.len();
        self.slots.resize(base + count, 0.0);
        tracing::trace!(base, count, "pushed loop variable scope");
        base
    }

    fn pop(&mut self, count: usize) {
        let len = self.slots.len().saturating_sub(count);
        self.slots.truncate(len);
        tracing::trace!(count, remaining = len, "popped loop variable scope");
    }

    fn set(&mut self, slot: usize, value: f64) {
        if let Some(current) = self.slots.get_mut(slot) {
            *current = value;
        }
    }

    fn get(&self, name: &str) -> Option<f64> {
        BuiltinSymbols::bound_variable_slot(name).and_then(|slot| self.slots.get(slot).copied())
    }
}

/// Formula evaluator
///
/// Resolvers may borrow host data for `'r`. One evaluator can evaluate any
/// number of formulas; each call to [`Evaluator::evaluate`] starts from an
/// empty loop variable scope.
///
/// # Example
/// ```rust
/// use balance_formula::{parse_formula, Evaluator, SymbolTable};
///
/// let mut symbols = SymbolTable::new();
/// symbols.add_variable("level").unwrap();
/// let ast = parse_formula("10+level*2", &symbols).unwrap();
///
/// let mut evaluator = Evaluator::new();
/// evaluator
///     .add_variable_resolver(0, |name| (name == "level").then_some(5.0))
///     .unwrap();
/// assert_eq!(evaluator.evaluate(&ast).unwrap(), 20.0);
/// ```
pub struct Evaluator<'r> {
    builtins: BuiltinSymbols,
    variables: Vec<Entry<VariableSource<'r>>>,
    methods: Vec<Entry<MethodSource<'r>>>,
}

impl Default for Evaluator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Evaluator<'r> {
    /// Create an evaluator with only the built-in resolvers
    pub fn new() -> Self {
        Self {
            builtins: BuiltinSymbols::new(),
            variables: vec![
                Entry {
                    priority: BOUND_VARIABLE_PRIORITY,
                    source: VariableSource::BoundVariables,
                },
                Entry {
                    priority: BUILTIN_PRIORITY,
                    source: VariableSource::Builtins,
                },
            ],
            methods: vec![Entry {
                priority: BUILTIN_PRIORITY,
                source: MethodSource::Builtins,
            }],
        }
    }

    /// The built-in constants and functions answered at [`BUILTIN_PRIORITY`]
    pub fn builtins(&self) -> &BuiltinSymbols {
        &self.builtins
    }

    /// Register a variable resolver closure
    pub fn add_variable_resolver<F>(&mut self, priority: i32, resolver: F) -> Result<(), SymbolError>
    where
        F: Fn(&str) -> Option<f64> + 'r,
    {
        self.add_boxed_variable_resolver(priority, Box::new(resolver))
    }

    /// Register any [`VariableResolver`]
    pub fn add_boxed_variable_resolver(
        &mut self,
        priority: i32,
        resolver: Box<dyn VariableResolver + 'r>,
    ) -> Result<(), SymbolError> {
        check_priority(priority)?;
        insert_by_priority(&mut self.variables, priority, VariableSource::Host(resolver));
        tracing::debug!(priority, total = self.variables.len(), "registered variable resolver");
        Ok(())
    }

    /// Register a method resolver closure
    pub fn add_method_resolver<F>(&mut self, priority: i32, resolver: F) -> Result<(), SymbolError>
    where
        F: Fn(&str, &[f64]) -> Option<f64> + 'r,
    {
        self.add_boxed_method_resolver(priority, Box::new(resolver))
    }

    /// Register any [`MethodResolver`]
    pub fn add_boxed_method_resolver(
        &mut self,
        priority: i32,
        resolver: Box<dyn MethodResolver + 'r>,
    ) -> Result<(), SymbolError> {
        check_priority(priority)?;
        insert_by_priority(&mut self.methods, priority, MethodSource::Host(resolver));
        tracing::debug!(priority, total = self.methods.len(), "registered method resolver");
        Ok(())
    }

    /// Evaluate a formula AST
    pub fn evaluate(&self, expr: &FormulaExpr) -> EvalResult<f64> {
        let mut scopes = BoundScopes::default();
        self.eval(expr, &mut scopes)
    }

    fn eval(&self, expr: &FormulaExpr, scopes: &mut BoundScopes) -> EvalResult<f64> {
        match expr {
            FormulaExpr::Grouping(child) => self.eval(child, scopes),

            FormulaExpr::Operator(OperatorExpr::Negate(operand)) => Ok(-self.eval(operand, scopes)?),

            FormulaExpr::Operator(OperatorExpr::Binary { op, left, right }) => {
                let left = self.eval(left, scopes)?;
                let right = self.eval(right, scopes)?;
                Ok(apply_binary(*op, left, right))
            }

            FormulaExpr::Leaf(Leaf::Literal(literal)) => literal
                .text
                .parse::<f64>()
                .map_err(|_| EvalError::InvalidLiteral(literal.text.clone())),

            FormulaExpr::Leaf(Leaf::Symbol(symbol)) => self.resolve_variable(symbol, scopes),

            FormulaExpr::Call(call) if call.is_meta_function() => self.eval_meta_function(call, scopes),

            FormulaExpr::Call(call) => {
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.eval(arg, scopes))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.resolve_method(&call.name, &args)
            }
        }
    }

    fn resolve_variable(&self, symbol: &Symbol, scopes: &BoundScopes) -> EvalResult<f64> {
        let name = symbol.name.as_str();
        for entry in &self.variables {
            let value = match &entry.source {
                // Only names the parser bound to a loop variable live in the
                // scope slots; a host variable may share a loop variable name
                VariableSource::BoundVariables if symbol.origin == SymbolOrigin::BoundVariable => {
                    scopes.get(name)
                }
                VariableSource::BoundVariables => None,
                VariableSource::Host(resolver) => resolver.resolve_variable(name),
                VariableSource::Builtins => self.builtins.constant(name),
            };
            if let Some(value) = value {
                return Ok(value);
            }
            tracing::trace!(name, priority = entry.priority, "variable resolver miss");
        }
        Err(EvalError::UnresolvedVariable(name.to_string()))
    }

    fn resolve_method(&self, name: &str, args: &[f64]) -> EvalResult<f64> {
        for entry in &self.methods {
            let value = match &entry.source {
                MethodSource::Host(resolver) => resolver.resolve_method(name, args),
                MethodSource::Builtins => self.builtins.call(name, args),
            };
            if let Some(value) = value {
                return Ok(value);
            }
            tracing::trace!(name, priority = entry.priority, "method resolver miss");
        }
        Err(EvalError::UnresolvedMethod {
            name: name.to_string(),
            arg_count: args.len(),
        })
    }

    // === Meta-functions ===

    fn eval_meta_function(&self, call: &MethodCall, scopes: &mut BoundScopes) -> EvalResult<f64> {
        let meta = self
            .builtins
            .meta_function(&call.name)
            .map(|(_, meta)| meta)
            .ok_or_else(|| EvalError::UnknownMetaFunction(call.name.clone()))?;

        match meta {
            MetaFunction::Sum => self.eval_sum(call, scopes),
        }
    }

    /// `SUM(start, end, [step,] body)`: add up `body` for each loop value
    /// from `start` towards `end` inclusive
    ///
    /// The bounds and step see only the enclosing scope; the loop variable
    /// is pushed for the body alone.
    fn eval_sum(&self, call: &MethodCall, scopes: &mut BoundScopes) -> EvalResult<f64> {
        let (start, end, step, body) = match call.args.as_slice() {
            [start, end, body] => (start, end, None, body),
            [start, end, step, body] => (start, end, Some(step), body),
            _ => {
                return Err(EvalError::UnresolvedMethod {
                    name: call.name.clone(),
                    arg_count: call.args.len(),
                })
            }
        };

        let start = self.eval(start, scopes)?;
        let end = self.eval(end, scopes)?;
        let step = match step {
            Some(step) => self.eval(step, scopes)?,
            None => 1.0,
        };
        if step == 0.0 {
            return Err(EvalError::ZeroStep {
                method: call.name.clone(),
                step,
            });
        }

        let slot = scopes.push(call.bound_variables);
        let mut sum_body = || -> EvalResult<f64> {
            let mut total = 0.0;
            let mut value = start;
            while (step > 0.0 && value <= end) || (step < 0.0 && value >= end) {
                scopes.set(slot, value);
                total += self.eval(body, scopes)?;
                value += step;
            }
            Ok(total)
        };
        let result = sum_body();
        scopes.pop(call.bound_variables);
        result
    }
}

fn apply_binary(op: Operator, left: f64, right: f64) -> f64 {
    match op {
        Operator::Add => left + right,
        Operator::Subtract => left - right,
        Operator::Modulo => left % right,
        Operator::Multiply => left * right,
        Operator::Divide => left / right,
    }
}
