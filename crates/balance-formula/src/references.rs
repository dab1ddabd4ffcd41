//! Host symbols referenced by a formula
//!
//! Tells a host which values a formula needs before evaluating it, e.g. to
//! check that a data row has a column for every variable.

use crate::ast::{FormulaExpr, Leaf, SymbolOrigin};
use crate::builtins::BuiltinSymbols;
use std::collections::BTreeSet;

/// Host variables and methods used by a formula
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaReferences {
    /// Host variable names, sorted
    pub variables: Vec<String>,
    /// Host method names, sorted
    pub methods: Vec<String>,
    /// Whether a meta-function such as `SUM` appears
    pub uses_meta_function: bool,
}

impl FormulaReferences {
    /// Collect the references of a parsed formula.
    ///
    /// Loop variables, built-in constants and built-in functions are left
    /// out. A host method that shares its name with a built-in function is
    /// reported as the built-in.
    pub fn collect(expr: &FormulaExpr) -> Self {
        let builtins = BuiltinSymbols::new();
        let mut variables = BTreeSet::new();
        let mut methods = BTreeSet::new();
        let mut uses_meta_function = false;

        let mut pending = vec![expr];
        while let Some(expr) = pending.pop() {
            match expr {
                FormulaExpr::Leaf(Leaf::Symbol(symbol)) if symbol.origin == SymbolOrigin::Host => {
                    variables.insert(symbol.name.as_str());
                }
                FormulaExpr::Call(call) if call.is_meta_function() => uses_meta_function = true,
                FormulaExpr::Call(call) if builtins.function(&call.name).is_none() => {
                    methods.insert(call.name.as_str());
                }
                _ => {}
            }
            pending.extend(expr.children());
        }

        Self {
            variables: variables.into_iter().map(str::to_string).collect(),
            methods: methods.into_iter().map(str::to_string).collect(),
            uses_meta_function,
        }
    }

    /// Whether the formula needs no host value at all
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.methods.is_empty()
    }

    /// Iterate over every referenced host name, variables first
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables
            .iter()
            .chain(self.methods.iter())
            .map(String::as_str)
    }
}
