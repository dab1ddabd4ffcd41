//! Built-in constants, functions and meta-functions
//!
//! These symbols are available to every formula regardless of the host
//! symbol table. They are looked up after the host symbols while parsing
//! and resolved last while evaluating.

use crate::symbols::Method;
use ahash::AHashMap;

/// Names a meta-function loop variable may take, in slot order.
///
/// A formula nested inside `n` meta-function bodies may use the first `n`
/// names; the `k`-th name always refers to slot `k` of the scope stack.
pub const BOUND_VARIABLE_NAMES: [&str; 26] = [
    "i", "j", "k", "a", "b", "c", "d", "e", "f", "g", "h", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z",
];

/// Built-in function implementation signature
pub type FunctionImpl = fn(&[f64]) -> f64;

/// Built-in function definition
pub struct FunctionDef {
    pub method: Method,
    pub implementation: FunctionImpl,
}

/// Meta-functions: methods that bind loop variables for their arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFunction {
    /// `SUM(start, end, [step,] body)`
    Sum,
}

/// The fixed set of built-in symbols
pub struct BuiltinSymbols {
    constants: Vec<(&'static str, f64)>,
    functions: AHashMap<&'static str, FunctionDef>,
    function_order: Vec<&'static str>,
    meta_functions: Vec<(Method, MetaFunction)>,
}

impl Default for BuiltinSymbols {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinSymbols {
    /// Create the built-in symbol set
    pub fn new() -> Self {
        let mut builtins = Self {
            constants: vec![
                ("PI", std::f64::consts::PI),
                ("PHI", (1.0 + 5f64.sqrt()) / 2.0),
            ],
            functions: AHashMap::new(),
            function_order: Vec::new(),
            meta_functions: vec![(Method::builtin("SUM", 3, Some(4), 1), MetaFunction::Sum)],
        };

        builtins.register("MIN", 2, None, fn_min);
        builtins.register("MAX", 2, None, fn_max);
        builtins.register("ABS", 1, Some(1), fn_abs);
        builtins.register("COS", 1, Some(1), fn_cos);
        builtins.register("SIN", 1, Some(1), fn_sin);
        builtins.register("TAN", 1, Some(1), fn_tan);
        builtins.register("POW", 2, Some(2), fn_pow);
        builtins.register("SQRT", 1, Some(1), fn_sqrt);
        builtins.register("INTDIV", 2, Some(2), fn_intdiv);
        builtins.register("FLOOR", 1, Some(1), fn_floor);
        builtins.register("CEIL", 1, Some(1), fn_ceil);

        builtins
    }

    fn register(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.function_order.push(name);
        self.functions.insert(
            name,
            FunctionDef {
                method: Method::builtin(name, min_args, max_args, 0),
                implementation,
            },
        );
    }

    /// Value of a built-in constant
    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants
            .iter()
            .find(|(constant, _)| *constant == name)
            .map(|(_, value)| *value)
    }

    pub fn constant_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constants.iter().map(|(name, _)| *name)
    }

    /// Look up a built-in function
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Built-in function names in declaration order
    pub fn function_names(&self) -> &[&'static str] {
        &self.function_order
    }

    /// Look up a meta-function and its definition
    pub fn meta_function(&self, name: &str) -> Option<(&Method, MetaFunction)> {
        self.meta_functions
            .iter()
            .find(|(method, _)| method.name() == name)
            .map(|(method, meta)| (method, *meta))
    }

    pub fn meta_function_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.meta_functions.iter().map(|(method, _)| method.name())
    }

    /// Evaluate a built-in function. Returns `None` for an unknown name or an
    /// argument count outside the declared bounds.
    pub fn call(&self, name: &str, args: &[f64]) -> Option<f64> {
        let def = self.function(name)?;
        if !def.method.accepts(args.len()) {
            return None;
        }
        Some((def.implementation)(args))
    }

    /// Loop variable names usable with `count` enclosing meta-function slots
    pub fn bound_variable_names(count: usize) -> &'static [&'static str] {
        &BOUND_VARIABLE_NAMES[..count.min(BOUND_VARIABLE_NAMES.len())]
    }

    /// Scope slot a loop variable name refers to
    pub fn bound_variable_slot(name: &str) -> Option<usize> {
        BOUND_VARIABLE_NAMES.iter().position(|n| *n == name)
    }
}

fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// MIN function
pub fn fn_min(args: &[f64]) -> f64 {
    args.split_first().map_or(f64::NAN, |(first, rest)| {
        rest.iter()
            .fold(*first, |min, &value| if value < min { value } else { min })
    })
}

/// MAX function
pub fn fn_max(args: &[f64]) -> f64 {
    args.split_first().map_or(f64::NAN, |(first, rest)| {
        rest.iter()
            .fold(*first, |max, &value| if value > max { value } else { max })
    })
}

/// ABS function
pub fn fn_abs(args: &[f64]) -> f64 {
    args[0].abs()
}

/// COS function (degrees)
pub fn fn_cos(args: &[f64]) -> f64 {
    degrees_to_radians(args[0]).cos()
}

/// SIN function (degrees)
pub fn fn_sin(args: &[f64]) -> f64 {
    degrees_to_radians(args[0]).sin()
}

/// TAN function (degrees)
pub fn fn_tan(args: &[f64]) -> f64 {
    degrees_to_radians(args[0]).tan()
}

/// POW function
pub fn fn_pow(args: &[f64]) -> f64 {
    args[0].powf(args[1])
}

/// SQRT function
pub fn fn_sqrt(args: &[f64]) -> f64 {
    args[0].sqrt()
}

/// INTDIV function: floor of the quotient
pub fn fn_intdiv(args: &[f64]) -> f64 {
    (args[0] / args[1]).floor()
}

/// FLOOR function
pub fn fn_floor(args: &[f64]) -> f64 {
    args[0].floor()
}

/// CEIL function
pub fn fn_ceil(args: &[f64]) -> f64 {
    args[0].ceil()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        let builtins = BuiltinSymbols::new();
        assert_eq!(builtins.constant("PI"), Some(std::f64::consts::PI));
        assert!((builtins.constant("PHI").unwrap() - 1.618_033_988_749_895).abs() < 1e-12);
        assert_eq!(builtins.constant("pi"), None);
        assert_eq!(builtins.constant_names().collect::<Vec<_>>(), ["PI", "PHI"]);
    }

    #[test]
    fn test_function_arity() {
        let builtins = BuiltinSymbols::new();
        assert_eq!(builtins.call("MAX", &[1.0, 5.0, 3.0]), Some(5.0));
        assert_eq!(builtins.call("MIN", &[4.0, -2.0, 3.0]), Some(-2.0));
        assert_eq!(builtins.call("MAX", &[1.0]), None);
        assert_eq!(builtins.call("SQRT", &[16.0, 1.0]), None);
        assert_eq!(builtins.call("UNKNOWN", &[1.0]), None);
        assert_eq!(builtins.function_names().len(), 11);
    }

    #[test]
    fn test_math_functions() {
        let builtins = BuiltinSymbols::new();
        assert_eq!(builtins.call("SQRT", &[16.0]), Some(4.0));
        assert_eq!(builtins.call("ABS", &[-3.5]), Some(3.5));
        assert_eq!(builtins.call("POW", &[2.0, 10.0]), Some(1024.0));
        assert_eq!(builtins.call("INTDIV", &[7.0, 2.0]), Some(3.0));
        assert_eq!(builtins.call("INTDIV", &[-7.0, 2.0]), Some(-4.0));
        assert_eq!(builtins.call("FLOOR", &[-1.5]), Some(-2.0));
        assert_eq!(builtins.call("CEIL", &[1.2]), Some(2.0));
    }

    #[test]
    fn test_trigonometry_in_degrees() {
        let builtins = BuiltinSymbols::new();
        assert!((builtins.call("COS", &[180.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!((builtins.call("SIN", &[90.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((builtins.call("TAN", &[45.0]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_meta_functions() {
        let builtins = BuiltinSymbols::new();
        let (method, meta) = builtins.meta_function("SUM").unwrap();
        assert_eq!(meta, MetaFunction::Sum);
        assert_eq!(method.bound_variables(), 1);
        assert_eq!((method.min_args(), method.max_args()), (3, Some(4)));
        assert!(builtins.meta_function("MAX").is_none());
        // Meta-functions are not callable as plain functions
        assert_eq!(builtins.call("SUM", &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_bound_variable_names() {
        assert!(BuiltinSymbols::bound_variable_names(0).is_empty());
        assert_eq!(BuiltinSymbols::bound_variable_names(2), ["i", "j"]);
        assert_eq!(BuiltinSymbols::bound_variable_names(100).len(), 26);
        assert_eq!(BuiltinSymbols::bound_variable_slot("k"), Some(2));
        assert_eq!(BuiltinSymbols::bound_variable_slot("a"), Some(3));
        assert_eq!(BuiltinSymbols::bound_variable_slot("level"), None);
    }
}
