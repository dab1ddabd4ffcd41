//! Symbol tables: the variable names and method signatures a formula may use

use crate::error::SymbolError;
use ahash::AHashMap;

/// Signature text meaning "no upper bound" on the argument count
const UNBOUNDED: &str = "INF";

/// Check if a character may appear in a symbol name after the first one
pub fn is_symbol_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Check if a string is a valid symbol name: an ASCII letter followed by
/// letters, digits or underscores.
pub fn is_valid_symbol_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(is_symbol_char),
        _ => false,
    }
}

/// Definition of a method: name, accepted argument counts and the number
/// of loop variables it binds (0 for ordinary methods).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    name: String,
    min_args: usize,
    /// `None` = unlimited
    max_args: Option<usize>,
    bound_variables: usize,
    signature: String,
}

impl Method {
    /// Create an ordinary method definition
    pub fn new(
        name: impl Into<String>,
        min_args: usize,
        max_args: Option<usize>,
    ) -> Result<Self, SymbolError> {
        let name = name.into();
        if !is_valid_symbol_name(&name) {
            return Err(SymbolError::InvalidSymbolName(name));
        }
        let method = Self::builtin(&name, min_args, max_args, 0);
        if matches!(max_args, Some(max) if max < min_args) {
            return Err(SymbolError::InvalidSignature {
                signature: method.signature,
                reason: "minimum argument count exceeds maximum".into(),
            });
        }
        Ok(method)
    }

    /// Definition for a built-in symbol, whose bounds are known to be valid
    pub(crate) fn builtin(
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        bound_variables: usize,
    ) -> Self {
        let signature = match max_args {
            Some(max) if max == min_args => format!("{name}({min_args})"),
            Some(max) => format!("{name}({min_args}-{max})"),
            None => format!("{name}({min_args}-{UNBOUNDED})"),
        };
        Self {
            name: name.to_string(),
            min_args,
            max_args,
            bound_variables,
            signature,
        }
    }

    /// Parse a signature such as `"DAMAGE(1-3)"`, `"LEVEL(2)"`,
    /// `"BONUS(1-INF)"` or `"SEED"`.
    ///
    /// Without a parenthesized part the method takes no argument. A single
    /// number fixes the argument count, a lone `INF` accepts any count.
    pub fn parse(signature: &str) -> Result<Self, SymbolError> {
        let invalid = |reason: &str| SymbolError::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let (name, arity) = match signature.find('(') {
            Some(open) => {
                let arity = signature[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| invalid("missing closing parenthesis"))?;
                (&signature[..open], arity)
            }
            None => (signature, ""),
        };

        if !is_valid_symbol_name(name) {
            return Err(invalid("method name is not a valid symbol name"));
        }

        let parse_count = |text: &str| {
            if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("argument count is not a non-negative integer"));
            }
            text.parse::<usize>()
                .map_err(|_| invalid("argument count is not a non-negative integer"))
        };

        let (min_args, max_args) = if arity.is_empty() {
            (0, Some(0))
        } else {
            match arity.split_once('-') {
                None if arity == UNBOUNDED => (0, None),
                None => {
                    let count = parse_count(arity)?;
                    (count, Some(count))
                }
                Some((min, max)) => {
                    let min = parse_count(min)?;
                    let max = if max == UNBOUNDED {
                        None
                    } else {
                        Some(parse_count(max)?)
                    };
                    (min, max)
                }
            }
        };

        if matches!(max_args, Some(max) if max < min_args) {
            return Err(invalid("minimum argument count exceeds maximum"));
        }

        Ok(Self {
            name: name.to_string(),
            min_args,
            max_args,
            bound_variables: 0,
            signature: signature.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_args(&self) -> usize {
        self.min_args
    }

    /// Maximum argument count, `None` when unbounded
    pub fn max_args(&self) -> Option<usize> {
        self.max_args
    }

    pub fn bound_variables(&self) -> usize {
        self.bound_variables
    }

    /// Signature text the method was built from
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn is_meta_function(&self) -> bool {
        self.bound_variables > 0
    }

    /// Check an argument count against the declared bounds
    pub fn accepts(&self, arg_count: usize) -> bool {
        arg_count >= self.min_args && self.max_args.map_or(true, |max| arg_count <= max)
    }

    /// Human readable description of the accepted argument counts
    pub fn arity_description(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("exactly {max}"),
            Some(max) => format!("between {} and {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Symbols available to a parse: variable names and method definitions
/// declared by the host.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    variables: Vec<String>,
    methods: AHashMap<String, Method>,
    /// Method names in registration order
    method_order: Vec<String>,
}

impl SymbolTable {
    /// Create an empty symbol table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable name
    pub fn add_variable(&mut self, name: impl Into<String>) -> Result<(), SymbolError> {
        let name = name.into();
        if !is_valid_symbol_name(&name) {
            return Err(SymbolError::InvalidSymbolName(name));
        }
        if !self.variables.contains(&name) {
            self.variables.push(name);
        }
        Ok(())
    }

    /// Declare several variable names
    pub fn add_variables<I, S>(&mut self, names: I) -> Result<(), SymbolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add_variable(name)?;
        }
        Ok(())
    }

    /// Declare a method. Method names must be unique.
    pub fn add_method(&mut self, method: Method) -> Result<(), SymbolError> {
        if self.methods.contains_key(method.name()) {
            return Err(SymbolError::DuplicateMethod(method.name().to_string()));
        }
        self.method_order.push(method.name().to_string());
        self.methods.insert(method.name().to_string(), method);
        Ok(())
    }

    /// Declare methods from signature strings
    pub fn add_signatures<I, S>(&mut self, signatures: I) -> Result<(), SymbolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for signature in signatures {
            self.add_method(Method::parse(signature.as_ref())?)?;
        }
        Ok(())
    }

    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Variable names in registration order
    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    /// Method names in registration order
    pub fn method_names(&self) -> &[String] {
        &self.method_order
    }

    /// Methods in registration order
    pub fn methods(&self) -> impl Iterator<Item = &Method> + '_ {
        self.method_order
            .iter()
            .filter_map(move |name| self.methods.get(name))
    }

    /// Number of declared variables and methods
    pub fn symbol_count(&self) -> usize {
        self.variables.len() + self.methods.len()
    }

    /// Whether nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.symbol_count() == 0
    }
}
