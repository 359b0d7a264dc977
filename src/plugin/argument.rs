//! Function Arguments
//!
//! Typed positional arguments for function plugins and the scheme that
//! validates them before plugin code sees them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plugin::error::{PluginError, PluginResult};

/// Kind of a function argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentKind {
    Text,
    Number,
    Boolean,
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentKind::Text => write!(f, "text"),
            ArgumentKind::Number => write!(f, "number"),
            ArgumentKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// A function argument value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl Argument {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            Argument::Text(_) => ArgumentKind::Text,
            Argument::Number(_) => ArgumentKind::Number,
            Argument::Boolean(_) => ArgumentKind::Boolean,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Argument::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Text(s) => write!(f, "{}", s),
            Argument::Number(n) => write!(f, "{}", n),
            Argument::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Text(value)
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Argument::Number(value)
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Boolean(value)
    }
}

/// A declared positional parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ArgumentKind,
}

/// Declared argument scheme of a function plugin.
///
/// Fixed parameters are matched positionally; an optional variadic kind
/// accepts any number of trailing arguments of that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentScheme {
    parameters: Vec<Parameter>,
    variadic: Option<ArgumentKind>,
}

impl ArgumentScheme {
    /// A scheme accepting no arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed parameter
    pub fn with_parameter<S: Into<String>>(mut self, name: S, kind: ArgumentKind) -> Self {
        self.parameters.push(Parameter { name: name.into(), kind });
        self
    }

    /// Accept any number of trailing arguments of `kind`
    pub fn with_variadic(mut self, kind: ArgumentKind) -> Self {
        self.variadic = Some(kind);
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Check arity and kinds. Returns the arguments unchanged when valid.
    pub fn require_valid<'a>(&self, args: &'a [Argument]) -> PluginResult<&'a [Argument]> {
        let fixed = self.parameters.len();
        if args.len() < fixed || (self.variadic.is_none() && args.len() > fixed) {
            let expected = match self.variadic {
                Some(_) => format!("at least {}", fixed),
                None => fixed.to_string(),
            };
            return Err(PluginError::formula(format!(
                "expected {} argument(s) but got {}",
                expected,
                args.len()
            )));
        }

        for (index, arg) in args.iter().enumerate() {
            let (name, kind) = match self.parameters.get(index) {
                Some(param) => (param.name.as_str(), param.kind),
                None => ("variadic", self.variadic.unwrap_or(arg.kind())),
            };
            if arg.kind() != kind {
                return Err(PluginError::formula(format!(
                    "argument {} ('{}') must be {} but was {}",
                    index + 1,
                    name,
                    kind,
                    arg.kind()
                )));
            }
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_texts() -> ArgumentScheme {
        ArgumentScheme::new()
            .with_parameter("first", ArgumentKind::Text)
            .with_parameter("second", ArgumentKind::Text)
            .with_parameter("third", ArgumentKind::Text)
    }

    #[test]
    fn test_valid_fixed_arguments() {
        let args = vec![Argument::from("a"), Argument::from("b"), Argument::from("c")];
        assert_eq!(three_texts().require_valid(&args).unwrap().len(), 3);
    }

    #[test]
    fn test_arity_mismatch() {
        let args = vec![Argument::from("a")];
        let err = three_texts().require_valid(&args).unwrap_err();
        assert!(matches!(err, PluginError::Formula { .. }));
        assert!(err.to_string().contains("expected 3 argument(s) but got 1"));

        let args: Vec<Argument> = ["a", "b", "c", "d"].iter().map(|s| Argument::from(*s)).collect();
        assert!(three_texts().require_valid(&args).is_err());
    }

    #[test]
    fn test_kind_mismatch() {
        let args = vec![Argument::from("a"), Argument::from(2.0), Argument::from("c")];
        let err = three_texts().require_valid(&args).unwrap_err();
        assert!(err.to_string().contains("argument 2 ('second') must be text but was number"));
    }

    #[test]
    fn test_variadic_tail() {
        let scheme = ArgumentScheme::new()
            .with_parameter("separator", ArgumentKind::Text)
            .with_variadic(ArgumentKind::Number);

        assert!(scheme.require_valid(&[Argument::from(",")]).is_ok());
        assert!(scheme
            .require_valid(&[Argument::from(","), Argument::from(1.0), Argument::from(2.5)])
            .is_ok());
        assert!(scheme
            .require_valid(&[Argument::from(","), Argument::from(true)])
            .is_err());
        assert!(scheme.require_valid(&[]).is_err());
    }

    #[test]
    fn test_argument_accessors() {
        assert_eq!(Argument::from("x").as_text(), Some("x"));
        assert_eq!(Argument::from(1.5).as_number(), Some(1.5));
        assert_eq!(Argument::from(true).as_bool(), Some(true));
        assert_eq!(Argument::from(true).as_text(), None);
        assert_eq!(Argument::from(3.0).to_string(), "3");
    }
}
