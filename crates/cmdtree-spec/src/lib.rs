//! Declarative argument schema model for cmdtree commands.
//!
//! The types here describe *what* a command accepts (positional arguments,
//! flags, their types and defaults); they do not parse anything themselves.
//! They are used by:
//! - `cmdtree-argparse` (token scanning and coercion against a spec)
//! - `cmdtree-core` (command registration and dispatch)
//!
//! A spec is validated eagerly when defined and never mutated afterwards:
//! a malformed spec is a programming error caught at startup, not a runtime
//! condition.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The value type an argument or flag coerces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Number,
    Boolean,
    Enum,
}

/// A typed argument value produced by parsing (or carried as a default).
///
/// `List` only ever appears as the capture of a variadic positional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Str(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Whether this value is acceptable as a default for `ty`.
    fn fits(&self, ty: ArgType) -> bool {
        matches!(
            (self, ty),
            (Self::Str(_), ArgType::String)
                | (Self::Str(_), ArgType::Enum)
                | (Self::Number(_), ArgType::Number)
                | (Self::Bool(_), ArgType::Boolean)
        )
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => write!(f, "{}", items.join(" ")),
        }
    }
}

/// An argument identified by a `--name` or `-short` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlagSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ArgType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Alternate long names resolving to this flag.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ArgValue>,
    /// Enum flags only: the closed set of accepted values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FlagSpec {
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            short: None,
            aliases: Vec::new(),
            required: false,
            default: None,
            allowed_values: Vec::new(),
            description: String::new(),
        }
    }

    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: ArgValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn allow(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

/// An argument identified by its position in the token stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PositionalSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ArgType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ArgValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// Captures all remaining tokens as a string list; at most one per
    /// spec, and it must be the last positional.
    #[serde(default)]
    pub variadic: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl PositionalSpec {
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            allowed_values: Vec::new(),
            variadic: false,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: ArgValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn allow(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

/// The full argument schema owned by one command: positionals plus flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positionals: Vec<PositionalSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagSpec>,
}

impl CommandSpec {
    /// An empty spec: no positionals, no flags.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Define and validate a spec in one step.
    ///
    /// Every schema invariant is checked here, so a `CommandSpec` obtained
    /// through `define` is known-good for the lifetime of the command.
    pub fn define(
        positionals: Vec<PositionalSpec>,
        flags: Vec<FlagSpec>,
    ) -> Result<Self, ConfigError> {
        let spec = Self { positionals, flags };
        spec.validate()?;
        Ok(spec)
    }

    /// Re-run the full validation on an already-built spec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_duplicates()?;

        let mut seen_optional = false;
        for (idx, pos) in self.positionals.iter().enumerate() {
            if pos.variadic {
                if idx + 1 != self.positionals.len() {
                    return Err(ConfigError::invalid_spec(format!(
                        "Variadic positional '{}' must be the last positional",
                        pos.name
                    )));
                }
                if pos.ty != ArgType::String {
                    return Err(ConfigError::invalid_spec(format!(
                        "Variadic positional '{}' must have string type",
                        pos.name
                    )));
                }
                if pos.default.is_some() {
                    return Err(ConfigError::invalid_spec(format!(
                        "Variadic positional '{}' cannot declare a default value",
                        pos.name
                    )));
                }
                continue;
            }

            if pos.required && seen_optional {
                return Err(ConfigError::invalid_spec(format!(
                    "Required positional '{}' cannot follow an optional positional",
                    pos.name
                )));
            }
            if !pos.required {
                seen_optional = true;
            }

            check_arg(
                &pos.name,
                pos.ty,
                pos.required,
                pos.default.as_ref(),
                &pos.allowed_values,
            )?;
        }

        for flag in &self.flags {
            if let Some(short) = &flag.short {
                if short.chars().count() != 1 {
                    return Err(ConfigError::invalid_spec(format!(
                        "Short name '{short}' for flag '{}' must be a single character",
                        flag.name
                    )));
                }
            }
            check_arg(
                &flag.name,
                flag.ty,
                flag.required,
                flag.default.as_ref(),
                &flag.allowed_values,
            )?;
        }

        Ok(())
    }

    /// Duplicate-name detection alone.
    ///
    /// The parser re-runs this defensively before scanning, so the check is
    /// exposed separately from the full validation.
    pub fn check_duplicates(&self) -> Result<(), ConfigError> {
        let mut long_names: Vec<&str> = Vec::new();
        let mut short_names: Vec<&str> = Vec::new();
        for flag in &self.flags {
            for name in std::iter::once(flag.name.as_str())
                .chain(flag.aliases.iter().map(String::as_str))
            {
                if long_names.contains(&name) {
                    return Err(ConfigError::invalid_spec(format!(
                        "Duplicate flag name detected: {name}"
                    )));
                }
                long_names.push(name);
            }
            if let Some(short) = &flag.short {
                if short_names.contains(&short.as_str()) {
                    return Err(ConfigError::invalid_spec(format!(
                        "Duplicate short name detected: {short}"
                    )));
                }
                short_names.push(short.as_str());
            }
        }

        let mut positional_names: Vec<&str> = Vec::new();
        for pos in &self.positionals {
            if positional_names.contains(&pos.name.as_str()) {
                return Err(ConfigError::invalid_spec(format!(
                    "Duplicate positional name detected: {}",
                    pos.name
                )));
            }
            positional_names.push(pos.name.as_str());
        }

        Ok(())
    }
}

fn check_arg(
    name: &str,
    ty: ArgType,
    required: bool,
    default: Option<&ArgValue>,
    allowed_values: &[String],
) -> Result<(), ConfigError> {
    match ty {
        ArgType::Boolean => {
            // Booleans are presence/absence; they are never missing and so
            // can be neither required nor defaulted (other than false).
            if required {
                return Err(ConfigError::invalid_spec(format!(
                    "Boolean '{name}' cannot be required"
                )));
            }
            if default.is_some_and(|d| *d != ArgValue::Bool(false)) {
                return Err(ConfigError::invalid_spec(format!(
                    "Boolean '{name}' cannot declare a default other than false"
                )));
            }
        }
        ArgType::Enum => {
            if allowed_values.is_empty() {
                return Err(ConfigError::invalid_spec(format!(
                    "Enum '{name}' must declare at least one allowed value"
                )));
            }
            match default {
                Some(value) => {
                    let ok = value
                        .as_str()
                        .is_some_and(|s| allowed_values.iter().any(|v| v == s));
                    if !ok {
                        return Err(ConfigError::invalid_spec(format!(
                            "Default value \"{value}\" for enum '{name}' is not one of [{}]",
                            allowed_values.join(", ")
                        )));
                    }
                    if required {
                        return Err(ConfigError::invalid_spec(format!(
                            "'{name}' cannot be required and carry a default value"
                        )));
                    }
                }
                None => {
                    if !required {
                        return Err(ConfigError::invalid_spec(format!(
                            "Enum '{name}' must be required or declare a default value"
                        )));
                    }
                }
            }
        }
        ArgType::String | ArgType::Number => {
            if !allowed_values.is_empty() {
                return Err(ConfigError::invalid_spec(format!(
                    "'{name}' may only declare allowed values with the enum type"
                )));
            }
            if let Some(value) = default {
                if required {
                    return Err(ConfigError::invalid_spec(format!(
                        "'{name}' cannot be required and carry a default value"
                    )));
                }
                if !value.fits(ty) {
                    return Err(ConfigError::invalid_spec(format!(
                        "Default value for '{name}' does not match its declared type"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Fatal configuration error raised while defining specs or commands.
///
/// Unlike parse errors, these are programmer mistakes: they surface at
/// startup (definition/registration time) and are never produced during
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidSpec(String),
    InvalidName(String),
}

impl ConfigError {
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec(message.into())
    }

    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidSpec(msg) | Self::InvalidName(msg) => msg.as_str(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ConfigError {}
