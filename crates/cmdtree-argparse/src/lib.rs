//! Schema-driven token parsing and usage rendering.
//!
//! This crate consumes a [`CommandSpec`] and a pre-tokenized argument vector
//! and produces either fully defaulted, typed values or a descriptive parse
//! error. It intentionally depends on nothing but the schema crate so it can
//! be reused by:
//! - `cmdtree-core` (group-level and leaf-level parsing during dispatch)
//! - embedding hosts that want to validate tokens without dispatching
//!
//! Parsing never panics and never raises: every failure is an ordinary
//! [`ParseError`] return value the caller can test and branch on.

use std::collections::HashMap;

use cmdtree_spec::{ArgType, ArgValue, CommandSpec, FlagSpec};

/// A parse failure, always carrying a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The token stream does not satisfy the spec (user input problem).
    InvalidArgs(String),
    /// The spec itself is malformed; detected defensively before scanning.
    InvalidSpec(String),
}

impl ParseError {
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgs(msg) | Self::InvalidSpec(msg) => msg.as_str(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Typed, fully defaulted values produced by one parse call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    positionals: HashMap<String, ArgValue>,
    flags: HashMap<String, ArgValue>,
}

impl ParsedArgs {
    pub fn positional(&self, name: &str) -> Option<&ArgValue> {
        self.positionals.get(name)
    }

    pub fn flag(&self, name: &str) -> Option<&ArgValue> {
        self.flags.get(name)
    }

    pub fn positional_str(&self, name: &str) -> Option<&str> {
        self.positionals.get(name).and_then(ArgValue::as_str)
    }

    pub fn positional_number(&self, name: &str) -> Option<f64> {
        self.positionals.get(name).and_then(ArgValue::as_number)
    }

    /// The capture of a variadic positional.
    pub fn positional_list(&self, name: &str) -> Option<&[String]> {
        self.positionals.get(name).and_then(ArgValue::as_list)
    }

    pub fn flag_str(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(ArgValue::as_str)
    }

    pub fn flag_number(&self, name: &str) -> Option<f64> {
        self.flags.get(name).and_then(ArgValue::as_number)
    }

    /// Boolean flags are always present after defaulting, so this needs no
    /// `Option`.
    pub fn flag_bool(&self, name: &str) -> bool {
        self.flags
            .get(name)
            .and_then(ArgValue::as_bool)
            .unwrap_or(false)
    }
}

/// Parse `tokens` against `spec`, rejecting unknown flags and excess
/// positionals.
pub fn parse(spec: &CommandSpec, tokens: &[String]) -> ParseResult<ParsedArgs> {
    parse_inner(spec, tokens, false)
}

/// Parse `tokens` against `spec`, passing unknown flags and excess
/// positionals through to the spec's variadic positional (in their original
/// order) instead of failing.
///
/// Group dispatch uses this so that tokens meant for a child command survive
/// the group-level scan verbatim. When the spec declares no variadic,
/// passthrough tokens are dropped.
pub fn parse_lenient(spec: &CommandSpec, tokens: &[String]) -> ParseResult<ParsedArgs> {
    parse_inner(spec, tokens, true)
}

fn parse_inner(spec: &CommandSpec, tokens: &[String], lenient: bool) -> ParseResult<ParsedArgs> {
    spec.check_duplicates()
        .map_err(|e| ParseError::InvalidSpec(e.message().to_string()))?;

    let mut long_map: HashMap<&str, &FlagSpec> = HashMap::new();
    let mut short_map: HashMap<char, &FlagSpec> = HashMap::new();
    for flag in &spec.flags {
        long_map.insert(flag.name.as_str(), flag);
        for alias in &flag.aliases {
            long_map.insert(alias.as_str(), flag);
        }
        if let Some(short) = &flag.short {
            if let Some(c) = short.chars().next() {
                short_map.insert(c, flag);
            }
        }
    }

    let has_variadic = spec.positionals.last().is_some_and(|p| p.variadic);
    let fixed_count = spec.positionals.len() - usize::from(has_variadic);

    let mut positionals: HashMap<String, ArgValue> = HashMap::new();
    let mut flags: HashMap<String, ArgValue> = HashMap::new();
    let mut rest: Vec<String> = Vec::new();
    // Once a bare token reaches the variadic positional, everything that
    // follows is captured verbatim, flags included.
    let mut rest_open = false;
    let mut pos_idx = 0usize;

    let mut i = 0usize;
    while i < tokens.len() {
        let token = tokens[i].as_str();

        if rest_open {
            rest.push(token.to_string());
            i += 1;
            continue;
        }

        if let Some(body) = token.strip_prefix("--") {
            let (name, attached) = match body.split_once('=') {
                Some((n, v)) => (n, Some(v)),
                None => (body, None),
            };
            let Some(flag) = (if name.is_empty() { None } else { long_map.get(name).copied() })
            else {
                if lenient {
                    if has_variadic {
                        rest.push(token.to_string());
                    }
                    i += 1;
                    continue;
                }
                return Err(ParseError::InvalidArgs(format!("Unknown flag '--{name}'")));
            };
            i += consume_flag_value(
                flag,
                &format!("--{name}"),
                attached,
                tokens.get(i + 1),
                &mut flags,
            )?;
            continue;
        }

        if token.len() > 1 && token.starts_with('-') {
            let body = &token[1..];
            let (cluster, attached) = match body.split_once('=') {
                Some((c, v)) => (c, Some(v)),
                None => (body, None),
            };

            if cluster.chars().count() > 1 {
                // Combined short flags: only booleans may be clustered.
                let mut resolved: Vec<(char, &FlagSpec)> = Vec::new();
                let mut unknown: Option<char> = None;
                for c in cluster.chars() {
                    match short_map.get(&c) {
                        Some(flag) => resolved.push((c, flag)),
                        None => {
                            unknown = Some(c);
                            break;
                        }
                    }
                }
                if let Some(c) = unknown {
                    if lenient {
                        if has_variadic {
                            rest.push(token.to_string());
                        }
                        i += 1;
                        continue;
                    }
                    return Err(ParseError::InvalidArgs(format!("Unknown flag '-{c}'")));
                }
                if let Some((c, _)) = resolved.iter().find(|(_, f)| f.ty != ArgType::Boolean) {
                    return Err(ParseError::InvalidArgs(format!(
                        "Flag '-{c}' must be boolean when combined"
                    )));
                }
                if attached.is_some() {
                    return Err(ParseError::InvalidArgs(format!(
                        "Flag '-{cluster}' cannot take a value when combined"
                    )));
                }
                for (_, flag) in resolved {
                    flags.insert(flag.name.clone(), ArgValue::Bool(true));
                }
                i += 1;
                continue;
            }

            let Some(flag) = cluster
                .chars()
                .next()
                .and_then(|c| short_map.get(&c).copied())
            else {
                if lenient {
                    if has_variadic {
                        rest.push(token.to_string());
                    }
                    i += 1;
                    continue;
                }
                return Err(ParseError::InvalidArgs(format!("Unknown flag '-{cluster}'")));
            };
            i += consume_flag_value(
                flag,
                &format!("-{cluster}"),
                attached,
                tokens.get(i + 1),
                &mut flags,
            )?;
            continue;
        }

        // Bare token: the next expected positional.
        if pos_idx < fixed_count {
            let pos = &spec.positionals[pos_idx];
            let value = coerce(pos.ty, &pos.allowed_values, token)
                .map_err(|msg| ParseError::InvalidArgs(format!("Argument '{}': {msg}", pos.name)))?;
            positionals.insert(pos.name.clone(), value);
            pos_idx += 1;
        } else if has_variadic {
            rest.push(token.to_string());
            rest_open = true;
        } else if !lenient {
            return Err(ParseError::InvalidArgs(format!(
                "Unexpected argument: '{token}'"
            )));
        }
        i += 1;
    }

    // Finishing pass: defaults first, then requiredness, in declaration
    // order, positionals before flags. Input order never affects these
    // checks.
    for pos in &spec.positionals {
        if pos.variadic {
            if rest.is_empty() && pos.required {
                return Err(ParseError::InvalidArgs(format!(
                    "Missing required argument: '{}'",
                    pos.name
                )));
            }
            positionals.insert(pos.name.clone(), ArgValue::List(std::mem::take(&mut rest)));
            continue;
        }
        if positionals.contains_key(&pos.name) {
            continue;
        }
        if let Some(default) = &pos.default {
            positionals.insert(pos.name.clone(), default.clone());
        } else if pos.ty == ArgType::Boolean {
            positionals.insert(pos.name.clone(), ArgValue::Bool(false));
        } else if pos.required {
            return Err(ParseError::InvalidArgs(format!(
                "Missing required argument: '{}'",
                pos.name
            )));
        }
    }
    for flag in &spec.flags {
        if flags.contains_key(&flag.name) {
            continue;
        }
        if let Some(default) = &flag.default {
            flags.insert(flag.name.clone(), default.clone());
        } else if flag.ty == ArgType::Boolean {
            flags.insert(flag.name.clone(), ArgValue::Bool(false));
        } else if flag.required {
            return Err(ParseError::InvalidArgs(format!(
                "Missing required flag: '--{}'",
                flag.name
            )));
        }
    }

    Ok(ParsedArgs { positionals, flags })
}

/// Record a flag's value, consuming the attached `=value` segment or the
/// following token as needed. Returns how many tokens were consumed.
fn consume_flag_value(
    flag: &FlagSpec,
    display: &str,
    attached: Option<&str>,
    next: Option<&String>,
    flags: &mut HashMap<String, ArgValue>,
) -> ParseResult<usize> {
    match attached {
        Some(value) => {
            if value.is_empty() {
                return Err(ParseError::InvalidArgs(format!(
                    "Flag '{display}' requires a value"
                )));
            }
            let value = coerce(flag.ty, &flag.allowed_values, value)
                .map_err(|msg| ParseError::InvalidArgs(format!("Flag '{display}': {msg}")))?;
            flags.insert(flag.name.clone(), value);
            Ok(1)
        }
        None => {
            if flag.ty == ArgType::Boolean {
                flags.insert(flag.name.clone(), ArgValue::Bool(true));
                return Ok(1);
            }
            // A next token starting with '-' is rejected so a missing value
            // is never silently swallowed by the following flag.
            match next {
                Some(raw) if !raw.starts_with('-') => {
                    let value = coerce(flag.ty, &flag.allowed_values, raw)
                        .map_err(|msg| ParseError::InvalidArgs(format!("Flag '{display}': {msg}")))?;
                    flags.insert(flag.name.clone(), value);
                    Ok(2)
                }
                _ => Err(ParseError::InvalidArgs(format!(
                    "Flag '{display}': No value provided"
                ))),
            }
        }
    }
}

/// Convert one raw token into a typed value. The error carries no subject
/// prefix; callers attach the flag or argument name.
fn coerce(ty: ArgType, allowed_values: &[String], value: &str) -> Result<ArgValue, String> {
    match ty {
        ArgType::String => Ok(ArgValue::Str(value.to_string())),
        ArgType::Number => value
            .parse::<f64>()
            .map(ArgValue::Number)
            .map_err(|_| format!("Expected number, got \"{value}\"")),
        ArgType::Boolean => Ok(ArgValue::Bool(value.eq_ignore_ascii_case("true"))),
        ArgType::Enum => {
            if allowed_values.iter().any(|v| v == value) {
                Ok(ArgValue::Str(value.to_string()))
            } else {
                Err(format!(
                    "Expected one of [{}], got \"{value}\"",
                    allowed_values.join(", ")
                ))
            }
        }
    }
}

/// Render a one-line usage string for a spec.
///
/// Non-variadic positionals come first in declared order, then flags in
/// declared order, then the variadic positional. Optional elements are
/// bracketed.
pub fn generate_usage(spec: &CommandSpec) -> String {
    let mut parts: Vec<String> = Vec::new();
    for pos in spec.positionals.iter().filter(|p| !p.variadic) {
        parts.push(if pos.required {
            format!("<{}>", pos.name)
        } else {
            format!("[{}]", pos.name)
        });
    }
    for flag in &spec.flags {
        let inner = match &flag.short {
            Some(short) => format!("--{}|-{short} <value>", flag.name),
            None => format!("--{} <value>", flag.name),
        };
        parts.push(if flag.required {
            inner
        } else {
            format!("[{inner}]")
        });
    }
    if let Some(pos) = spec.positionals.last().filter(|p| p.variadic) {
        parts.push(if pos.required {
            format!("<{}...>", pos.name)
        } else {
            format!("[{}...]", pos.name)
        });
    }
    parts.join(" ")
}
