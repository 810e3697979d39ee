//! Line parsing for the two console grammars.
//!
//! Verb grammar: `<verb> [<Class>] [<id>] [<attr> <value>]`.
//! Dotted grammar: `<Class>.<verb>(<args>)`, translated into an
//! [`Invocation`] identical to what the verb grammar would produce.

use serde_json::{Number, Value as JsonValue};

use super::error::CommandError;
use crate::types::TypeTag;

/// Logical operations shared by both grammars.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Create,
    Show,
    Destroy,
    All,
    Update,
    Count,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::Create,
        Verb::Show,
        Verb::Destroy,
        Verb::All,
        Verb::Update,
        Verb::Count,
    ];

    pub fn from_word(word: &str) -> Option<Verb> {
        match word {
            "create" => Some(Verb::Create),
            "show" => Some(Verb::Show),
            "destroy" => Some(Verb::Destroy),
            "all" => Some(Verb::All),
            "update" => Some(Verb::Update),
            "count" => Some(Verb::Count),
            _ => None,
        }
    }

    pub fn as_word(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Show => "show",
            Verb::Destroy => "destroy",
            Verb::All => "all",
            Verb::Update => "update",
            Verb::Count => "count",
        }
    }

    /// One-line usage shown by `help <verb>`.
    pub fn usage(self) -> &'static str {
        match self {
            Verb::Create => "create <class>: create an instance, save it and print its id",
            Verb::Show => "show <class> <id>: print an instance | <class>.show(<id>)",
            Verb::Destroy => "destroy <class> <id>: delete an instance | <class>.destroy(<id>)",
            Verb::All => "all [<class>]: print every instance, optionally of one class | <class>.all()",
            Verb::Update => {
                "update <class> <id> <attribute> <value>: set an attribute | <class>.update(<id>, <attribute>, <value>)"
            }
            Verb::Count => "count <class>: print the number of instances | <class>.count()",
        }
    }
}

/// A verb and its positional arguments, tokens kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub verb: Verb,
    pub args: Vec<String>,
}

impl Invocation {
    /// Positional argument `index`; empty arguments count as missing.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .filter(|arg| !arg.is_empty())
    }
}

/// Parsed form of one input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Empty,
    Quit,
    Help(Option<String>),
    Invoke(Invocation),
}

pub fn parse_line(line: &str) -> Result<Line, CommandError> {
    let trimmed = line.trim();
    let tokens = tokenize(trimmed);
    let Some(head) = tokens.first() else {
        return Ok(Line::Empty);
    };
    match head.as_str() {
        "quit" | "EOF" => Ok(Line::Quit),
        "help" | "?" => Ok(Line::Help(tokens.get(1).cloned())),
        word => match Verb::from_word(word) {
            Some(verb) => Ok(Line::Invoke(Invocation {
                verb,
                args: tokens[1..].to_vec(),
            })),
            None => parse_dotted(trimmed).map(Line::Invoke),
        },
    }
}

/// Translate `<Class>.<verb>(<args>)` into the verb grammar.
pub fn parse_dotted(line: &str) -> Result<Invocation, CommandError> {
    let (class, call) = line.split_once('.').ok_or(CommandError::InvalidCommand)?;
    let class = class.trim();
    if class.is_empty() {
        return Err(CommandError::ClassNameMissing);
    }
    if TypeTag::lookup(class).is_none() {
        return Err(CommandError::ClassUnknown);
    }

    let (method, rest) = call
        .trim()
        .split_once('(')
        .ok_or(CommandError::InvalidCommand)?;
    let inner = rest.strip_suffix(')').ok_or(CommandError::InvalidCommand)?;
    let verb = Verb::from_word(method.trim()).ok_or(CommandError::InvalidCommand)?;

    let mut args = vec![class.to_string()];
    match verb {
        Verb::Create => return Err(CommandError::InvalidCommand),
        Verb::All | Verb::Count => {
            if !inner.trim().is_empty() {
                return Err(CommandError::InvalidFormat);
            }
        }
        Verb::Show | Verb::Destroy => args.push(strip_literal(inner).to_string()),
        Verb::Update => {
            let parts: Vec<&str> = inner.splitn(3, ',').collect();
            let [id, attribute, value] = parts.as_slice() else {
                return Err(CommandError::InvalidFormat);
            };
            args.push(strip_literal(id).to_string());
            args.push(strip_literal(attribute).to_string());
            args.push(value.trim().to_string());
        }
    }
    Ok(Invocation { verb, args })
}

/// Split on whitespace, keeping quoted segments (quotes included) together.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in line.chars() {
        match quote {
            Some(open) => {
                current.push(ch);
                if ch == open {
                    quote = None;
                }
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => {
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
                current.push(ch);
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Type an `update` value from its literal form.
///
/// Unquoted integer and float literals become numbers. Anything else becomes
/// text with surrounding quote characters removed, so `"5"` is stored as the
/// text `5`. Integers outside the 64-bit range are kept as text so no digits
/// are lost to float rounding.
pub fn infer_value(literal: &str) -> JsonValue {
    if let Ok(n) = literal.parse::<i64>() {
        return JsonValue::from(n);
    }
    if let Ok(n) = literal.parse::<u64>() {
        return JsonValue::from(n);
    }
    if is_integer_literal(literal) {
        return JsonValue::String(literal.to_string());
    }
    if is_float_literal(literal) {
        if let Some(n) = literal.parse::<f64>().ok().and_then(Number::from_f64) {
            return JsonValue::Number(n);
        }
    }
    JsonValue::String(strip_quotes(literal).to_string())
}

fn is_integer_literal(literal: &str) -> bool {
    let digits = literal.strip_prefix(['-', '+']).unwrap_or(literal);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_float_literal(literal: &str) -> bool {
    literal.chars().any(|c| c.is_ascii_digit())
        && literal
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c: char| c == '"' || c == '\'')
}

fn strip_literal(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
}
