//! Interactive command interpreter over an [`ObjectStore`].

pub mod error;
pub mod parse;

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::debug;

use crate::key::{composite_key, key_tag};
use crate::store::ObjectStore;
use crate::types::TypeTag;

pub use error::CommandError;
pub use parse::{Invocation, Line, Verb, infer_value, parse_line};

pub const PROMPT: &str = "(hbnb) ";

/// Whether the session should keep reading input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Command interpreter bound to one store handle.
pub struct Console<'s> {
    store: &'s mut ObjectStore,
}

impl<'s> Console<'s> {
    pub fn new(store: &'s mut ObjectStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ObjectStore {
        &*self.store
    }

    /// Read and execute lines until `quit` or end of input.
    ///
    /// Failures other than operator mistakes (e.g. a failed save) are
    /// reported on stderr and the session continues. A line that is not
    /// valid UTF-8 is rejected as an invalid command.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        out: &mut W,
        interactive: bool,
    ) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            if interactive {
                write!(out, "{PROMPT}")?;
                out.flush()?;
            }
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                if interactive {
                    writeln!(out)?;
                }
                break;
            }
            let Ok(line) = std::str::from_utf8(&buf) else {
                debug!(bytes = buf.len(), "rejecting line that is not UTF-8");
                writeln!(out, "{}", CommandError::InvalidCommand)?;
                continue;
            };
            match self.execute(line, out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => {
                    tracing::error!(error = %format!("{err:#}"), "command failed");
                    eprintln!("error: {err:#}");
                }
            }
        }
        Ok(())
    }

    /// Execute a single input line, writing operator output to `out`.
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let invocation = match parse_line(line) {
            Ok(Line::Empty) => return Ok(Flow::Continue),
            Ok(Line::Quit) => return Ok(Flow::Quit),
            Ok(Line::Help(topic)) => {
                write_help(out, topic.as_deref())?;
                return Ok(Flow::Continue);
            }
            Ok(Line::Invoke(invocation)) => invocation,
            Err(err) => {
                writeln!(out, "{err}")?;
                return Ok(Flow::Continue);
            }
        };

        debug!(verb = invocation.verb.as_word(), args = ?invocation.args, "dispatching command");
        match self.dispatch(&invocation) {
            Ok(Some(reply)) => writeln!(out, "{reply}")?,
            Ok(None) => {}
            Err(err) => match err.downcast::<CommandError>() {
                Ok(command_err) => writeln!(out, "{command_err}")?,
                Err(other) => return Err(other),
            },
        }
        Ok(Flow::Continue)
    }

    fn dispatch(&mut self, invocation: &Invocation) -> Result<Option<String>> {
        match invocation.verb {
            Verb::Create => {
                let tag = class_arg(invocation)?;
                let record = tag.fresh();
                let id = record.id().to_string();
                self.store.register(record);
                self.store.save()?;
                Ok(Some(id))
            }
            Verb::Show => {
                let key = self.existing_key(invocation)?;
                let record = self.store.get(&key).ok_or(CommandError::NoInstanceFound)?;
                Ok(Some(record.to_string()))
            }
            Verb::Destroy => {
                let key = self.existing_key(invocation)?;
                self.store.remove(&key);
                self.store.save()?;
                Ok(None)
            }
            Verb::All => {
                let filter = match invocation.arg(0) {
                    Some(_) => Some(class_arg(invocation)?),
                    None => None,
                };
                let rendered: Vec<String> = self
                    .store
                    .all()
                    .iter()
                    .filter(|(key, _)| matches_tag(key, filter))
                    .map(|(_, record)| record.to_string())
                    .collect();
                Ok(Some(format!("[{}]", rendered.join(", "))))
            }
            Verb::Count => {
                let tag = class_arg(invocation)?;
                let count = self
                    .store
                    .all()
                    .keys()
                    .filter(|key| matches_tag(key, Some(tag)))
                    .count();
                Ok(Some(count.to_string()))
            }
            Verb::Update => {
                let key = self.existing_key(invocation)?;
                let name = invocation.arg(2).ok_or(CommandError::AttributeNameMissing)?;
                let literal = invocation.arg(3).ok_or(CommandError::ValueMissing)?;
                let record = self
                    .store
                    .get_mut(&key)
                    .ok_or(CommandError::NoInstanceFound)?;
                record
                    .set_attribute(name, infer_value(literal))
                    .map_err(|_| CommandError::ReservedAttribute)?;
                record.touch();
                self.store.save()?;
                Ok(None)
            }
        }
    }

    /// Resolve class and id arguments to a key present in the store.
    fn existing_key(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let tag = class_arg(invocation)?;
        let id = invocation.arg(1).ok_or(CommandError::InstanceIdMissing)?;
        let key = composite_key(tag, id);
        if !self.store.contains(&key) {
            return Err(CommandError::NoInstanceFound);
        }
        Ok(key)
    }
}

fn class_arg(invocation: &Invocation) -> Result<TypeTag, CommandError> {
    let name = invocation.arg(0).ok_or(CommandError::ClassNameMissing)?;
    TypeTag::lookup(name).ok_or(CommandError::ClassUnknown)
}

fn matches_tag(key: &str, filter: Option<TypeTag>) -> bool {
    match filter {
        Some(tag) => key_tag(key) == Some(tag.as_atom()),
        None => true,
    }
}

fn write_help<W: Write>(out: &mut W, topic: Option<&str>) -> Result<()> {
    match topic {
        None => {
            writeln!(out)?;
            writeln!(out, "Documented commands (type help <topic>):")?;
            writeln!(out, "========================================")?;
            let mut names: Vec<&str> = Verb::ALL.iter().map(|verb| verb.as_word()).collect();
            names.extend(["EOF", "help", "quit"]);
            names.sort_unstable();
            writeln!(out, "{}", names.join("  "))?;
            writeln!(out)?;
        }
        Some("quit") | Some("EOF") => writeln!(out, "Quit command to exit the program")?,
        Some("help") => writeln!(out, "help [<command>]: list commands or describe one")?,
        Some(word) => match Verb::from_word(word) {
            Some(verb) => writeln!(out, "{}", verb.usage())?,
            None => writeln!(out, "*** No help on {word}")?,
        },
    }
    Ok(())
}
