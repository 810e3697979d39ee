use thiserror::Error;

/// Operator-facing conditions reported by the console.
///
/// The `Display` form is the literal message printed at the prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("** class name missing **")]
    ClassNameMissing,
    #[error("** class doesn't exist **")]
    ClassUnknown,
    #[error("** instance id missing **")]
    InstanceIdMissing,
    #[error("** no instance found **")]
    NoInstanceFound,
    #[error("** attribute name missing **")]
    AttributeNameMissing,
    #[error("** value missing **")]
    ValueMissing,
    #[error("** attribute can't be updated **")]
    ReservedAttribute,
    #[error("** invalid format **")]
    InvalidFormat,
    #[error("** invalid command **")]
    InvalidCommand,
}
