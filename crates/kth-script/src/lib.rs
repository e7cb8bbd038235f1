/// Knuth domain - Script parsing and the consensus script machine.
///
/// Provides the script opcode table, parsed operations, the [`Script`] type
/// and the [`machine`] module: programs, the interpreter driver, rule-fork
/// capabilities, VM-limits metrics and input verification.

pub mod machine;
pub mod opcodes;
pub mod operation;
pub mod script;

mod error;
pub use error::ScriptError;
pub use operation::Operation;
pub use script::Script;
