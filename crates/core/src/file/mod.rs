//! File inspection and file type rules.
//!
//! - [`FileDescriptor`]: an inspected file or directory with its detected MIME type
//! - [`FileHandlerDefinition`]: accept/reject rules used by presets and adapters

mod definition;
mod descriptor;
pub(crate) mod naming;
mod sniff;

pub use definition::{Criterion, FileHandlerDefinition, FileHandlerDefinitionBuilder};
pub use descriptor::{FileDescriptor, FileKind};
pub use sniff::BINARY_CHARSET;
