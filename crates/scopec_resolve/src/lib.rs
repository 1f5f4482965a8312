//! Lexical scope resolution for the C subset
//!
//! Resolution walks a parsed `Program` once, in source order, and:
//! 1. Tracks nested scopes (file, parameter lists, bodies, blocks, loop headers, switches)
//! 2. Validates every declaration against redeclaration and linkage rules
//! 3. Renames block-scope variables and parameters to program-unique names
//! 4. Checks `default` labels per switch and goto labels per function
//!
//! The first violation stops resolution.

mod error;
mod labels;
mod names;
mod resolve;
pub mod scope;

pub use error::{ResolveError, ResolveErrorKind};
pub use resolve::{Binding, ResolvedProgram, Resolver};
pub use scope::{DeclKind, Linkage, ScopeId, ScopeKind};
