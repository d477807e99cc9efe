//! The template compiler.
//!
//! A template's literal fragments are analysed once per call site: the markup is parsed into a detached node, and every
//! dynamic slot becomes an instruction that the engine replays against a clone of that node. See [`markup`] for the
//! string passes and [`template`] for slot allocation.

use crate::dom::DomError;
use thiserror::Error;

pub(crate) mod markup;
pub(crate) mod template;

pub(crate) use template::{AfterNode, ArgOp, CompiledTemplate, ContentSlot, InsertionPoints};
pub use template::{instantiate, try_instantiate, TemplateSite};

#[derive(Debug, Error)]
pub enum CompileError {
	#[error("template expects {expected} argument(s) but was given {found}")]
	ArgumentCount { expected: usize, found: usize },
	#[error("template markup does not match its parsed structure: {0}")]
	Structure(String),
	#[error(transparent)]
	Dom(#[from] DomError),
}
