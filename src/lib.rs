//! Compiler and stepping interpreter for NMF narrative scripts.
//!
//! A script is parsed into a flat [`Program`] whose branches carry resolved
//! instruction indices. A [`Runtime`] walks it one [`Command`] at a time; the
//! host decides when each command reaches its [`View`] and when to step again.
//!
//! ```no_run
//! use std::{cell::RefCell, rc::Rc};
//! # fn host<V: nmfe::View>(view: V) -> Result<(), nmfe::NmfeError> {
//! let view = Rc::new(RefCell::new(view));
//! let mut runtime = nmfe::Runtime::new(Rc::clone(&view));
//! runtime.read_file("scenes/intro.scn")?;
//! while let Ok(command) = runtime.step() {
//!     command.execute()?;
//!     if command.choices().is_some() {
//!         runtime.select(1)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod bytecode;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod flags;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod token;
pub mod view;

pub use bytecode::{Condition, Instruction, Program};
pub use command::{Command, Effect};
pub use context::{AmbientState, ContextSnapshot, ContextStack};
pub use error::{NmfeError, RuntimeError, SyntaxError};
pub use flags::{FlagStore, Value};
pub use parser::compile;
pub use runtime::{Runtime, ScriptSource, CHOICE_FLAG};
pub use view::{View, ViewHandle};
