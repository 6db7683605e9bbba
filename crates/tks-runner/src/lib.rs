#![warn(missing_docs)]
//! `tks-runner` - sequential execution of TKS scripts.
//!
//! [`ExecutionEngine`] extracts the command lines of a [`SharedEditor`](tks_core::SharedEditor)'s
//! script, locks the editor and dispatches the lines one by one to a [`DeviceCommander`],
//! highlighting progress in the active view. The first failure stops the run.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tks_core::{BufferOptions, DualModeEditor};
//! use tks_lang::LanguageConfig;
//! use tks_runner::{EngineOptions, ExecutionContext, ExecutionEngine, ProcessCommander};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let editor = DualModeEditor::open("login.tks", BufferOptions::default(), Arc::new(LanguageConfig::tks()))
//!     .await?
//!     .into_shared();
//! let engine = ExecutionEngine::new(Arc::new(ProcessCommander::default()), EngineOptions::default());
//! let outcome = engine
//!     .run(&editor, &ExecutionContext::new("emulator-5554", "/work/project"))
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod engine;
mod error;
pub mod observer;

pub use device::{DeviceCommander, DispatchResult, ProcessCommander, ProcessCommanderConfig};
pub use engine::{
    CancelHandle, EngineOptions, ExecutionContext, ExecutionEngine, RunOutcome, RunState,
};
pub use error::{DeviceError, PreconditionError, RunError};
pub use observer::{Notice, RunObserver, TracingObserver};
