#![warn(missing_docs)]
//! TKS Core - headless engine for TKS mobile-UI test scripts
//!
//! # Overview
//!
//! `tks-core` owns the text of a `.tks` script and everything derived from it: tokens, parsed
//! commands, a block (form) projection and a plain-text projection. It does not render anything;
//! hosts draw the [`TextView`] / [`BlockView`] state and route user edits back through
//! [`DualModeEditor`].
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Dual-Mode Editor (text view / block view)  │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Block Projector (edits as text splices)    │  ← Structural Edits
//! ├─────────────────────────────────────────────┤
//! │  Parser / Serializer + Tokenizer            │  ← Language
//! ├─────────────────────────────────────────────┤
//! │  Source Buffer (debounced save)             │  ← Single Source of Truth
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tks_core::{BufferOptions, Command, DualModeEditor, SourceBuffer};
//! use tks_lang::{Keyword, LanguageConfig};
//!
//! let buffer = SourceBuffer::new("login.tks", "步骤:\n启动 [com.example.app, .MainActivity]\n", BufferOptions::default());
//! let mut editor = DualModeEditor::new(buffer, Arc::new(LanguageConfig::tks()));
//!
//! editor.append_command(&Command::from_raw(Keyword::Click, ["{登录按钮}&resourceId"])).unwrap();
//! assert_eq!(editor.block_view().blocks().len(), 2);
//! assert!(editor.content().ends_with("点击 [{登录按钮}&resourceId]\n"));
//! ```
//!
//! # Module Description
//!
//! - [`token`] - Total line tokenizer
//! - [`command`] - Command / parameter model and canonical serialization
//! - [`parser`] - Steps-section parser, header parser, shared command-line rule
//! - [`buffer`] - Source buffer with debounced persistence
//! - [`projector`] - Block projector and drag placement
//! - [`view`] - Text and block views
//! - [`editor`] - Dual-mode editor façade

pub mod buffer;
pub mod command;
pub mod editor;
mod error;
pub mod intervals;
pub mod line_ending;
pub mod line_index;
pub mod parser;
pub mod processing;
pub mod projector;
pub mod token;
pub mod view;

pub use buffer::{BufferEvent, BufferEventCallback, BufferOptions, SourceBuffer};
pub use command::{Command, Locator, ParamValue, Parameter, command_to_line, split_parameters};
pub use editor::{DualModeEditor, EditorMode, SharedEditor, StructuralEditGuard, lock_editor};
pub use error::{BufferError, EditError};
pub use intervals::{Interval, StyleId, StyleLayerId};
pub use line_ending::LineEnding;
pub use line_index::LineIndex;
pub use parser::{CommandLine, LineClass, ScriptHeader, ScriptParser};
pub use processing::{DocumentProcessor, ProcessingEdit};
pub use projector::{BlockExtent, Projector, nearest_insertion_index};
pub use token::{Token, TokenKind, Tokenizer};
pub use view::{
    Block, BlockField, BlockView, LineMark, MarkKind, MarkOutcome, ScriptView, TextView,
};
