//! A structured, attribute-rich logging core for long-running server
//! processes.
//!
//! This crate provides the pieces a configuration layer, CLI, or embedding
//! application composes into a working logger: an attribute data model
//! (`attribute`), an immutable-after-activation record (`record`), a
//! composable logger (`logger`) backed by thread-scoped attribute frames
//! (`scope`), pluggable formatters (`format`) and sinks (`sink`), an async
//! sink wrapper for destinations that must not block the caller, a
//! compile-once message-pattern front-end (`facade`), and a trait boundary
//! (`config`) for consuming an external configuration tree. Nothing here
//! reads a config file, registers a CLI flag, or owns process-wide state;
//! those are left to the embedding application.
//!
//! # Example
//!
//! ```
//! use logly_core::format::StringFormatterBuilder;
//! use logly_core::handler::Handler;
//! use logly_core::logger::{Logger, RootLogger};
//! use logly_core::sink::ConsoleSink;
//!
//! let formatter = Box::new(StringFormatterBuilder::new("{timestamp} {severity} {message}").build().unwrap());
//! let handler = Handler::new(formatter, vec![Box::new(ConsoleSink::stdout())]).unwrap();
//!
//! let logger = RootLogger::new();
//! logger.add_handler(handler);
//! logger.log(1, "service started");
//! ```

pub mod attribute;
pub mod config;
pub mod datetime;
pub mod error;
pub mod facade;
pub mod format;
pub mod handler;
pub mod logger;
pub mod record;
pub mod scope;
pub mod sink;

pub use error::{LoglyError, Result};
pub use facade::Facade;
pub use handler::Handler;
pub use logger::{Logger, RootLogger, WrapperLogger};
pub use record::{Record, Timestamp};
pub use scope::{ScopeManager, ScopedFrame};
