//! # splot-sae — Splot Automation Expressions
//!
//! A tiny postfix stack language used throughout Splot wherever a value
//! needs a programmable transform: pairing forward/reverse conversions,
//! rule conditions, and timer schedules/predicates. A program is a
//! whitespace-separated token stream compiled once into a flat opcode
//! vector and then run repeatedly against an evaluation [`Context`].
//!
//! ```
//! use splot_sae::{compile, run, Context};
//! use splot_core::{RtcSnapshot, Value};
//!
//! let program = compile("2 ^").unwrap();
//! let rtc = RtcSnapshot {
//!     year: 2026, day_of_week: 0, day_of_month: 0, time_of_day: 0.0,
//!     month_of_year: 0, aligned_week_of_month: 0, week_of_month: 0, week_of_year: 0,
//! };
//! let ctx = Context::new(Value::Float(0.0), Value::Float(0.0), 0.0, rtc);
//! let out = run(&program, Value::Float(3.0), &ctx).unwrap();
//! assert_eq!(out.as_f64().unwrap(), 9.0);
//! ```

#![deny(missing_docs)]

pub mod compiler;
pub mod context;
pub mod error;
pub mod lexer;
pub mod vm;

pub use compiler::compile;
pub use context::Context;
pub use error::SaeError;
pub use vm::{run, Opcode};
