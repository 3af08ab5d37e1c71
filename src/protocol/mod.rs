//! Bridge wire protocol
//!
//! Newline-delimited JSON requests in, completions out.

pub mod commands;
pub mod handlers;
pub mod parser;
pub mod responses;

pub use commands::{Command, Request, parse_command};
pub use handlers::{handle_command, process_line};
pub use parser::{RejectedRequest, parse_request};
