//! JSON envelopes exchanged with skill modules over stdin/stdout.

pub mod request;
pub mod response;

pub use request::{InjectOptions, RequestEnvelope, SpecFormat, Syntax};
pub use response::{effective_exit_code, ResponseEnvelope, UnmatchedStep, UnmatchedTest};
