//! Query instrumentation: the command interceptor and the background writer
//! that persists what it flags.

pub mod interceptor;
pub mod writer;

pub use interceptor::{CommandInterceptor, CompletedCommand, QueryPolicy};
pub use writer::{BackgroundLogWriter, WriterStats};
