mod channel;
mod sink;

pub use channel::Console;
pub use sink::{format_record, ResultSink};
