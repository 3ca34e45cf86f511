//! Formatters: turn an activated [`crate::record::Record`] into bytes a
//! sink can write.

mod json;
mod template;
mod tskv;

pub use json::{JsonFormatter, JsonFormatterBuilder};
pub use template::{StringFormatter, StringFormatterBuilder};
pub use tskv::{TskvFormatter, TskvFormatterBuilder};

use crate::error::Result;
use crate::record::Record;

/// Anything that can render a record to a byte-oriented buffer.
///
/// Implemented by the three built-in formatters; a [`crate::handler::Handler`]
/// owns exactly one.
pub trait Formatter: Send + Sync {
    /// Renders `record`, appending to `out`.
    fn format(&self, record: &Record<'_>, out: &mut String) -> Result<()>;
}

impl Formatter for StringFormatter {
    fn format(&self, record: &Record<'_>, out: &mut String) -> Result<()> {
        StringFormatter::format(self, record, out)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record<'_>, out: &mut String) -> Result<()> {
        JsonFormatter::format(self, record, out)
    }
}

impl Formatter for TskvFormatter {
    fn format(&self, record: &Record<'_>, out: &mut String) -> Result<()> {
        TskvFormatter::format(self, record, out)
    }
}
