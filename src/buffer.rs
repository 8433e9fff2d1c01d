/// Growable text buffer with fallible formatted appends
///
/// Every SQL statement, the text report and the run-log lines are assembled
/// through this type. Output is never truncated: before each write the
/// required length is measured, and if it does not fit the backing `String`
/// is grown by exactly that amount with `try_reserve_exact`, so an allocation
/// failure surfaces as [`BufferError::Alloc`] instead of an abort.
use std::fmt::{self, Write};

use thiserror::Error;

/// Initial capacity guess for a fresh buffer
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("failed to grow text buffer by {requested} bytes")]
    Alloc { requested: usize },

    #[error("formatting error while rendering text")]
    Format,
}

/// Counts the bytes a formatting run would produce without storing them.
struct LengthProbe(usize);

impl Write for LengthProbe {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

fn required_len(args: fmt::Arguments<'_>) -> Result<usize, BufferError> {
    let mut probe = LengthProbe(0);
    probe.write_fmt(args).map_err(|_| BufferError::Format)?;
    Ok(probe.0)
}

#[derive(Debug, Default)]
pub struct DynamicBuffer {
    buf: String,
}

impl DynamicBuffer {
    pub fn new() -> Result<Self, BufferError> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        let mut buf = String::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| BufferError::Alloc {
                requested: capacity,
            })?;
        Ok(DynamicBuffer { buf })
    }

    /// Append formatted text, growing the allocation to fit.
    pub fn append(&mut self, args: fmt::Arguments<'_>) -> Result<(), BufferError> {
        let needed = required_len(args)?;
        if self.buf.len() + needed >= self.buf.capacity() {
            self.buf
                .try_reserve_exact(needed)
                .map_err(|_| BufferError::Alloc { requested: needed })?;
        }
        self.buf.write_fmt(args).map_err(|_| BufferError::Format)
    }

    pub fn push_str(&mut self, s: &str) -> Result<(), BufferError> {
        self.append(format_args!("{}", s))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Hand the finished text to the caller.
    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Render `args` into a freshly allocated string.
pub fn render(args: fmt::Arguments<'_>) -> Result<String, BufferError> {
    let mut buffer = DynamicBuffer::new()?;
    buffer.append(args)?;
    Ok(buffer.into_string())
}

/// `format!` with allocation failures reported as [`BufferError`].
#[macro_export]
macro_rules! render {
    ($($arg:tt)*) => {
        $crate::buffer::render(format_args!($($arg)*))
    };
}

/// `write!` into a [`DynamicBuffer`].
#[macro_export]
macro_rules! append {
    ($buf:expr, $($arg:tt)*) => {
        $buf.append(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_never_truncates_long_values() {
        let long = "x".repeat(10_000);
        let out = render(format_args!("value='{}';", long)).unwrap();
        assert_eq!(out.len(), 10_000 + "value='';".len());
        assert!(out.starts_with("value='xxx"));
        assert!(out.ends_with("xxx';"));
    }

    #[test]
    fn append_grows_past_initial_capacity() {
        let mut buffer = DynamicBuffer::with_capacity(4).unwrap();
        for i in 0..100 {
            buffer.append(format_args!("{:03},", i)).unwrap();
        }
        assert_eq!(buffer.len(), 400);
        assert!(buffer.capacity() >= 400);
        assert!(buffer.as_str().ends_with("098,099,"));
    }

    #[test]
    fn render_macro_formats_like_format() {
        let out = crate::render!("{:.1} {:02}:{:02}", 21.34, 3, 5).unwrap();
        assert_eq!(out, "21.3 03:05");
    }

    struct Failing;

    impl fmt::Display for Failing {
        fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn formatting_failure_is_distinguishable() {
        let err = render(format_args!("{}", Failing)).unwrap_err();
        assert!(matches!(err, BufferError::Format));
    }
}
