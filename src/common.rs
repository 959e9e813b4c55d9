// Licensed under the Apache-2.0 license

//! Crate-wide helpers shared by the peripheral drivers.
//!
//! Drivers take a [`Logger`] as a type parameter so that firmware can route
//! diagnostics to a UART while tests and size-constrained builds compile the
//! calls away with [`NoOpLogger`].

use core::fmt::Arguments;

/// Sink for driver diagnostics.
pub trait Logger {
    /// Record a debug-level message.
    fn debug(&mut self, args: Arguments<'_>);

    /// Record an error-level message.
    fn error(&mut self, args: Arguments<'_>);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn debug(&mut self, _args: Arguments<'_>) {}

    #[inline]
    fn error(&mut self, _args: Arguments<'_>) {}
}

/// Logger writing one CRLF-terminated line per record to an `embedded-io` sink.
///
/// Write failures are dropped: a broken console must never take the bus down.
pub struct UartLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> UartLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Give the underlying writer back.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, args: Arguments<'_>) {
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_fmt(args);
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<W: embedded_io::Write> Logger for UartLogger<W> {
    fn debug(&mut self, args: Arguments<'_>) {
        self.line("[D] ", args);
    }

    fn error(&mut self, args: Arguments<'_>) {
        self.line("[E] ", args);
    }
}

impl<L: Logger + ?Sized> Logger for &mut L {
    fn debug(&mut self, args: Arguments<'_>) {
        (**self).debug(args);
    }

    fn error(&mut self, args: Arguments<'_>) {
        (**self).error(args);
    }
}
