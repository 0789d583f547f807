use std::io::{self, Write};

/// HTTP success status sent with a delivered archive.
pub const STATUS_OK: u16 = 200;

/// Destination for a finished archive.
///
/// `start` is called exactly once, before any bytes are written.
pub trait DeliverySink: Write {
    fn start(&mut self, media_type: &str, status: u16) -> io::Result<()>;
}

/// Collects the delivery in memory.
#[derive(Debug, Default)]
pub struct BufferedSink {
    pub media_type: Option<String>,
    pub status: Option<u16>,
    pub body: Vec<u8>,
}

impl Write for BufferedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DeliverySink for BufferedSink {
    fn start(&mut self, media_type: &str, status: u16) -> io::Result<()> {
        self.media_type = Some(media_type.to_string());
        self.status = Some(status);
        Ok(())
    }
}

/// Forwards the delivery to any writer, discarding the status line.
#[derive(Debug)]
pub struct StreamSink<W> {
    inner: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for StreamSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> DeliverySink for StreamSink<W> {
    fn start(&mut self, media_type: &str, status: u16) -> io::Result<()> {
        tracing::debug!(media_type, status, "starting delivery");
        Ok(())
    }
}
