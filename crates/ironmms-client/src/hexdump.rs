use std::io::{self, Read, Write};

/// Read/Write adapter that hex-dumps everything crossing the socket.
///
/// Active under `--debug`; dump lines go to the log at debug level.
pub struct Sniffer<S> {
    inner: S,
    enabled: bool,
}

impl<S> Sniffer<S> {
    pub fn new(inner: S, enabled: bool) -> Self {
        Self { inner, enabled }
    }
}

impl<S: Read> Read for Sniffer<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.inner.read(buf)?;

        if self.enabled && len > 0 {
            debug!("recv {}", hexdump(&buf[..len]));
        }

        Ok(len)
    }
}

impl<S: Write> Write for Sniffer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.inner.write(buf)?;

        if self.enabled && len > 0 {
            debug!("send {}", hexdump(&buf[..len]));
        }

        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);

    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }

    out
}
