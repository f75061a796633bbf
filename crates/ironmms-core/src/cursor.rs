//! Forward-only octet cursors.
//!
//! Everything on an ISO transport wire is network byte order, so the
//! multi-octet accessors are big-endian only. The cursors do not carry
//! failure state: callers bound an access with [`ensure_octets!`] first,
//! and running past the end of a buffer is a programming error that
//! panics.
//!
//! [`ensure_octets!`]: crate::ensure_octets

/// Reads octets off a borrowed slice, front to back.
///
/// The unread tail keeps the lifetime of the underlying buffer, so
/// decoded elements can borrow from it.
#[derive(Clone, Debug)]
pub struct OctetReader<'a> {
    unread: &'a [u8],
    consumed: usize,
}

impl<'a> OctetReader<'a> {
    #[inline]
    pub const fn new(octets: &'a [u8]) -> Self {
        Self {
            unread: octets,
            consumed: 0,
        }
    }

    /// Octets left to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.unread.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.unread.is_empty()
    }

    /// Octets consumed so far.
    #[inline]
    pub const fn position(&self) -> usize {
        self.consumed
    }

    /// The unread tail, without consuming it.
    #[inline]
    pub const fn rest(&self) -> &'a [u8] {
        self.unread
    }

    /// Consumes and returns the next `n` octets.
    #[inline]
    #[track_caller]
    pub fn take_octets(&mut self, n: usize) -> &'a [u8] {
        let (taken, unread) = self.unread.split_at(n);
        self.unread = unread;
        self.consumed += n;
        taken
    }

    /// Consumes everything left.
    #[inline]
    pub fn take_rest(&mut self) -> &'a [u8] {
        self.take_octets(self.remaining())
    }

    #[inline]
    #[track_caller]
    pub fn take_u8(&mut self) -> u8 {
        self.take_octets(1)[0]
    }

    /// Big-endian `u16`.
    #[inline]
    #[track_caller]
    pub fn take_u16(&mut self) -> u16 {
        let octets = self.take_octets(2);
        u16::from_be_bytes([octets[0], octets[1]])
    }

    /// The next `n` octets, without consuming them.
    #[inline]
    #[track_caller]
    pub fn peek_octets(&self, n: usize) -> &'a [u8] {
        &self.unread[..n]
    }

    /// Discards the next `n` octets.
    #[inline]
    #[track_caller]
    pub fn skip(&mut self, n: usize) {
        let _ = self.take_octets(n);
    }
}

/// Writes octets into a borrowed mutable slice, front to back.
#[derive(Debug)]
pub struct OctetWriter<'a> {
    dst: &'a mut [u8],
    filled: usize,
}

impl<'a> OctetWriter<'a> {
    #[inline]
    pub fn new(dst: &'a mut [u8]) -> Self {
        Self { dst, filled: 0 }
    }

    /// Room left to write into.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.dst.len() - self.filled
    }

    /// Octets written so far.
    #[inline]
    pub const fn position(&self) -> usize {
        self.filled
    }

    #[inline]
    #[track_caller]
    pub fn put_octets(&mut self, octets: &[u8]) {
        self.dst[self.filled..self.filled + octets.len()].copy_from_slice(octets);
        self.filled += octets.len();
    }

    #[inline]
    #[track_caller]
    pub fn put_u8(&mut self, octet: u8) {
        self.put_octets(&[octet]);
    }

    /// Big-endian `u16`.
    #[inline]
    #[track_caller]
    pub fn put_u16(&mut self, value: u16) {
        self.put_octets(&value.to_be_bytes());
    }
}
