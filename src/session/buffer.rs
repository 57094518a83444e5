/// Inbound byte buffer. Refilled in whole chunks from the transport and
/// drained one byte at a time through the decoder. Bytes already consumed
/// are never revisited; a refill may only happen once the buffer is empty.
#[derive(Debug)]
pub struct RecvBuffer {
    data: Box<[u8]>,
    len: usize,
    pos: usize,
}

impl RecvBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            len: 0,
            pos: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.len
    }

    /// Pop the next unconsumed byte, if any.
    pub fn next(&mut self) -> Option<u8> {
        if self.pos < self.len {
            let byte = self.data[self.pos];
            self.pos += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// Full capacity slice for the transport to receive into.
    pub fn space(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Record a refill of `count` bytes at the front of the buffer.
    pub fn commit(&mut self, count: usize) {
        assert!(count <= self.data.len(), "refill larger than buffer");
        self.len = count;
        self.pos = 0;
    }
}

/// Outbound staging buffer. Filled one byte at a time by the encoder and
/// flushed to the transport as a single chunk.
#[derive(Debug)]
pub struct SendBuffer {
    data: Box<[u8]>,
    used: usize,
}

impl SendBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            used: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used >= self.data.len()
    }

    /// Append one byte. The caller must flush before pushing into a full
    /// buffer.
    pub fn push(&mut self, byte: u8) {
        assert!(self.used < self.data.len(), "send buffer overflow");
        self.data[self.used] = byte;
        self.used += 1;
    }

    /// The staged bytes, oldest first.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.used]
    }

    pub fn clear(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recv_drains_in_refill_order() {
        let mut buf = RecvBuffer::new(8);
        assert!(buf.is_empty());
        assert_eq!(buf.next(), None);

        buf.space()[..3].copy_from_slice(b"abc");
        buf.commit(3);
        assert!(!buf.is_empty());
        assert_eq!(buf.next(), Some(b'a'));
        assert_eq!(buf.next(), Some(b'b'));
        assert_eq!(buf.next(), Some(b'c'));
        assert_eq!(buf.next(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn recv_commit_restarts_at_front() {
        let mut buf = RecvBuffer::new(4);
        buf.space()[..2].copy_from_slice(b"xy");
        buf.commit(2);
        assert_eq!(buf.next(), Some(b'x'));
        assert_eq!(buf.next(), Some(b'y'));

        buf.space()[..1].copy_from_slice(b"z");
        buf.commit(1);
        assert_eq!(buf.next(), Some(b'z'));
        assert_eq!(buf.next(), None);
    }

    #[test]
    fn send_fills_then_reports_full() {
        let mut buf = SendBuffer::new(2);
        assert!(buf.is_empty());
        buf.push(b'h');
        assert!(!buf.is_empty());
        assert!(!buf.is_full());
        buf.push(b'i');
        assert!(buf.is_full());
        assert_eq!(buf.filled(), b"hi");

        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.filled(), b"");
    }

    #[test]
    #[should_panic(expected = "send buffer overflow")]
    fn send_push_past_capacity_panics() {
        let mut buf = SendBuffer::new(1);
        buf.push(b'a');
        buf.push(b'b');
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut recv = RecvBuffer::new(0);
        assert_eq!(recv.space().len(), 1);
        let mut send = SendBuffer::new(0);
        send.push(b'!');
        assert!(send.is_full());
    }
}
