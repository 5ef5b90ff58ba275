//! Replay source for recorded captures and host-side tests

use core::convert::Infallible;

use crate::uart::ByteSource;

/// [`ByteSource`] backed by an in-memory byte slice
///
/// Each call to `read_byte` hands out the next byte until the slice is
/// exhausted, after which it reports "no data" forever.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Create a source over a captured byte stream
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns true once every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl ByteSource for SliceSource<'_> {
    type Error = Infallible;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_source_drains() {
        let mut source = SliceSource::new(&[1, 2]);
        assert_eq!(source.read_byte(), Ok(Some(1)));
        assert_eq!(source.remaining(), &[2]);
        assert_eq!(source.read_byte(), Ok(Some(2)));
        assert!(source.is_exhausted());
        assert_eq!(source.read_byte(), Ok(None));
        assert_eq!(source.read_byte(), Ok(None));
    }

    #[test]
    fn test_mut_ref_is_a_source() {
        fn drain<S: ByteSource>(mut source: S) -> usize {
            let mut n = 0;
            while let Ok(Some(_)) = source.read_byte() {
                n += 1;
            }
            n
        }

        let mut source = SliceSource::new(&[1, 2, 3]);
        assert_eq!(drain(&mut source), 3);
        assert!(source.is_exhausted());
    }
}
