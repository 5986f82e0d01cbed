use crate::core::error::BufferError;

/// Growable in-memory sink for the bytes of one chunk.
///
/// Written by exactly one transfer; never shrinks. Growth goes through
/// `try_reserve` so an allocation failure surfaces as an error instead of an abort.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkBuffer {
    data: Vec<u8>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a received fragment. Returns the number of bytes accepted.
    pub fn append(&mut self, fragment: &[u8]) -> Result<usize, BufferError> {
        self.grow(fragment.len())?;
        self.data.extend_from_slice(fragment);
        Ok(fragment.len())
    }

    fn grow(&mut self, additional: usize) -> Result<(), BufferError> {
        self.data
            .try_reserve(additional)
            .map_err(|_| BufferError::OutOfMemory { requested: additional })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let buf = ChunkBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.as_slice(), b"");
    }

    #[test]
    fn test_append_accumulates_in_call_order() {
        let mut buf = ChunkBuffer::new();
        assert_eq!(buf.append(b"foo").unwrap(), 3);
        assert_eq!(buf.append(b"").unwrap(), 0);
        assert_eq!(buf.append(b"barbaz").unwrap(), 6);
        assert_eq!(buf.len(), 9);
        assert_eq!(buf.into_inner(), b"foobarbaz".to_vec());
    }

    #[test]
    fn test_failed_growth_reports_out_of_memory() {
        let mut buf = ChunkBuffer::new();
        buf.append(b"abc").unwrap();
        // more than isize::MAX bytes can never be reserved
        assert_eq!(buf.grow(usize::MAX), Err(BufferError::OutOfMemory { requested: usize::MAX }));
        assert_eq!(buf.as_slice(), b"abc");
        assert_eq!(buf.append(b"d").unwrap(), 1);
        assert_eq!(buf.as_slice(), b"abcd");
    }

    mod property_tests {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_length_is_sum_of_fragments(fragments in vec(vec(any::<u8>(), 0..512), 0..32)) {
                let mut buf = ChunkBuffer::new();
                let mut accepted = 0usize;
                for f in &fragments {
                    accepted += buf.append(f)?;
                }

                let expected: Vec<u8> = fragments.concat();
                prop_assert_eq!(accepted, expected.len());
                prop_assert_eq!(buf.len(), expected.len());
                prop_assert_eq!(buf.as_slice(), expected.as_slice());
            }
        }
    }
}
