//! Fixed byte pattern at a fixed offset.

use super::{Signature, SignatureInfo};
use crate::error::{ProbeError, ProbeResult};
use crate::stream::SniffableStream;

/// Matches when the bytes at `offset` equal `content`.
#[derive(Debug, Clone)]
pub struct ByteSignature {
    info: SignatureInfo,
    content: Vec<u8>,
    offset: usize,
}

impl ByteSignature {
    pub fn new(info: SignatureInfo, content: impl Into<Vec<u8>>, offset: usize) -> Self {
        Self {
            info,
            content: content.into(),
            offset,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Signature for ByteSignature {
    fn info(&self) -> &SignatureInfo {
        &self.info
    }

    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        match stream.read_at(self.offset, self.content.len()) {
            Ok(bytes) => Ok(bytes == self.content.as_slice()),
            Err(ProbeError::TruncatedInput { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::mime::MimeType;
    use crate::resource::MemoryResource;
    use crate::stream::SniffOptions;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn zip_magic_matches_iff_prefix_equal(
            head in proptest::collection::vec(any::<u8>(), 4),
            tail in proptest::collection::vec(any::<u8>(), 0..64)
        ) {
            let sig = ByteSignature::new(
                SignatureInfo::new("zip-magic", MimeType::zip()),
                b"PK\x03\x04".to_vec(),
                0,
            );
            let mut data = head.clone();
            data.extend_from_slice(&tail);
            let resource = MemoryResource::new("mem", data);
            let mut stream = SniffableStream::open(&resource, SniffOptions::default()).unwrap();
            prop_assert_eq!(sig.probe(&mut stream).unwrap(), head == b"PK\x03\x04");
        }
    }
}
