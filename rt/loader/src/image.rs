//! Flash/file layer contract

use crate::LoadError;

/// Random-access reader over an app binary in flash or on the filesystem
pub trait ImageSource {
    /// Total image length in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `buf.len()` bytes starting at `offset`; returns the count
    /// read, zero at the end of the image
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize;

    /// Fill `buf` completely or fail with `ShortRead`
    fn read_exact_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), LoadError> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.read_at(offset + filled, &mut buf[filled..]);
            if read == 0 {
                return Err(LoadError::ShortRead {
                    offset,
                    wanted: buf.len(),
                    got: filled,
                });
            }
            filled += read;
        }
        Ok(())
    }
}

impl ImageSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let Some(rest) = self.get(offset..) else {
            return 0;
        };
        let count = rest.len().min(buf.len());
        buf[..count].copy_from_slice(&rest[..count]);
        count
    }
}

impl<T: ImageSource + ?Sized> ImageSource for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        (**self).read_at(offset, buf)
    }
}

#[cfg(feature = "std")]
impl ImageSource for std::vec::Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        self.as_slice().read_at(offset, buf)
    }
}
