//! The storage capability the stream and transforms depend on.
//!
//! Anything that is `Read + Seek` and can report its length is a valid
//! ciphertext source: local files, in-memory buffers, or a caller's own
//! adapter over remote storage. Writing goes through plain [`std::io::Write`].

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};

/// A readable, seekable byte store with a known length.
pub trait ByteSource: Read + Seek {
    /// Total length in bytes.
    ///
    /// The default seeks to the end and back, leaving the position unchanged.
    fn size(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if current != end {
            self.seek(SeekFrom::Start(current))?;
        }
        Ok(end)
    }

    /// Current position.
    fn pos(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Release the capability. Called once when the owning stream closes.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteSource for File {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64)
    }
}

impl<R: Read + Seek> ByteSource for BufReader<R> {}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn size(&mut self) -> io::Result<u64> {
        (**self).size()
    }

    fn pos(&mut self) -> io::Result<u64> {
        (**self).pos()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn size(&mut self) -> io::Result<u64> {
        (**self).size()
    }

    fn pos(&mut self) -> io::Result<u64> {
        (**self).pos()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}
