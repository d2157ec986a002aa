//! A typed, file-backed, memory-mapped growable vector.
//!
//! `Array<T>` is the leaf layer of the index: a single file holding a packed
//! little-endian run of fixed-size elements, grown in [`Array::<T>::CHUNK`]-byte
//! increments and mapped into memory for O(1) indexed reads and writes. Logical
//! length is tracked separately from the mmap'd capacity and is only made durable
//! (by truncating the file to the exact byte length) on [`Array::close`].
//!
//! Clients must never retain a reference derived from [`Array::get`] across a call
//! to [`Array::append`] or [`Array::extend`]: a resize closes the current mapping
//! and re-establishes a new one, which invalidates any earlier mapping. `get`/`set`
//! return and accept owned scalar values rather than slices into the mapping, so
//! this can't happen by accident.

use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use snafu::ResultExt;

use crate::error::{IoSnafu, OutOfRangeSnafu, Result};

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width scalar types an [`Array`] can store.
///
/// Sealed: the only implementors are the scalar types this design supports, so
/// `Array<T>` simply won't compile for anything else. The `Unsupported` error kind
/// in [`crate::Error`] exists only for parity with other language bindings of this
/// design, which enforce the same constraint at runtime instead of compile time.
pub trait Scalar: Copy + sealed::Sealed {
    /// Encoded width in bytes.
    const SIZE: usize;

    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_scalar {
    ($t:ty) => {
        impl sealed::Sealed for $t {}
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_le_bytes(buf)
            }

            fn write_le(self, bytes: &mut [u8]) {
                bytes[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_scalar!(u8);
impl_scalar!(u16);
impl_scalar!(u32);
impl_scalar!(u64);
impl_scalar!(u128);
impl_scalar!(i8);
impl_scalar!(i16);
impl_scalar!(i32);
impl_scalar!(i64);
impl_scalar!(i128);
impl_scalar!(f32);
impl_scalar!(f64);

/// A typed, file-backed, memory-mapped growable vector.
///
/// See the module documentation for the lifecycle contract.
#[derive(Debug)]
pub struct Array<T: Scalar> {
    path: PathBuf,
    file: File,
    mmap: Option<MmapMut>,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Scalar> Array<T> {
    /// Growth granularity, in bytes, for the backing file.
    pub const CHUNK: usize = 4096;

    /// Opens `path`, creating it (truncated to empty) if `create` is true or the
    /// file doesn't yet exist; otherwise reopens an existing array, deriving its
    /// logical length from the file's current size.
    pub fn open(path: impl AsRef<Path>, create: bool) -> Result<Self> {
        Self::open_with_capacity(path, create, 0)
    }

    /// Like [`Array::open`], but when creating a new array, pre-allocates capacity
    /// for at least `initial_elements` (rounded up to a [`Array::<T>::CHUNK`]
    /// multiple).
    pub fn open_with_capacity(
        path: impl AsRef<Path>,
        create: bool,
        initial_elements: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .context(IoSnafu { path: path.clone() })?;

        let mut array = Array {
            path,
            file,
            mmap: None,
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        };

        if create || !existed {
            array.file.set_len(0).context(IoSnafu {
                path: array.path.clone(),
            })?;
            array.allocate_capacity(initial_elements)?;
        } else {
            let file_size = array
                .file
                .metadata()
                .context(IoSnafu {
                    path: array.path.clone(),
                })?
                .len();
            array.len = (file_size / T::SIZE as u64) as usize;
            let min_elements = ((file_size + T::SIZE as u64 - 1) / T::SIZE as u64) as usize;
            array.allocate_capacity(min_elements.max(array.len))?;
            trace!(path = %array.path.display(), len = array.len, "reopened array");
        }

        Ok(array)
    }

    /// Current logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn resolve_index(&self, index: i64) -> Result<usize> {
        let resolved = if index < 0 {
            index + self.len as i64
        } else {
            index
        };
        if resolved < 0 || resolved as usize >= self.len {
            return OutOfRangeSnafu {
                index,
                len: self.len,
            }
            .fail();
        }
        Ok(resolved as usize)
    }

    /// Reads element `index`, applying negative-index wraparound.
    pub fn get(&self, index: i64) -> Result<T> {
        let i = self.resolve_index(index)?;
        let mmap = self.mmap.as_ref().expect("non-empty array always has a mapping");
        let offset = i * T::SIZE;
        Ok(T::read_le(&mmap[offset..offset + T::SIZE]))
    }

    /// Writes element `index`, applying negative-index wraparound.
    pub fn set(&mut self, index: i64, value: T) -> Result<()> {
        let i = self.resolve_index(index)?;
        let mmap = self.mmap.as_mut().expect("non-empty array always has a mapping");
        let offset = i * T::SIZE;
        value.write_le(&mut mmap[offset..offset + T::SIZE]);
        Ok(())
    }

    /// Appends `value`, growing the backing file first if the array is at capacity.
    pub fn append(&mut self, value: T) -> Result<()> {
        if self.len == self.capacity {
            self.allocate_capacity(self.len + 1)?;
        }
        let offset = self.len * T::SIZE;
        let mmap = self.mmap.as_mut().expect("capacity was just ensured");
        value.write_le(&mut mmap[offset..offset + T::SIZE]);
        self.len += 1;
        Ok(())
    }

    /// Appends every value from `iter`, growing the backing file once for the
    /// whole batch rather than once per element.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = T>) -> Result<()> {
        let values: Vec<T> = iter.into_iter().collect();
        if self.len + values.len() > self.capacity {
            self.allocate_capacity(self.len + values.len())?;
        }
        for value in values {
            let offset = self.len * T::SIZE;
            let mmap = self.mmap.as_mut().expect("capacity was just ensured");
            value.write_le(&mut mmap[offset..offset + T::SIZE]);
            self.len += 1;
        }
        Ok(())
    }

    /// Pushes the mapping's contents to disk without changing length or capacity.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush().context(IoSnafu {
                path: self.path.clone(),
            })?;
        }
        Ok(())
    }

    /// Flushes, drops the mapping, and truncates the file to the exact logical
    /// length. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.mmap = None;
        self.file
            .set_len((self.len * T::SIZE) as u64)
            .context(IoSnafu {
                path: self.path.clone(),
            })?;
        Ok(())
    }

    /// Rounds `min_elements` up to a [`Array::<T>::CHUNK`]-aligned byte capacity,
    /// extends the file to that size if needed, and remaps.
    fn allocate_capacity(&mut self, min_elements: usize) -> Result<()> {
        let bytes_needed = min_elements * T::SIZE;
        let chunks_needed = (bytes_needed + Self::CHUNK - 1) / Self::CHUNK;
        let capacity_bytes = chunks_needed * Self::CHUNK;

        self.mmap = None;
        self.file.set_len(capacity_bytes as u64).context(IoSnafu {
            path: self.path.clone(),
        })?;
        self.capacity = capacity_bytes / T::SIZE;

        if capacity_bytes > 0 {
            // SAFETY: the mapped file is exclusively owned by this `Array` for its
            // lifetime (§5 "Shared-resource policy"); no other process is assumed to
            // write to it concurrently.
            let mmap = unsafe { MmapMut::map_mut(&self.file) }.context(IoSnafu {
                path: self.path.clone(),
            })?;
            self.mmap = Some(mmap);
        }

        Ok(())
    }
}

impl<T: Scalar> Drop for Array<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(path = %self.path.display(), %err, "failed to close array cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn round_trip_append_and_read() {
        let dir = TempDir::new("array").unwrap();
        let path = dir.path().join("values.dat");

        let mut array: Array<u64> = Array::open(&path, true).unwrap();
        for v in 0..10_000u64 {
            array.append(v).unwrap();
        }
        assert_eq!(array.len(), 10_000);
        for v in 0..10_000i64 {
            assert_eq!(array.get(v).unwrap(), v as u64);
        }
        array.close().unwrap();

        let file_len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(file_len, 10_000 * 8);
    }

    #[test]
    fn reopen_preserves_contents() {
        let dir = TempDir::new("array").unwrap();
        let path = dir.path().join("values.dat");

        {
            let mut array: Array<u32> = Array::open(&path, true).unwrap();
            array.extend([1u32, 2, 3, 4, 5]).unwrap();
            array.close().unwrap();
        }

        let array: Array<u32> = Array::open(&path, false).unwrap();
        assert_eq!(array.len(), 5);
        assert_eq!(array.get(0).unwrap(), 1);
        assert_eq!(array.get(-1).unwrap(), 5);
    }

    #[test]
    fn negative_index_wraps() {
        let dir = TempDir::new("array").unwrap();
        let path = dir.path().join("values.dat");
        let mut array: Array<u16> = Array::open(&path, true).unwrap();
        array.extend([10u16, 20, 30]).unwrap();
        assert_eq!(array.get(-1).unwrap(), 30);
        assert_eq!(array.get(-3).unwrap(), 10);
        assert!(array.get(-4).is_err());
        assert!(array.get(3).is_err());
    }

    #[test]
    fn capacity_is_chunk_aligned() {
        let dir = TempDir::new("array").unwrap();
        let path = dir.path().join("values.dat");
        let mut array: Array<u8> = Array::open(&path, true).unwrap();
        for v in 0..100u8 {
            array.append(v).unwrap();
        }
        assert_eq!(array.capacity, Array::<u8>::CHUNK);
        array.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 100);
    }

    #[test]
    fn empty_array_has_no_mapping() {
        let dir = TempDir::new("array").unwrap();
        let path = dir.path().join("values.dat");
        let array: Array<u64> = Array::open(&path, true).unwrap();
        assert_eq!(array.len(), 0);
        assert!(array.mmap.is_none());
    }
}
