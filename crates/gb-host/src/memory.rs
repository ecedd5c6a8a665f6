//! Linear memory and the host-side views over it
//!
//! The module owns a single growable buffer. The host never holds on to it;
//! it only keeps typed views that remember which buffer generation they were
//! built against:
//! - signed bytes (`View<i8>`)
//! - unsigned bytes (`View<u8>`)
//! - little-endian 32-bit words (`View<i32>`)
//!
//! A growth replaces the buffer and bumps its generation. Any view built
//! before that reports [`HostError::StaleView`] instead of reading the new
//! buffer, and [`MemoryViews`] rebuilds its own set the next time it is asked.

use std::marker::PhantomData;

use crate::error::{HostError, Result};

/// Size of one wasm page in bytes
pub const PAGE_SIZE: usize = 65536;

/// Chunk size used when scanning memory for a byte
const SCAN_CHUNK: usize = 256;

/// A growable, byte-addressable buffer owned by a module instance
pub trait LinearMemory {
    /// Identity of the current backing buffer; changes whenever it is replaced
    fn generation(&self) -> u64;

    /// Current length of the buffer in bytes
    fn byte_length(&self) -> usize;

    /// Copy `dst.len()` bytes starting at `offset` out of the buffer
    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()>;

    /// Copy `src` into the buffer starting at `offset`
    fn write(&mut self, offset: usize, src: &[u8]) -> Result<()>;
}

/// Fail with [`HostError::OutOfBounds`] unless `offset..offset + len` fits
pub fn check_bounds(offset: usize, len: usize, memory_len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= memory_len => Ok(()),
        _ => Err(HostError::OutOfBounds {
            offset,
            len,
            memory_len,
        }),
    }
}

/// Linear memory borrowed from an engine for the duration of one host call
///
/// Wasm memory only ever grows, so the byte length identifies the buffer.
#[derive(Debug)]
pub struct BorrowedMemory<'a> {
    data: &'a mut [u8],
}

impl<'a> BorrowedMemory<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }
}

impl LinearMemory for BorrowedMemory<'_> {
    fn generation(&self) -> u64 {
        self.data.len() as u64
    }

    fn byte_length(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        check_bounds(offset, dst.len(), self.data.len())?;
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        check_bounds(offset, src.len(), self.data.len())?;
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }
}

/// Heap-allocated linear memory with explicit, buffer-replacing growth
///
/// Behaves like a module's memory as seen from the host: growing allocates a
/// fresh buffer, copies the old contents and bumps the generation.
#[derive(Debug, Clone)]
pub struct HeapMemory {
    data: Vec<u8>,
    generation: u64,
}

impl HeapMemory {
    /// Create a memory of `pages` zeroed wasm pages
    pub fn new(pages: usize) -> Self {
        Self::with_len(pages * PAGE_SIZE)
    }

    /// Create a zeroed memory of exactly `len` bytes
    pub fn with_len(len: usize) -> Self {
        Self {
            data: vec![0; len],
            generation: 0,
        }
    }

    /// Grow by `pages` wasm pages, returning the previous size in pages
    pub fn grow(&mut self, pages: usize) -> usize {
        let previous = self.data.len() / PAGE_SIZE;
        let mut data = vec![0; self.data.len() + pages * PAGE_SIZE];
        data[..self.data.len()].copy_from_slice(&self.data);
        self.data = data;
        self.generation += 1;
        previous
    }

    /// Raw contents of the current buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl LinearMemory for HeapMemory {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn byte_length(&self) -> usize {
        self.data.len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        check_bounds(offset, dst.len(), self.data.len())?;
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        check_bounds(offset, src.len(), self.data.len())?;
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }
}

/// Element type of a typed view
pub trait Element: Copy {
    /// Width of one element in bytes
    const SIZE: usize;

    fn from_le_bytes(bytes: &[u8]) -> Self;

    fn write_le_bytes(self, out: &mut [u8]);
}

impl Element for i8 {
    const SIZE: usize = 1;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn write_le_bytes(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

impl Element for u8 {
    const SIZE: usize = 1;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le_bytes(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl Element for i32 {
    const SIZE: usize = 4;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write_le_bytes(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
}

/// A typed window over one generation of linear memory
///
/// Indices are in elements, so word `i` lives at byte `i * 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View<T> {
    generation: u64,
    byte_length: usize,
    _element: PhantomData<T>,
}

impl<T: Element> View<T> {
    /// Build a view over the memory's current buffer
    pub fn bind<M: LinearMemory + ?Sized>(memory: &M) -> Self {
        Self {
            generation: memory.generation(),
            byte_length: memory.byte_length(),
            _element: PhantomData,
        }
    }

    /// Buffer generation this view was built against
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of elements visible through the view
    pub fn len(&self) -> usize {
        self.byte_length / T::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the memory's buffer has been replaced since the view was built
    pub fn is_stale<M: LinearMemory + ?Sized>(&self, memory: &M) -> bool {
        memory.generation() != self.generation
    }

    fn ensure_current<M: LinearMemory + ?Sized>(&self, memory: &M) -> Result<()> {
        if self.is_stale(memory) {
            return Err(HostError::StaleView {
                view: self.generation,
                current: memory.generation(),
            });
        }
        Ok(())
    }

    fn element_offset(&self, index: usize, count: usize) -> Result<usize> {
        let offset = index.checked_mul(T::SIZE).unwrap_or(usize::MAX);
        check_bounds(offset, count * T::SIZE, self.byte_length)?;
        Ok(offset)
    }

    /// Read the element at `index`
    pub fn get<M: LinearMemory + ?Sized>(&self, memory: &M, index: usize) -> Result<T> {
        self.ensure_current(memory)?;
        let offset = self.element_offset(index, 1)?;
        let mut bytes = [0u8; 8];
        memory.read(offset, &mut bytes[..T::SIZE])?;
        Ok(T::from_le_bytes(&bytes[..T::SIZE]))
    }

    /// Write `value` at `index`
    pub fn set<M: LinearMemory + ?Sized>(&self, memory: &mut M, index: usize, value: T) -> Result<()> {
        self.ensure_current(memory)?;
        let offset = self.element_offset(index, 1)?;
        let mut bytes = [0u8; 8];
        value.write_le_bytes(&mut bytes[..T::SIZE]);
        memory.write(offset, &bytes[..T::SIZE])
    }
}

impl View<u8> {
    /// Copy `dst.len()` bytes starting at `offset`
    pub fn read<M: LinearMemory + ?Sized>(&self, memory: &M, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.ensure_current(memory)?;
        check_bounds(offset, dst.len(), self.byte_length)?;
        memory.read(offset, dst)
    }

    /// Copy `src` into memory starting at `offset`
    pub fn write<M: LinearMemory + ?Sized>(&self, memory: &mut M, offset: usize, src: &[u8]) -> Result<()> {
        self.ensure_current(memory)?;
        check_bounds(offset, src.len(), self.byte_length)?;
        memory.write(offset, src)
    }

    /// Offset of the first `needle` at or after `start`, if any
    pub fn position<M: LinearMemory + ?Sized>(
        &self,
        memory: &M,
        start: usize,
        needle: u8,
    ) -> Result<Option<usize>> {
        self.ensure_current(memory)?;
        let mut chunk = [0u8; SCAN_CHUNK];
        let mut cursor = start;
        while cursor < self.byte_length {
            let len = SCAN_CHUNK.min(self.byte_length - cursor);
            memory.read(cursor, &mut chunk[..len])?;
            if let Some(found) = chunk[..len].iter().position(|&b| b == needle) {
                return Ok(Some(cursor + found));
            }
            cursor += len;
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy)]
struct ViewSet {
    signed: View<i8>,
    bytes: View<u8>,
    words: View<i32>,
}

/// The host's current set of views over the module's linear memory
///
/// Accessors compare the stored generation with the memory's and rebuild on
/// mismatch, so callers always get views over the live buffer.
#[derive(Debug, Default)]
pub struct MemoryViews {
    views: Option<ViewSet>,
    rebuilds: u64,
}

impl MemoryViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild all three views against the memory's current buffer
    pub fn rebuild<M: LinearMemory + ?Sized>(&mut self, memory: &M) {
        self.refresh(memory);
    }

    fn refresh<M: LinearMemory + ?Sized>(&mut self, memory: &M) -> ViewSet {
        let set = ViewSet {
            signed: View::bind(memory),
            bytes: View::bind(memory),
            words: View::bind(memory),
        };
        self.views = Some(set);
        self.rebuilds += 1;
        tracing::debug!(
            target: "gb_host::memory",
            generation = memory.generation(),
            byte_length = memory.byte_length(),
            "rebuilt memory views"
        );
        set
    }

    /// Generation the views were last built against
    pub fn generation(&self) -> Option<u64> {
        self.views.map(|set| set.bytes.generation())
    }

    /// How many times the views have been (re)built
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn current<M: LinearMemory + ?Sized>(&mut self, memory: &M) -> ViewSet {
        match self.views {
            Some(set) if !set.bytes.is_stale(memory) => set,
            _ => self.refresh(memory),
        }
    }

    /// Signed-byte view over the live buffer
    pub fn signed_bytes<M: LinearMemory + ?Sized>(&mut self, memory: &M) -> View<i8> {
        self.current(memory).signed
    }

    /// Unsigned-byte view over the live buffer
    pub fn bytes<M: LinearMemory + ?Sized>(&mut self, memory: &M) -> View<u8> {
        self.current(memory).bytes
    }

    /// 32-bit word view over the live buffer
    pub fn words<M: LinearMemory + ?Sized>(&mut self, memory: &M) -> View<i32> {
        self.current(memory).words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_memory_grow_replaces_buffer() {
        let mut memory = HeapMemory::new(1);
        memory.write(10, &[1, 2, 3]).unwrap();
        assert_eq!(memory.grow(2), 1);
        assert_eq!(memory.byte_length(), 3 * PAGE_SIZE);
        assert_eq!(memory.generation(), 1);
        assert_eq!(&memory.as_slice()[10..13], &[1, 2, 3]);
    }

    #[test]
    fn test_out_of_bounds_read() {
        let memory = HeapMemory::with_len(8);
        let mut buf = [0u8; 4];
        assert_eq!(
            memory.read(6, &mut buf),
            Err(HostError::OutOfBounds {
                offset: 6,
                len: 4,
                memory_len: 8
            })
        );
    }

    #[test]
    fn test_word_view_is_little_endian() {
        let mut memory = HeapMemory::with_len(16);
        let words = View::<i32>::bind(&memory);
        assert_eq!(words.len(), 4);
        words.set(&mut memory, 1, 0x0403_0201).unwrap();
        assert_eq!(&memory.as_slice()[4..8], &[1, 2, 3, 4]);
        assert_eq!(words.get(&memory, 1).unwrap(), 0x0403_0201);
        assert!(words.get(&memory, 4).is_err());
    }

    #[test]
    fn test_signed_and_unsigned_views_alias() {
        let mut memory = HeapMemory::with_len(4);
        let bytes = View::<u8>::bind(&memory);
        let signed = View::<i8>::bind(&memory);
        bytes.set(&mut memory, 2, 0xFF).unwrap();
        assert_eq!(signed.get(&memory, 2).unwrap(), -1);
    }

    #[test]
    fn test_captured_view_is_stale_after_growth() {
        let mut memory = HeapMemory::new(1);
        let captured = View::<u8>::bind(&memory);
        memory.grow(1);
        memory.write(PAGE_SIZE + 5, &[42]).unwrap();

        assert!(captured.is_stale(&memory));
        assert_eq!(
            captured.get(&memory, 0),
            Err(HostError::StaleView { view: 0, current: 1 })
        );

        let mut views = MemoryViews::new();
        views.rebuild(&memory);
        let fresh = views.bytes(&memory);
        assert_eq!(fresh.len(), 2 * PAGE_SIZE);
        assert_eq!(fresh.get(&memory, PAGE_SIZE + 5).unwrap(), 42);
    }

    #[test]
    fn test_manager_rebuilds_on_generation_mismatch() {
        let mut memory = HeapMemory::new(1);
        let mut views = MemoryViews::new();
        views.rebuild(&memory);
        assert_eq!(views.rebuild_count(), 1);

        // Same generation, no rebuild.
        let _ = views.words(&memory);
        assert_eq!(views.rebuild_count(), 1);

        memory.grow(1);
        let words = views.words(&memory);
        assert_eq!(views.rebuild_count(), 2);
        assert_eq!(views.generation(), Some(1));
        assert_eq!(words.len(), 2 * PAGE_SIZE / 4);
    }

    #[test]
    fn test_position_scans_across_chunks() {
        let mut memory = HeapMemory::with_len(1024);
        memory.write(0, &[1; 1024]).unwrap();
        memory.write(700, &[0]).unwrap();
        let bytes = View::<u8>::bind(&memory);
        assert_eq!(bytes.position(&memory, 3, 0).unwrap(), Some(700));
        assert_eq!(bytes.position(&memory, 701, 0).unwrap(), None);
    }

    #[test]
    fn test_borrowed_memory_generation_tracks_length() {
        let mut small = vec![0u8; PAGE_SIZE];
        let mut large = vec![0u8; 2 * PAGE_SIZE];
        let view = View::<u8>::bind(&BorrowedMemory::new(&mut small));
        assert!(view.is_stale(&BorrowedMemory::new(&mut large)));
        assert!(!view.is_stale(&BorrowedMemory::new(&mut small)));
    }
}
