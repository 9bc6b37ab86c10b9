//! Flat 1 MiB memory for the 8086
//!
//! The CPU reaches memory only through the `Memory8086` trait. Every access is
//! bounds-checked; an address past the end is an error, never a wrap.

use std::fmt;

use super::error::MemoryError;

/// Size of the real-mode address space (20-bit addresses)
pub const MEMORY_SIZE: usize = 0x10_0000;

/// Calculate physical address from segment:offset
#[inline]
pub fn physical_address(segment: u16, offset: u16) -> u32 {
    ((segment as u32) << 4) + (offset as u32)
}

/// Memory interface trait for the 8086 CPU
pub trait Memory8086 {
    /// Number of addressable bytes
    fn size(&self) -> u32;

    /// Read a byte from memory at the given address
    fn read_byte(&self, addr: u32) -> Result<u8, MemoryError>;

    /// Write a byte to memory at the given address
    fn write_byte(&mut self, addr: u32, val: u8) -> Result<(), MemoryError>;

    /// Read a 16-bit word (little-endian)
    ///
    /// The high byte comes from physical `addr + 1`. A word at segment offset
    /// 0xFFFF therefore continues into the next paragraph, where a real 8086
    /// wraps to offset 0 of the same segment.
    fn read_word(&self, addr: u32) -> Result<u16, MemoryError> {
        let low = self.read_byte(addr)? as u16;
        let high = self.read_byte(addr.wrapping_add(1))? as u16;
        Ok((high << 8) | low)
    }

    /// Write a 16-bit word (little-endian)
    ///
    /// Both addresses are checked before either byte is written. Addressing
    /// past segment offset 0xFFFF follows `read_word`.
    fn write_word(&mut self, addr: u32, val: u16) -> Result<(), MemoryError> {
        let high_addr = addr
            .checked_add(1)
            .filter(|&a| a < self.size())
            .ok_or(MemoryError::OutOfBounds {
                address: addr.saturating_add(1),
            })?;
        self.write_byte(addr, (val & 0xFF) as u8)?;
        self.write_byte(high_addr, (val >> 8) as u8)
    }
}

/// Simple array-based memory
#[derive(Clone)]
pub struct ArrayMemory {
    data: Vec<u8>,
    /// Physical origin and length of the last loaded image
    image: (u32, usize),
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self {
            data: vec![0; MEMORY_SIZE],
            image: (0, 0),
        }
    }

    /// Copy a program image into memory at `origin`
    ///
    /// Memory is left unmodified if the image does not fit.
    pub fn load(&mut self, program: &[u8], origin: u32) -> Result<(), MemoryError> {
        let start = origin as usize;
        let end = start
            .checked_add(program.len())
            .filter(|&end| end <= self.data.len())
            .ok_or(MemoryError::ImageTooLarge {
                origin,
                len: program.len(),
            })?;
        self.data[start..end].copy_from_slice(program);
        self.image = (origin, program.len());
        Ok(())
    }

    /// Physical origin of the loaded image
    pub fn image_origin(&self) -> u32 {
        self.image.0
    }

    /// First physical address past the loaded image
    pub fn image_end(&self) -> u32 {
        self.image.0 + self.image.1 as u32
    }

    /// Bytes of the loaded image region (read-only)
    pub fn image(&self) -> &[u8] {
        let (origin, len) = self.image;
        &self.data[origin as usize..origin as usize + len]
    }
}

impl fmt::Debug for ArrayMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayMemory")
            .field("size", &self.data.len())
            .field("image_origin", &self.image.0)
            .field("image_len", &self.image.1)
            .finish()
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory8086 for ArrayMemory {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn read_byte(&self, addr: u32) -> Result<u8, MemoryError> {
        self.data
            .get(addr as usize)
            .copied()
            .ok_or(MemoryError::OutOfBounds { address: addr })
    }

    fn write_byte(&mut self, addr: u32, val: u8) -> Result<(), MemoryError> {
        let slot = self
            .data
            .get_mut(addr as usize)
            .ok_or(MemoryError::OutOfBounds { address: addr })?;
        *slot = val;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_address() {
        assert_eq!(physical_address(0x1000, 0x0234), 0x10234);
        assert_eq!(physical_address(0xFFFF, 0xFFFF), 0x10FFEF);
    }

    #[test]
    fn test_load_at_origin() {
        let mut mem = ArrayMemory::new();
        mem.load(&[0x88, 0xC3, 0xF4], 0x100).unwrap();

        assert_eq!(mem.read_byte(0x100).unwrap(), 0x88);
        assert_eq!(mem.read_byte(0x102).unwrap(), 0xF4);
        assert_eq!(mem.image_origin(), 0x100);
        assert_eq!(mem.image_end(), 0x103);
        assert_eq!(mem.image(), &[0x88, 0xC3, 0xF4]);
    }

    #[test]
    fn test_load_too_large_leaves_memory_unmodified() {
        let mut mem = ArrayMemory::new();
        mem.write_byte(0, 0xAA).unwrap();

        let image = vec![0x11; MEMORY_SIZE + 1];
        let err = mem.load(&image, 0).unwrap_err();
        assert_eq!(
            err,
            MemoryError::ImageTooLarge {
                origin: 0,
                len: MEMORY_SIZE + 1
            }
        );
        assert_eq!(mem.read_byte(0).unwrap(), 0xAA);
        assert_eq!(mem.read_byte(1).unwrap(), 0x00);
        assert!(mem.image().is_empty());
    }

    #[test]
    fn test_load_past_end_from_origin() {
        let mut mem = ArrayMemory::new();
        let err = mem.load(&[1, 2, 3], (MEMORY_SIZE - 2) as u32);
        assert!(err.is_err());
        assert_eq!(mem.read_byte((MEMORY_SIZE - 2) as u32).unwrap(), 0);
    }

    #[test]
    fn test_byte_out_of_bounds() {
        let mut mem = ArrayMemory::new();
        let last = (MEMORY_SIZE - 1) as u32;
        assert!(mem.write_byte(last, 0x42).is_ok());
        assert_eq!(mem.read_byte(last).unwrap(), 0x42);

        assert_eq!(
            mem.read_byte(last + 1),
            Err(MemoryError::OutOfBounds { address: last + 1 })
        );
        assert!(mem.write_byte(last + 1, 0).is_err());
    }

    #[test]
    fn test_word_little_endian() {
        let mut mem = ArrayMemory::new();
        mem.write_word(0x2000, 0xAABB).unwrap();
        assert_eq!(mem.read_byte(0x2000).unwrap(), 0xBB);
        assert_eq!(mem.read_byte(0x2001).unwrap(), 0xAA);
        assert_eq!(mem.read_word(0x2000).unwrap(), 0xAABB);
    }

    #[test]
    fn test_word_write_straddling_end_is_atomic() {
        let mut mem = ArrayMemory::new();
        let last = (MEMORY_SIZE - 1) as u32;
        mem.write_byte(last, 0x55).unwrap();

        let err = mem.write_word(last, 0x1234).unwrap_err();
        assert_eq!(err, MemoryError::OutOfBounds { address: last + 1 });
        assert_eq!(mem.read_byte(last).unwrap(), 0x55, "low byte not written");
        assert!(mem.read_word(last).is_err());
    }
}
