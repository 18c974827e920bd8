//! Besides regular commands and control commands there is also direct
//! memory access using datablocks. Some vital parameters (e.g design
//! capacity) are available exclusively through this interface.
//!
//! A transaction selects a class and block, waits for the gauge to latch the
//! selection and then works on a byte range of the 32-byte block. Writes only
//! touch the changed range: the block checksum is updated from the old and
//! new bytes instead of re-reading the whole block.
//!
//! The selection is device state shared by every transfer of the
//! transaction, so the whole sequence runs under one `&mut self` borrow.

use byteorder::{BigEndian, ByteOrder};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::fmt::*;
use crate::gauge::{Bq27427, GaugeError};
use crate::gauge_defs::{commands, MemoryLocation, MEMBLOCK_SETTLE_MS, MEMBLOCK_SIZE};

fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Simple checksum used by the gauge: 255 minus the byte sum modulo 256.
#[must_use]
pub fn block_checksum(block: &[u8]) -> u8 {
    255 - byte_sum(block)
}

/// Checksum of a block after replacing `old` with `new` somewhere in it.
///
/// Only the stored checksum and the changed range are needed, the rest of
/// the block contributes `255 - checksum - sum(old)`.
#[must_use]
pub fn updated_checksum(checksum: u8, old: &[u8], new: &[u8]) -> u8 {
    let rest = 255u8.wrapping_sub(checksum).wrapping_sub(byte_sum(old));
    255 - rest.wrapping_add(byte_sum(new))
}

/// Checks that `len` bytes at `location` stay inside one block.
pub(crate) fn check_range<E>(location: &MemoryLocation, len: usize) -> Result<(), GaugeError<E>> {
    if usize::from(location.offset) + len > MEMBLOCK_SIZE {
        error!(
            "memory access of {} bytes at offset {} crosses the block end",
            len, location.offset
        );
        return Err(GaugeError::OutOfBlock);
    }
    Ok(())
}

impl<I, D, E> Bq27427<I, D>
where
    I: I2c<Error = E>,
    D: DelayNs,
{
    /// Selects a block and waits until the gauge latched it
    fn memblock_prepare_op(&mut self, class: u8, block: u8) -> Result<(), GaugeError<E>> {
        self.write_command(commands::BLOCK_DATA_CONTROL, 0)?;
        self.write_command(commands::DATA_CLASS, class)?;
        self.write_command(commands::DATA_BLOCK, block)?;

        self.delay.delay_ms(MEMBLOCK_SETTLE_MS);

        Ok(())
    }

    /// Read the selected block checksum from the gauge
    fn read_checksum(&mut self) -> Result<u8, GaugeError<E>> {
        let mut checksum = [0];

        self.i2c
            .write_read(self.addr, &[commands::BLOCK_DATA_CHECKSUM], &mut checksum)?;

        Ok(checksum[0])
    }

    /// Reads `buffer.len()` bytes of data memory at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`GaugeError::OutOfBlock`] if the range crosses the end of the
    /// block, or the first bus error.
    pub fn read_memory(
        &mut self,
        location: &MemoryLocation,
        buffer: &mut [u8],
    ) -> Result<(), GaugeError<E>> {
        check_range(location, buffer.len())?;
        self.memblock_prepare_op(location.class, location.block)?;
        self.i2c
            .write_read(self.addr, &[location.register()], buffer)?;
        Ok(())
    }

    /// Writes `data` to data memory at `location` and updates the block checksum.
    ///
    /// The gauge must be unsealed and in configuration update mode. The
    /// checksum accepted by the gauge is not read back.
    ///
    /// # Errors
    ///
    /// Returns [`GaugeError::OutOfBlock`] if the range crosses the end of the
    /// block. A bus error aborts the remaining steps.
    pub fn write_memory(
        &mut self,
        location: &MemoryLocation,
        data: &[u8],
    ) -> Result<(), GaugeError<E>> {
        check_range(location, data.len())?;
        let len = data.len();

        self.memblock_prepare_op(location.class, location.block)?;

        let checksum = self.read_checksum()?;
        let mut old = [0u8; MEMBLOCK_SIZE];
        self.i2c
            .write_read(self.addr, &[location.register()], &mut old[..len])?;

        let mut request = [0u8; MEMBLOCK_SIZE + 1];
        request[0] = location.register();
        request[1..=len].copy_from_slice(data);
        self.i2c.write(self.addr, &request[..=len])?;

        let new_checksum = updated_checksum(checksum, &old[..len], data);
        debug!(
            "memory {}/{}@{}: checksum {} -> {}",
            location.class, location.block, location.offset, checksum, new_checksum
        );
        self.i2c
            .write(self.addr, &[commands::BLOCK_DATA_CHECKSUM, new_checksum])?;

        Ok(())
    }

    pub(crate) fn read_memory_u8(&mut self, location: &MemoryLocation) -> Result<u8, GaugeError<E>> {
        let mut buffer = [0u8; 1];
        self.read_memory(location, &mut buffer)?;
        Ok(buffer[0])
    }

    pub(crate) fn read_memory_u16(
        &mut self,
        location: &MemoryLocation,
    ) -> Result<u16, GaugeError<E>> {
        let mut buffer = [0u8; 2];
        self.read_memory(location, &mut buffer)?;
        Ok(BigEndian::read_u16(&buffer))
    }

    pub(crate) fn write_memory_u16(
        &mut self,
        location: &MemoryLocation,
        value: u16,
    ) -> Result<(), GaugeError<E>> {
        let mut buffer = [0u8; 2];
        BigEndian::write_u16(&mut buffer, value);
        self.write_memory(location, &buffer)
    }
}
