use crate::config::MetaContext;
use crate::error::EncodingError;

use super::Registry;

/// Bounds-checked decoder mirroring [`MetaWriter`](super::MetaWriter).
///
/// Every read checks the remaining length first; a short buffer is a
/// [`EncodingError::Truncated`] error, never a panic.
pub struct MetaReader<'a> {
    data: &'a [u8],
    offset: usize,
    ctx: MetaContext,
}

impl<'a> MetaReader<'a> {
    pub fn new(data: &'a [u8], ctx: MetaContext) -> Self {
        Self {
            data,
            offset: 0,
            ctx,
        }
    }

    pub fn context(&self) -> MetaContext {
        self.ctx
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Fail if any bytes are left unread.
    pub fn finish(&self) -> Result<(), EncodingError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(EncodingError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EncodingError> {
        if n > self.remaining() {
            return Err(EncodingError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], EncodingError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, EncodingError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, EncodingError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EncodingError::InvalidValue {
                field: "bool",
                value: other as u64,
            }),
        }
    }

    pub fn get_i16(&mut self) -> Result<i16, EncodingError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn get_u16(&mut self) -> Result<u16, EncodingError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn get_i32(&mut self) -> Result<i32, EncodingError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, EncodingError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn get_i64(&mut self) -> Result<i64, EncodingError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64, EncodingError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Read an element count.
    ///
    /// Every element occupies at least one byte, so a count larger than the
    /// remaining input is rejected before anything is allocated.
    pub fn get_count(&mut self) -> Result<usize, EncodingError> {
        let count = self.get_u32()? as usize;
        if count > self.remaining() {
            return Err(EncodingError::Truncated {
                needed: count,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }

    pub fn get_bytes(&mut self) -> Result<&'a [u8], EncodingError> {
        let len = self.get_u32()? as usize;
        self.take(len)
    }

    pub fn get_str(&mut self, field: &'static str) -> Result<String, EncodingError> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| EncodingError::InvalidUtf8(field))
    }

    pub fn get_opt_str(&mut self, field: &'static str) -> Result<Option<String>, EncodingError> {
        if self.get_bool()? {
            Ok(Some(self.get_str(field)?))
        } else {
            Ok(None)
        }
    }

    /// Read a `[tag][body_len][body]` entity, dispatching on the tag through
    /// `registry`. The variant reader must consume the body exactly.
    pub fn get_variant<T: 'static>(
        &mut self,
        registry: &Registry<T>,
    ) -> Result<T, EncodingError> {
        let tag = self.get_u8()?;
        let variant = registry
            .lookup(tag)
            .ok_or(EncodingError::UnknownVariant {
                family: registry.family(),
                tag,
            })?;
        let declared = self.get_u32()? as usize;
        let body = self.take(declared)?;

        let mut sub = MetaReader::new(body, self.ctx);
        let value = (variant.read)(&mut sub)?;
        if sub.remaining() != 0 {
            return Err(EncodingError::LengthMismatch {
                family: registry.family(),
                declared,
                consumed: sub.position(),
            });
        }
        Ok(value)
    }
}
