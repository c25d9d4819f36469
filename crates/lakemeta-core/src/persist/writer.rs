use crate::config::MetaContext;
use crate::error::EncodingError;

/// Append-only little-endian encoder for catalog entities.
///
/// Layout conventions:
/// ```text
/// integers   fixed width, little-endian
/// bool       u8 (0 or 1)
/// string     [len: u32][utf-8 bytes]
/// option     [present: u8][value if present]
/// sequence   [count: u32][item]*
/// variant    [tag: u8][body_len: u32][body]
/// ```
pub struct MetaWriter {
    buf: Vec<u8>,
    ctx: MetaContext,
}

impl MetaWriter {
    pub fn new(ctx: MetaContext) -> Self {
        Self {
            buf: Vec::new(),
            ctx,
        }
    }

    pub fn context(&self) -> MetaContext {
        self.ctx
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn put_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a length or element count as u32.
    pub fn put_len(&mut self, len: usize) -> Result<(), EncodingError> {
        let len = u32::try_from(len).map_err(|_| EncodingError::InvalidValue {
            field: "length",
            value: len as u64,
        })?;
        self.put_u32(len);
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodingError> {
        self.put_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn put_str(&mut self, value: &str) -> Result<(), EncodingError> {
        self.put_bytes(value.as_bytes())
    }

    pub fn put_opt_str(&mut self, value: Option<&str>) -> Result<(), EncodingError> {
        match value {
            Some(s) => {
                self.put_bool(true);
                self.put_str(s)
            }
            None => {
                self.put_bool(false);
                Ok(())
            }
        }
    }

    /// Write `[tag][body_len][body]`, where the body is produced by `body`.
    ///
    /// The length is patched in after the body is written so that readers
    /// can verify a variant consumed exactly what its writer produced.
    pub fn put_variant<F>(&mut self, tag: u8, body: F) -> Result<(), EncodingError>
    where
        F: FnOnce(&mut MetaWriter) -> Result<(), EncodingError>,
    {
        self.put_u8(tag);
        let len_offset = self.buf.len();
        self.put_u32(0);
        let body_start = self.buf.len();
        body(self)?;
        let body_len = self.buf.len() - body_start;
        let body_len = u32::try_from(body_len).map_err(|_| EncodingError::InvalidValue {
            field: "variant body length",
            value: body_len as u64,
        })?;
        self.buf[len_offset..len_offset + 4].copy_from_slice(&body_len.to_le_bytes());
        Ok(())
    }
}
