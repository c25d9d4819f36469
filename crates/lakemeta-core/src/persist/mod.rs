//! Versioned binary persistence of the catalog graph.
//!
//! A stream starts with the meta version it was written at. Entities are
//! written depth-first, parent before children. Polymorphic entities carry a
//! type tag and a body length so that the reader can dispatch to the right
//! variant through a [`Registry`] and verify the body was consumed exactly.
//!
//! Fields added after [`META_VERSION_MIN`] are present iff the stream's meta
//! version is greater than or equal to the version that introduced them.

mod reader;
mod writer;

pub use reader::MetaReader;
pub use writer::MetaWriter;

use crate::config::MetaContext;
use crate::error::EncodingError;
use crate::types::{META_VERSION_CURRENT, META_VERSION_MIN};

/// An entity with a binary encoding.
pub trait Persist: Sized {
    fn write_to(&self, w: &mut MetaWriter) -> Result<(), EncodingError>;
    fn read_from(r: &mut MetaReader<'_>) -> Result<Self, EncodingError>;
}

/// Reads one concrete variant's body.
pub type ReadFn<T> = fn(&mut MetaReader<'_>) -> Result<T, EncodingError>;

/// One entry of a [`Registry`].
pub struct Variant<T: 'static> {
    pub tag: u8,
    pub name: &'static str,
    pub read: ReadFn<T>,
}

/// Maps persisted type tags to variant constructors for one entity family.
///
/// New variants are added by extending the registry's table; nothing else
/// in the codec branches on concrete types.
pub struct Registry<T: 'static> {
    family: &'static str,
    variants: &'static [Variant<T>],
}

impl<T: 'static> Registry<T> {
    pub const fn new(family: &'static str, variants: &'static [Variant<T>]) -> Self {
        Self { family, variants }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn lookup(&self, tag: u8) -> Option<&Variant<T>> {
        self.variants.iter().find(|v| v.tag == tag)
    }

    /// Human-readable name of `tag`, for diagnostics.
    pub fn name_of(&self, tag: u8) -> Option<&'static str> {
        self.lookup(tag).map(|v| v.name)
    }
}

/// Write `[count][item]*`.
pub fn write_seq<'a, T, I>(w: &mut MetaWriter, items: I) -> Result<(), EncodingError>
where
    T: Persist + 'a,
    I: ExactSizeIterator<Item = &'a T>,
{
    w.put_len(items.len())?;
    for item in items {
        item.write_to(w)?;
    }
    Ok(())
}

/// Read `[count][item]*`.
pub fn read_seq<T: Persist>(r: &mut MetaReader<'_>) -> Result<Vec<T>, EncodingError> {
    let count = r.get_count()?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::read_from(r)?);
    }
    Ok(items)
}

/// Check that a stream's meta version is one this crate can decode.
pub fn check_meta_version(version: u32) -> Result<(), EncodingError> {
    if (META_VERSION_MIN..=META_VERSION_CURRENT).contains(&version) {
        Ok(())
    } else {
        Err(EncodingError::UnsupportedMetaVersion(version))
    }
}

/// Encode `value` as a self-describing stream: `[meta_version: u32][entity]`.
pub fn encode<T: Persist>(value: &T, ctx: MetaContext) -> Result<Vec<u8>, EncodingError> {
    check_meta_version(ctx.meta_version())?;
    let mut w = MetaWriter::new(ctx);
    w.put_u32(ctx.meta_version());
    value.write_to(&mut w)?;
    Ok(w.into_bytes())
}

/// Decode a stream produced by [`encode`].
///
/// The whole input must be consumed; on any error nothing is returned.
pub fn decode<T: Persist>(data: &[u8]) -> Result<T, EncodingError> {
    let mut header = MetaReader::new(data, MetaContext::current());
    let version = header.get_u32()?;
    check_meta_version(version)?;

    let mut r = MetaReader::new(&data[header.position()..], MetaContext::new(version));
    let value = T::read_from(&mut r)?;
    r.finish()?;
    Ok(value)
}
