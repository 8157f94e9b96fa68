// crate::io
use bincode;
use std::io::{Read, Result, Write};

pub trait SerializeTo<P> {
    fn serialize_to(&self, p: P) -> bincode::Result<()>;
}

pub trait DeserializeFrom<P>
where
    Self: Sized,
{
    fn deserialize_from(p: P) -> bincode::Result<Self>;
}

/******************************************************************************/
// ReadFrom / WriteTo --
//   convenience traits to move fixed-width big-endian words between
//   types and byte streams. Binary index files are always big-endian
//   so that a build on one machine reads back on any other.
/******************************************************************************/
pub trait ReadFrom {
    fn read_from(f: &mut dyn Read) -> Result<Self>
    where
        Self: Sized;
}

pub trait WriteTo {
    fn write_to(&self, f: &mut dyn Write) -> Result<()>;
}

impl ReadFrom for u64 {
    fn read_from(f: &mut dyn Read) -> Result<Self> {
        let mut val: [u8; 8] = [0; 8];
        f.read_exact(&mut val)?;
        Ok(u64::from_be_bytes(val))
    }
}

impl ReadFrom for i32 {
    fn read_from(f: &mut dyn Read) -> Result<Self> {
        let mut val: [u8; 4] = [0; 4];
        f.read_exact(&mut val)?;
        Ok(i32::from_be_bytes(val))
    }
}

impl WriteTo for u64 {
    fn write_to(&self, f: &mut dyn Write) -> Result<()> {
        f.write_all(&self.to_be_bytes())
    }
}

impl WriteTo for i32 {
    fn write_to(&self, f: &mut dyn Write) -> Result<()> {
        f.write_all(&self.to_be_bytes())
    }
}

/// Decode a big-endian `i32` from the first four bytes of `buf`.
#[inline]
pub fn i32_from_be_slice(buf: &[u8]) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[..4]);
    i32::from_be_bytes(word)
}
