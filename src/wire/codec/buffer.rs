use crate::wire::codec::CodecError;
use crate::wire::types::Version;

/// Width of every element-count field.
pub const COUNT_LEN: usize = 2;

#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_i8(&mut self, value: i8) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_zeros(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < count {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.get_array::<1>()?[0])
    }

    pub fn get_i8(&mut self) -> Result<i8, CodecError> {
        Ok(i8::from_be_bytes(self.get_array::<1>()?))
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.get_array::<2>()?))
    }

    pub fn get_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_be_bytes(self.get_array::<2>()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.get_array::<4>()?))
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.get_array::<4>()?))
    }

    pub fn skip(&mut self, count: usize) -> Result<(), CodecError> {
        self.take(count).map(|_| ())
    }
}

/// Byte layout of a value at a given protocol version.
pub trait WireFormat: Sized {
    fn encoded_len(&self, version: Version) -> usize;
    fn encode(&self, version: Version, writer: &mut PacketWriter);
    fn decode(version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError>;
}

impl WireFormat for i8 {
    fn encoded_len(&self, _version: Version) -> usize {
        1
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_i8(*self);
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        reader.get_i8()
    }
}

impl WireFormat for u16 {
    fn encoded_len(&self, _version: Version) -> usize {
        2
    }

    fn encode(&self, _version: Version, writer: &mut PacketWriter) {
        writer.put_u16(*self);
    }

    fn decode(_version: Version, reader: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        reader.get_u16()
    }
}

pub fn list_len<T: WireFormat>(items: &[T], version: Version) -> usize {
    COUNT_LEN + items_len(items, version)
}

pub fn items_len<T: WireFormat>(items: &[T], version: Version) -> usize {
    items.iter().map(|item| item.encoded_len(version)).sum()
}

/// Writes the count field followed by every element.
pub fn put_list<T: WireFormat>(items: &[T], version: Version, writer: &mut PacketWriter) {
    writer.put_u16(items.len() as u16);
    for item in items {
        item.encode(version, writer);
    }
}

pub fn get_list<T: WireFormat>(
    version: Version,
    reader: &mut PacketReader<'_>,
    field: &'static str,
    capacity: usize,
) -> Result<Vec<T>, CodecError> {
    let count = usize::from(reader.get_u16()?);
    get_items(version, reader, field, count, capacity)
}

pub fn get_items<T: WireFormat>(
    version: Version,
    reader: &mut PacketReader<'_>,
    field: &'static str,
    count: usize,
    capacity: usize,
) -> Result<Vec<T>, CodecError> {
    if count > capacity {
        return Err(CodecError::CountExceedsCapacity {
            field,
            count,
            capacity,
        });
    }
    (0..count).map(|_| T::decode(version, reader)).collect()
}

pub fn check_capacity<T>(
    items: &[T],
    field: &'static str,
    capacity: usize,
) -> Result<(), CodecError> {
    if items.len() > capacity {
        return Err(CodecError::CountExceedsCapacity {
            field,
            count: items.len(),
            capacity,
        });
    }
    Ok(())
}
