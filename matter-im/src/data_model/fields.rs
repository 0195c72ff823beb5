/*
 *
 *    Copyright (c) 2020-2022 Project CHIP Authors
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        http://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

//! Command argument encoding for both wire formats.
//!
//! A command's arguments are an ordered list of fields. Over the
//! interaction model each field is the struct member whose context tag is
//! its position; over legacy ZCL the fields follow each other little-endian,
//! strings prefixed by a one byte length. Both directions walk the same
//! field order so an encoded argument set always decodes back to itself.

use log::warn;

use crate::{
    error::{Error, ErrorCode},
    tlv::{TLVElement, TLVWriter, TagType},
    utils::{parsebuf::ParseBuf, writebuf::WriteBuf},
};

pub enum FieldReader<'a> {
    Tlv {
        fields: Option<TLVElement<'a>>,
        next_tag: u8,
    },
    Zcl(ParseBuf<'a>),
}

impl<'a> FieldReader<'a> {
    /// Reader over a command fields structure. The structure must be
    /// complete: a truncated container fails here, before any field is read.
    pub fn tlv(fields: Option<TLVElement<'a>>) -> Result<Self, Error> {
        if let Some(fields) = fields {
            fields.confirm_struct()?;
            fields.validate()?;
        }
        Ok(FieldReader::Tlv {
            fields,
            next_tag: 0,
        })
    }

    pub fn zcl(payload: &'a [u8]) -> Self {
        FieldReader::Zcl(ParseBuf::new(payload))
    }

    fn next_element(&mut self) -> Result<TLVElement<'a>, Error> {
        match self {
            FieldReader::Tlv { fields, next_tag } => {
                let tag = *next_tag;
                *next_tag += 1;
                fields
                    .as_ref()
                    .ok_or(ErrorCode::NoTagFound)?
                    .find_tag(tag as u32)
            }
            FieldReader::Zcl(_) => Err(ErrorCode::InvalidState.into()),
        }
    }

    pub fn u8(&mut self) -> Result<u8, Error> {
        match self {
            FieldReader::Zcl(pb) => pb.le_u8(),
            _ => self.next_element()?.u8(),
        }
    }

    pub fn u16(&mut self) -> Result<u16, Error> {
        match self {
            FieldReader::Zcl(pb) => pb.le_u16(),
            _ => self.next_element()?.u16(),
        }
    }

    pub fn u32(&mut self) -> Result<u32, Error> {
        match self {
            FieldReader::Zcl(pb) => pb.le_u32(),
            _ => self.next_element()?.u32(),
        }
    }

    pub fn u64(&mut self) -> Result<u64, Error> {
        match self {
            FieldReader::Zcl(pb) => pb.le_u64(),
            _ => self.next_element()?.u64(),
        }
    }

    pub fn i16(&mut self) -> Result<i16, Error> {
        match self {
            FieldReader::Zcl(pb) => pb.le_i16(),
            _ => self.next_element()?.i16(),
        }
    }

    pub fn bool(&mut self) -> Result<bool, Error> {
        match self {
            FieldReader::Zcl(pb) => Ok(pb.le_u8()? != 0),
            _ => self.next_element()?.bool(),
        }
    }

    /// An octet string of at most `max` bytes
    pub fn octets(&mut self, max: usize) -> Result<Vec<u8>, Error> {
        let data = match self {
            FieldReader::Zcl(pb) => {
                let len = pb.le_u8()? as usize;
                pb.take(len)?
            }
            _ => self.next_element()?.octets()?,
        };
        check_len(data.len(), max)?;
        Ok(data.to_vec())
    }

    /// A UTF-8 string of at most `max` bytes
    pub fn utf8(&mut self, max: usize) -> Result<String, Error> {
        let data = match self {
            FieldReader::Zcl(pb) => {
                let len = pb.le_u8()? as usize;
                pb.take(len)?
            }
            _ => self.next_element()?.utf8()?,
        };
        check_len(data.len(), max)?;
        Ok(core::str::from_utf8(data)?.to_owned())
    }
}

fn check_len(len: usize, max: usize) -> Result<(), Error> {
    if len > max {
        warn!("Field of {} bytes exceeds its limit of {}", len, max);
        Err(ErrorCode::MessageTooLong.into())
    } else {
        Ok(())
    }
}

pub enum FieldWriter<'w> {
    Tlv { tw: TLVWriter<'w>, next_tag: u8 },
    Zcl(&'w mut WriteBuf),
}

impl<'w> FieldWriter<'w> {
    /// Writes the fields as members of the container currently open in `buf`
    pub fn tlv(buf: &'w mut WriteBuf) -> Self {
        FieldWriter::Tlv {
            tw: TLVWriter::new(buf),
            next_tag: 0,
        }
    }

    pub fn zcl(buf: &'w mut WriteBuf) -> Self {
        FieldWriter::Zcl(buf)
    }

    fn next_tag(next_tag: &mut u8) -> TagType {
        let tag = TagType::Context(*next_tag);
        *next_tag += 1;
        tag
    }

    pub fn u8(&mut self, v: u8) -> Result<(), Error> {
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.u8(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => wb.le_u8(v),
        }
    }

    pub fn u16(&mut self, v: u16) -> Result<(), Error> {
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.u16(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => wb.le_u16(v),
        }
    }

    pub fn u32(&mut self, v: u32) -> Result<(), Error> {
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.u32(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => wb.le_u32(v),
        }
    }

    pub fn u64(&mut self, v: u64) -> Result<(), Error> {
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.u64(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => wb.le_u64(v),
        }
    }

    pub fn i16(&mut self, v: i16) -> Result<(), Error> {
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.i16(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => wb.le_i16(v),
        }
    }

    pub fn bool(&mut self, v: bool) -> Result<(), Error> {
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.bool(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => wb.le_u8(v as u8),
        }
    }

    pub fn octets(&mut self, v: &[u8], max: usize) -> Result<(), Error> {
        if v.len() > max {
            return Err(ErrorCode::ConstraintError.into());
        }
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.octets(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => Self::zcl_string(wb, v),
        }
    }

    pub fn utf8(&mut self, v: &str, max: usize) -> Result<(), Error> {
        if v.len() > max {
            return Err(ErrorCode::ConstraintError.into());
        }
        match self {
            FieldWriter::Tlv { tw, next_tag } => tw.utf8(Self::next_tag(next_tag), v),
            FieldWriter::Zcl(wb) => Self::zcl_string(wb, v.as_bytes()),
        }
    }

    fn zcl_string(wb: &mut WriteBuf, v: &[u8]) -> Result<(), Error> {
        let len = u8::try_from(v.len()).map_err(|_| ErrorCode::ConstraintError)?;
        let anchor = wb.get_tail();
        let result = wb.le_u8(len).and_then(|_| wb.copy_from_slice(v));
        if result.is_err() {
            wb.rewind_tail_to(anchor);
        }
        result
    }
}

/// One command argument
pub trait Field: Sized {
    fn read_field(r: &mut FieldReader<'_>) -> Result<Self, Error>;

    fn write_field(&self, w: &mut FieldWriter<'_>) -> Result<(), Error>;
}

macro_rules! field_for {
    ($($t:ident)*) => {
        $(
            impl Field for $t {
                fn read_field(r: &mut FieldReader<'_>) -> Result<Self, Error> {
                    r.$t()
                }

                fn write_field(&self, w: &mut FieldWriter<'_>) -> Result<(), Error> {
                    w.$t(*self)
                }
            }
        )*
    };
}

field_for!(u8 u16 u32 u64 i16 bool);

/// Octet string bounded to `MAX` bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Octets<const MAX: usize>(Vec<u8>);

impl<const MAX: usize> Octets<MAX> {
    pub fn new(data: &[u8]) -> Result<Self, Error> {
        check_len(data.len(), MAX).map_err(|_| ErrorCode::ConstraintError)?;
        Ok(Self(data.to_vec()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl<const MAX: usize> Field for Octets<MAX> {
    fn read_field(r: &mut FieldReader<'_>) -> Result<Self, Error> {
        r.octets(MAX).map(Self)
    }

    fn write_field(&self, w: &mut FieldWriter<'_>) -> Result<(), Error> {
        w.octets(&self.0, MAX)
    }
}

/// UTF-8 string bounded to `MAX` bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Utf8<const MAX: usize>(String);

impl<const MAX: usize> Utf8<MAX> {
    pub fn new(s: &str) -> Result<Self, Error> {
        check_len(s.len(), MAX).map_err(|_| ErrorCode::ConstraintError)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<const MAX: usize> Field for Utf8<MAX> {
    fn read_field(r: &mut FieldReader<'_>) -> Result<Self, Error> {
        r.utf8(MAX).map(Self)
    }

    fn write_field(&self, w: &mut FieldWriter<'_>) -> Result<(), Error> {
        w.utf8(&self.0, MAX)
    }
}

/// The full argument list of one command or command response
pub trait CommandArgs: Sized {
    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, Error>;

    fn write_fields(&self, w: &mut FieldWriter<'_>) -> Result<(), Error>;
}

impl CommandArgs for () {
    fn read_fields(_r: &mut FieldReader<'_>) -> Result<Self, Error> {
        Ok(())
    }

    fn write_fields(&self, _w: &mut FieldWriter<'_>) -> Result<(), Error> {
        Ok(())
    }
}

/// Declares an argument struct whose fields are encoded in declaration order
#[macro_export]
macro_rules! command_args {
    ($(#[$meta:meta])* pub struct $name:ident { $(pub $field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl $crate::data_model::fields::CommandArgs for $name {
            fn read_fields(
                r: &mut $crate::data_model::fields::FieldReader<'_>,
            ) -> Result<Self, $crate::error::Error> {
                Ok(Self {
                    $($field: <$ty as $crate::data_model::fields::Field>::read_field(r)?,)*
                })
            }

            fn write_fields(
                &self,
                w: &mut $crate::data_model::fields::FieldWriter<'_>,
            ) -> Result<(), $crate::error::Error> {
                $($crate::data_model::fields::Field::write_field(&self.$field, w)?;)*
                Ok(())
            }
        }
    };
}

/// Writes the fields of one command into either wire format
pub type FieldsFn<'a> = dyn Fn(&mut FieldWriter<'_>) -> Result<(), Error> + 'a;

/// Encodes `args` as a complete TLV fields structure
pub fn encode_tlv<A: CommandArgs>(args: &A, tag: TagType, limit: usize) -> Result<Vec<u8>, Error> {
    encode_tlv_fields(&|w| args.write_fields(w), tag, limit)
}

pub fn encode_tlv_fields(fields: &FieldsFn, tag: TagType, limit: usize) -> Result<Vec<u8>, Error> {
    let mut wb = WriteBuf::new(limit);
    let mut tw = TLVWriter::new(&mut wb);
    tw.start_struct(tag)?;
    fields(&mut FieldWriter::tlv(tw.get_buf()))?;
    tw.end_container()?;
    Ok(wb.into_vec())
}

/// Encodes `args` as a legacy ZCL payload
pub fn encode_zcl<A: CommandArgs>(args: &A, limit: usize) -> Result<Vec<u8>, Error> {
    encode_zcl_fields(&|w| args.write_fields(w), limit)
}

pub fn encode_zcl_fields(fields: &FieldsFn, limit: usize) -> Result<Vec<u8>, Error> {
    let mut wb = WriteBuf::new(limit);
    fields(&mut FieldWriter::zcl(&mut wb))?;
    Ok(wb.into_vec())
}
