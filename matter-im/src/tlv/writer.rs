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

use super::{TagType, TAG_SHIFT_BITS, TAG_SIZE_MAP};
use crate::{
    error::{Error, ErrorCode},
    utils::writebuf::WriteBuf,
};
use log::error;

#[derive(Copy, Clone)]
enum WriteElementType {
    S8 = 0,
    S16 = 1,
    S32 = 2,
    S64 = 3,
    U8 = 4,
    U16 = 5,
    U32 = 6,
    U64 = 7,
    False = 8,
    True = 9,
    Utf8l = 12,
    Utf16l = 13,
    Str8l = 16,
    Str16l = 17,
    Null = 20,
    Struct = 21,
    Array = 22,
    List = 23,
    EndCnt = 24,
}

/// Appends TLV elements to a [`WriteBuf`]. Integers always take the
/// narrowest encoding that holds the value.
pub struct TLVWriter<'a> {
    buf: &'a mut WriteBuf,
}

impl<'a> TLVWriter<'a> {
    pub fn new(buf: &'a mut WriteBuf) -> Self {
        TLVWriter { buf }
    }

    fn put_control_tag(
        &mut self,
        tag_type: TagType,
        val_type: WriteElementType,
    ) -> Result<(), Error> {
        let (tag_id, tag_val) = match tag_type {
            TagType::Anonymous => (0_u8, 0),
            TagType::Context(v) => (1, v as u64),
            TagType::CommonPrf16(v) => (2, v as u64),
            TagType::CommonPrf32(v) => (3, v as u64),
            TagType::ImplPrf16(v) => (4, v as u64),
            TagType::ImplPrf32(v) => (5, v as u64),
            TagType::FullQual48(v) => (6, v),
            TagType::FullQual64(v) => (7, v),
        };
        self.buf.le_u8((tag_id << TAG_SHIFT_BITS) | (val_type as u8))?;
        if tag_type != TagType::Anonymous {
            self.buf.le_uint(TAG_SIZE_MAP[tag_id as usize], tag_val)?;
        }
        Ok(())
    }

    // A half written element must never stay in the buffer
    fn atomically<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        let anchor = self.buf.get_tail();
        let result = f(self);
        if result.is_err() {
            self.buf.rewind_tail_to(anchor);
        }
        result
    }

    pub fn i8(&mut self, tag_type: TagType, data: i8) -> Result<(), Error> {
        self.atomically(|tw| {
            tw.put_control_tag(tag_type, WriteElementType::S8)?;
            tw.buf.le_i8(data)
        })
    }

    pub fn u8(&mut self, tag_type: TagType, data: u8) -> Result<(), Error> {
        self.atomically(|tw| {
            tw.put_control_tag(tag_type, WriteElementType::U8)?;
            tw.buf.le_u8(data)
        })
    }

    pub fn i16(&mut self, tag_type: TagType, data: i16) -> Result<(), Error> {
        if let Ok(v) = i8::try_from(data) {
            self.i8(tag_type, v)
        } else {
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::S16)?;
                tw.buf.le_i16(data)
            })
        }
    }

    pub fn u16(&mut self, tag_type: TagType, data: u16) -> Result<(), Error> {
        if let Ok(v) = u8::try_from(data) {
            self.u8(tag_type, v)
        } else {
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::U16)?;
                tw.buf.le_u16(data)
            })
        }
    }

    pub fn i32(&mut self, tag_type: TagType, data: i32) -> Result<(), Error> {
        if let Ok(v) = i16::try_from(data) {
            self.i16(tag_type, v)
        } else {
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::S32)?;
                tw.buf.le_i32(data)
            })
        }
    }

    pub fn u32(&mut self, tag_type: TagType, data: u32) -> Result<(), Error> {
        if let Ok(v) = u16::try_from(data) {
            self.u16(tag_type, v)
        } else {
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::U32)?;
                tw.buf.le_u32(data)
            })
        }
    }

    pub fn i64(&mut self, tag_type: TagType, data: i64) -> Result<(), Error> {
        if let Ok(v) = i32::try_from(data) {
            self.i32(tag_type, v)
        } else {
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::S64)?;
                tw.buf.le_i64(data)
            })
        }
    }

    pub fn u64(&mut self, tag_type: TagType, data: u64) -> Result<(), Error> {
        if let Ok(v) = u32::try_from(data) {
            self.u32(tag_type, v)
        } else {
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::U64)?;
                tw.buf.le_u64(data)
            })
        }
    }

    pub fn str8(&mut self, tag_type: TagType, data: &[u8]) -> Result<(), Error> {
        if data.len() > 0xff {
            error!("use str16() instead");
            return Err(ErrorCode::Invalid.into());
        }
        self.atomically(|tw| {
            tw.put_control_tag(tag_type, WriteElementType::Str8l)?;
            tw.buf.le_u8(data.len() as u8)?;
            tw.buf.copy_from_slice(data)
        })
    }

    pub fn str16(&mut self, tag_type: TagType, data: &[u8]) -> Result<(), Error> {
        if data.len() <= 0xff {
            self.str8(tag_type, data)
        } else {
            let len = u16::try_from(data.len()).map_err(|_| ErrorCode::MessageTooLong)?;
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::Str16l)?;
                tw.buf.le_u16(len)?;
                tw.buf.copy_from_slice(data)
            })
        }
    }

    /// Octet string of any length up to 64k
    pub fn octets(&mut self, tag_type: TagType, data: &[u8]) -> Result<(), Error> {
        self.str16(tag_type, data)
    }

    pub fn utf8(&mut self, tag_type: TagType, data: &str) -> Result<(), Error> {
        let data = data.as_bytes();
        if data.len() <= 0xff {
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::Utf8l)?;
                tw.buf.le_u8(data.len() as u8)?;
                tw.buf.copy_from_slice(data)
            })
        } else {
            let len = u16::try_from(data.len()).map_err(|_| ErrorCode::MessageTooLong)?;
            self.atomically(|tw| {
                tw.put_control_tag(tag_type, WriteElementType::Utf16l)?;
                tw.buf.le_u16(len)?;
                tw.buf.copy_from_slice(data)
            })
        }
    }

    fn no_val(&mut self, tag_type: TagType, element: WriteElementType) -> Result<(), Error> {
        self.atomically(|tw| tw.put_control_tag(tag_type, element))
    }

    pub fn start_struct(&mut self, tag_type: TagType) -> Result<(), Error> {
        self.no_val(tag_type, WriteElementType::Struct)
    }

    pub fn start_array(&mut self, tag_type: TagType) -> Result<(), Error> {
        self.no_val(tag_type, WriteElementType::Array)
    }

    pub fn start_list(&mut self, tag_type: TagType) -> Result<(), Error> {
        self.no_val(tag_type, WriteElementType::List)
    }

    pub fn end_container(&mut self) -> Result<(), Error> {
        self.no_val(TagType::Anonymous, WriteElementType::EndCnt)
    }

    pub fn null(&mut self, tag_type: TagType) -> Result<(), Error> {
        self.no_val(tag_type, WriteElementType::Null)
    }

    pub fn bool(&mut self, tag_type: TagType, val: bool) -> Result<(), Error> {
        if val {
            self.no_val(tag_type, WriteElementType::True)
        } else {
            self.no_val(tag_type, WriteElementType::False)
        }
    }

    /// Copies an already encoded element verbatim
    pub fn raw(&mut self, encoded: &[u8]) -> Result<(), Error> {
        self.buf.copy_from_slice(encoded)
    }

    pub fn get_tail(&self) -> usize {
        self.buf.get_tail()
    }

    pub fn rewind_to(&mut self, anchor: usize) {
        self.buf.rewind_tail_to(anchor);
    }

    pub fn get_buf(&mut self) -> &mut WriteBuf {
        self.buf
    }
}
