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

use crate::error::{Error, ErrorCode};

use byteorder::{ByteOrder, LittleEndian};
use log::{error, trace};
use std::fmt;

use super::{TagType, TAG_MASK, TAG_SHIFT_BITS, TYPE_MASK};

pub struct TLVList<'a> {
    buf: &'a [u8],
}

impl<'a> TLVList<'a> {
    pub fn new(buf: &'a [u8]) -> TLVList<'a> {
        TLVList { buf }
    }

    pub fn iter(&self) -> TLVListIterator<'a> {
        TLVListIterator {
            buf: self.buf,
            current: 0,
            left: self.buf.len(),
        }
    }
}

/// The position right after a container's control octet and tag
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pointer<'a> {
    buf: &'a [u8],
    current: usize,
    left: usize,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ElementType<'a> {
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    False,
    True,
    F32(f32),
    F64(f64),
    Utf8l(&'a [u8]),
    Utf16l(&'a [u8]),
    Str8l(&'a [u8]),
    Str16l(&'a [u8]),
    Null,
    Struct(Pointer<'a>),
    Array(Pointer<'a>),
    List(Pointer<'a>),
    EndCnt,
}

impl<'a> ElementType<'a> {
    fn container(&self) -> Option<Pointer<'a>> {
        match *self {
            ElementType::Struct(p) | ElementType::Array(p) | ElementType::List(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TLVElement<'a> {
    tag_type: TagType,
    element_type: ElementType<'a>,
}

impl<'a> PartialEq for TLVElement<'a> {
    fn eq(&self, other: &Self) -> bool {
        if self.tag_type != other.tag_type {
            return false;
        }
        match (self.element_type.container(), other.element_type.container()) {
            (Some(_), Some(_)) => {
                core::mem::discriminant(&self.element_type)
                    == core::mem::discriminant(&other.element_type)
                    && matches!(
                        (self.container_span(), other.container_span()),
                        (Ok(a), Ok(b)) if a == b
                    )
            }
            (None, None) => self.element_type == other.element_type,
            _ => false,
        }
    }
}

macro_rules! widen {
    ($name:ident, $t:ty, $($variant:ident),+) => {
        pub fn $name(&self) -> Result<$t, Error> {
            match self.element_type {
                $(ElementType::$variant(a) => Ok(a.into()),)+
                _ => Err(ErrorCode::TLVTypeMismatch.into()),
            }
        }
    };
}

impl<'a> TLVElement<'a> {
    pub fn new(tag: TagType, value: ElementType<'a>) -> Self {
        Self {
            tag_type: tag,
            element_type: value,
        }
    }

    pub fn enter(&self) -> Option<TLVContainerIterator<'a>> {
        let ptr = self.element_type.container()?;
        Some(TLVContainerIterator {
            list_iter: TLVListIterator::from_pointer(ptr),
            prev_container: false,
            iterator_consumed: false,
        })
    }

    widen!(u8, u8, U8);
    widen!(u16, u16, U8, U16);
    widen!(u32, u32, U8, U16, U32);
    widen!(u64, u64, U8, U16, U32, U64);
    widen!(i8, i8, S8);
    widen!(i16, i16, S8, S16);
    widen!(i32, i32, S8, S16, S32);
    widen!(i64, i64, S8, S16, S32, S64);

    /// The payload of any string element, octet or UTF-8
    pub fn slice(&self) -> Result<&'a [u8], Error> {
        match self.element_type {
            ElementType::Str8l(s)
            | ElementType::Utf8l(s)
            | ElementType::Str16l(s)
            | ElementType::Utf16l(s) => Ok(s),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    pub fn octets(&self) -> Result<&'a [u8], Error> {
        match self.element_type {
            ElementType::Str8l(s) | ElementType::Str16l(s) => Ok(s),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    pub fn utf8(&self) -> Result<&'a [u8], Error> {
        match self.element_type {
            ElementType::Utf8l(s) | ElementType::Utf16l(s) => Ok(s),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    pub fn str(&self) -> Result<&'a str, Error> {
        Ok(core::str::from_utf8(self.utf8()?)?)
    }

    pub fn bool(&self) -> Result<bool, Error> {
        match self.element_type {
            ElementType::False => Ok(false),
            ElementType::True => Ok(true),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    pub fn null(&self) -> Result<(), Error> {
        match self.element_type {
            ElementType::Null => Ok(()),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    pub fn confirm_struct(&self) -> Result<TLVElement<'a>, Error> {
        match self.element_type {
            ElementType::Struct(_) => Ok(*self),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    pub fn confirm_array(&self) -> Result<TLVElement<'a>, Error> {
        match self.element_type {
            ElementType::Array(_) => Ok(*self),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    pub fn confirm_list(&self) -> Result<TLVElement<'a>, Error> {
        match self.element_type {
            ElementType::List(_) => Ok(*self),
            _ => Err(ErrorCode::TLVTypeMismatch.into()),
        }
    }

    /// Returns the first member of this container carrying the context tag
    pub fn find_tag(&self, tag: u32) -> Result<TLVElement<'a>, Error> {
        let match_tag = TagType::Context(tag as u8);

        let iter = self.enter().ok_or(ErrorCode::TLVTypeMismatch)?;
        for a in iter {
            if match_tag == a.tag_type {
                return Ok(a);
            }
        }
        Err(ErrorCode::NoTagFound.into())
    }

    pub fn get_tag(&self) -> TagType {
        self.tag_type
    }

    pub fn check_ctx_tag(&self, tag: u8) -> bool {
        self.tag_type == TagType::Context(tag)
    }

    pub fn get_element_type(&self) -> ElementType<'a> {
        self.element_type
    }

    pub fn is_container(&self) -> bool {
        self.element_type.container().is_some()
    }

    /// The encoded contents of a container, up to and including its
    /// end-of-container marker.
    ///
    /// Fails with `TruncatedPacket` if the buffer ends before the container
    /// (or any container nested in it) is closed.
    pub fn container_span(&self) -> Result<&'a [u8], Error> {
        let ptr = self
            .element_type
            .container()
            .ok_or(ErrorCode::TLVTypeMismatch)?;
        let mut iter = TLVListIterator::from_pointer(ptr);
        let mut nest_level = 0_usize;
        loop {
            let element = iter.next().ok_or(ErrorCode::TruncatedPacket)?;
            match element.element_type {
                ElementType::EndCnt if nest_level == 0 => break,
                ElementType::EndCnt => nest_level -= 1,
                ElementType::Struct(_) | ElementType::Array(_) | ElementType::List(_) => {
                    nest_level += 1
                }
                _ => (),
            }
        }
        Ok(&ptr.buf[ptr.current..iter.current])
    }

    /// Confirms that this element is structurally complete: scalars always
    /// are, containers must be closed within the buffer.
    pub fn validate(&self) -> Result<(), Error> {
        if self.is_container() {
            self.container_span().map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl<'a> fmt::Display for TLVElement<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag_type {
            TagType::Anonymous => (),
            TagType::Context(tag) => write!(f, "{}: ", tag)?,
            _ => write!(f, "Other Context Tag")?,
        }
        match self.element_type {
            ElementType::Struct(_) => write!(f, "{{"),
            ElementType::Array(_) | ElementType::List(_) => write!(f, "["),
            ElementType::EndCnt => write!(f, ">"),
            ElementType::True => write!(f, "True"),
            ElementType::False => write!(f, "False"),
            ElementType::Str8l(a)
            | ElementType::Utf8l(a)
            | ElementType::Str16l(a)
            | ElementType::Utf16l(a) => {
                if let Ok(s) = core::str::from_utf8(a) {
                    write!(f, "len[{}]\"{}\"", s.len(), s)
                } else {
                    write!(f, "len[{}]{:x?}", a.len(), a)
                }
            }
            _ => write!(f, "{:?}", self.element_type),
        }
    }
}

// Iterates over every individual TLV in a list, including container markers
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TLVListIterator<'a> {
    buf: &'a [u8],
    current: usize,
    left: usize,
}

impl<'a> TLVListIterator<'a> {
    fn from_pointer(p: Pointer<'a>) -> Self {
        Self {
            buf: p.buf,
            current: p.current,
            left: p.left,
        }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if len > self.left {
            return None;
        }
        let data = &self.buf[self.current..self.current + len];
        self.current += len;
        self.left -= len;
        Some(data)
    }

    fn take_len_value(&mut self, size_of_length_field: usize) -> Option<&'a [u8]> {
        let length =
            LittleEndian::read_uint(self.take(size_of_length_field)?, size_of_length_field);
        self.take(length as usize)
    }

    fn pointer(&self) -> Pointer<'a> {
        Pointer {
            buf: self.buf,
            current: self.current,
            left: self.left,
        }
    }

    fn read_tag(&mut self, tag_control: u8) -> Option<TagType> {
        let tag = match tag_control {
            0 => TagType::Anonymous,
            1 => TagType::Context(self.take(1)?[0]),
            2 => TagType::CommonPrf16(LittleEndian::read_u16(self.take(2)?)),
            3 => TagType::CommonPrf32(LittleEndian::read_u32(self.take(4)?)),
            4 => TagType::ImplPrf16(LittleEndian::read_u16(self.take(2)?)),
            5 => TagType::ImplPrf32(LittleEndian::read_u32(self.take(4)?)),
            6 => TagType::FullQual48(LittleEndian::read_u48(self.take(6)?)),
            _ => TagType::FullQual64(LittleEndian::read_u64(self.take(8)?)),
        };
        Some(tag)
    }

    fn read_value(&mut self, element_type: u8) -> Option<ElementType<'a>> {
        let value = match element_type {
            0 => ElementType::S8(self.take(1)?[0] as i8),
            1 => ElementType::S16(LittleEndian::read_i16(self.take(2)?)),
            2 => ElementType::S32(LittleEndian::read_i32(self.take(4)?)),
            3 => ElementType::S64(LittleEndian::read_i64(self.take(8)?)),
            4 => ElementType::U8(self.take(1)?[0]),
            5 => ElementType::U16(LittleEndian::read_u16(self.take(2)?)),
            6 => ElementType::U32(LittleEndian::read_u32(self.take(4)?)),
            7 => ElementType::U64(LittleEndian::read_u64(self.take(8)?)),
            8 => ElementType::False,
            9 => ElementType::True,
            10 => ElementType::F32(LittleEndian::read_f32(self.take(4)?)),
            11 => ElementType::F64(LittleEndian::read_f64(self.take(8)?)),
            12 => ElementType::Utf8l(self.take_len_value(1)?),
            13 => ElementType::Utf16l(self.take_len_value(2)?),
            16 => ElementType::Str8l(self.take_len_value(1)?),
            17 => ElementType::Str16l(self.take_len_value(2)?),
            20 => ElementType::Null,
            21 => ElementType::Struct(self.pointer()),
            22 => ElementType::Array(self.pointer()),
            23 => ElementType::List(self.pointer()),
            24 => ElementType::EndCnt,
            _ => {
                error!("Unsupported TLV element type {}", element_type);
                return None;
            }
        };
        Some(value)
    }

    fn read_element(&mut self) -> Option<TLVElement<'a>> {
        let control = self.take(1)?[0];
        let tag_type = self.read_tag((control & TAG_MASK) >> TAG_SHIFT_BITS)?;
        let element_type = self.read_value(control & TYPE_MASK)?;

        Some(TLVElement {
            tag_type,
            element_type,
        })
    }
}

impl<'a> Iterator for TLVListIterator<'a> {
    type Item = TLVElement<'a>;

    fn next(&mut self) -> Option<TLVElement<'a>> {
        let element = self.read_element();
        if element.is_none() {
            // Never resume in the middle of a broken element
            self.left = 0;
        }
        element
    }
}

// Iterates over the members of one container, stepping over nested containers
#[derive(Debug, PartialEq)]
pub struct TLVContainerIterator<'a> {
    list_iter: TLVListIterator<'a>,
    prev_container: bool,
    iterator_consumed: bool,
}

impl<'a> TLVContainerIterator<'a> {
    fn skip_to_end_of_container(&mut self) -> Option<()> {
        let mut nest_level = 0;
        loop {
            let element = self.list_iter.next()?;
            match element.element_type {
                ElementType::EndCnt if nest_level == 0 => return Some(()),
                ElementType::EndCnt => nest_level -= 1,
                ElementType::Struct(_) | ElementType::Array(_) | ElementType::List(_) => {
                    nest_level += 1
                }
                _ => (),
            }
        }
    }
}

impl<'a> Iterator for TLVContainerIterator<'a> {
    type Item = TLVElement<'a>;

    fn next(&mut self) -> Option<TLVElement<'a>> {
        if self.iterator_consumed {
            return None;
        }
        if self.prev_container {
            self.prev_container = false;
            if self.skip_to_end_of_container().is_none() {
                self.iterator_consumed = true;
                return None;
            }
        }

        let element = match self.list_iter.next() {
            Some(element) => element,
            None => {
                self.iterator_consumed = true;
                return None;
            }
        };

        if element.element_type == ElementType::EndCnt {
            self.iterator_consumed = true;
            return None;
        }
        self.prev_container = element.is_container();
        Some(element)
    }
}

pub fn get_root_node(b: &[u8]) -> Result<TLVElement, Error> {
    Ok(TLVList::new(b).iter().next().ok_or(ErrorCode::InvalidData)?)
}

pub fn get_root_node_struct(b: &[u8]) -> Result<TLVElement, Error> {
    get_root_node(b)?.confirm_struct()
}

pub fn get_root_node_list(b: &[u8]) -> Result<TLVElement, Error> {
    get_root_node(b)?.confirm_list()
}

/// Dumps a TLV buffer, one element per line, at trace level
pub fn print_tlv_list(b: &[u8]) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }

    let mut closers: Vec<char> = Vec::new();
    trace!("TLV list:");
    for a in TLVList::new(b).iter() {
        let indent = "    ".repeat(closers.len());
        match a.element_type {
            ElementType::Struct(_) => {
                trace!("{}{}", indent, a);
                closers.push('}');
            }
            ElementType::Array(_) | ElementType::List(_) => {
                trace!("{}{}", indent, a);
                closers.push(']');
            }
            ElementType::EndCnt => match closers.pop() {
                Some(c) => trace!("{}{}", "    ".repeat(closers.len()), c),
                None => error!("Incorrect TLV List"),
            },
            _ => trace!("{}{}", indent, a),
        }
    }
    trace!("---------");
}
