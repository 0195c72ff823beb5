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

use super::{TLVContainerIterator, TLVElement, TLVWriter, TagType};
use crate::error::{Error, ErrorCode};
use std::marker::PhantomData;

pub trait FromTLV<'a> {
    fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error>
    where
        Self: Sized;

    // Only optional fields turn a missing element into a value
    fn tlv_not_found() -> Result<Self, Error>
    where
        Self: Sized,
    {
        Err(ErrorCode::TLVNotFound.into())
    }

    /// Decodes the member of `parent` carrying the context tag `tag`
    fn from_tag(parent: &TLVElement<'a>, tag: u8) -> Result<Self, Error>
    where
        Self: Sized,
    {
        match parent.find_tag(tag as u32) {
            Ok(element) => Self::from_tlv(&element),
            Err(e) if e.code() == ErrorCode::NoTagFound => Self::tlv_not_found(),
            Err(e) => Err(e),
        }
    }
}

macro_rules! fromtlv_for {
    ($($t:ident)*) => {
        $(
            impl<'a> FromTLV<'a> for $t {
                fn from_tlv(t: &TLVElement) -> Result<Self, Error> {
                    t.$t()
                }
            }
        )*
    };
}

fromtlv_for!(i8 u8 i16 u16 i32 u32 i64 u64 bool);

pub trait ToTLV {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error>;
}

macro_rules! totlv_for {
    ($($t:ident)*) => {
        $(
            impl ToTLV for $t {
                fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
                    tw.$t(tag, *self)
                }
            }
        )*
    };
}

totlv_for!(i8 u8 i16 u16 i32 u32 i64 u64 bool);

impl<'a> FromTLV<'a> for TLVElement<'a> {
    fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(*t)
    }
}

impl<T: ToTLV> ToTLV for [T] {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
        tw.start_array(tag)?;
        for i in self {
            i.to_tlv(tw, TagType::Anonymous)?;
        }
        tw.end_container()
    }
}

impl<T: ToTLV> ToTLV for Vec<T> {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
        self.as_slice().to_tlv(tw, tag)
    }
}

impl<T: ToTLV> ToTLV for Option<T> {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
        match self {
            Some(v) => v.to_tlv(tw, tag),
            None => Ok(()),
        }
    }
}

impl<'a, T: FromTLV<'a>> FromTLV<'a> for Option<T> {
    fn from_tlv(t: &TLVElement<'a>) -> Result<Option<T>, Error> {
        Ok(Some(T::from_tlv(t)?))
    }

    fn tlv_not_found() -> Result<Self, Error> {
        Ok(None)
    }
}

/// UTF-8 string borrowed from the received buffer
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UtfStr<'a>(pub &'a str);

impl<'a> FromTLV<'a> for UtfStr<'a> {
    fn from_tlv(t: &TLVElement<'a>) -> Result<UtfStr<'a>, Error> {
        t.str().map(UtfStr)
    }
}

impl<'a> ToTLV for UtfStr<'a> {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
        tw.utf8(tag, self.0)
    }
}

/// Octet string borrowed from the received buffer
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OctetStr<'a>(pub &'a [u8]);

impl<'a> FromTLV<'a> for OctetStr<'a> {
    fn from_tlv(t: &TLVElement<'a>) -> Result<OctetStr<'a>, Error> {
        t.octets().map(OctetStr)
    }
}

impl<'a> ToTLV for OctetStr<'a> {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
        tw.octets(tag, self.0)
    }
}

impl FromTLV<'_> for Vec<u8> {
    fn from_tlv(t: &TLVElement) -> Result<Vec<u8>, Error> {
        t.octets().map(|x| x.to_owned())
    }
}

impl FromTLV<'_> for String {
    fn from_tlv(t: &TLVElement) -> Result<String, Error> {
        t.str().map(|s| s.to_owned())
    }
}

impl ToTLV for String {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
        tw.utf8(tag, self)
    }
}

impl ToTLV for str {
    fn to_tlv(&self, tw: &mut TLVWriter, tag: TagType) -> Result<(), Error> {
        tw.utf8(tag, self)
    }
}

/// A TLV array still sitting in the received buffer. Entries are decoded
/// lazily while iterating.
pub struct TLVArray<'a, T> {
    element: TLVElement<'a>,
    _type: PhantomData<fn() -> T>,
}

impl<'a, T> Clone for TLVArray<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for TLVArray<'a, T> {}

impl<'a, T> std::fmt::Debug for TLVArray<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TLVArray({})", self.element)
    }
}

impl<'a, T: FromTLV<'a>> TLVArray<'a, T> {
    pub fn iter(&self) -> TLVArrayIter<'a, T> {
        TLVArrayIter {
            inner: self.element.enter(),
            _type: PhantomData,
        }
    }

    /// The raw entries, for callers that recover from undecodable ones
    pub fn elements(&self) -> impl Iterator<Item = TLVElement<'a>> {
        self.element.enter().into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.element.enter().map(|i| i.count()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a, T: FromTLV<'a>> FromTLV<'a> for TLVArray<'a, T> {
    fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            element: t.confirm_array()?,
            _type: PhantomData,
        })
    }
}

pub struct TLVArrayIter<'a, T> {
    inner: Option<TLVContainerIterator<'a>>,
    _type: PhantomData<fn() -> T>,
}

impl<'a, T: FromTLV<'a>> Iterator for TLVArrayIter<'a, T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.inner.as_mut()?.next()?;
        Some(T::from_tlv(&element))
    }
}
