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

use crate::error::*;
use byteorder::{ByteOrder, LittleEndian};

/// A bounds-checked cursor over a received byte slice
pub struct ParseBuf<'a> {
    buf: &'a [u8],
    read_off: usize,
}

impl<'a> ParseBuf<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, read_off: 0 }
    }

    pub fn left(&self) -> usize {
        self.buf.len() - self.read_off
    }

    // Return the unparsed data, consume self
    pub fn into_slice(self) -> &'a [u8] {
        &self.buf[self.read_off..]
    }

    pub fn as_slice(&self) -> &'a [u8] {
        &self.buf[self.read_off..]
    }

    pub fn parsed_as_slice(&self) -> &'a [u8] {
        &self.buf[..self.read_off]
    }

    /// Consume `size` bytes from the head
    pub fn take(&mut self, size: usize) -> Result<&'a [u8], Error> {
        if size <= self.left() {
            let head = &self.buf[self.read_off..self.read_off + size];
            self.read_off += size;
            Ok(head)
        } else {
            Err(ErrorCode::TruncatedPacket.into())
        }
    }

    pub fn le_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn le_u16(&mut self) -> Result<u16, Error> {
        self.take(2).map(LittleEndian::read_u16)
    }

    pub fn le_i16(&mut self) -> Result<i16, Error> {
        self.take(2).map(LittleEndian::read_i16)
    }

    pub fn le_u32(&mut self) -> Result<u32, Error> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub fn le_u64(&mut self) -> Result<u64, Error> {
        self.take(8).map(LittleEndian::read_u64)
    }
}
