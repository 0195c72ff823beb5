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
use byteorder::{LittleEndian, WriteBytesExt};

/// A growable output buffer with a hard ceiling.
///
/// Messages are built into a heap allocated `Vec` that only grows as far as
/// needed. The ceiling is the largest payload the protocol allows and every
/// append is checked against it, so an oversized message fails with
/// `NoSpace` instead of writing past its bounds.
#[derive(Debug, Clone)]
pub struct WriteBuf {
    buf: Vec<u8>,
    limit: usize,
    ceiling: usize,
}

impl WriteBuf {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            ceiling: limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.buf.len()
    }

    pub fn get_tail(&self) -> usize {
        self.buf.len()
    }

    pub fn rewind_tail_to(&mut self, new_end: usize) {
        self.buf.truncate(new_end);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Sets aside `with` bytes at the end of the buffer, typically for the
    /// closing bytes of containers that are still open
    pub fn shrink(&mut self, with: usize) -> Result<(), Error> {
        if self.buf.len() + with <= self.limit {
            self.limit -= with;
            Ok(())
        } else {
            Err(ErrorCode::NoSpace.into())
        }
    }

    /// Gives back bytes set aside by `shrink`
    pub fn expand(&mut self, by: usize) -> Result<(), Error> {
        if self.limit + by <= self.ceiling {
            self.limit += by;
            Ok(())
        } else {
            Err(ErrorCode::NoSpace.into())
        }
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.limit = self.ceiling;
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure(&self, size: usize) -> Result<(), Error> {
        if self.buf.len() + size <= self.limit {
            Ok(())
        } else {
            Err(ErrorCode::NoSpace.into())
        }
    }

    pub fn append(&mut self, src: &[u8]) -> Result<(), Error> {
        self.copy_from_slice(src)
    }

    pub fn copy_from_slice(&mut self, src: &[u8]) -> Result<(), Error> {
        self.ensure(src.len())?;
        self.buf.extend_from_slice(src);
        Ok(())
    }

    pub fn le_i8(&mut self, data: i8) -> Result<(), Error> {
        self.ensure(1)?;
        Ok(self.buf.write_i8(data)?)
    }

    pub fn le_u8(&mut self, data: u8) -> Result<(), Error> {
        self.ensure(1)?;
        Ok(self.buf.write_u8(data)?)
    }

    pub fn le_u16(&mut self, data: u16) -> Result<(), Error> {
        self.ensure(2)?;
        Ok(self.buf.write_u16::<LittleEndian>(data)?)
    }

    pub fn le_i16(&mut self, data: i16) -> Result<(), Error> {
        self.ensure(2)?;
        Ok(self.buf.write_i16::<LittleEndian>(data)?)
    }

    pub fn le_u32(&mut self, data: u32) -> Result<(), Error> {
        self.ensure(4)?;
        Ok(self.buf.write_u32::<LittleEndian>(data)?)
    }

    pub fn le_i32(&mut self, data: i32) -> Result<(), Error> {
        self.ensure(4)?;
        Ok(self.buf.write_i32::<LittleEndian>(data)?)
    }

    pub fn le_u64(&mut self, data: u64) -> Result<(), Error> {
        self.ensure(8)?;
        Ok(self.buf.write_u64::<LittleEndian>(data)?)
    }

    pub fn le_i64(&mut self, data: i64) -> Result<(), Error> {
        self.ensure(8)?;
        Ok(self.buf.write_i64::<LittleEndian>(data)?)
    }

    pub fn le_uint(&mut self, nbytes: usize, data: u64) -> Result<(), Error> {
        if nbytes == 0 {
            return Ok(());
        }
        self.ensure(nbytes)?;
        Ok(self.buf.write_uint::<LittleEndian>(data, nbytes)?)
    }
}
