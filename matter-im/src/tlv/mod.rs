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

//! Matter TLV (Tag-Length-Value) encoding.
//!
//! A TLV element starts with a control octet: the upper three bits select
//! the tag form and the lower five bits the element type. All multi-byte
//! quantities are little-endian.

mod parser;
mod traits;
mod writer;

pub use parser::*;
pub use traits::*;
pub use writer::*;

/* Tag Types */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagType {
    Anonymous,
    Context(u8),
    CommonPrf16(u16),
    CommonPrf32(u32),
    ImplPrf16(u16),
    ImplPrf32(u32),
    FullQual48(u64),
    FullQual64(u64),
}

pub const TAG_SHIFT_BITS: u8 = 5;
pub const TAG_MASK: u8 = 0xe0;
pub const TYPE_MASK: u8 = 0x1f;

// Size of the tag field, indexed by the tag control bits
pub static TAG_SIZE_MAP: [usize; 8] = [0, 1, 2, 4, 2, 4, 6, 8];
