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

use crate::{
    error::{Error, ErrorCode},
    tlv::{FromTLV, TLVElement, TLVWriter, TagType, ToTLV},
};
use num_derive::FromPrimitive;

/* Interaction Model protocol ID */
pub const PROTO_ID_INTERACTION_MODEL: u16 = 0x01;
pub const PROTO_ID_SECURE_CHANNEL: u16 = 0x00;

#[macro_export]
macro_rules! cmd_enter {
    ($e:expr) => {{
        use colored::Colorize;
        log::info! {"{} {}", "Handling Command".cyan(), $e.cyan()}
    }};
}

#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IMStatusCode {
    Success = 0,
    Failure = 1,
    InvalidSubscription = 0x7D,
    UnsupportedAccess = 0x7E,
    UnsupportedEndpoint = 0x7F,
    InvalidAction = 0x80,
    UnsupportedCommand = 0x81,
    InvalidCommand = 0x85,
    UnsupportedAttribute = 0x86,
    ConstraintError = 0x87,
    UnsupportedWrite = 0x88,
    ResourceExhausted = 0x89,
    NotFound = 0x8b,
    InvalidDataType = 0x8d,
    Timeout = 0x94,
    Busy = 0x9c,
    UnsupportedCluster = 0xc3,
    TimedRequestMisMatch = 0xc9,
}

impl From<ErrorCode> for IMStatusCode {
    fn from(e: ErrorCode) -> Self {
        match e {
            ErrorCode::EndpointNotFound => IMStatusCode::UnsupportedEndpoint,
            ErrorCode::ClusterNotFound => IMStatusCode::UnsupportedCluster,
            ErrorCode::AttributeNotFound => IMStatusCode::UnsupportedAttribute,
            ErrorCode::CommandNotFound => IMStatusCode::UnsupportedCommand,
            ErrorCode::InvalidCommand => IMStatusCode::InvalidCommand,
            ErrorCode::ConstraintError => IMStatusCode::ConstraintError,
            ErrorCode::Busy => IMStatusCode::Busy,
            ErrorCode::NotFound => IMStatusCode::NotFound,
            ErrorCode::Timeout => IMStatusCode::Timeout,
            ErrorCode::ResourceExhausted | ErrorCode::NoSpace | ErrorCode::NoMemory => {
                IMStatusCode::ResourceExhausted
            }
            ErrorCode::InvalidOpcode => IMStatusCode::InvalidAction,
            _ => IMStatusCode::Failure,
        }
    }
}

impl From<&Error> for IMStatusCode {
    fn from(e: &Error) -> Self {
        e.code().into()
    }
}

impl From<Error> for IMStatusCode {
    fn from(e: Error) -> Self {
        (&e).into()
    }
}

impl IMStatusCode {
    /// The local error a peer's failure status stands for
    pub fn to_error(self) -> Error {
        let code = match self {
            IMStatusCode::Success => ErrorCode::InvalidResponse,
            IMStatusCode::UnsupportedEndpoint => ErrorCode::EndpointNotFound,
            IMStatusCode::UnsupportedCluster => ErrorCode::ClusterNotFound,
            IMStatusCode::UnsupportedAttribute => ErrorCode::AttributeNotFound,
            IMStatusCode::UnsupportedCommand => ErrorCode::CommandNotFound,
            IMStatusCode::InvalidCommand => ErrorCode::InvalidCommand,
            IMStatusCode::ConstraintError => ErrorCode::ConstraintError,
            IMStatusCode::ResourceExhausted => ErrorCode::ResourceExhausted,
            IMStatusCode::NotFound => ErrorCode::NotFound,
            IMStatusCode::Timeout => ErrorCode::Timeout,
            IMStatusCode::Busy => ErrorCode::Busy,
            _ => ErrorCode::Invalid,
        };
        code.into()
    }
}

impl FromTLV<'_> for IMStatusCode {
    fn from_tlv(t: &TLVElement) -> Result<Self, Error> {
        num::FromPrimitive::from_u16(t.u16()?).ok_or_else(|| ErrorCode::Invalid.into())
    }
}

impl ToTLV for IMStatusCode {
    fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
        tw.u16(tag_type, *self as u16)
    }
}

/// Secure channel general status codes
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralCode {
    Success = 0,
    Failure = 1,
    BadPrecondition = 2,
    OutOfRange = 3,
    BadRequest = 4,
    Unsupported = 5,
    Unexpected = 6,
    ResourceExhausted = 7,
    Busy = 8,
    Timeout = 9,
    Continue = 10,
    Aborted = 11,
    InvalidArgument = 12,
    NotFound = 13,
    AlreadyExists = 14,
    PermissionDenied = 15,
    DataLoss = 16,
}

impl FromTLV<'_> for GeneralCode {
    fn from_tlv(t: &TLVElement) -> Result<Self, Error> {
        num::FromPrimitive::from_u16(t.u16()?).ok_or_else(|| ErrorCode::Invalid.into())
    }
}

impl ToTLV for GeneralCode {
    fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
        tw.u16(tag_type, *self as u16)
    }
}

#[derive(FromPrimitive, Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    Reserved = 0,
    StatusResponse = 1,
    ReadRequest = 2,
    SubscribeRequest = 3,
    SubscribeResponse = 4,
    ReportData = 5,
    WriteRequest = 6,
    WriteResponse = 7,
    InvokeRequest = 8,
    InvokeResponse = 9,
    TimedRequest = 10,
}

impl OpCode {
    pub fn from_u8(opcode: u8) -> Result<Self, Error> {
        num::FromPrimitive::from_u8(opcode).ok_or_else(|| ErrorCode::InvalidOpcode.into())
    }
}
