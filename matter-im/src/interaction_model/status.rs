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

use std::fmt;

use num_derive::FromPrimitive;

use super::core::{GeneralCode, PROTO_ID_INTERACTION_MODEL};
use crate::{
    error::{Error, ErrorCode},
    tlv::{FromTLV, TLVElement, TLVWriter, TagType, ToTLV},
};

/// Cluster level status returned for every command and attribute write
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZclStatus {
    Success = 0x00,
    Failure = 0x01,
    MalformedCommand = 0x80,
    UnsupCommand = 0x81,
    UnsupGeneralCommand = 0x82,
    UnsupManufClusterCommand = 0x83,
    UnsupManufGeneralCommand = 0x84,
    InvalidField = 0x85,
    UnsupportedAttribute = 0x86,
    InvalidValue = 0x87,
    ReadOnly = 0x88,
    InsufficientSpace = 0x89,
    UnsupportedCluster = 0xC3,
}

impl ZclStatus {
    /// Alias used when a response runs out of room
    pub const NO_MEMORY: ZclStatus = ZclStatus::InsufficientSpace;

    pub fn from_u16(code: u16) -> Option<Self> {
        num::FromPrimitive::from_u16(code)
    }

    pub fn is_success(&self) -> bool {
        *self == ZclStatus::Success
    }

    /// Status of a dispatched command, from whether a handler took it, whether
    /// the target cluster exists and whether it is manufacturer specific
    pub fn for_dispatch(handled: bool, cluster_exists: bool, mfg_specific: bool) -> Self {
        if handled {
            ZclStatus::Success
        } else if mfg_specific {
            ZclStatus::UnsupManufClusterCommand
        } else if cluster_exists {
            ZclStatus::UnsupCommand
        } else {
            ZclStatus::UnsupportedCluster
        }
    }
}

impl From<ErrorCode> for ZclStatus {
    fn from(e: ErrorCode) -> Self {
        match e {
            ErrorCode::ClusterNotFound => ZclStatus::UnsupportedCluster,
            ErrorCode::CommandNotFound => ZclStatus::UnsupCommand,
            ErrorCode::AttributeNotFound => ZclStatus::UnsupportedAttribute,
            ErrorCode::ConstraintError => ZclStatus::InvalidValue,
            ErrorCode::InvalidArgument => ZclStatus::InvalidField,
            ErrorCode::NoSpace | ErrorCode::NoMemory | ErrorCode::ResourceExhausted => {
                ZclStatus::NO_MEMORY
            }
            code if Error::new(code).is_decode_failure() => ZclStatus::MalformedCommand,
            _ => ZclStatus::Failure,
        }
    }
}

impl From<&Error> for ZclStatus {
    fn from(e: &Error) -> Self {
        e.code().into()
    }
}

impl fmt::Display for ZclStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#04x})", self, *self as u8)
    }
}

/// The (general code, protocol id, protocol code) triple carried by a StatusIB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusElement {
    pub general_code: GeneralCode,
    pub protocol_id: u32,
    pub protocol_code: u16,
}

#[derive(Debug, Clone, Copy)]
pub enum StatusTag {
    GeneralCode = 0,
    ProtocolId = 1,
    ProtocolCode = 2,
}

impl StatusElement {
    pub fn new(general_code: GeneralCode, protocol_id: u32, protocol_code: u16) -> Self {
        Self {
            general_code,
            protocol_id,
            protocol_code,
        }
    }

    /// A status in the interaction model protocol carrying a cluster status
    pub fn from_zcl(status: ZclStatus) -> Self {
        let general_code = if status.is_success() {
            GeneralCode::Success
        } else {
            GeneralCode::Failure
        };
        Self::new(
            general_code,
            PROTO_ID_INTERACTION_MODEL as u32,
            status as u16,
        )
    }

    /// The cluster status, if this is an interaction model status
    pub fn zcl_status(&self) -> Option<ZclStatus> {
        if self.protocol_id == PROTO_ID_INTERACTION_MODEL as u32 {
            ZclStatus::from_u16(self.protocol_code)
        } else {
            None
        }
    }

    pub fn is_success(&self) -> bool {
        self.general_code == GeneralCode::Success
    }
}

impl From<ZclStatus> for StatusElement {
    fn from(status: ZclStatus) -> Self {
        Self::from_zcl(status)
    }
}

impl<'a> FromTLV<'a> for StatusElement {
    fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
        t.confirm_struct()?;
        Ok(Self {
            general_code: GeneralCode::from_tag(t, StatusTag::GeneralCode as u8)?,
            protocol_id: u32::from_tag(t, StatusTag::ProtocolId as u8)?,
            protocol_code: u16::from_tag(t, StatusTag::ProtocolCode as u8)?,
        })
    }
}

impl ToTLV for StatusElement {
    fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
        tw.start_struct(tag_type)?;
        self.general_code
            .to_tlv(tw, TagType::Context(StatusTag::GeneralCode as u8))?;
        tw.u32(TagType::Context(StatusTag::ProtocolId as u8), self.protocol_id)?;
        tw.u16(
            TagType::Context(StatusTag::ProtocolCode as u8),
            self.protocol_code,
        )?;
        tw.end_container()
    }
}
