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

use bitflags::bitflags;
use std::fmt;

use crate::{
    error::{Error, ErrorCode},
    tlv::{FromTLV, TLVElement, TLVWriter, TagType, ToTLV},
};

pub type EndptId = u16;
pub type GroupId = u16;
pub type ClusterId = u32;
pub type CommandId = u32;
pub type AttrId = u32;

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandPathFlags: u8 {
        const ENDPOINT_ID_VALID = 0x01;
        const GROUP_ID_VALID = 0x02;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttributePathFlags: u8 {
        const FIELD_ID_VALID = 0x01;
        const LIST_INDEX_VALID = 0x02;
    }
}

/// Target of one command invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPathParams {
    pub endpoint_id: EndptId,
    pub group_id: GroupId,
    pub cluster_id: ClusterId,
    pub command_id: CommandId,
    pub flags: CommandPathFlags,
}

#[derive(Debug, Clone, Copy)]
pub enum CommandPathTag {
    Endpoint = 0,
    Group = 1,
    Cluster = 2,
    Command = 3,
}

impl CommandPathParams {
    pub fn new(endpoint_id: EndptId, cluster_id: ClusterId, command_id: CommandId) -> Self {
        Self {
            endpoint_id,
            group_id: 0,
            cluster_id,
            command_id,
            flags: CommandPathFlags::ENDPOINT_ID_VALID,
        }
    }

    /// A path addressed to a group rather than a single endpoint
    pub fn new_group(group_id: GroupId, cluster_id: ClusterId, command_id: CommandId) -> Self {
        Self {
            endpoint_id: 0,
            group_id,
            cluster_id,
            command_id,
            flags: CommandPathFlags::GROUP_ID_VALID,
        }
    }

    /// `None` when the endpoint is a wildcard
    pub fn endpoint(&self) -> Option<EndptId> {
        self.flags
            .contains(CommandPathFlags::ENDPOINT_ID_VALID)
            .then_some(self.endpoint_id)
    }

    pub fn group(&self) -> Option<GroupId> {
        self.flags
            .contains(CommandPathFlags::GROUP_ID_VALID)
            .then_some(self.group_id)
    }

    pub fn is_wildcard(&self) -> bool {
        self.endpoint().is_none()
    }
}

impl fmt::Display for CommandPathParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint() {
            Some(e) => write!(f, "({}, ", e)?,
            None => write!(f, "(*, ")?,
        }
        write!(f, "{:#06x}, {:#04x})", self.cluster_id, self.command_id)
    }
}

impl<'a> FromTLV<'a> for CommandPathParams {
    fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
        t.confirm_list()?;
        let endpoint = Option::<u16>::from_tag(t, CommandPathTag::Endpoint as u8)?;
        let group = Option::<u16>::from_tag(t, CommandPathTag::Group as u8)?;

        let mut flags = CommandPathFlags::empty();
        flags.set(CommandPathFlags::ENDPOINT_ID_VALID, endpoint.is_some());
        flags.set(CommandPathFlags::GROUP_ID_VALID, group.is_some());

        Ok(Self {
            endpoint_id: endpoint.unwrap_or_default(),
            group_id: group.unwrap_or_default(),
            cluster_id: u32::from_tag(t, CommandPathTag::Cluster as u8)?,
            command_id: u32::from_tag(t, CommandPathTag::Command as u8)?,
            flags,
        })
    }
}

impl ToTLV for CommandPathParams {
    fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
        tw.start_list(tag_type)?;
        self.endpoint()
            .to_tlv(tw, TagType::Context(CommandPathTag::Endpoint as u8))?;
        self.group()
            .to_tlv(tw, TagType::Context(CommandPathTag::Group as u8))?;
        tw.u32(TagType::Context(CommandPathTag::Cluster as u8), self.cluster_id)?;
        tw.u32(TagType::Context(CommandPathTag::Command as u8), self.command_id)?;
        tw.end_container()
    }
}

/// Target of one attribute write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributePathParams {
    pub node_id: u64,
    pub endpoint_id: EndptId,
    pub cluster_id: ClusterId,
    pub field_id: AttrId,
    pub list_index: u16,
    pub flags: AttributePathFlags,
}

#[derive(Debug, Clone, Copy)]
pub enum AttributePathTag {
    Node = 1,
    Endpoint = 2,
    Cluster = 3,
    Attribute = 4,
    ListIndex = 5,
}

impl AttributePathParams {
    pub fn new(endpoint_id: EndptId, cluster_id: ClusterId, field_id: AttrId) -> Self {
        Self {
            endpoint_id,
            cluster_id,
            field_id,
            flags: AttributePathFlags::FIELD_ID_VALID,
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node_id: u64) -> Self {
        self.node_id = node_id;
        self
    }

    pub fn with_list_index(mut self, list_index: u16) -> Self {
        self.list_index = list_index;
        self.flags |= AttributePathFlags::LIST_INDEX_VALID;
        self
    }

    pub fn field(&self) -> Option<AttrId> {
        self.flags
            .contains(AttributePathFlags::FIELD_ID_VALID)
            .then_some(self.field_id)
    }

    pub fn list_index(&self) -> Option<u16> {
        self.flags
            .contains(AttributePathFlags::LIST_INDEX_VALID)
            .then_some(self.list_index)
    }

    /// Whether a path echoed back by a peer refers to the same attribute.
    /// The node id is not echoed by every implementation and is ignored.
    pub fn same_target(&self, other: &Self) -> bool {
        self.endpoint_id == other.endpoint_id
            && self.cluster_id == other.cluster_id
            && self.field() == other.field()
            && self.list_index() == other.list_index()
    }
}

impl fmt::Display for AttributePathParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:#06x}, ", self.endpoint_id, self.cluster_id)?;
        match self.field() {
            Some(a) => write!(f, "{:#06x})", a),
            None => write!(f, "*)"),
        }
    }
}

impl<'a> FromTLV<'a> for AttributePathParams {
    fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
        t.confirm_list()?;
        let field = Option::<u32>::from_tag(t, AttributePathTag::Attribute as u8)?;
        let list_index = Option::<u16>::from_tag(t, AttributePathTag::ListIndex as u8)?;

        let mut flags = AttributePathFlags::empty();
        flags.set(AttributePathFlags::FIELD_ID_VALID, field.is_some());
        flags.set(AttributePathFlags::LIST_INDEX_VALID, list_index.is_some());

        Ok(Self {
            node_id: Option::<u64>::from_tag(t, AttributePathTag::Node as u8)?.unwrap_or_default(),
            endpoint_id: u16::from_tag(t, AttributePathTag::Endpoint as u8)?,
            cluster_id: u32::from_tag(t, AttributePathTag::Cluster as u8)?,
            field_id: field.unwrap_or_default(),
            list_index: list_index.unwrap_or_default(),
            flags,
        })
    }
}

impl ToTLV for AttributePathParams {
    fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
        tw.start_list(tag_type)?;
        if self.node_id != 0 {
            tw.u64(TagType::Context(AttributePathTag::Node as u8), self.node_id)?;
        }
        tw.u16(TagType::Context(AttributePathTag::Endpoint as u8), self.endpoint_id)?;
        tw.u32(TagType::Context(AttributePathTag::Cluster as u8), self.cluster_id)?;
        self.field()
            .to_tlv(tw, TagType::Context(AttributePathTag::Attribute as u8))?;
        self.list_index()
            .to_tlv(tw, TagType::Context(AttributePathTag::ListIndex as u8))?;
        tw.end_container()
    }
}

/// Rejects paths that cannot address a single attribute
pub fn confirm_concrete(path: &AttributePathParams) -> Result<AttrId, Error> {
    path.field().ok_or_else(|| ErrorCode::AttributeNotFound.into())
}
