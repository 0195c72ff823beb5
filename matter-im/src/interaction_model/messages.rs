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

//! Parsed forms of the interaction model messages this crate exchanges.
//!
//! Request and response elements borrow from the received buffer; command
//! fields and attribute data stay as raw [`TLVElement`]s until the
//! dispatcher decodes them against a schema.

pub mod ib {
    use crate::{
        error::Error,
        interaction_model::{
            path::{AttributePathParams, CommandPathParams},
            status::StatusElement,
        },
        tlv::{FromTLV, TLVElement, TLVWriter, TagType, ToTLV},
    };

    /// CommandDataIB
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct CmdData<'a> {
        pub path: CommandPathParams,
        pub data: Option<TLVElement<'a>>,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum CmdDataTag {
        Path = 0,
        Data = 1,
    }

    impl<'a> FromTLV<'a> for CmdData<'a> {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                path: CommandPathParams::from_tag(t, CmdDataTag::Path as u8)?,
                data: Option::<TLVElement>::from_tag(t, CmdDataTag::Data as u8)?,
            })
        }
    }

    /// CommandStatusIB
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CmdStatus {
        pub path: CommandPathParams,
        pub status: StatusElement,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum CmdStatusTag {
        Path = 0,
        Status = 1,
    }

    impl CmdStatus {
        pub fn new(path: CommandPathParams, status: StatusElement) -> Self {
            Self { path, status }
        }
    }

    impl<'a> FromTLV<'a> for CmdStatus {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                path: CommandPathParams::from_tag(t, CmdStatusTag::Path as u8)?,
                status: StatusElement::from_tag(t, CmdStatusTag::Status as u8)?,
            })
        }
    }

    impl ToTLV for CmdStatus {
        fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
            tw.start_struct(tag_type)?;
            self.path
                .to_tlv(tw, TagType::Context(CmdStatusTag::Path as u8))?;
            self.status
                .to_tlv(tw, TagType::Context(CmdStatusTag::Status as u8))?;
            tw.end_container()
        }
    }

    /// InvokeResponseIB
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum InvResp<'a> {
        Cmd(CmdData<'a>),
        Status(CmdStatus),
    }

    #[derive(Debug, Clone, Copy)]
    pub enum InvRespTag {
        Cmd = 0,
        Status = 1,
    }

    impl<'a> FromTLV<'a> for InvResp<'a> {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            match Option::<CmdData>::from_tag(t, InvRespTag::Cmd as u8)? {
                Some(cmd) => Ok(InvResp::Cmd(cmd)),
                None => Ok(InvResp::Status(CmdStatus::from_tag(
                    t,
                    InvRespTag::Status as u8,
                )?)),
            }
        }
    }

    impl<'a> From<CmdStatus> for InvResp<'a> {
        fn from(value: CmdStatus) -> Self {
            InvResp::Status(value)
        }
    }

    /// AttributeDataIB
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct AttrData<'a> {
        pub data_ver: Option<u32>,
        pub path: AttributePathParams,
        pub data: TLVElement<'a>,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum AttrDataTag {
        DataVer = 0,
        Path = 1,
        Data = 2,
    }

    impl<'a> FromTLV<'a> for AttrData<'a> {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                data_ver: Option::<u32>::from_tag(t, AttrDataTag::DataVer as u8)?,
                path: AttributePathParams::from_tag(t, AttrDataTag::Path as u8)?,
                data: TLVElement::from_tag(t, AttrDataTag::Data as u8)?,
            })
        }
    }

    /// AttributeStatusIB
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttrStatus {
        pub path: AttributePathParams,
        pub status: StatusElement,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum AttrStatusTag {
        Path = 0,
        Status = 1,
    }

    impl AttrStatus {
        pub fn new(path: AttributePathParams, status: StatusElement) -> Self {
            Self { path, status }
        }
    }

    impl<'a> FromTLV<'a> for AttrStatus {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                path: AttributePathParams::from_tag(t, AttrStatusTag::Path as u8)?,
                status: StatusElement::from_tag(t, AttrStatusTag::Status as u8)?,
            })
        }
    }

    impl ToTLV for AttrStatus {
        fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
            tw.start_struct(tag_type)?;
            self.path
                .to_tlv(tw, TagType::Context(AttrStatusTag::Path as u8))?;
            self.status
                .to_tlv(tw, TagType::Context(AttrStatusTag::Status as u8))?;
            tw.end_container()
        }
    }
}

pub mod msg {
    use crate::{
        error::Error,
        interaction_model::core::IMStatusCode,
        tlv::{FromTLV, TLVArray, TLVElement, TLVWriter, TagType, ToTLV},
    };

    use super::ib::{AttrData, AttrStatus, CmdData, InvResp};

    #[derive(Debug, Clone, Copy)]
    pub struct InvReq<'a> {
        pub suppress_response: bool,
        pub timed_request: bool,
        pub inv_requests: Option<TLVArray<'a, CmdData<'a>>>,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum InvReqTag {
        SupressResponse = 0,
        TimedReq = 1,
        InvokeRequests = 2,
    }

    impl<'a> FromTLV<'a> for InvReq<'a> {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                suppress_response: Option::<bool>::from_tag(t, InvReqTag::SupressResponse as u8)?
                    .unwrap_or(false),
                timed_request: Option::<bool>::from_tag(t, InvReqTag::TimedReq as u8)?
                    .unwrap_or(false),
                inv_requests: Option::<TLVArray<CmdData>>::from_tag(
                    t,
                    InvReqTag::InvokeRequests as u8,
                )?,
            })
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct InvRespMsg<'a> {
        pub suppress_response: bool,
        pub inv_responses: Option<TLVArray<'a, InvResp<'a>>>,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum InvRespTag {
        SupressResponse = 0,
        InvokeResponses = 1,
    }

    impl<'a> FromTLV<'a> for InvRespMsg<'a> {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                suppress_response: Option::<bool>::from_tag(t, InvRespTag::SupressResponse as u8)?
                    .unwrap_or(false),
                inv_responses: Option::<TLVArray<InvResp>>::from_tag(
                    t,
                    InvRespTag::InvokeResponses as u8,
                )?,
            })
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct WriteReq<'a> {
        pub suppress_response: bool,
        pub timed_request: bool,
        pub write_requests: TLVArray<'a, AttrData<'a>>,
        pub more_chunked: bool,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum WriteReqTag {
        SuppressResponse = 0,
        TimedRequest = 1,
        WriteRequests = 2,
        MoreChunked = 3,
    }

    impl<'a> FromTLV<'a> for WriteReq<'a> {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                suppress_response: Option::<bool>::from_tag(t, WriteReqTag::SuppressResponse as u8)?
                    .unwrap_or(false),
                timed_request: Option::<bool>::from_tag(t, WriteReqTag::TimedRequest as u8)?
                    .unwrap_or(false),
                write_requests: TLVArray::from_tag(t, WriteReqTag::WriteRequests as u8)?,
                more_chunked: Option::<bool>::from_tag(t, WriteReqTag::MoreChunked as u8)?
                    .unwrap_or(false),
            })
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct WriteResp<'a> {
        pub write_responses: TLVArray<'a, AttrStatus>,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum WriteRespTag {
        WriteResponses = 0,
    }

    impl<'a> FromTLV<'a> for WriteResp<'a> {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                write_responses: TLVArray::from_tag(t, WriteRespTag::WriteResponses as u8)?,
            })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusResp {
        pub status: IMStatusCode,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum StatusRespTag {
        Status = 0,
    }

    impl<'a> FromTLV<'a> for StatusResp {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                status: IMStatusCode::from_tag(t, StatusRespTag::Status as u8)?,
            })
        }
    }

    impl ToTLV for StatusResp {
        fn to_tlv(&self, tw: &mut TLVWriter, tag_type: TagType) -> Result<(), Error> {
            tw.start_struct(tag_type)?;
            self.status
                .to_tlv(tw, TagType::Context(StatusRespTag::Status as u8))?;
            tw.end_container()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimedReq {
        pub timeout: u16,
    }

    impl<'a> FromTLV<'a> for TimedReq {
        fn from_tlv(t: &TLVElement<'a>) -> Result<Self, Error> {
            t.confirm_struct()?;
            Ok(Self {
                timeout: u16::from_tag(t, 0)?,
            })
        }
    }
}
