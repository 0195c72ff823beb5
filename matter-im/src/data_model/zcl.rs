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

//! Legacy ZCL framing: a short header in front of sequentially encoded
//! command fields.

use bitflags::bitflags;

use super::dispatcher::Direction;
use crate::{
    error::Error,
    interaction_model::path::{ClusterId, EndptId},
    utils::{parsebuf::ParseBuf, writebuf::WriteBuf},
};

/// Protocol carrying legacy ZCL frames
pub const PROTO_ID_LEGACY_ZCL: u16 = 0x0005;
/// The only message type of the legacy protocol
pub const OPCODE_ZCL_FRAME: u8 = 0x00;

/// Where a legacy frame is going: endpoint (u16) and cluster (u32), both
/// little-endian, ahead of the ZCL header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZclAddress {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
}

impl ZclAddress {
    pub fn new(endpoint: EndptId, cluster: ClusterId) -> Self {
        Self { endpoint, cluster }
    }

    /// Splits a message into its address and the ZCL frame
    pub fn parse(msg: &[u8]) -> Result<(Self, &[u8]), Error> {
        let mut pb = ParseBuf::new(msg);
        let endpoint = pb.le_u16()?;
        let cluster = pb.le_u32()?;
        Ok((Self { endpoint, cluster }, pb.into_slice()))
    }

    pub fn write(&self, wb: &mut WriteBuf) -> Result<(), Error> {
        wb.le_u16(self.endpoint)?;
        wb.le_u32(self.cluster)
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameControl: u8 {
        const CLUSTER_SPECIFIC = 0x01;
        const MANUFACTURER_SPECIFIC = 0x04;
        const SERVER_TO_CLIENT = 0x08;
        const DISABLE_DEFAULT_RESPONSE = 0x10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZclHeader {
    pub frame_control: FrameControl,
    pub mfg_code: Option<u16>,
    pub seq: u8,
    pub command: u8,
}

impl ZclHeader {
    /// Header of a cluster specific command
    pub fn cluster_command(
        direction: Direction,
        seq: u8,
        command: u8,
        mfg_code: Option<u16>,
    ) -> Self {
        let mut frame_control = FrameControl::CLUSTER_SPECIFIC;
        frame_control.set(
            FrameControl::SERVER_TO_CLIENT,
            direction == Direction::ServerToClient,
        );
        frame_control.set(FrameControl::MANUFACTURER_SPECIFIC, mfg_code.is_some());
        Self {
            frame_control,
            mfg_code,
            seq,
            command,
        }
    }

    /// Splits a frame into its header and the command payload
    pub fn parse(frame: &[u8]) -> Result<(Self, &[u8]), Error> {
        let mut pb = ParseBuf::new(frame);
        let frame_control = FrameControl::from_bits_retain(pb.le_u8()?);
        let mfg_code = if frame_control.contains(FrameControl::MANUFACTURER_SPECIFIC) {
            Some(pb.le_u16()?)
        } else {
            None
        };
        let seq = pb.le_u8()?;
        let command = pb.le_u8()?;

        Ok((
            Self {
                frame_control,
                mfg_code,
                seq,
                command,
            },
            pb.into_slice(),
        ))
    }

    pub fn write(&self, wb: &mut WriteBuf) -> Result<(), Error> {
        let mut frame_control = self.frame_control;
        frame_control.set(FrameControl::MANUFACTURER_SPECIFIC, self.mfg_code.is_some());
        wb.le_u8(frame_control.bits())?;
        if let Some(code) = self.mfg_code {
            wb.le_u16(code)?;
        }
        wb.le_u8(self.seq)?;
        wb.le_u8(self.command)
    }

    pub fn direction(&self) -> Direction {
        if self.frame_control.contains(FrameControl::SERVER_TO_CLIENT) {
            Direction::ServerToClient
        } else {
            Direction::ClientToServer
        }
    }

    pub fn is_cluster_specific(&self) -> bool {
        self.frame_control.contains(FrameControl::CLUSTER_SPECIFIC)
    }
}
