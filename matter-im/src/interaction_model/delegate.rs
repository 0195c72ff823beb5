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

use super::{
    core::GeneralCode,
    path::{AttributePathParams, ClusterId, CommandId, EndptId},
    status::StatusElement,
};
use crate::error::Error;

/// One status element of an Invoke-Response, as reported to the initiator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub general_code: GeneralCode,
    pub protocol_id: u32,
    pub protocol_code: u16,
    pub endpoint_id: EndptId,
    pub cluster_id: ClusterId,
    pub command_id: CommandId,
    /// Position of the element in the response
    pub index: u8,
}

/// Receives the outcome of initiator side interactions.
///
/// Each transaction ends with exactly one of `*_processed` or `*_error`.
/// Command senders are identified by their id, write clients by their
/// application identifier.
pub trait InteractionModelDelegate: Send + Sync {
    fn command_response_status(&self, _sender: u64, _status: &CommandStatus) -> Result<(), Error> {
        Ok(())
    }

    fn command_response_protocol_error(&self, _sender: u64, _index: u8) -> Result<(), Error> {
        Ok(())
    }

    fn command_response_error(&self, _sender: u64, _error: &Error) -> Result<(), Error> {
        Ok(())
    }

    fn command_response_processed(&self, _sender: u64) -> Result<(), Error> {
        Ok(())
    }

    fn write_response_status(
        &self,
        _app_identifier: u64,
        _status: &StatusElement,
        _path: &AttributePathParams,
        _index: u8,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn write_response_protocol_error(&self, _app_identifier: u64, _index: u8) -> Result<(), Error> {
        Ok(())
    }

    fn write_response_error(&self, _app_identifier: u64, _error: &Error) -> Result<(), Error> {
        Ok(())
    }

    fn write_response_processed(&self, _app_identifier: u64) -> Result<(), Error> {
        Ok(())
    }
}

/// A delegate that ignores everything
#[derive(Debug, Default)]
pub struct NoopDelegate;

impl InteractionModelDelegate for NoopDelegate {}
