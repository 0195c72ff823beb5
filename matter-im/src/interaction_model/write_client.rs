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

use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info, warn};

use super::{
    core::{OpCode, PROTO_ID_INTERACTION_MODEL},
    delegate::InteractionModelDelegate,
    messages::{
        ib::AttrDataTag,
        msg::{StatusResp, WriteReqTag, WriteResp},
    },
    path::AttributePathParams,
};
use crate::{
    error::{Error, ErrorCode},
    tlv::{get_root_node_struct, print_tlv_list, FromTLV, TLVWriter, TagType, ToTLV},
    transport::exchange::{ExchangeContext, ANY_NODE_ID},
    utils::writebuf::WriteBuf,
};

// End of the attribute list, the more-chunked flag, end of the request
const REQUEST_CLOSING_RESERVE: usize = 4;
// End of the attribute data element
const ATTRIBUTE_CLOSING_RESERVE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteClientState {
    Uninitialized,
    Initialized,
    AddAttribute,
    AwaitingResponse,
}

pub struct WriteClient {
    state: WriteClientState,
    app_identifier: u64,
    wb: WriteBuf,
    // Paths of the finished attributes, in the order they were written
    paths: Vec<AttributePathParams>,
    attribute_open: bool,
    // Where the open attribute starts, and whether it also opened the request
    attribute_start: Option<(usize, bool)>,
    finalized: bool,
    exchange: Option<Arc<dyn ExchangeContext>>,
    delegate: Option<Arc<dyn InteractionModelDelegate>>,
}

impl WriteClient {
    pub fn new() -> Self {
        Self {
            state: WriteClientState::Uninitialized,
            app_identifier: 0,
            wb: WriteBuf::new(0),
            paths: Vec::new(),
            attribute_open: false,
            attribute_start: None,
            finalized: false,
            exchange: None,
            delegate: None,
        }
    }

    pub fn init(
        &mut self,
        delegate: Arc<dyn InteractionModelDelegate>,
        max_payload: usize,
    ) -> Result<(), Error> {
        if self.state != WriteClientState::Uninitialized {
            return Err(ErrorCode::InvalidState.into());
        }
        self.wb = WriteBuf::new(max_payload);
        self.paths.clear();
        self.attribute_open = false;
        self.attribute_start = None;
        self.finalized = false;
        self.delegate = Some(delegate);
        self.state = WriteClientState::Initialized;
        Ok(())
    }

    pub fn state(&self) -> WriteClientState {
        self.state
    }

    pub fn state_str(&self) -> &'static str {
        match self.state {
            WriteClientState::Uninitialized => "Uninitialized",
            WriteClientState::Initialized => "Initialized",
            WriteClientState::AddAttribute => "AddAttribute",
            WriteClientState::AwaitingResponse => "AwaitingResponse",
        }
    }

    pub fn is_free(&self) -> bool {
        self.state == WriteClientState::Uninitialized
    }

    pub fn app_identifier(&self) -> u64 {
        self.app_identifier
    }

    pub fn set_app_identifier(&mut self, app_identifier: u64) {
        self.app_identifier = app_identifier;
    }

    /// Node id of the peer the request went to
    pub fn source_node_id(&self) -> u64 {
        self.exchange
            .as_ref()
            .map(|e| e.peer_node_id())
            .unwrap_or(ANY_NODE_ID)
    }

    pub fn exchange_id(&self) -> Option<u16> {
        self.exchange.as_ref().map(|e| e.id())
    }

    /// Number of attributes finished so far
    pub fn attribute_count(&self) -> usize {
        self.paths.len()
    }

    /// Opens an attribute data element addressed to `path`. Nothing is left
    /// in the request if this fails.
    pub fn prepare_attribute(&mut self, path: &AttributePathParams) -> Result<(), Error> {
        if self.attribute_open
            || self.finalized
            || !matches!(
                self.state,
                WriteClientState::Initialized | WriteClientState::AddAttribute
            )
        {
            return Err(ErrorCode::InvalidState.into());
        }
        if self.paths.len() >= u8::MAX as usize {
            return Err(ErrorCode::ResourceExhausted.into());
        }

        let opens_request = self.state == WriteClientState::Initialized;
        let reserve = if opens_request {
            ATTRIBUTE_CLOSING_RESERVE + REQUEST_CLOSING_RESERVE
        } else {
            ATTRIBUTE_CLOSING_RESERVE
        };
        let anchor = self.wb.get_tail();
        let written = self
            .write_attribute_header(path, opens_request)
            .and_then(|_| self.wb.shrink(reserve));
        if let Err(e) = written {
            self.wb.rewind_tail_to(anchor);
            return Err(e);
        }

        self.attribute_start = Some((anchor, opens_request));
        self.state = WriteClientState::AddAttribute;
        self.paths.push(*path);
        self.attribute_open = true;
        Ok(())
    }

    fn write_attribute_header(
        &mut self,
        path: &AttributePathParams,
        opens_request: bool,
    ) -> Result<(), Error> {
        let mut tw = TLVWriter::new(&mut self.wb);
        if opens_request {
            tw.start_struct(TagType::Anonymous)?;
            tw.bool(TagType::Context(WriteReqTag::SuppressResponse as u8), false)?;
            tw.bool(TagType::Context(WriteReqTag::TimedRequest as u8), false)?;
            tw.start_array(TagType::Context(WriteReqTag::WriteRequests as u8))?;
        }
        tw.start_struct(TagType::Anonymous)?;
        path.to_tlv(&mut tw, TagType::Context(AttrDataTag::Path as u8))
    }

    /// Writer positioned inside the open attribute data element. The value
    /// must be written with the `AttrDataTag::Data` context tag.
    pub fn attribute_data_writer(&mut self) -> Result<TLVWriter<'_>, Error> {
        if !self.attribute_open {
            return Err(ErrorCode::InvalidState.into());
        }
        Ok(TLVWriter::new(&mut self.wb))
    }

    pub fn put_attribute_value<T: ToTLV + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let mut tw = self.attribute_data_writer()?;
        value.to_tlv(&mut tw, TagType::Context(AttrDataTag::Data as u8))
    }

    pub fn finish_attribute(&mut self) -> Result<(), Error> {
        if !self.attribute_open {
            return Err(ErrorCode::InvalidState.into());
        }
        self.wb.expand(ATTRIBUTE_CLOSING_RESERVE)?;
        TLVWriter::new(&mut self.wb).end_container()?;
        self.attribute_open = false;
        self.attribute_start = None;
        Ok(())
    }

    /// Drops the open attribute, value included, as if it was never prepared
    pub fn cancel_attribute(&mut self) -> Result<(), Error> {
        let (anchor, opened_request) = self.attribute_start.take().ok_or(ErrorCode::InvalidState)?;
        self.wb.rewind_tail_to(anchor);
        if opened_request {
            self.wb.expand(ATTRIBUTE_CLOSING_RESERVE + REQUEST_CLOSING_RESERVE)?;
            self.state = WriteClientState::Initialized;
        } else {
            self.wb.expand(ATTRIBUTE_CLOSING_RESERVE)?;
        }
        self.paths.pop();
        self.attribute_open = false;
        Ok(())
    }

    /// Closes the attribute list. Nothing can be added afterwards.
    pub fn finalize_message(&mut self) -> Result<(), Error> {
        if self.attribute_open || self.finalized || self.state != WriteClientState::AddAttribute {
            return Err(ErrorCode::InvalidState.into());
        }
        self.wb.expand(REQUEST_CLOSING_RESERVE)?;
        let mut tw = TLVWriter::new(&mut self.wb);
        tw.end_container()?;
        tw.bool(TagType::Context(WriteReqTag::MoreChunked as u8), false)?;
        tw.end_container()?;
        self.finalized = true;
        Ok(())
    }

    pub fn send_write_request(&mut self, exchange: Arc<dyn ExchangeContext>) -> Result<(), Error> {
        if self.attribute_open || self.state != WriteClientState::AddAttribute {
            return Err(ErrorCode::InvalidState.into());
        }

        let sent = if self.finalized {
            Ok(())
        } else {
            self.finalize_message()
        }
        .and_then(|_| {
            exchange.send_message(
                PROTO_ID_INTERACTION_MODEL,
                OpCode::WriteRequest as u8,
                self.wb.as_slice().to_vec(),
            )
        });

        match sent {
            Ok(()) => {
                info!(
                    "Write client {} sent {} attributes on exchange {}",
                    self.app_identifier,
                    self.paths.len(),
                    exchange.id()
                );
                self.exchange = Some(exchange);
                self.state = WriteClientState::AwaitingResponse;
                Ok(())
            }
            Err(e) => {
                error!("Write client {} failed to send: {}", self.app_identifier, e);
                exchange.close();
                self.shutdown();
                Err(e)
            }
        }
    }

    /// Processes the peer's answer. The delegate sees either the statuses
    /// followed by `write_response_processed`, or one `write_response_error`.
    pub fn on_message_received(&mut self, opcode: u8, payload: &[u8]) -> Result<(), Error> {
        self.complete()?.on_message_received(opcode, payload)
    }

    pub fn on_response_timeout(&mut self) -> Result<(), Error> {
        if self.state != WriteClientState::AwaitingResponse {
            return Ok(());
        }
        self.complete()?.on_response_timeout()
    }

    /// Ends the wait for a response and makes the client reusable. The
    /// outcome is reported through the returned completion, outside of
    /// whatever lock guards the client.
    pub fn complete(&mut self) -> Result<WriteCompletion, Error> {
        if self.state != WriteClientState::AwaitingResponse {
            return Err(ErrorCode::InvalidState.into());
        }
        let delegate = self.delegate.clone().ok_or(ErrorCode::InvalidState)?;
        let completion = WriteCompletion {
            app_identifier: self.app_identifier,
            delegate,
            paths: std::mem::take(&mut self.paths),
        };
        self.shutdown();
        Ok(completion)
    }

    /// Abandons whatever is in progress and makes the client reusable
    pub fn shutdown(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.close();
        }
        self.wb.reset();
        self.paths.clear();
        self.attribute_open = false;
        self.attribute_start = None;
        self.finalized = false;
        self.delegate = None;
        self.app_identifier = 0;
        self.state = WriteClientState::Uninitialized;
    }
}

impl Default for WriteClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive ownership of a pooled write client between allocation and
/// sending. Dropping the handle without sending releases the client.
pub struct WriteClientHandle {
    client: Option<Arc<Mutex<WriteClient>>>,
}

impl WriteClientHandle {
    pub fn new(client: Arc<Mutex<WriteClient>>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Access to the client for building the request
    pub fn lock(&self) -> Result<MutexGuard<'_, WriteClient>, Error> {
        let client = self.client.as_ref().ok_or(ErrorCode::InvalidState)?;
        Ok(client.lock()?)
    }

    pub fn put_attribute<T: ToTLV + ?Sized>(
        &self,
        path: &AttributePathParams,
        value: &T,
    ) -> Result<(), Error> {
        let mut client = self.lock()?;
        client.prepare_attribute(path)?;
        if let Err(e) = client.put_attribute_value(value) {
            client.cancel_attribute()?;
            return Err(e);
        }
        client.finish_attribute()
    }

    /// Sends the request. The handle is consumed either way: on success the
    /// client waits for its response or timeout, on failure it is shut down.
    pub fn send_write_request(mut self, exchange: Arc<dyn ExchangeContext>) -> Result<(), Error> {
        let client = self.client.take().ok_or(ErrorCode::InvalidState)?;
        let mut client = client.lock()?;
        client.send_write_request(exchange)
    }
}

impl Drop for WriteClientHandle {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            match client.lock() {
                Ok(mut client) => client.shutdown(),
                Err(_) => error!("Write client lock poisoned on release"),
            }
        }
    }
}

/// The finished attributes of a sent write request, waiting to be matched
/// with the peer's statuses
pub struct WriteCompletion {
    app_identifier: u64,
    delegate: Arc<dyn InteractionModelDelegate>,
    paths: Vec<AttributePathParams>,
}

impl WriteCompletion {
    pub fn app_identifier(&self) -> u64 {
        self.app_identifier
    }

    pub fn on_message_received(self, opcode: u8, payload: &[u8]) -> Result<(), Error> {
        print_tlv_list(payload);
        let result = match OpCode::from_u8(opcode) {
            Ok(OpCode::WriteResponse) => self.process_write_response(payload),
            Ok(OpCode::StatusResponse) => get_root_node_struct(payload)
                .and_then(|root| StatusResp::from_tlv(&root))
                .and_then(|resp| Err(resp.status.to_error())),
            Ok(_) => Err(ErrorCode::InvalidOpcode.into()),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => self.delegate.write_response_processed(self.app_identifier),
            Err(e) => {
                warn!("Write client {} got no usable response: {}", self.app_identifier, e);
                self.delegate.write_response_error(self.app_identifier, e)
            }
        }
    }

    pub fn on_response_timeout(self) -> Result<(), Error> {
        self.delegate
            .write_response_error(self.app_identifier, &ErrorCode::Timeout.into())
    }

    // Statuses are checked as a whole before any is delivered, so that a
    // mismatched response is reported once and never partially.
    fn process_write_response(&self, payload: &[u8]) -> Result<(), Error> {
        let response = WriteResp::from_tlv(&get_root_node_struct(payload)?)?;

        let mut statuses = Vec::with_capacity(self.paths.len());
        for (index, status) in response.write_responses.iter().enumerate() {
            let index = u8::try_from(index).map_err(|_| ErrorCode::InvalidResponse)?;
            let matched = match (status, self.paths.get(index as usize)) {
                (Ok(status), Some(path)) if status.path.same_target(path) => Some(status),
                _ => None,
            };
            match matched {
                Some(status) => statuses.push(status),
                None => {
                    warn!("Write status {} does not match the request", index);
                    self.delegate
                        .write_response_protocol_error(self.app_identifier, index)?;
                    return Err(ErrorCode::InvalidResponse.into());
                }
            }
        }

        if statuses.len() != self.paths.len() {
            warn!(
                "Expected {} write statuses, got {}",
                self.paths.len(),
                statuses.len()
            );
            let index = u8::try_from(statuses.len()).map_err(|_| ErrorCode::InvalidResponse)?;
            self.delegate
                .write_response_protocol_error(self.app_identifier, index)?;
            return Err(ErrorCode::InvalidResponse.into());
        }

        for (index, status) in statuses.iter().enumerate() {
            self.delegate.write_response_status(
                self.app_identifier,
                &status.status,
                &status.path,
                index as u8,
            )?;
        }
        Ok(())
    }
}
