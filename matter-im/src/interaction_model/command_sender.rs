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

//! Initiator side of an invoke interaction.

use std::{sync::Arc, time::Duration};

use log::{error, info, warn};

use super::{
    core::{OpCode, PROTO_ID_INTERACTION_MODEL},
    delegate::{CommandStatus, InteractionModelDelegate},
    messages::{
        ib::{CmdDataTag, InvResp},
        msg::{InvReqTag, InvRespMsg, StatusResp},
    },
    path::CommandPathParams,
};
use crate::{
    data_model::{
        dispatcher::{CommandContext, CommandPayload, Direction, DispatchRequest, Dispatcher},
        fields::{CommandArgs, FieldWriter},
    },
    error::{Error, ErrorCode},
    tlv::{get_root_node_struct, print_tlv_list, FromTLV, TLVWriter, TagType, ToTLV},
    transport::exchange::ExchangeContext,
    utils::writebuf::WriteBuf,
};

// End of the array of commands, end of the request
const REQUEST_CLOSING_RESERVE: usize = 2;
// End of the fields, end of the command data element
const COMMAND_CLOSING_RESERVE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// In the pool, not handed out
    Free,
    Initialized,
    AddCommand,
    AwaitingResponse,
}

pub struct CommandSender {
    id: u64,
    state: SenderState,
    wb: WriteBuf,
    command_count: u8,
    command_open: bool,
    // Where the open command starts, and whether it also opened the request
    command_start: Option<(usize, bool)>,
    exchange: Option<Arc<dyn ExchangeContext>>,
    delegate: Arc<dyn InteractionModelDelegate>,
    dispatcher: Option<Arc<Dispatcher>>,
    response_timeout: Duration,
}

impl CommandSender {
    pub fn new(
        id: u64,
        delegate: Arc<dyn InteractionModelDelegate>,
        dispatcher: Option<Arc<Dispatcher>>,
        max_payload: usize,
        response_timeout: Duration,
    ) -> Self {
        Self {
            id,
            state: SenderState::Free,
            wb: WriteBuf::new(max_payload),
            command_count: 0,
            command_open: false,
            command_start: None,
            exchange: None,
            delegate,
            dispatcher,
            response_timeout,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn is_free(&self) -> bool {
        self.state == SenderState::Free
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn exchange_id(&self) -> Option<u16> {
        self.exchange.as_ref().map(|e| e.id())
    }

    /// Takes the sender out of the pool
    pub fn init(&mut self) -> Result<(), Error> {
        if self.state != SenderState::Free {
            return Err(ErrorCode::InvalidState.into());
        }
        self.wb.reset();
        self.command_count = 0;
        self.command_open = false;
        self.command_start = None;
        self.state = SenderState::Initialized;
        Ok(())
    }

    /// Opens a new command data element addressed to `path`. Nothing is left
    /// in the request if this fails.
    pub fn prepare_command(&mut self, path: &CommandPathParams) -> Result<(), Error> {
        if self.command_open
            || !matches!(self.state, SenderState::Initialized | SenderState::AddCommand)
        {
            return Err(ErrorCode::InvalidState.into());
        }

        let opens_request = self.state == SenderState::Initialized;
        let reserve = if opens_request {
            COMMAND_CLOSING_RESERVE + REQUEST_CLOSING_RESERVE
        } else {
            COMMAND_CLOSING_RESERVE
        };
        let anchor = self.wb.get_tail();
        let written = self
            .write_command_header(path, opens_request)
            .and_then(|_| self.wb.shrink(reserve));
        if let Err(e) = written {
            self.wb.rewind_tail_to(anchor);
            return Err(e);
        }

        self.command_start = Some((anchor, opens_request));
        self.state = SenderState::AddCommand;
        self.command_open = true;
        Ok(())
    }

    fn write_command_header(
        &mut self,
        path: &CommandPathParams,
        opens_request: bool,
    ) -> Result<(), Error> {
        let mut tw = TLVWriter::new(&mut self.wb);
        if opens_request {
            tw.start_struct(TagType::Anonymous)?;
            tw.bool(TagType::Context(InvReqTag::SupressResponse as u8), false)?;
            tw.bool(TagType::Context(InvReqTag::TimedReq as u8), false)?;
            tw.start_array(TagType::Context(InvReqTag::InvokeRequests as u8))?;
        }
        tw.start_struct(TagType::Anonymous)?;
        path.to_tlv(&mut tw, TagType::Context(CmdDataTag::Path as u8))?;
        tw.start_struct(TagType::Context(CmdDataTag::Data as u8))
    }

    /// Writer for the fields of the command opened by `prepare_command`
    pub fn command_fields_writer(&mut self) -> Result<FieldWriter<'_>, Error> {
        if !self.command_open {
            return Err(ErrorCode::InvalidState.into());
        }
        Ok(FieldWriter::tlv(&mut self.wb))
    }

    pub fn finish_command(&mut self) -> Result<(), Error> {
        if !self.command_open {
            return Err(ErrorCode::InvalidState.into());
        }
        let count = self
            .command_count
            .checked_add(1)
            .ok_or(ErrorCode::ResourceExhausted)?;

        self.wb.expand(COMMAND_CLOSING_RESERVE)?;
        let mut tw = TLVWriter::new(&mut self.wb);
        tw.end_container()?;
        tw.end_container()?;
        self.command_open = false;
        self.command_start = None;
        self.command_count = count;
        Ok(())
    }

    /// Drops the open command, fields included, as if it was never prepared
    pub fn cancel_command(&mut self) -> Result<(), Error> {
        let (anchor, opened_request) = self.command_start.take().ok_or(ErrorCode::InvalidState)?;
        self.wb.rewind_tail_to(anchor);
        if opened_request {
            self.wb.expand(COMMAND_CLOSING_RESERVE + REQUEST_CLOSING_RESERVE)?;
            self.state = SenderState::Initialized;
        } else {
            self.wb.expand(COMMAND_CLOSING_RESERVE)?;
        }
        self.command_open = false;
        Ok(())
    }

    /// Adds one complete command, or nothing at all
    pub fn add_command<A: CommandArgs>(
        &mut self,
        path: &CommandPathParams,
        args: &A,
    ) -> Result<(), Error> {
        self.prepare_command(path)?;
        let written = self
            .command_fields_writer()
            .and_then(|mut w| args.write_fields(&mut w));
        if let Err(e) = written {
            self.cancel_command()?;
            return Err(e);
        }
        self.finish_command()
    }

    pub fn command_count(&self) -> u8 {
        self.command_count
    }

    /// Closes the request and sends it. The sender then waits for exactly
    /// one response or timeout.
    pub fn send_command_request(
        &mut self,
        exchange: Arc<dyn ExchangeContext>,
    ) -> Result<(), Error> {
        if self.command_open || self.state != SenderState::AddCommand {
            return Err(ErrorCode::InvalidState.into());
        }

        match self.close_and_send(exchange.as_ref()) {
            Ok(()) => {
                info!(
                    "Sender {} sent {} commands on exchange {}",
                    self.id,
                    self.command_count,
                    exchange.id()
                );
                self.exchange = Some(exchange);
                self.state = SenderState::AwaitingResponse;
                Ok(())
            }
            Err(e) => {
                error!("Sender {} failed to send its request: {}", self.id, e);
                exchange.close();
                self.shutdown();
                Err(e)
            }
        }
    }

    fn close_and_send(&mut self, exchange: &dyn ExchangeContext) -> Result<(), Error> {
        self.wb.expand(REQUEST_CLOSING_RESERVE)?;
        let mut tw = TLVWriter::new(&mut self.wb);
        tw.end_container()?;
        tw.end_container()?;
        exchange.send_message(
            PROTO_ID_INTERACTION_MODEL,
            OpCode::InvokeRequest as u8,
            self.wb.as_slice().to_vec(),
        )
    }

    /// Processes the peer's answer. Every outcome reaches the delegate
    /// exactly once and returns the sender to the pool.
    pub fn on_message_received(&mut self, opcode: u8, payload: &[u8]) -> Result<(), Error> {
        self.complete()?.on_message_received(opcode, payload)
    }

    /// The peer did not answer in time
    pub fn on_response_timeout(&mut self) -> Result<(), Error> {
        if self.state != SenderState::AwaitingResponse {
            return Ok(());
        }
        self.complete()?.on_response_timeout()
    }

    /// Ends the wait for a response and returns the sender to the pool. The
    /// outcome is reported through the returned completion, so the sender's
    /// lock need not be held while delegate and cluster callbacks run.
    pub fn complete(&mut self) -> Result<SenderCompletion, Error> {
        if self.state != SenderState::AwaitingResponse {
            return Err(ErrorCode::InvalidState.into());
        }
        let completion = SenderCompletion {
            id: self.id,
            delegate: self.delegate.clone(),
            dispatcher: self.dispatcher.clone(),
        };
        self.shutdown();
        Ok(completion)
    }

    /// Releases the exchange and returns the sender to the pool
    pub fn shutdown(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.close();
        }
        self.wb.reset();
        self.command_count = 0;
        self.command_open = false;
        self.command_start = None;
        self.state = SenderState::Free;
    }
}

/// What is left of a sender once its exchange is done: enough to report
/// the outcome to the delegate and to dispatch response commands.
pub struct SenderCompletion {
    id: u64,
    delegate: Arc<dyn InteractionModelDelegate>,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl SenderCompletion {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn on_message_received(self, opcode: u8, payload: &[u8]) -> Result<(), Error> {
        print_tlv_list(payload);
        let result = match OpCode::from_u8(opcode) {
            Ok(OpCode::InvokeResponse) => self.process_invoke_response(payload),
            Ok(OpCode::StatusResponse) => get_root_node_struct(payload)
                .and_then(|root| StatusResp::from_tlv(&root))
                .and_then(|resp| Err(resp.status.to_error())),
            Ok(_) => Err(ErrorCode::InvalidOpcode.into()),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => self.delegate.command_response_processed(self.id),
            Err(e) => {
                warn!("Sender {} got no usable response: {}", self.id, e);
                self.delegate.command_response_error(self.id, e)
            }
        }
    }

    pub fn on_response_timeout(self) -> Result<(), Error> {
        self.delegate
            .command_response_error(self.id, &ErrorCode::Timeout.into())
    }

    fn process_invoke_response(&self, payload: &[u8]) -> Result<(), Error> {
        let response = InvRespMsg::from_tlv(&get_root_node_struct(payload)?)?;
        let responses = match response.inv_responses {
            Some(responses) => responses,
            None => return Ok(()),
        };

        for (index, element) in responses.elements().enumerate() {
            let index = u8::try_from(index).map_err(|_| ErrorCode::InvalidResponse)?;
            let handled = element
                .validate()
                .and_then(|_| InvResp::from_tlv(&element))
                .and_then(|resp| self.process_command_response(resp, index));
            if let Err(e) = handled {
                warn!("Response element {} rejected: {}", index, e);
                self.delegate.command_response_protocol_error(self.id, index)?;
            }
        }
        Ok(())
    }

    fn process_command_response(&self, response: InvResp, index: u8) -> Result<(), Error> {
        match response {
            InvResp::Status(status) => {
                let path = status.path;
                self.delegate.command_response_status(
                    self.id,
                    &CommandStatus {
                        general_code: status.status.general_code,
                        protocol_id: status.status.protocol_id,
                        protocol_code: status.status.protocol_code,
                        endpoint_id: path.endpoint_id,
                        cluster_id: path.cluster_id,
                        command_id: path.command_id,
                        index,
                    },
                )
            }
            InvResp::Cmd(cmd) => {
                let dispatcher = self.dispatcher.as_ref().ok_or(ErrorCode::NoHandler)?;
                let request = DispatchRequest::new(&cmd.path, Direction::ServerToClient);
                let mut ctx = CommandContext::detached(request);
                let status = dispatcher.dispatch(&request, CommandPayload::Tlv(cmd.data), &mut ctx);
                if status.is_success() {
                    Ok(())
                } else {
                    warn!("Response command {} not handled: {}", cmd.path, status);
                    Err(ErrorCode::InvalidResponse.into())
                }
            }
        }
    }
}
