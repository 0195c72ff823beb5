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

//! Responder side of an invoke interaction.
//!
//! One `CommandHandler` serves one Invoke-Request. Every command data
//! element is dispatched in order and earns exactly one result, a response
//! or a status, kept in a slot of its own. A command may defer its result
//! with a [`PendingWork`] token; the handler answers once dispatch is over
//! and the last token is gone, and never answers twice.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info, warn};

use super::{
    core::{GeneralCode, OpCode, PROTO_ID_INTERACTION_MODEL},
    messages::{
        ib::{CmdData, CmdDataTag, CmdStatus, InvRespTag},
        msg::{self, InvReq},
    },
    path::CommandPathParams,
    status::{StatusElement, ZclStatus},
};
use crate::{
    data_model::{
        dispatcher::{
            CommandContext, CommandPayload, Direction, DispatchRequest, Dispatcher, ResponseSink,
        },
        fields::{encode_tlv, encode_tlv_fields, CommandArgs, FieldsFn},
    },
    error::{Error, ErrorCode},
    tlv::{get_root_node_struct, FromTLV, TLVElement, TLVWriter, TagType, ToTLV},
    transport::exchange::ExchangeContext,
    utils::writebuf::WriteBuf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Idle,
    Dispatching,
    AwaitingPendingWork,
    Sent,
    /// Finished without sending: suppressed, or the exchange was gone
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotResult {
    Data {
        path: CommandPathParams,
        fields: Vec<u8>,
    },
    Status(CmdStatus),
}

#[derive(Debug)]
struct Slot {
    path: CommandPathParams,
    result: Option<SlotResult>,
}

struct Inner {
    state: HandlerState,
    exchange: Option<Arc<dyn ExchangeContext>>,
    slots: Vec<Slot>,
    pending: u32,
    suppress_response: bool,
    max_payload: usize,
}

// Room kept for closing the response array and structure
const CLOSING_RESERVE: usize = 2;

impl Inner {
    fn set_result(&mut self, index: usize, result: SlotResult) -> Result<(), Error> {
        let slot = self.slots.get_mut(index).ok_or(ErrorCode::InvalidState)?;
        if slot.result.is_some() {
            warn!("Command {} already has a result, dropping {:?}", slot.path, result);
            return Err(ErrorCode::InvalidState.into());
        }
        slot.result = Some(result);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, HandlerState::Sent | HandlerState::Closed)
    }

    fn encode_result(tw: &mut TLVWriter, result: &SlotResult) -> Result<(), Error> {
        tw.start_struct(TagType::Anonymous)?;
        match result {
            SlotResult::Data { path, fields } => {
                tw.start_struct(TagType::Context(InvRespTag::Cmd as u8))?;
                path.to_tlv(tw, TagType::Context(CmdDataTag::Path as u8))?;
                tw.raw(fields)?;
                tw.end_container()?;
            }
            SlotResult::Status(status) => {
                status.to_tlv(tw, TagType::Context(InvRespTag::Status as u8))?;
            }
        }
        tw.end_container()?;
        if tw.get_buf().remaining() < CLOSING_RESERVE {
            return Err(ErrorCode::NoSpace.into());
        }
        Ok(())
    }

    fn build_response(&self) -> Result<Vec<u8>, Error> {
        let mut wb = WriteBuf::new(self.max_payload);
        let mut tw = TLVWriter::new(&mut wb);
        tw.start_struct(TagType::Anonymous)?;
        tw.bool(
            TagType::Context(msg::InvRespTag::SupressResponse as u8),
            false,
        )?;
        tw.start_array(TagType::Context(msg::InvRespTag::InvokeResponses as u8))?;

        for slot in &self.slots {
            let success = SlotResult::Status(CmdStatus::new(
                slot.path,
                StatusElement::from_zcl(ZclStatus::Success),
            ));
            let result = slot.result.as_ref().unwrap_or(&success);

            let anchor = tw.get_tail();
            if let Err(e) = Self::encode_result(&mut tw, result) {
                warn!("No room for the result of {}: {}", slot.path, e);
                tw.rewind_to(anchor);
                let exhausted = SlotResult::Status(CmdStatus::new(
                    slot.path,
                    StatusElement::from_zcl(ZclStatus::NO_MEMORY),
                ));
                Self::encode_result(&mut tw, &exhausted)?;
            }
        }

        tw.end_container()?;
        tw.end_container()?;
        Ok(wb.into_vec())
    }

    /// Sends the aggregated response. Runs once; later calls are no-ops.
    fn finalize(&mut self) -> Result<(), Error> {
        if self.is_finished() {
            return Ok(());
        }

        if self.suppress_response {
            info!("Response suppressed, {} commands handled", self.slots.len());
            self.state = HandlerState::Closed;
            if let Some(exchange) = self.exchange.take() {
                exchange.close();
            }
            return Ok(());
        }

        let exchange = match self.exchange.take() {
            Some(exchange) if exchange.is_open() => exchange,
            _ => {
                error!("Exchange closed before the invoke response could be sent");
                self.state = HandlerState::Closed;
                return Err(ErrorCode::NoExchange.into());
            }
        };

        let result = self.build_response().and_then(|payload| {
            exchange.send_message(
                PROTO_ID_INTERACTION_MODEL,
                OpCode::InvokeResponse as u8,
                payload,
            )
        });
        exchange.close();

        match result {
            Ok(()) => {
                self.state = HandlerState::Sent;
                Ok(())
            }
            Err(e) => {
                error!("Failed to send the invoke response: {}", e);
                self.state = HandlerState::Closed;
                Err(e)
            }
        }
    }
}

fn lock(state: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>, Error> {
    Ok(state.lock()?)
}

/// Keeps a command's result open after its callback returned
pub struct PendingWork {
    state: Arc<Mutex<Inner>>,
    index: usize,
    path: CommandPathParams,
}

impl PendingWork {
    /// Path of the command this work belongs to
    pub fn path(&self) -> CommandPathParams {
        self.path
    }

    pub fn add_status(&self, status: ZclStatus) -> Result<(), Error> {
        self.add_status_code(
            StatusElement::from_zcl(status).general_code,
            PROTO_ID_INTERACTION_MODEL as u32,
            status as u16,
        )
    }

    pub fn add_status_code(
        &self,
        general_code: GeneralCode,
        protocol_id: u32,
        protocol_code: u16,
    ) -> Result<(), Error> {
        let status = StatusElement::new(general_code, protocol_id, protocol_code);
        let result = SlotResult::Status(CmdStatus::new(self.path, status));
        lock(&self.state)?.set_result(self.index, result)
    }

    /// Answers with `command` of the same cluster
    pub fn add_response<A: CommandArgs>(&self, command: u32, args: &A) -> Result<(), Error> {
        let path = CommandPathParams::new(self.path.endpoint_id, self.path.cluster_id, command);
        self.add_response_to(path, args)
    }

    pub fn add_response_to<A: CommandArgs>(
        &self,
        path: CommandPathParams,
        args: &A,
    ) -> Result<(), Error> {
        let mut inner = lock(&self.state)?;
        let fields = encode_tlv(args, TagType::Context(CmdDataTag::Data as u8), inner.max_payload)?;
        inner.set_result(self.index, SlotResult::Data { path, fields })
    }

    /// Releases the work; same as dropping the token
    pub fn complete(self) {}
}

impl Drop for PendingWork {
    fn drop(&mut self) {
        let mut inner = match self.state.lock() {
            Ok(inner) => inner,
            Err(_) => {
                error!("Command handler state poisoned, {} left unanswered", self.path);
                return;
            }
        };
        inner.pending = inner.pending.saturating_sub(1);
        if inner.pending == 0 && inner.state == HandlerState::AwaitingPendingWork {
            // Failures are logged by finalize and there is nobody to return them to
            let _ = inner.finalize();
        }
    }
}

// The response sink handed to the callback of one element
struct ElementSink<'a> {
    state: &'a Arc<Mutex<Inner>>,
    index: usize,
    path: CommandPathParams,
}

impl<'a> ResponseSink for ElementSink<'a> {
    fn add_response(&mut self, path: CommandPathParams, fields: &FieldsFn) -> Result<(), Error> {
        let mut inner = lock(self.state)?;
        let fields = encode_tlv_fields(
            fields,
            TagType::Context(CmdDataTag::Data as u8),
            inner.max_payload,
        )?;
        inner.set_result(self.index, SlotResult::Data { path, fields })
    }

    fn add_status(&mut self, path: CommandPathParams, status: StatusElement) -> Result<(), Error> {
        lock(self.state)?.set_result(self.index, SlotResult::Status(CmdStatus::new(path, status)))
    }

    fn prepare_pending_work(&mut self) -> Result<PendingWork, Error> {
        lock(self.state)?.pending += 1;
        Ok(PendingWork {
            state: self.state.clone(),
            index: self.index,
            path: self.path,
        })
    }
}

pub struct CommandHandler {
    dispatcher: Arc<Dispatcher>,
    state: Arc<Mutex<Inner>>,
}

impl CommandHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, max_payload: usize) -> Self {
        Self {
            dispatcher,
            state: Arc::new(Mutex::new(Inner {
                state: HandlerState::Idle,
                exchange: None,
                slots: Vec::new(),
                pending: 0,
                suppress_response: false,
                max_payload,
            })),
        }
    }

    pub fn state(&self) -> HandlerState {
        lock(&self.state)
            .map(|i| i.state)
            .unwrap_or(HandlerState::Closed)
    }

    /// Whether the handler has answered (or given up) and can be recycled
    pub fn is_done(&self) -> bool {
        lock(&self.state).map(|i| i.is_finished()).unwrap_or(true)
    }

    /// Handles one Invoke-Request arriving on `exchange`.
    ///
    /// Returns an error only if the request as a whole cannot be parsed or
    /// the handler is already in use; problems with individual commands are
    /// answered with a status for that command.
    pub fn on_invoke_command_request(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        payload: &[u8],
    ) -> Result<(), Error> {
        let request = InvReq::from_tlv(&get_root_node_struct(payload)?)?;

        {
            let mut inner = lock(&self.state)?;
            if inner.state != HandlerState::Idle {
                return Err(ErrorCode::InvalidState.into());
            }
            inner.state = HandlerState::Dispatching;
            inner.exchange = Some(exchange);
            inner.suppress_response = request.suppress_response;
        }

        if let Some(commands) = request.inv_requests {
            for element in commands.elements() {
                self.process_command_data_element(&element)?;
            }
        }

        let mut inner = lock(&self.state)?;
        inner.state = HandlerState::AwaitingPendingWork;
        if inner.pending == 0 {
            inner.finalize()
        } else {
            info!("Invoke response deferred, {} commands pending", inner.pending);
            Ok(())
        }
    }

    fn process_command_data_element(&self, element: &TLVElement) -> Result<(), Error> {
        // Best effort path, so that even a broken element can be answered
        let path = CommandPathParams::from_tag(element, CmdDataTag::Path as u8).unwrap_or(
            CommandPathParams {
                endpoint_id: 0,
                group_id: 0,
                cluster_id: 0,
                command_id: 0,
                flags: Default::default(),
            },
        );

        let index = {
            let mut inner = lock(&self.state)?;
            inner.slots.push(Slot { path, result: None });
            inner.slots.len() - 1
        };

        let status = match element.validate().and_then(|_| CmdData::from_tlv(element)) {
            Err(e) => {
                warn!("Malformed command data element {}: {}", path, e);
                ZclStatus::MalformedCommand
            }
            Ok(cmd) if cmd.path.is_wildcard() => {
                warn!("Wildcard invoke of {} is not supported", cmd.path);
                ZclStatus::UnsupportedCluster
            }
            Ok(cmd) => {
                info!("Invoking command {}", cmd.path);
                let request = DispatchRequest::new(&cmd.path, Direction::ClientToServer);
                let mut sink = ElementSink {
                    state: &self.state,
                    index,
                    path: cmd.path,
                };
                let mut ctx = CommandContext::new(request, Some(&mut sink));
                self.dispatcher
                    .dispatch(&request, CommandPayload::Tlv(cmd.data), &mut ctx)
            }
        };

        if !status.is_success() {
            let mut inner = lock(&self.state)?;
            let slot = &mut inner.slots[index];
            if slot.result.is_none() {
                slot.result = Some(SlotResult::Status(CmdStatus::new(
                    path,
                    StatusElement::from_zcl(status),
                )));
            }
        }
        Ok(())
    }
}

impl Drop for CommandHandler {
    fn drop(&mut self) {
        let outstanding = match self.state.lock() {
            Ok(inner) if !inner.is_finished() => inner.pending,
            _ => 0,
        };
        if outstanding > 0 {
            error!(
                "Command handler dropped with {} pending commands outstanding",
                outstanding
            );
            if !std::thread::panicking() {
                debug_assert!(false, "command handler dropped while busy");
            }
        }
    }
}
