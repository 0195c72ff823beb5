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

//! Routes interaction model messages to the handler, sender or client that
//! owns the exchange they arrived on.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info, warn};

use super::{
    command_handler::{CommandHandler, PendingWork},
    command_sender::{CommandSender, SenderCompletion},
    core::{IMStatusCode, OpCode, PROTO_ID_INTERACTION_MODEL},
    delegate::InteractionModelDelegate,
    messages::msg::StatusResp,
    path::CommandPathParams,
    status::{StatusElement, ZclStatus},
    write_client::{WriteClient, WriteClientHandle, WriteCompletion},
    write_handler::WriteHandler,
};
use crate::{
    config::ImConfig,
    data_model::{
        dispatcher::{Direction, Dispatcher, ResponseSink},
        fields::{encode_zcl_fields, FieldsFn},
        zcl::{ZclAddress, ZclHeader, OPCODE_ZCL_FRAME, PROTO_ID_LEGACY_ZCL},
    },
    error::{Error, ErrorCode},
    tlv::{TLVWriter, TagType, ToTLV},
    transport::exchange::ExchangeContext,
    utils::writebuf::WriteBuf,
};

pub struct InteractionModelEngine {
    config: ImConfig,
    dispatcher: Arc<Dispatcher>,
    delegate: Arc<dyn InteractionModelDelegate>,
    handlers: Mutex<Vec<Arc<CommandHandler>>>,
    senders: Vec<Arc<Mutex<CommandSender>>>,
    write_clients: Vec<Arc<Mutex<WriteClient>>>,
    write_handler: WriteHandler,
}

impl InteractionModelEngine {
    pub fn new(
        config: ImConfig,
        dispatcher: Dispatcher,
        delegate: Arc<dyn InteractionModelDelegate>,
    ) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let senders = (0..config.max_command_senders)
            .map(|i| {
                Arc::new(Mutex::new(CommandSender::new(
                    i as u64 + 1,
                    delegate.clone(),
                    Some(dispatcher.clone()),
                    config.max_payload,
                    config.response_timeout,
                )))
            })
            .collect();
        let write_clients = (0..config.max_write_clients)
            .map(|_| Arc::new(Mutex::new(WriteClient::new())))
            .collect();

        Self {
            write_handler: WriteHandler::new(dispatcher.clone(), config.max_payload),
            handlers: Mutex::new(Vec::with_capacity(config.max_command_handlers)),
            config,
            dispatcher,
            delegate,
            senders,
            write_clients,
        }
    }

    pub fn config(&self) -> &ImConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Takes a free command sender out of the pool
    pub fn new_command_sender(&self) -> Result<Arc<Mutex<CommandSender>>, Error> {
        for sender in &self.senders {
            let mut s = sender.lock()?;
            if s.is_free() {
                s.init()?;
                return Ok(sender.clone());
            }
        }
        warn!("All {} command senders are busy", self.senders.len());
        Err(ErrorCode::NoMemory.into())
    }

    /// Takes a free write client out of the pool
    pub fn new_write_client(&self, app_identifier: u64) -> Result<WriteClientHandle, Error> {
        for client in &self.write_clients {
            let mut c = client.lock()?;
            if c.is_free() {
                c.init(self.delegate.clone(), self.config.max_payload)?;
                c.set_app_identifier(app_identifier);
                return Ok(WriteClientHandle::new(client.clone()));
            }
        }
        warn!("All {} write clients are busy", self.write_clients.len());
        Err(ErrorCode::NoMemory.into())
    }

    /// Number of command handlers that have not answered yet
    pub fn active_handlers(&self) -> usize {
        self.handlers
            .lock()
            .map(|h| h.iter().filter(|h| !h.is_done()).count())
            .unwrap_or(0)
    }

    pub fn on_message_received(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        opcode: u8,
        payload: &[u8],
    ) -> Result<(), Error> {
        let opcode = match OpCode::from_u8(opcode) {
            Ok(opcode) => opcode,
            Err(e) => {
                warn!("Invalid interaction model opcode {:#04x}", opcode);
                send_status_response(exchange.as_ref(), IMStatusCode::InvalidAction)?;
                exchange.close();
                return Err(e);
            }
        };
        info!("Received {:?} on exchange {}", opcode, exchange.id());

        match opcode {
            OpCode::InvokeRequest => self.handle_invoke_req(exchange, payload),
            OpCode::WriteRequest => {
                let result = self.write_handler.handle_write_req(exchange.as_ref(), payload);
                if let Err(e) = &result {
                    warn!("Unable to process the write request: {}", e);
                    send_status_response(exchange.as_ref(), IMStatusCode::InvalidAction)?;
                    exchange.close();
                }
                result
            }
            OpCode::TimedRequest => send_status_response(exchange.as_ref(), IMStatusCode::Success),
            OpCode::InvokeResponse | OpCode::WriteResponse | OpCode::StatusResponse => {
                self.route_response(exchange.id(), opcode, payload)
            }
            OpCode::Reserved
            | OpCode::ReadRequest
            | OpCode::SubscribeRequest
            | OpCode::SubscribeResponse
            | OpCode::ReportData => {
                warn!("{:?} is not served by this engine", opcode);
                send_status_response(exchange.as_ref(), IMStatusCode::InvalidAction)?;
                exchange.close();
                Ok(())
            }
        }
    }

    fn handle_invoke_req(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        payload: &[u8],
    ) -> Result<(), Error> {
        let handler = {
            let mut handlers = self.handlers()?;
            handlers.retain(|h| !h.is_done());
            if handlers.len() >= self.config.max_command_handlers {
                drop(handlers);
                warn!("No free command handler, rejecting the invoke request");
                send_status_response(exchange.as_ref(), IMStatusCode::Busy)?;
                exchange.close();
                return Err(ErrorCode::Busy.into());
            }
            let handler = Arc::new(CommandHandler::new(
                self.dispatcher.clone(),
                self.config.max_payload,
            ));
            handlers.push(handler.clone());
            handler
        };

        let result = handler.on_invoke_command_request(exchange.clone(), payload);
        if let Err(e) = &result {
            warn!("Unable to process the invoke request: {}", e);
            self.handlers()?.retain(|h| !Arc::ptr_eq(h, &handler));
            if exchange.is_open() {
                send_status_response(exchange.as_ref(), IMStatusCode::InvalidAction)?;
                exchange.close();
            }
        }
        result
    }

    fn route_response(
        &self,
        exchange_id: u16,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<(), Error> {
        // The owner is released before its callbacks run, so that they may
        // start new interactions on this engine
        if opcode != OpCode::WriteResponse {
            if let Some(sender) = self.complete_sender(exchange_id)? {
                return sender.on_message_received(opcode as u8, payload);
            }
        }
        if opcode != OpCode::InvokeResponse {
            if let Some(client) = self.complete_write_client(exchange_id)? {
                return client.on_message_received(opcode as u8, payload);
            }
        }
        warn!("Nobody is waiting for {:?} on exchange {}", opcode, exchange_id);
        Err(ErrorCode::NoHandler.into())
    }

    /// Handles one legacy ZCL message. A command response added by the
    /// callback goes back as a server to client frame.
    pub fn on_zcl_message(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        msg: &[u8],
    ) -> Result<ZclStatus, Error> {
        let (address, frame) = ZclAddress::parse(msg)?;
        let (header, _) = ZclHeader::parse(frame)?;
        info!(
            "Received ZCL command {:#04x} for ({}, {:#06x}) on exchange {}",
            header.command,
            address.endpoint,
            address.cluster,
            exchange.id()
        );

        let mut responder = ZclResponder {
            seq: header.seq,
            max_payload: self.config.max_payload,
            response: None,
        };
        let sink: Option<&mut dyn ResponseSink> = match header.direction() {
            Direction::ClientToServer => Some(&mut responder),
            Direction::ServerToClient => None,
        };
        let status = self
            .dispatcher
            .dispatch_zcl(address.endpoint, address.cluster, frame, sink);

        let sent = match responder.response.take() {
            Some(response) => {
                exchange.send_message(PROTO_ID_LEGACY_ZCL, OPCODE_ZCL_FRAME, response)
            }
            None => Ok(()),
        };
        exchange.close();
        sent.map(|_| status)
    }

    /// The transport gave up waiting on `exchange_id`
    pub fn on_response_timeout(&self, exchange_id: u16) -> Result<(), Error> {
        if let Some(sender) = self.complete_sender(exchange_id)? {
            return sender.on_response_timeout();
        }
        if let Some(client) = self.complete_write_client(exchange_id)? {
            return client.on_response_timeout();
        }
        Ok(())
    }

    fn handlers(&self) -> Result<MutexGuard<'_, Vec<Arc<CommandHandler>>>, Error> {
        Ok(self.handlers.lock()?)
    }

    // Returns the sender waiting on `exchange_id` to the pool
    fn complete_sender(&self, exchange_id: u16) -> Result<Option<SenderCompletion>, Error> {
        for sender in &self.senders {
            let mut s = sender.lock()?;
            if s.exchange_id() == Some(exchange_id) {
                return s.complete().map(Some);
            }
        }
        Ok(None)
    }

    fn complete_write_client(&self, exchange_id: u16) -> Result<Option<WriteCompletion>, Error> {
        for client in &self.write_clients {
            let mut c = client.lock()?;
            if c.exchange_id() == Some(exchange_id) {
                return c.complete().map(Some);
            }
        }
        Ok(None)
    }
}

// Collects the response of a legacy command as a ready to send message
struct ZclResponder {
    seq: u8,
    max_payload: usize,
    response: Option<Vec<u8>>,
}

impl ResponseSink for ZclResponder {
    fn add_response(&mut self, path: CommandPathParams, fields: &FieldsFn) -> Result<(), Error> {
        if self.response.is_some() {
            return Err(ErrorCode::InvalidState.into());
        }
        let command = u8::try_from(path.command_id).map_err(|_| ErrorCode::InvalidCommand)?;

        let mut wb = WriteBuf::new(self.max_payload);
        ZclAddress::new(path.endpoint_id, path.cluster_id).write(&mut wb)?;
        ZclHeader::cluster_command(Direction::ServerToClient, self.seq, command, None)
            .write(&mut wb)?;
        let payload = encode_zcl_fields(fields, wb.remaining())?;
        wb.copy_from_slice(&payload)?;
        self.response = Some(wb.into_vec());
        Ok(())
    }

    fn add_status(&mut self, path: CommandPathParams, status: StatusElement) -> Result<(), Error> {
        // Legacy frames carry no per-command status
        info!("Status {:?} for {} not sent on the legacy path", status, path);
        Ok(())
    }

    fn prepare_pending_work(&mut self) -> Result<PendingWork, Error> {
        Err(ErrorCode::NotImplemented.into())
    }
}

fn send_status_response(exchange: &dyn ExchangeContext, status: IMStatusCode) -> Result<(), Error> {
    let mut wb = WriteBuf::new(16);
    let mut tw = TLVWriter::new(&mut wb);
    StatusResp { status }.to_tlv(&mut tw, TagType::Anonymous)?;
    exchange
        .send_message(
            PROTO_ID_INTERACTION_MODEL,
            OpCode::StatusResponse as u8,
            wb.into_vec(),
        )
        .map_err(|e| {
            error!("Unable to send status response {:?}: {}", status, e);
            e
        })
}
