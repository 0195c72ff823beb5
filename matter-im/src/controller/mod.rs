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

//! Client side cluster invocation.
//!
//! A [`CommandInvoker`] puts one command on the wire. Which one is used is
//! decided once from [`InvokeStrategy`]: Invoke-Requests through a pooled
//! [`CommandSender`](crate::interaction_model::command_sender::CommandSender),
//! or legacy ZCL frames.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use log::info;

use crate::{
    config::{ImConfig, InvokeStrategy},
    data_model::{
        dispatcher::Direction,
        fields::{encode_zcl_fields, FieldsFn},
        zcl::{ZclAddress, ZclHeader, OPCODE_ZCL_FRAME, PROTO_ID_LEGACY_ZCL},
    },
    error::{Error, ErrorCode},
    interaction_model::{engine::InteractionModelEngine, path::CommandPathParams},
    transport::exchange::ExchangeContext,
    utils::writebuf::WriteBuf,
};

pub mod cluster_client;

pub trait CommandInvoker: Send + Sync {
    /// Sends one command on `exchange`. Returns what the answer will be
    /// correlated with: the command sender id, or the ZCL sequence number.
    fn invoke(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        path: &CommandPathParams,
        fields: &FieldsFn,
    ) -> Result<u64, Error>;
}

/// Invokes through the interaction model
pub struct ImInvoker {
    engine: Arc<InteractionModelEngine>,
}

impl ImInvoker {
    pub fn new(engine: Arc<InteractionModelEngine>) -> Self {
        Self { engine }
    }
}

impl CommandInvoker for ImInvoker {
    fn invoke(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        path: &CommandPathParams,
        fields: &FieldsFn,
    ) -> Result<u64, Error> {
        let sender = self.engine.new_command_sender()?;
        let mut sender = sender.lock()?;

        let result = sender
            .prepare_command(path)
            .and_then(|_| fields(&mut sender.command_fields_writer()?))
            .and_then(|_| sender.finish_command());
        if let Err(e) = result {
            sender.shutdown();
            return Err(e);
        }

        sender.send_command_request(exchange)?;
        Ok(sender.id())
    }
}

/// Invokes with legacy ZCL frames
pub struct LegacyZclInvoker {
    seq: AtomicU8,
    max_payload: usize,
}

impl LegacyZclInvoker {
    pub fn new(max_payload: usize) -> Self {
        Self {
            seq: AtomicU8::new(0),
            max_payload,
        }
    }
}

impl CommandInvoker for LegacyZclInvoker {
    fn invoke(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        path: &CommandPathParams,
        fields: &FieldsFn,
    ) -> Result<u64, Error> {
        let endpoint = path.endpoint().ok_or(ErrorCode::InvalidArgument)?;
        let command = u8::try_from(path.command_id).map_err(|_| ErrorCode::InvalidCommand)?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        let mut wb = WriteBuf::new(self.max_payload);
        ZclAddress::new(endpoint, path.cluster_id).write(&mut wb)?;
        ZclHeader::cluster_command(Direction::ClientToServer, seq, command, None).write(&mut wb)?;
        let payload = encode_zcl_fields(fields, wb.remaining())?;
        wb.copy_from_slice(&payload)?;

        info!("Sending ZCL command {} as seq {}", path, seq);
        exchange.send_message(PROTO_ID_LEGACY_ZCL, OPCODE_ZCL_FRAME, wb.into_vec())?;
        Ok(seq as u64)
    }
}

/// The invoker `config` asks for
pub fn invoker_for(
    config: &ImConfig,
    engine: Arc<InteractionModelEngine>,
) -> Arc<dyn CommandInvoker> {
    match config.invoke_strategy {
        InvokeStrategy::InteractionModel => Arc::new(ImInvoker::new(engine)),
        InvokeStrategy::LegacyZcl => Arc::new(LegacyZclInvoker::new(config.max_payload)),
    }
}
