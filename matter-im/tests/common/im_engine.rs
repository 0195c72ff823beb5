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

use std::sync::{
    atomic::{AtomicU16, Ordering},
    Arc, Mutex,
};

use matter_im::{
    config::ImConfig,
    controller::cluster_client::NetworkProvisioningClient,
    data_model::{
        cluster_network_provisioning::{
            self as net_prov, NetworkProvisioningCluster, NetworkProvisioningDelegate,
            NetworkProvisioningResp, NetworkStore,
        },
        cluster_on_off::OnOffCluster,
        dispatcher::Dispatcher,
        zcl::PROTO_ID_LEGACY_ZCL,
    },
    error::{Error, ErrorCode},
    interaction_model::{
        core::{OpCode, PROTO_ID_INTERACTION_MODEL},
        delegate::{CommandStatus, InteractionModelDelegate},
        engine::InteractionModelEngine,
        path::AttributePathParams,
        status::StatusElement,
    },
    transport::exchange::{Exchange, ExchangeContext, ProtoTx, Role},
};

use super::echo_cluster::EchoCluster;

/// Everything the delegate of the initiator side was told, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImEvent {
    CommandStatus(u64, CommandStatus),
    CommandProtocolError(u64, u8),
    CommandError(u64, ErrorCode),
    CommandProcessed(u64),
    WriteStatus(u64, AttributePathParams, StatusElement, u8),
    WriteProtocolError(u64, u8),
    WriteError(u64, ErrorCode),
    WriteProcessed(u64),
}

#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<ImEvent>>,
}

impl EventRecorder {
    fn push(&self, event: ImEvent) -> Result<(), Error> {
        self.events.lock()?.push(event);
        Ok(())
    }

    pub fn take(&self) -> Vec<ImEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl InteractionModelDelegate for EventRecorder {
    fn command_response_status(&self, sender: u64, status: &CommandStatus) -> Result<(), Error> {
        self.push(ImEvent::CommandStatus(sender, *status))
    }

    fn command_response_protocol_error(&self, sender: u64, index: u8) -> Result<(), Error> {
        self.push(ImEvent::CommandProtocolError(sender, index))
    }

    fn command_response_error(&self, sender: u64, error: &Error) -> Result<(), Error> {
        self.push(ImEvent::CommandError(sender, error.code()))
    }

    fn command_response_processed(&self, sender: u64) -> Result<(), Error> {
        self.push(ImEvent::CommandProcessed(sender))
    }

    fn write_response_status(
        &self,
        app_identifier: u64,
        status: &StatusElement,
        path: &AttributePathParams,
        index: u8,
    ) -> Result<(), Error> {
        self.push(ImEvent::WriteStatus(app_identifier, *path, *status, index))
    }

    fn write_response_protocol_error(&self, app_identifier: u64, index: u8) -> Result<(), Error> {
        self.push(ImEvent::WriteProtocolError(app_identifier, index))
    }

    fn write_response_error(&self, app_identifier: u64, error: &Error) -> Result<(), Error> {
        self.push(ImEvent::WriteError(app_identifier, error.code()))
    }

    fn write_response_processed(&self, app_identifier: u64) -> Result<(), Error> {
        self.push(ImEvent::WriteProcessed(app_identifier))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    Thread(Vec<u8>),
    WiFi(Vec<u8>, Vec<u8>),
}

#[derive(Default)]
pub struct ProvisionRecorder {
    pub provisioned: Mutex<Vec<Provisioned>>,
}

impl NetworkProvisioningDelegate for ProvisionRecorder {
    fn provision_thread(&self, dataset: &[u8]) -> Result<(), Error> {
        self.provisioned
            .lock()?
            .push(Provisioned::Thread(dataset.to_vec()));
        Ok(())
    }

    fn provision_wifi(&self, ssid: &[u8], credentials: &[u8]) -> Result<(), Error> {
        self.provisioned
            .lock()?
            .push(Provisioned::WiFi(ssid.to_vec(), credentials.to_vec()));
        Ok(())
    }
}

pub const NET_PROV_ENDPOINT: u16 = 0;
pub const LIGHT_ENDPOINT: u16 = 1;

/// A node with:
/// - Endpoint 0: network provisioning server, echo server (x2)
/// - Endpoint 1: on/off server, echo server (x3), network provisioning
///   client receiving the responses
pub struct ImEngine {
    pub engine: Arc<InteractionModelEngine>,
    pub light: Arc<OnOffCluster>,
    pub net_prov: Arc<NetworkProvisioningCluster>,
    pub echo: Arc<EchoCluster>,
    pub provisioned: Arc<ProvisionRecorder>,
    pub events: Arc<EventRecorder>,
    pub net_prov_responses: Arc<Mutex<Vec<(net_prov::Commands, NetworkProvisioningResp)>>>,
    next_exchange: AtomicU16,
}

impl ImEngine {
    pub fn new(config: ImConfig) -> Self {
        let mut dispatcher = Dispatcher::new();

        let light = OnOffCluster::new()
            .register(&mut dispatcher, &[LIGHT_ENDPOINT])
            .unwrap();

        let provisioned = Arc::new(ProvisionRecorder::default());
        let net_prov = NetworkProvisioningCluster::new(NetworkStore::new(), provisioned.clone())
            .register(&mut dispatcher, &[NET_PROV_ENDPOINT])
            .unwrap();

        let echo = EchoCluster::register(
            &mut dispatcher,
            &[(NET_PROV_ENDPOINT, 2), (LIGHT_ENDPOINT, 3)],
        );

        let net_prov_responses = Arc::new(Mutex::new(Vec::new()));
        let responses = net_prov_responses.clone();
        NetworkProvisioningClient::register_responses(
            &mut dispatcher,
            net_prov::RESPONSE_ENDPOINT,
            move |command, resp| responses.lock().unwrap().push((command, resp)),
        )
        .unwrap();

        let events = Arc::new(EventRecorder::default());
        let engine = Arc::new(InteractionModelEngine::new(
            config,
            dispatcher,
            events.clone(),
        ));

        Self {
            engine,
            light,
            net_prov,
            echo,
            provisioned,
            events,
            net_prov_responses,
            next_exchange: AtomicU16::new(1),
        }
    }

    /// An exchange this node would open towards a peer
    pub fn initiate(&self) -> Arc<Exchange> {
        Arc::new(Exchange::new(
            self.next_exchange.fetch_add(1, Ordering::SeqCst),
            Role::Initiator,
            0x12345678,
        ))
    }

    /// Delivers one message on a fresh responder exchange, returning the
    /// exchange so that what was sent back can be inspected
    pub fn handle(&self, opcode: OpCode, payload: &[u8]) -> (Result<(), Error>, Arc<Exchange>) {
        let exchange = Arc::new(Exchange::new(
            self.next_exchange.fetch_add(1, Ordering::SeqCst),
            Role::Responder,
            0x12345678,
        ));
        let result = self
            .engine
            .on_message_received(exchange.clone(), opcode as u8, payload);
        (result, exchange)
    }

    /// Delivers everything waiting in `from` to this engine on `to`
    pub fn receive_from(&self, from: &Exchange, to: Arc<Exchange>) -> Vec<Result<(), Error>> {
        from.take_outgoing()
            .into_iter()
            .map(|tx| self.deliver(&tx, to.clone()))
            .collect()
    }

    /// Runs one request/response exchange: `send` puts the request on a new
    /// exchange of this node, `peer` handles it and its answer comes back
    pub fn converse<F>(&self, peer: &ImEngine, send: F) -> Arc<Exchange>
    where
        F: FnOnce(Arc<Exchange>),
    {
        let exchange = self.initiate();
        send(exchange.clone());
        let responder = peer_of(&exchange);
        for result in peer.receive_from(&exchange, responder.clone()) {
            result.unwrap();
        }
        for result in self.receive_from(&responder, exchange.clone()) {
            result.unwrap();
        }
        exchange
    }

    pub fn deliver(&self, tx: &ProtoTx, to: Arc<Exchange>) -> Result<(), Error> {
        match tx.proto_id {
            PROTO_ID_INTERACTION_MODEL => {
                self.engine.on_message_received(to, tx.opcode, &tx.payload)
            }
            PROTO_ID_LEGACY_ZCL => self.engine.on_zcl_message(to, &tx.payload).map(|_| ()),
            _ => Err(ErrorCode::InvalidOpcode.into()),
        }
    }
}

impl Default for ImEngine {
    fn default() -> Self {
        Self::new(ImConfig::default())
    }
}

/// Peer exchange on the other node, same id, opposite role
pub fn peer_of(exchange: &Exchange) -> Arc<Exchange> {
    let role = match exchange.role() {
        Role::Initiator => Role::Responder,
        Role::Responder => Role::Initiator,
    };
    Arc::new(Exchange::new(exchange.id(), role, 0x12345678))
}
