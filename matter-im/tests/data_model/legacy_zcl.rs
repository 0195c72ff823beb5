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

use std::sync::Arc;

use matter_im::{
    config::{ImConfig, InvokeStrategy},
    controller::{
        cluster_client::{NetworkProvisioningClient, OnOffClient},
        invoker_for, CommandInvoker, LegacyZclInvoker,
    },
    data_model::{
        cluster_network_provisioning::{self as net_prov, Commands},
        cluster_on_off,
        dispatcher::Direction,
        zcl::{ZclAddress, ZclHeader, OPCODE_ZCL_FRAME, PROTO_ID_LEGACY_ZCL},
    },
    interaction_model::status::ZclStatus,
    transport::exchange::ExchangeContext,
};
use rstest::rstest;

use crate::common::{
    im_engine::{peer_of, ImEngine, ImEvent, Provisioned, LIGHT_ENDPOINT, NET_PROV_ENDPOINT},
    init_env_logger,
};

fn zcl_invoker() -> Arc<dyn CommandInvoker> {
    Arc::new(LegacyZclInvoker::new(1024))
}

#[test]
fn test_on_off_frame() {
    init_env_logger();
    let client = ImEngine::default();
    let server = ImEngine::default();

    let exchange = client.initiate();
    let seq = OnOffClient::new(zcl_invoker(), LIGHT_ENDPOINT)
        .on(exchange.clone())
        .unwrap();
    assert_eq!(seq, 0);

    let sent = exchange.take_outgoing();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].proto_id, PROTO_ID_LEGACY_ZCL);
    assert_eq!(sent[0].opcode, OPCODE_ZCL_FRAME);
    // endpoint, cluster, frame control, seq, command
    assert_eq!(
        sent[0].payload,
        vec![
            0x01,
            0x00,
            0x06,
            0x00,
            0x00,
            0x00,
            0x01,
            0x00,
            cluster_on_off::Commands::On as u8
        ]
    );

    let responder = peer_of(&exchange);
    let status = server
        .engine
        .on_zcl_message(responder.clone(), &sent[0].payload)
        .unwrap();
    assert_eq!(status, ZclStatus::Success);
    assert_eq!(server.light.get(LIGHT_ENDPOINT), Some(true));

    // Success carries no response frame
    assert!(responder.take_outgoing().is_empty());
    assert!(!responder.is_open());
}

#[test]
fn test_sequence_numbers_advance() {
    let client = ImEngine::default();
    let light = OnOffClient::new(zcl_invoker(), LIGHT_ENDPOINT);

    let seqs: Vec<_> = (0..3)
        .map(|_| light.toggle(client.initiate()).unwrap())
        .collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[test]
fn test_response_frame() {
    init_env_logger();
    let client = ImEngine::default();
    let server = ImEngine::default();
    let dataset = [0x0e, 0x08, 0x00];

    let exchange = client.initiate();
    let seq = NetworkProvisioningClient::new(zcl_invoker(), NET_PROV_ENDPOINT)
        .add_thread_network(exchange.clone(), &dataset, 0, 1000)
        .unwrap();

    let responder = peer_of(&exchange);
    for result in server.receive_from(&exchange, responder.clone()) {
        result.unwrap();
    }

    let sent = responder.take_outgoing();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].proto_id, PROTO_ID_LEGACY_ZCL);

    let (address, frame) = ZclAddress::parse(&sent[0].payload).unwrap();
    assert_eq!(
        address,
        ZclAddress::new(net_prov::RESPONSE_ENDPOINT, net_prov::ID)
    );
    let (header, payload) = ZclHeader::parse(frame).unwrap();
    assert_eq!(header.seq as u64, seq);
    assert_eq!(header.direction(), Direction::ServerToClient);
    assert_eq!(header.command, Commands::AddThreadNetworkResponse as u8);

    let mut expected = vec![0x00, 13];
    expected.extend_from_slice(b"CHIP_NO_ERROR");
    assert_eq!(payload, expected.as_slice());

    // Handing the frame to the client side dispatches the response
    let status = client
        .engine
        .on_zcl_message(exchange.clone(), &sent[0].payload)
        .unwrap();
    assert_eq!(status, ZclStatus::Success);
    let responses = client.net_prov_responses.lock().unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].0, Commands::AddThreadNetworkResponse);
    assert_eq!(responses[0].1.error_code, 0);
    assert_eq!(
        *server.provisioned.provisioned.lock().unwrap(),
        Vec::<Provisioned>::new()
    );
}

#[rstest]
#[case::missing_timeout(1)]
#[case::short_breadcrumb(6)]
#[case::short_dataset(14)]
fn test_truncated_frame(#[case] cut: usize) {
    init_env_logger();
    let client = ImEngine::default();
    let server = ImEngine::default();

    let exchange = client.initiate();
    NetworkProvisioningClient::new(zcl_invoker(), NET_PROV_ENDPOINT)
        .add_thread_network(exchange.clone(), &[1, 2, 3, 4], 0, 1000)
        .unwrap();
    let mut frame = exchange.take_outgoing().remove(0).payload;
    frame.truncate(frame.len() - cut);

    let responder = peer_of(&exchange);
    let status = server
        .engine
        .on_zcl_message(responder.clone(), &frame)
        .unwrap();
    assert_eq!(status, ZclStatus::MalformedCommand);
    assert!(responder.take_outgoing().is_empty());
    assert!(server.net_prov.networks().unwrap().is_empty());
}

#[test]
fn test_unknown_cluster_frame() {
    init_env_logger();
    let server = ImEngine::default();
    let exchange = server.initiate();

    let mut frame = Vec::new();
    frame.extend_from_slice(&[0x01, 0x00, 0x08, 0x00, 0x00, 0x00]);
    frame.extend_from_slice(&[0x01, 0x05, 0x00]);
    assert_eq!(
        server.engine.on_zcl_message(exchange, &frame).unwrap(),
        ZclStatus::UnsupportedCluster
    );
}

#[test]
fn test_general_command_frame() {
    let server = ImEngine::default();
    let exchange = server.initiate();

    // Frame control without the cluster specific bit
    let frame = [0x01, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
    assert_eq!(
        server.engine.on_zcl_message(exchange, &frame).unwrap(),
        ZclStatus::UnsupGeneralCommand
    );
}

// The same conversation, whichever way commands travel
#[rstest]
#[case::interaction_model(InvokeStrategy::InteractionModel)]
#[case::legacy_zcl(InvokeStrategy::LegacyZcl)]
fn test_wifi_provisioning(#[case] strategy: InvokeStrategy) {
    init_env_logger();
    let config = ImConfig::default().with_invoke_strategy(strategy);
    let client = ImEngine::new(config.clone());
    let server = ImEngine::default();
    let net_prov = NetworkProvisioningClient::new(
        invoker_for(&config, client.engine.clone()),
        NET_PROV_ENDPOINT,
    );

    client.converse(&server, |exchange| {
        net_prov
            .add_wifi_network(exchange, b"home", b"secret", 1, 1000)
            .unwrap();
    });
    client.converse(&server, |exchange| {
        net_prov.enable_network(exchange, b"home", 2, 1000).unwrap();
    });

    let responses: Vec<_> = client
        .net_prov_responses
        .lock()
        .unwrap()
        .iter()
        .map(|(command, resp)| (*command, resp.error_code, resp.debug_text.as_str().to_owned()))
        .collect();
    assert_eq!(
        responses,
        vec![
            (Commands::AddWiFiNetworkResponse, 0, "CHIP_NO_ERROR".to_owned()),
            (Commands::EnableNetworkResponse, 0, "CHIP_NO_ERROR".to_owned()),
        ]
    );
    assert_eq!(
        *server.provisioned.provisioned.lock().unwrap(),
        vec![Provisioned::WiFi(b"home".to_vec(), b"secret".to_vec())]
    );

    let events = client.events.take();
    match strategy {
        InvokeStrategy::InteractionModel => {
            assert_eq!(
                events,
                vec![ImEvent::CommandProcessed(1), ImEvent::CommandProcessed(1)]
            )
        }
        InvokeStrategy::LegacyZcl => assert!(events.is_empty()),
    }
}
