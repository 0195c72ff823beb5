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
    data_model::cluster_on_off,
    error::ErrorCode,
    interaction_model::{
        core::{IMStatusCode, OpCode},
        messages::{
            ib::{AttrDataTag, AttrStatus},
            msg::{StatusResp, WriteReqTag, WriteResp, WriteRespTag},
        },
        path::AttributePathParams,
        status::{StatusElement, ZclStatus},
    },
    tlv::{get_root_node_struct, FromTLV, TLVWriter, TagType, ToTLV},
    transport::exchange::{Exchange, ExchangeContext},
    utils::writebuf::WriteBuf,
};
use rstest::rstest;

use crate::common::{
    im_engine::{ImEngine, ImEvent},
    init_env_logger,
};

const APP_ID: u64 = 7;

fn on_off(endpoint: u16, attr: u32) -> AttributePathParams {
    AttributePathParams::new(endpoint, cluster_on_off::ID, attr)
}

fn write_request(attrs: &[(AttributePathParams, bool)]) -> Vec<u8> {
    let mut wb = WriteBuf::new(512);
    let mut tw = TLVWriter::new(&mut wb);
    tw.start_struct(TagType::Anonymous).unwrap();
    tw.bool(TagType::Context(WriteReqTag::SuppressResponse as u8), false)
        .unwrap();
    tw.start_array(TagType::Context(WriteReqTag::WriteRequests as u8))
        .unwrap();
    for (path, value) in attrs {
        tw.start_struct(TagType::Anonymous).unwrap();
        path.to_tlv(&mut tw, TagType::Context(AttrDataTag::Path as u8))
            .unwrap();
        tw.bool(TagType::Context(AttrDataTag::Data as u8), *value)
            .unwrap();
        tw.end_container().unwrap();
    }
    tw.end_container().unwrap();
    tw.end_container().unwrap();
    wb.into_vec()
}

fn write_response(statuses: &[(AttributePathParams, ZclStatus)]) -> Vec<u8> {
    let mut wb = WriteBuf::new(512);
    let mut tw = TLVWriter::new(&mut wb);
    tw.start_struct(TagType::Anonymous).unwrap();
    tw.start_array(TagType::Context(WriteRespTag::WriteResponses as u8))
        .unwrap();
    for (path, status) in statuses {
        AttrStatus::new(*path, StatusElement::from_zcl(*status))
            .to_tlv(&mut tw, TagType::Anonymous)
            .unwrap();
    }
    tw.end_container().unwrap();
    tw.end_container().unwrap();
    wb.into_vec()
}

// Sends a write of `paths` from `client`, leaving it awaiting the response
fn send_write(client: &ImEngine, paths: &[AttributePathParams]) -> Arc<Exchange> {
    let handle = client.engine.new_write_client(APP_ID).unwrap();
    for path in paths {
        handle.put_attribute(path, &true).unwrap();
    }
    let exchange = client.initiate();
    handle.send_write_request(exchange.clone()).unwrap();
    exchange
}

#[test]
fn test_write_statuses_in_request_order() {
    init_env_logger();
    let im = ImEngine::default();

    let input = [
        (on_off(1, 0), true),
        (on_off(1, 9), true),
        (on_off(7, 0), true),
    ];
    let (result, exchange) = im.handle(OpCode::WriteRequest, &write_request(&input));
    result.unwrap();

    let sent = exchange.take_outgoing();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].opcode, OpCode::WriteResponse as u8);
    let resp = WriteResp::from_tlv(&get_root_node_struct(&sent[0].payload).unwrap()).unwrap();
    let statuses: Vec<_> = resp
        .write_responses
        .iter()
        .map(|s| {
            let s = s.unwrap();
            (s.path, s.status.zcl_status().unwrap())
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            (on_off(1, 0), ZclStatus::Success),
            (on_off(1, 9), ZclStatus::UnsupportedAttribute),
            (on_off(7, 0), ZclStatus::UnsupportedCluster),
        ]
    );
    assert_eq!(im.light.get(1), Some(true));
    assert!(!exchange.is_open());
}

#[test]
fn test_write_client_round_trip() {
    init_env_logger();
    let client = ImEngine::default();
    let server = ImEngine::default();

    let handle = client.engine.new_write_client(APP_ID).unwrap();
    handle.put_attribute(&on_off(1, 0), &true).unwrap();
    let exchange = client.converse(&server, |exchange| {
        handle.send_write_request(exchange).unwrap();
    });

    assert_eq!(
        client.events.take(),
        vec![
            ImEvent::WriteStatus(
                APP_ID,
                on_off(1, 0),
                StatusElement::from_zcl(ZclStatus::Success),
                0
            ),
            ImEvent::WriteProcessed(APP_ID),
        ]
    );
    assert_eq!(server.light.get(1), Some(true));
    assert!(!exchange.is_open());
}

#[rstest]
#[case::permuted(&[(1, ZclStatus::Success), (0, ZclStatus::Success)], 0)]
#[case::too_few(&[(0, ZclStatus::Success)], 1)]
#[case::too_many(&[(0, ZclStatus::Success), (1, ZclStatus::Success), (1, ZclStatus::Success)], 2)]
fn test_mismatched_write_response(#[case] statuses: &[(u32, ZclStatus)], #[case] index: u8) {
    init_env_logger();
    let client = ImEngine::default();
    let exchange = send_write(&client, &[on_off(1, 0), on_off(1, 1)]);

    let statuses: Vec<_> = statuses
        .iter()
        .map(|(attr, status)| (on_off(1, *attr), *status))
        .collect();
    client
        .engine
        .on_message_received(
            exchange.clone(),
            OpCode::WriteResponse as u8,
            &write_response(&statuses),
        )
        .unwrap();

    assert_eq!(
        client.events.take(),
        vec![
            ImEvent::WriteProtocolError(APP_ID, index),
            ImEvent::WriteError(APP_ID, ErrorCode::InvalidResponse),
        ]
    );
    assert!(!exchange.is_open());
}

#[test]
fn test_status_response_ends_write() {
    init_env_logger();
    let client = ImEngine::default();
    let exchange = send_write(&client, &[on_off(1, 0)]);

    let mut wb = WriteBuf::new(32);
    let mut tw = TLVWriter::new(&mut wb);
    StatusResp {
        status: IMStatusCode::Busy,
    }
    .to_tlv(&mut tw, TagType::Anonymous)
    .unwrap();

    client
        .engine
        .on_message_received(exchange.clone(), OpCode::StatusResponse as u8, wb.as_slice())
        .unwrap();
    assert_eq!(
        client.events.take(),
        vec![ImEvent::WriteError(APP_ID, ErrorCode::Busy)]
    );
}

#[test]
fn test_timeout_releases_client() {
    init_env_logger();
    let client = ImEngine::default();
    let exchange = send_write(&client, &[on_off(1, 0)]);

    client.engine.on_response_timeout(exchange.id()).unwrap();
    assert_eq!(
        client.events.take(),
        vec![ImEvent::WriteError(APP_ID, ErrorCode::Timeout)]
    );

    // The late answer finds nobody waiting
    let late = client.engine.on_message_received(
        exchange.clone(),
        OpCode::WriteResponse as u8,
        &write_response(&[(on_off(1, 0), ZclStatus::Success)]),
    );
    assert_eq!(late.unwrap_err().code(), ErrorCode::NoHandler);
    assert!(client.events.take().is_empty());
}

#[test]
fn test_write_client_pool() {
    init_env_logger();
    let client = ImEngine::default();

    let handles: Vec<_> = (0..client.engine.config().max_write_clients)
        .map(|i| client.engine.new_write_client(i as u64).unwrap())
        .collect();
    assert_eq!(
        client.engine.new_write_client(99).err().map(|e| e.code()),
        Some(ErrorCode::NoMemory)
    );

    drop(handles);
    let handle = client.engine.new_write_client(99).unwrap();
    assert_eq!(handle.lock().unwrap().app_identifier(), 99);
}
