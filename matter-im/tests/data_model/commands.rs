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

use matter_im::{
    config::ImConfig,
    data_model::{
        cluster_network_provisioning::{self as net_prov, WiFiNetworkReq},
        cluster_on_off,
        fields::Octets,
    },
    error::ErrorCode,
    interaction_model::{
        core::{IMStatusCode, OpCode},
        messages::ib::CmdDataTag,
        path::CommandPathParams,
        status::ZclStatus,
    },
    tlv::{TLVWriter, TagType},
    transport::exchange::ExchangeContext,
    utils::writebuf::WriteBuf,
};
use rstest::rstest;

use crate::common::{
    commands::{
        assert_inv_response, cmd_fields, invoke_request, single_inv_response, status_response,
        ExpectedInvResp, TestCmd,
    },
    echo_cluster::{self, EchoArgs},
    im_engine::ImEngine,
    init_env_logger,
};
use crate::{echo_req, echo_resp};

// Invokes `input` on a fresh node and checks the one response it sends
fn handle_commands(input: &[TestCmd], expected: &[ExpectedInvResp]) {
    let im = ImEngine::default();
    let (result, exchange) = im.handle(OpCode::InvokeRequest, &invoke_request(input, false));
    result.unwrap();
    assert!(!exchange.is_open());
    assert_inv_response(single_inv_response(&exchange.take_outgoing()), expected);
}

fn echo_path(endpoint: u16, command: u32) -> CommandPathParams {
    CommandPathParams::new(endpoint, echo_cluster::ID, command)
}

#[test]
fn test_invoke_cmds_success() {
    // 2 echo Requests
    // - one on endpoint 0 with data 5,
    // - another on endpoint 1 with data 10
    init_env_logger();

    let input = &[echo_req!(0, 5), echo_req!(1, 10)];
    let expected = &[echo_resp!(0, 10), echo_resp!(1, 30)];
    handle_commands(input, expected);
}

#[test]
fn test_invoke_cmds_unsupported_fields() {
    // 5 commands
    // - endpoint doesn't exist - UnsupportedCluster
    // - cluster doesn't exist - UnsupportedCluster
    // - group addressed, no endpoint - UnsupportedCluster
    // - command doesn't exist - UnsupCommand
    // - command of the other direction - UnsupCommand
    init_env_logger();

    let invalid_endpoint = echo_path(5, echo_cluster::Commands::EchoReq as u32);
    let invalid_cluster = CommandPathParams::new(0, 0x1234, 0);
    let wildcard = CommandPathParams::new_group(3, echo_cluster::ID, 0);
    let invalid_command = echo_path(0, 0x55);
    let response_command = echo_path(0, echo_cluster::Commands::EchoResp as u32);

    let input = &[
        (invalid_endpoint, None),
        (invalid_cluster, None),
        (wildcard, None),
        (invalid_command, None),
        (response_command, None),
    ];
    let expected = &[
        ExpectedInvResp::Status(invalid_endpoint, ZclStatus::UnsupportedCluster),
        ExpectedInvResp::Status(invalid_cluster, ZclStatus::UnsupportedCluster),
        ExpectedInvResp::Status(wildcard, ZclStatus::UnsupportedCluster),
        ExpectedInvResp::Status(invalid_command, ZclStatus::UnsupCommand),
        ExpectedInvResp::Status(response_command, ZclStatus::UnsupCommand),
    ];
    handle_commands(input, expected);
}

#[test]
fn test_invoke_cmd_on_off() {
    init_env_logger();
    let im = ImEngine::default();
    let on = CommandPathParams::new(1, cluster_on_off::ID, cluster_on_off::Commands::On as u32);

    let request = invoke_request(&[(on, None)], false);
    let (result, exchange) = im.handle(OpCode::InvokeRequest, &request);
    result.unwrap();

    assert_inv_response(
        single_inv_response(&exchange.take_outgoing()),
        &[ExpectedInvResp::Status(on, ZclStatus::Success)],
    );
    assert!(!exchange.is_open());
    assert_eq!(im.light.get(1), Some(true));
}

#[test]
fn test_malformed_element_keeps_its_slot() {
    // The middle command carries a string where a u8 is expected
    init_env_logger();

    let mut wb = WriteBuf::new(64);
    let mut tw = TLVWriter::new(&mut wb);
    tw.start_struct(TagType::Context(CmdDataTag::Data as u8)).unwrap();
    tw.utf8(TagType::Context(0), "five").unwrap();
    tw.end_container().unwrap();
    let bad_fields = Some(wb.into_vec());

    let echo = echo_path(0, echo_cluster::Commands::EchoReq as u32);
    let input = &[echo_req!(0, 1), (echo, bad_fields), echo_req!(1, 2)];
    let expected = &[
        echo_resp!(0, 2),
        ExpectedInvResp::Status(echo, ZclStatus::MalformedCommand),
        echo_resp!(1, 6),
    ];
    handle_commands(input, expected);
}

#[test]
fn test_undecodable_path_answered_with_default_path() {
    init_env_logger();

    let mut wb = WriteBuf::new(128);
    let mut tw = TLVWriter::new(&mut wb);
    tw.start_struct(TagType::Anonymous).unwrap();
    tw.start_array(TagType::Context(2)).unwrap();
    // Path is a u8 instead of a list
    tw.start_struct(TagType::Anonymous).unwrap();
    tw.u8(TagType::Context(CmdDataTag::Path as u8), 7).unwrap();
    tw.end_container().unwrap();
    tw.end_container().unwrap();
    tw.end_container().unwrap();

    let im = ImEngine::default();
    let (result, exchange) = im.handle(OpCode::InvokeRequest, wb.as_slice());
    result.unwrap();

    let default_path = CommandPathParams {
        endpoint_id: 0,
        group_id: 0,
        cluster_id: 0,
        command_id: 0,
        flags: Default::default(),
    };
    assert_inv_response(
        single_inv_response(&exchange.take_outgoing()),
        &[ExpectedInvResp::Status(default_path, ZclStatus::MalformedCommand)],
    );
}

#[test]
fn test_unknown_tags_are_ignored() {
    init_env_logger();
    let echo = echo_path(1, echo_cluster::Commands::EchoReq as u32);

    let mut wb = WriteBuf::new(128);
    let mut tw = TLVWriter::new(&mut wb);
    tw.start_struct(TagType::Context(CmdDataTag::Data as u8)).unwrap();
    tw.u8(TagType::Context(0), 7).unwrap();
    tw.utf8(TagType::Context(9), "extra").unwrap();
    tw.end_container().unwrap();
    // An unknown member of the command data element as well
    tw.bool(TagType::Context(5), true).unwrap();

    handle_commands(&[(echo, Some(wb.into_vec()))], &[echo_resp!(1, 21)]);
}

#[test]
fn test_unparsable_request_gets_status_response() {
    init_env_logger();
    let im = ImEngine::default();

    // SuppressResponse carries a u8
    let (result, exchange) = im.handle(OpCode::InvokeRequest, &[0x15, 0x24, 0x00, 0x05, 0x18]);
    assert!(result.is_err());

    let sent = exchange.take_outgoing();
    assert_eq!(sent.len(), 1);
    assert_eq!(status_response(&sent[0]), IMStatusCode::InvalidAction);
    assert!(!exchange.is_open());
    assert_eq!(im.engine.active_handlers(), 0);
}

fn add_wifi(ssid: &str) -> TestCmd {
    let req = WiFiNetworkReq {
        ssid: Octets::new(ssid.as_bytes()).unwrap(),
        credentials: Octets::new(b"secret").unwrap(),
        breadcrumb: 0,
        timeout_ms: 1000,
    };
    (
        CommandPathParams::new(0, net_prov::ID, net_prov::Commands::AddWiFiNetwork as u32),
        cmd_fields(&req),
    )
}

#[rstest]
#[case::room_for_all(1024, 3)]
#[case::exact_fit(124, 3)]
#[case::last_one_exhausted(123, 2)]
#[case::only_status_fits(114, 2)]
fn test_response_out_of_room(#[case] max_payload: usize, #[case] answered: usize) {
    init_env_logger();
    let im = ImEngine::new(ImConfig::default().with_max_payload(max_payload));

    let input = [add_wifi("one"), add_wifi("two"), add_wifi("six")];
    let (result, exchange) = im.handle(OpCode::InvokeRequest, &invoke_request(&input, false));
    result.unwrap();

    let response_path = CommandPathParams::new(
        net_prov::RESPONSE_ENDPOINT,
        net_prov::ID,
        net_prov::Commands::AddWiFiNetworkResponse as u32,
    );
    let expected: Vec<_> = input
        .iter()
        .enumerate()
        .map(|(i, (path, _))| {
            if i < answered {
                ExpectedInvResp::Cmd(response_path, 0)
            } else {
                ExpectedInvResp::Status(*path, ZclStatus::NO_MEMORY)
            }
        })
        .collect();
    assert_inv_response(single_inv_response(&exchange.take_outgoing()), &expected);
}

#[test]
fn test_deferred_commands_answered_together() {
    init_env_logger();
    let im = ImEngine::default();
    let deferred = echo_path(1, echo_cluster::Commands::DeferredEchoReq as u32);

    let input = [
        (deferred, cmd_fields(&EchoArgs { value: 4 })),
        echo_req!(0, 5),
        (deferred, cmd_fields(&EchoArgs { value: 1 })),
    ];
    let (result, exchange) = im.handle(OpCode::InvokeRequest, &invoke_request(&input, false));
    result.unwrap();

    assert_eq!(exchange.pending_count(), 0);
    assert_eq!(im.echo.deferred_count(), 2);
    assert_eq!(im.engine.active_handlers(), 1);

    let echo = im.echo.clone();
    std::thread::spawn(move || echo.complete_deferred())
        .join()
        .unwrap();

    assert_eq!(im.engine.active_handlers(), 0);
    assert!(!exchange.is_open());
    assert_inv_response(
        single_inv_response(&exchange.take_outgoing()),
        &[echo_resp!(1, 12), echo_resp!(0, 10), echo_resp!(1, 3)],
    );
}

#[test]
fn test_suppressed_response() {
    init_env_logger();
    let im = ImEngine::default();
    let toggle = CommandPathParams::new(
        1,
        cluster_on_off::ID,
        cluster_on_off::Commands::Toggle as u32,
    );

    let request = invoke_request(&[(toggle, None)], true);
    let (result, exchange) = im.handle(OpCode::InvokeRequest, &request);
    result.unwrap();

    assert!(exchange.take_outgoing().is_empty());
    assert!(!exchange.is_open());
    assert_eq!(im.light.get(1), Some(true));
}

#[test]
fn test_busy_when_no_handler_is_free() {
    init_env_logger();
    let config = ImConfig {
        max_command_handlers: 1,
        ..Default::default()
    };
    let im = ImEngine::new(config);
    let deferred = (
        echo_path(0, echo_cluster::Commands::DeferredEchoReq as u32),
        cmd_fields(&EchoArgs { value: 3 }),
    );

    let (result, first) = im.handle(OpCode::InvokeRequest, &invoke_request(&[deferred], false));
    result.unwrap();

    let request = invoke_request(&[echo_req!(0, 1)], false);
    let (result, second) = im.handle(OpCode::InvokeRequest, &request);
    assert_eq!(result.unwrap_err().code(), ErrorCode::Busy);
    let sent = second.take_outgoing();
    assert_eq!(sent.len(), 1);
    assert_eq!(status_response(&sent[0]), IMStatusCode::Busy);
    assert!(!second.is_open());

    im.echo.complete_deferred();
    assert_inv_response(single_inv_response(&first.take_outgoing()), &[echo_resp!(0, 6)]);

    let (result, third) = im.handle(OpCode::InvokeRequest, &request);
    result.unwrap();
    assert_inv_response(single_inv_response(&third.take_outgoing()), &[echo_resp!(0, 2)]);
}

#[test]
fn test_timed_request_is_acknowledged() {
    init_env_logger();
    let im = ImEngine::default();

    let (result, exchange) = im.handle(OpCode::TimedRequest, &[0x15, 0x25, 0x00, 0xe8, 0x03, 0x18]);
    result.unwrap();
    let sent = exchange.take_outgoing();
    assert_eq!(sent.len(), 1);
    assert_eq!(status_response(&sent[0]), IMStatusCode::Success);
}
