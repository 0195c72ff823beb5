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
    data_model::{
        cluster_network_provisioning::{
            self as net_prov, Commands, NetworkIdReq, NetworkInfo, ThreadNetworkReq,
            WiFiNetworkReq, MAX_NETWORKS, THREAD_NETWORK_ID,
        },
        fields::Octets,
    },
    interaction_model::{
        core::OpCode,
        messages::{ib::InvResp, msg::InvRespMsg},
        path::CommandPathParams,
        status::ZclStatus,
    },
    tlv::{get_root_node_struct, FromTLV},
};

use crate::common::{
    commands::{cmd_fields, invoke_request, single_inv_response, TestCmd},
    im_engine::{ImEngine, Provisioned, NET_PROV_ENDPOINT},
    init_env_logger,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Response(Commands, u8, String),
    Status(ZclStatus),
}

fn outcomes(payload: &[u8]) -> Vec<Outcome> {
    let resp = InvRespMsg::from_tlv(&get_root_node_struct(payload).unwrap()).unwrap();
    resp.inv_responses
        .unwrap()
        .iter()
        .map(|r| match r.unwrap() {
            InvResp::Cmd(c) => {
                assert_eq!(c.path.endpoint(), Some(net_prov::RESPONSE_ENDPOINT));
                assert_eq!(c.path.cluster_id, net_prov::ID);
                let data = c.data.unwrap();
                Outcome::Response(
                    Commands::from_repr(c.path.command_id).unwrap(),
                    data.find_tag(0).unwrap().u8().unwrap(),
                    data.find_tag(1).unwrap().str().unwrap().to_owned(),
                )
            }
            InvResp::Status(s) => Outcome::Status(s.status.zcl_status().unwrap()),
        })
        .collect()
}

fn invoke(im: &ImEngine, input: &[TestCmd]) -> Vec<Outcome> {
    let (result, exchange) = im.handle(OpCode::InvokeRequest, &invoke_request(input, false));
    result.unwrap();
    outcomes(single_inv_response(&exchange.take_outgoing()))
}

fn path(command: Commands) -> CommandPathParams {
    CommandPathParams::new(NET_PROV_ENDPOINT, net_prov::ID, command as u32)
}

fn add_thread(dataset: &[u8]) -> TestCmd {
    let req = ThreadNetworkReq {
        operational_dataset: Octets::new(dataset).unwrap(),
        breadcrumb: 1,
        timeout_ms: 1000,
    };
    (path(Commands::AddThreadNetwork), cmd_fields(&req))
}

fn add_wifi(ssid: &[u8], credentials: &[u8]) -> TestCmd {
    let req = WiFiNetworkReq {
        ssid: Octets::new(ssid).unwrap(),
        credentials: Octets::new(credentials).unwrap(),
        breadcrumb: 1,
        timeout_ms: 1000,
    };
    (path(Commands::AddWiFiNetwork), cmd_fields(&req))
}

fn network_id_cmd(command: Commands, network_id: &[u8]) -> TestCmd {
    let req = NetworkIdReq {
        network_id: Octets::new(network_id).unwrap(),
        breadcrumb: 1,
        timeout_ms: 1000,
    };
    (path(command), cmd_fields(&req))
}

fn success(response: Commands) -> Outcome {
    Outcome::Response(response, 0, "CHIP_NO_ERROR".to_owned())
}

#[test]
fn test_thread_network_added_and_enabled() {
    init_env_logger();
    let im = ImEngine::default();
    let dataset = [0x0e, 0x08, 0x00, 0x00, 0x00, 0x01];

    let outcomes = invoke(
        &im,
        &[
            add_thread(&dataset),
            network_id_cmd(Commands::EnableNetwork, THREAD_NETWORK_ID.as_bytes()),
        ],
    );
    assert_eq!(
        outcomes,
        vec![
            success(Commands::AddThreadNetworkResponse),
            success(Commands::EnableNetworkResponse),
        ]
    );
    assert_eq!(
        *im.provisioned.provisioned.lock().unwrap(),
        vec![Provisioned::Thread(dataset.to_vec())]
    );

    let networks = im.net_prov.networks().unwrap();
    assert_eq!(networks.len(), 1);
    assert!(networks[0].enabled);
    assert_eq!(
        networks[0].info,
        NetworkInfo::Thread {
            dataset: dataset.to_vec()
        }
    );
}

#[test]
fn test_wifi_network_enabled_once() {
    init_env_logger();
    let im = ImEngine::default();

    invoke(&im, &[add_wifi(b"home", b"secret")]);
    let enable = network_id_cmd(Commands::EnableNetwork, b"home");
    let outcomes = invoke(&im, &[enable.clone(), enable]);
    assert_eq!(
        outcomes,
        vec![
            success(Commands::EnableNetworkResponse),
            success(Commands::EnableNetworkResponse),
        ]
    );
    assert_eq!(
        *im.provisioned.provisioned.lock().unwrap(),
        vec![Provisioned::WiFi(b"home".to_vec(), b"secret".to_vec())]
    );
}

#[test]
fn test_enable_unknown_network() {
    init_env_logger();
    let im = ImEngine::default();

    let outcomes = invoke(&im, &[network_id_cmd(Commands::EnableNetwork, b"nowhere")]);
    assert_eq!(
        outcomes,
        vec![Outcome::Response(
            Commands::EnableNetworkResponse,
            3,
            "NetworkIDNotFound".to_owned()
        )]
    );
    assert!(im.provisioned.provisioned.lock().unwrap().is_empty());
}

#[test]
fn test_store_full() {
    init_env_logger();
    let im = ImEngine::default();

    let ssids: Vec<Vec<u8>> = (0..=MAX_NETWORKS)
        .map(|i| format!("net{}", i).into_bytes())
        .collect();
    let input: Vec<_> = ssids.iter().map(|ssid| add_wifi(ssid, b"pw")).collect();
    let outcomes = invoke(&im, &input);

    assert_eq!(outcomes.len(), MAX_NETWORKS + 1);
    for outcome in &outcomes[..MAX_NETWORKS] {
        assert_eq!(*outcome, success(Commands::AddWiFiNetworkResponse));
    }
    assert_eq!(
        outcomes[MAX_NETWORKS],
        Outcome::Response(Commands::AddWiFiNetworkResponse, 19, "NoMemory".to_owned())
    );
    assert_eq!(im.net_prov.networks().unwrap().len(), MAX_NETWORKS);
}

#[test]
fn test_commands_left_to_the_device() {
    init_env_logger();
    let im = ImEngine::default();

    let outcomes = invoke(
        &im,
        &[
            network_id_cmd(Commands::RemoveNetwork, b"home"),
            network_id_cmd(Commands::DisableNetwork, b"home"),
            network_id_cmd(Commands::TestNetwork, b"home"),
        ],
    );
    assert_eq!(outcomes, vec![Outcome::Status(ZclStatus::UnsupCommand); 3]);
}

#[test]
fn test_malformed_request() {
    init_env_logger();
    let im = ImEngine::default();

    // AddWiFiNetwork without any fields
    let outcomes = invoke(&im, &[(path(Commands::AddWiFiNetwork), None)]);
    assert_eq!(outcomes, vec![Outcome::Status(ZclStatus::MalformedCommand)]);
    assert!(im.net_prov.networks().unwrap().is_empty());
}
