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

//! Network provisioning server.
//!
//! Networks are kept in an owned [`NetworkStore`]. Adding a network only
//! records it; enabling hands its credentials to the device through the
//! injected [`NetworkProvisioningDelegate`].

use std::sync::{Arc, Mutex};

use log::{info, warn};
use strum::FromRepr;

use super::{
    dispatcher::{ClusterKind, CommandContext, Direction, Dispatcher},
    fields::{Octets, Utf8},
};
use crate::{
    cmd_enter, command_args,
    error::{Error, ErrorCode},
    interaction_model::path::{CommandPathParams, EndptId},
};

pub const ID: u32 = 0x0031;

pub const MAX_NETWORK_ID_LEN: usize = 32;
pub const MAX_THREAD_DATASET_LEN: usize = 128;
pub const MAX_WIFI_SSID_LEN: usize = 32;
pub const MAX_WIFI_CREDENTIALS_LEN: usize = 64;
pub const MAX_NETWORKS: usize = 4;
pub const MAX_DEBUG_TEXT_LEN: usize = 128;

/// Network id given to every Thread network
pub const THREAD_NETWORK_ID: &str = "tmp-thread-network";

/// Endpoint responses are addressed to
pub const RESPONSE_ENDPOINT: EndptId = 1;

#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Commands {
    ScanNetworks = 0x00,
    ScanNetworksResponse = 0x01,
    AddWiFiNetwork = 0x02,
    AddWiFiNetworkResponse = 0x03,
    UpdateWiFiNetwork = 0x04,
    UpdateWiFiNetworkResponse = 0x05,
    AddThreadNetwork = 0x06,
    AddThreadNetworkResponse = 0x07,
    UpdateThreadNetwork = 0x08,
    UpdateThreadNetworkResponse = 0x09,
    RemoveNetwork = 0x0A,
    RemoveNetworkResponse = 0x0B,
    EnableNetwork = 0x0C,
    EnableNetworkResponse = 0x0D,
    DisableNetwork = 0x0E,
    DisableNetworkResponse = 0x0F,
    TestNetwork = 0x10,
    TestNetworkResponse = 0x11,
    GetLastNetworkProvisioningResult = 0x12,
}

impl Commands {
    /// The response answering this request
    pub fn response(self) -> Option<Commands> {
        Commands::from_repr(self as u32 + 1).filter(|r| *r as u32 % 2 == 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkProvisioningError {
    Success = 0,
    OutOfRange = 1,
    BoundsExceeded = 2,
    NetworkIdNotFound = 3,
    DuplicateNetworkId = 4,
    NetworkNotFound = 5,
    RegulatoryError = 6,
    AuthFailure = 7,
    UnsupportedSecurity = 8,
    OtherConnectionFailure = 9,
    Ipv6Failed = 10,
    IpBindFailed = 11,
    UnknownError = 19,
}

command_args! {
    pub struct ScanNetworksReq {
        pub ssid: Octets<MAX_WIFI_SSID_LEN>,
        pub breadcrumb: u64,
        pub timeout_ms: u32,
    }
}

command_args! {
    pub struct WiFiNetworkReq {
        pub ssid: Octets<MAX_WIFI_SSID_LEN>,
        pub credentials: Octets<MAX_WIFI_CREDENTIALS_LEN>,
        pub breadcrumb: u64,
        pub timeout_ms: u32,
    }
}

command_args! {
    pub struct ThreadNetworkReq {
        pub operational_dataset: Octets<MAX_THREAD_DATASET_LEN>,
        pub breadcrumb: u64,
        pub timeout_ms: u32,
    }
}

command_args! {
    /// Remove, Enable, Disable and Test share one argument list
    pub struct NetworkIdReq {
        pub network_id: Octets<MAX_NETWORK_ID_LEN>,
        pub breadcrumb: u64,
        pub timeout_ms: u32,
    }
}

command_args! {
    pub struct GetLastResultReq {
        pub timeout_ms: u32,
    }
}

command_args! {
    pub struct NetworkProvisioningResp {
        pub error_code: u8,
        pub debug_text: Utf8<MAX_DEBUG_TEXT_LEN>,
    }
}

impl NetworkProvisioningResp {
    fn new(error: NetworkProvisioningError, debug_text: &str) -> Self {
        Self {
            error_code: error as u8,
            debug_text: Utf8::new(debug_text).unwrap_or_default(),
        }
    }

    fn success() -> Self {
        Self::new(NetworkProvisioningError::Success, "CHIP_NO_ERROR")
    }

    fn failure(e: &Error) -> Self {
        Self::new(NetworkProvisioningError::UnknownError, &e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkInfo {
    Thread { dataset: Vec<u8> },
    WiFi { ssid: Vec<u8>, credentials: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: Vec<u8>,
    pub enabled: bool,
    pub info: NetworkInfo,
}

/// The networks known to the device, at most [`MAX_NETWORKS`]
#[derive(Debug, Default)]
pub struct NetworkStore {
    networks: Vec<Network>,
}

impl NetworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &[u8], info: NetworkInfo) -> Result<(), Error> {
        if id.len() > MAX_NETWORK_ID_LEN {
            return Err(ErrorCode::InvalidArgument.into());
        }
        if self.networks.len() >= MAX_NETWORKS {
            return Err(ErrorCode::NoMemory.into());
        }
        self.networks.push(Network {
            id: id.to_vec(),
            enabled: false,
            info,
        });
        Ok(())
    }

    pub fn find(&self, id: &[u8]) -> Option<&Network> {
        self.networks.iter().find(|n| n.id == id)
    }

    fn find_mut(&mut self, id: &[u8]) -> Option<&mut Network> {
        self.networks.iter_mut().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }
}

/// The device side of provisioning
pub trait NetworkProvisioningDelegate: Send + Sync {
    fn provision_thread(&self, dataset: &[u8]) -> Result<(), Error>;

    fn provision_wifi(&self, ssid: &[u8], credentials: &[u8]) -> Result<(), Error>;
}

pub struct NetworkProvisioningCluster {
    store: Mutex<NetworkStore>,
    delegate: Arc<dyn NetworkProvisioningDelegate>,
}

impl NetworkProvisioningCluster {
    pub fn new(store: NetworkStore, delegate: Arc<dyn NetworkProvisioningDelegate>) -> Self {
        Self {
            store: Mutex::new(store),
            delegate,
        }
    }

    pub fn register(
        self,
        dispatcher: &mut Dispatcher,
        endpoints: &[EndptId],
    ) -> Result<Arc<Self>, Error> {
        for endpoint in endpoints {
            dispatcher.add_cluster(*endpoint, ID, ClusterKind::Server, None)?;
        }
        let cluster = Arc::new(self);

        let c = cluster.clone();
        dispatcher.register_command(
            ID,
            Commands::AddThreadNetwork as u32,
            Direction::ClientToServer,
            None,
            move |ctx: &mut CommandContext, req: ThreadNetworkReq| c.add_thread_network(ctx, req),
        )?;
        let c = cluster.clone();
        dispatcher.register_command(
            ID,
            Commands::AddWiFiNetwork as u32,
            Direction::ClientToServer,
            None,
            move |ctx: &mut CommandContext, req: WiFiNetworkReq| c.add_wifi_network(ctx, req),
        )?;
        let c = cluster.clone();
        dispatcher.register_command(
            ID,
            Commands::EnableNetwork as u32,
            Direction::ClientToServer,
            None,
            move |ctx: &mut CommandContext, req: NetworkIdReq| c.enable_network(ctx, req),
        )?;

        // Accepted on the wire but left to the device
        dispatcher.register_command(
            ID,
            Commands::ScanNetworks as u32,
            Direction::ClientToServer,
            None,
            |_: &mut CommandContext, _: ScanNetworksReq| unhandled("ScanNetworks"),
        )?;
        dispatcher.register_command(
            ID,
            Commands::UpdateWiFiNetwork as u32,
            Direction::ClientToServer,
            None,
            |_: &mut CommandContext, _: WiFiNetworkReq| unhandled("UpdateWiFiNetwork"),
        )?;
        dispatcher.register_command(
            ID,
            Commands::UpdateThreadNetwork as u32,
            Direction::ClientToServer,
            None,
            |_: &mut CommandContext, _: ThreadNetworkReq| unhandled("UpdateThreadNetwork"),
        )?;
        for cmd in [
            Commands::RemoveNetwork,
            Commands::DisableNetwork,
            Commands::TestNetwork,
        ] {
            dispatcher.register_command(
                ID,
                cmd as u32,
                Direction::ClientToServer,
                None,
                move |_: &mut CommandContext, _: NetworkIdReq| unhandled(&format!("{:?}", cmd)),
            )?;
        }
        dispatcher.register_command(
            ID,
            Commands::GetLastNetworkProvisioningResult as u32,
            Direction::ClientToServer,
            None,
            |_: &mut CommandContext, _: GetLastResultReq| {
                unhandled("GetLastNetworkProvisioningResult")
            },
        )?;

        Ok(cluster)
    }

    /// Snapshot of the stored networks
    pub fn networks(&self) -> Result<Vec<Network>, Error> {
        Ok(self.store.lock()?.iter().cloned().collect())
    }

    fn add_thread_network(&self, ctx: &mut CommandContext, req: ThreadNetworkReq) -> bool {
        cmd_enter!("AddThreadNetwork");
        let result = self.store.lock().map_err(Error::from).and_then(|mut store| {
            store.add(
                THREAD_NETWORK_ID.as_bytes(),
                NetworkInfo::Thread {
                    dataset: req.operational_dataset.into_vec(),
                },
            )
        });
        respond(ctx, Commands::AddThreadNetworkResponse, result)
    }

    fn add_wifi_network(&self, ctx: &mut CommandContext, req: WiFiNetworkReq) -> bool {
        cmd_enter!("AddWiFiNetwork");
        info!(
            "WiFi provisioning data: SSID: {}",
            String::from_utf8_lossy(req.ssid.as_slice())
        );
        let ssid = req.ssid.into_vec();
        let result = self.store.lock().map_err(Error::from).and_then(|mut store| {
            store.add(
                &ssid,
                NetworkInfo::WiFi {
                    ssid: ssid.clone(),
                    credentials: req.credentials.into_vec(),
                },
            )
        });
        respond(ctx, Commands::AddWiFiNetworkResponse, result)
    }

    fn enable_network(&self, ctx: &mut CommandContext, req: NetworkIdReq) -> bool {
        cmd_enter!("EnableNetwork");
        let resp = match self.enable(req.network_id.as_slice()) {
            Ok(()) => NetworkProvisioningResp::success(),
            Err(e) if e.code() == ErrorCode::NotFound => NetworkProvisioningResp::new(
                NetworkProvisioningError::NetworkIdNotFound,
                "NetworkIDNotFound",
            ),
            Err(e) => NetworkProvisioningResp::failure(&e),
        };
        send(ctx, Commands::EnableNetworkResponse, &resp)
    }

    fn enable(&self, id: &[u8]) -> Result<(), Error> {
        let mut store = self.store.lock()?;
        let network = store.find_mut(id).ok_or(ErrorCode::NotFound)?;
        if network.enabled {
            info!("Network already enabled");
            return Ok(());
        }

        match &network.info {
            NetworkInfo::Thread { dataset } => self.delegate.provision_thread(dataset)?,
            NetworkInfo::WiFi { ssid, credentials } => {
                self.delegate.provision_wifi(ssid, credentials)?
            }
        }
        network.enabled = true;
        info!("Network {} enabled", String::from_utf8_lossy(id));
        Ok(())
    }
}

fn unhandled(cmd: &str) -> bool {
    info!("{} is not handled by this device", cmd);
    false
}

fn respond(ctx: &mut CommandContext, response: Commands, result: Result<(), Error>) -> bool {
    let resp = match result {
        Ok(()) => NetworkProvisioningResp::success(),
        Err(e) => {
            warn!("{:?} failed: {}", response, e);
            NetworkProvisioningResp::failure(&e)
        }
    };
    send(ctx, response, &resp)
}

fn send(ctx: &mut CommandContext, response: Commands, resp: &NetworkProvisioningResp) -> bool {
    let path = CommandPathParams::new(RESPONSE_ENDPOINT, ID, response as u32);
    match ctx.add_response_to(path, resp) {
        Ok(()) => true,
        Err(e) => {
            warn!("Unable to add {:?}: {}", response, e);
            false
        }
    }
}
