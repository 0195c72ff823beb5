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

use log::info;

use super::CommandInvoker;
use crate::{
    data_model::{
        cluster_network_provisioning::{
            self as net_prov, GetLastResultReq, NetworkIdReq, NetworkProvisioningResp,
            ScanNetworksReq, ThreadNetworkReq, WiFiNetworkReq,
        },
        cluster_on_off as on_off,
        dispatcher::{ClusterKind, CommandContext, Direction, Dispatcher},
        fields::{CommandArgs, Octets},
    },
    error::Error,
    interaction_model::path::{ClusterId, CommandId, CommandPathParams, EndptId},
    transport::exchange::ExchangeContext,
};

/// Sends the commands of one cluster to one remote endpoint
pub struct ClusterClient {
    invoker: Arc<dyn CommandInvoker>,
    endpoint: EndptId,
    cluster: ClusterId,
}

impl ClusterClient {
    pub fn new(invoker: Arc<dyn CommandInvoker>, endpoint: EndptId, cluster: ClusterId) -> Self {
        Self {
            invoker,
            endpoint,
            cluster,
        }
    }

    pub fn endpoint(&self) -> EndptId {
        self.endpoint
    }

    pub fn invoke<A: CommandArgs>(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        command: CommandId,
        args: &A,
    ) -> Result<u64, Error> {
        let path = CommandPathParams::new(self.endpoint, self.cluster, command);
        self.invoker
            .invoke(exchange, &path, &|w| args.write_fields(w))
    }
}

pub struct OnOffClient(ClusterClient);

impl OnOffClient {
    pub fn new(invoker: Arc<dyn CommandInvoker>, endpoint: EndptId) -> Self {
        Self(ClusterClient::new(invoker, endpoint, on_off::ID))
    }

    pub fn off(&self, exchange: Arc<dyn ExchangeContext>) -> Result<u64, Error> {
        self.0.invoke(exchange, on_off::Commands::Off as u32, &())
    }

    pub fn on(&self, exchange: Arc<dyn ExchangeContext>) -> Result<u64, Error> {
        self.0.invoke(exchange, on_off::Commands::On as u32, &())
    }

    pub fn toggle(&self, exchange: Arc<dyn ExchangeContext>) -> Result<u64, Error> {
        self.0.invoke(exchange, on_off::Commands::Toggle as u32, &())
    }
}

pub struct NetworkProvisioningClient(ClusterClient);

impl NetworkProvisioningClient {
    pub fn new(invoker: Arc<dyn CommandInvoker>, endpoint: EndptId) -> Self {
        Self(ClusterClient::new(invoker, endpoint, net_prov::ID))
    }

    /// Accepts the server's responses on `endpoint` of the local node and
    /// hands each one to `callback`
    pub fn register_responses<F>(
        dispatcher: &mut Dispatcher,
        endpoint: EndptId,
        callback: F,
    ) -> Result<(), Error>
    where
        F: Fn(net_prov::Commands, NetworkProvisioningResp) + Send + Sync + 'static,
    {
        dispatcher.add_cluster(endpoint, net_prov::ID, ClusterKind::Client, None)?;
        let callback = Arc::new(callback);
        for response in [
            net_prov::Commands::AddWiFiNetworkResponse,
            net_prov::Commands::UpdateWiFiNetworkResponse,
            net_prov::Commands::AddThreadNetworkResponse,
            net_prov::Commands::UpdateThreadNetworkResponse,
            net_prov::Commands::RemoveNetworkResponse,
            net_prov::Commands::EnableNetworkResponse,
            net_prov::Commands::DisableNetworkResponse,
            net_prov::Commands::TestNetworkResponse,
        ] {
            let callback = callback.clone();
            dispatcher.register_command(
                net_prov::ID,
                response as u32,
                Direction::ServerToClient,
                None,
                move |_: &mut CommandContext, resp: NetworkProvisioningResp| {
                    info!(
                        "{:?}: {} {}",
                        response,
                        resp.error_code,
                        resp.debug_text.as_str()
                    );
                    callback(response, resp);
                    true
                },
            )?;
        }
        Ok(())
    }

    pub fn scan_networks(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        ssid: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        let req = ScanNetworksReq {
            ssid: Octets::new(ssid)?,
            breadcrumb,
            timeout_ms,
        };
        self.0
            .invoke(exchange, net_prov::Commands::ScanNetworks as u32, &req)
    }

    pub fn add_wifi_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        ssid: &[u8],
        credentials: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        let req = WiFiNetworkReq {
            ssid: Octets::new(ssid)?,
            credentials: Octets::new(credentials)?,
            breadcrumb,
            timeout_ms,
        };
        self.0
            .invoke(exchange, net_prov::Commands::AddWiFiNetwork as u32, &req)
    }

    pub fn update_wifi_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        ssid: &[u8],
        credentials: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        let req = WiFiNetworkReq {
            ssid: Octets::new(ssid)?,
            credentials: Octets::new(credentials)?,
            breadcrumb,
            timeout_ms,
        };
        self.0
            .invoke(exchange, net_prov::Commands::UpdateWiFiNetwork as u32, &req)
    }

    pub fn add_thread_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        operational_dataset: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        let req = ThreadNetworkReq {
            operational_dataset: Octets::new(operational_dataset)?,
            breadcrumb,
            timeout_ms,
        };
        self.0
            .invoke(exchange, net_prov::Commands::AddThreadNetwork as u32, &req)
    }

    pub fn update_thread_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        operational_dataset: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        let req = ThreadNetworkReq {
            operational_dataset: Octets::new(operational_dataset)?,
            breadcrumb,
            timeout_ms,
        };
        self.0
            .invoke(exchange, net_prov::Commands::UpdateThreadNetwork as u32, &req)
    }

    fn network_id_command(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        command: net_prov::Commands,
        network_id: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        let req = NetworkIdReq {
            network_id: Octets::new(network_id)?,
            breadcrumb,
            timeout_ms,
        };
        self.0.invoke(exchange, command as u32, &req)
    }

    pub fn remove_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        network_id: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        self.network_id_command(
            exchange,
            net_prov::Commands::RemoveNetwork,
            network_id,
            breadcrumb,
            timeout_ms,
        )
    }

    pub fn enable_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        network_id: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        self.network_id_command(
            exchange,
            net_prov::Commands::EnableNetwork,
            network_id,
            breadcrumb,
            timeout_ms,
        )
    }

    pub fn disable_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        network_id: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        self.network_id_command(
            exchange,
            net_prov::Commands::DisableNetwork,
            network_id,
            breadcrumb,
            timeout_ms,
        )
    }

    pub fn test_network(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        network_id: &[u8],
        breadcrumb: u64,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        self.network_id_command(
            exchange,
            net_prov::Commands::TestNetwork,
            network_id,
            breadcrumb,
            timeout_ms,
        )
    }

    pub fn get_last_network_provisioning_result(
        &self,
        exchange: Arc<dyn ExchangeContext>,
        timeout_ms: u32,
    ) -> Result<u64, Error> {
        self.0.invoke(
            exchange,
            net_prov::Commands::GetLastNetworkProvisioningResult as u32,
            &GetLastResultReq { timeout_ms },
        )
    }
}
