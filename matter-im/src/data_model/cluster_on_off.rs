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

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::{info, warn};
use strum::FromRepr;

use super::dispatcher::{ClusterKind, CommandContext, Direction, Dispatcher};
use crate::{
    cmd_enter,
    error::Error,
    interaction_model::{path::EndptId, status::ZclStatus},
};

pub const ID: u32 = 0x0006;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attributes {
    OnOff = 0x0,
}

#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Commands {
    Off = 0x0,
    On = 0x01,
    Toggle = 0x02,
}

type Hook = Box<dyn Fn(EndptId, bool) + Send + Sync>;

/// Server side of the OnOff cluster, one light per endpoint
#[derive(Default)]
pub struct OnOffCluster {
    state: Mutex<HashMap<EndptId, bool>>,
    on_change: Option<Hook>,
}

impl OnOffCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new value every time an endpoint changes state
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(EndptId, bool) + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(hook));
        self
    }

    /// Adds the cluster to `endpoints` and wires its commands and attribute
    pub fn register(
        self,
        dispatcher: &mut Dispatcher,
        endpoints: &[EndptId],
    ) -> Result<Arc<Self>, Error> {
        let cluster = Arc::new(self);
        {
            let mut state = cluster.state.lock()?;
            for endpoint in endpoints {
                dispatcher.add_cluster(*endpoint, ID, ClusterKind::Server, None)?;
                state.insert(*endpoint, false);
            }
        }

        for cmd in [Commands::Off, Commands::On, Commands::Toggle] {
            let c = cluster.clone();
            dispatcher.register_command(
                ID,
                cmd as u32,
                Direction::ClientToServer,
                None,
                move |ctx: &mut CommandContext, _: ()| c.handle_command(ctx),
            )?;
        }

        let c = cluster.clone();
        dispatcher.register_attribute(ID, Attributes::OnOff as u32, move |endpoint, data| {
            let value = data.bool().map_err(|_| ZclStatus::InvalidValue)?;
            c.set(endpoint, value).map_err(|_| ZclStatus::Failure)
        })?;

        Ok(cluster)
    }

    pub fn get(&self, endpoint: EndptId) -> Option<bool> {
        self.state.lock().ok()?.get(&endpoint).copied()
    }

    pub fn set(&self, endpoint: EndptId, value: bool) -> Result<(), Error> {
        let changed = {
            let mut state = self.state.lock()?;
            let current = state.entry(endpoint).or_insert(false);
            let changed = *current != value;
            *current = value;
            changed
        };
        if changed {
            info!("Endpoint {} is now {}", endpoint, if value { "on" } else { "off" });
            if let Some(hook) = &self.on_change {
                hook(endpoint, value);
            }
        }
        Ok(())
    }

    fn handle_command(&self, ctx: &mut CommandContext) -> bool {
        let endpoint = ctx.endpoint();
        let cmd = match Commands::from_repr(ctx.request().command) {
            Some(cmd) => cmd,
            None => return false,
        };

        let value = match cmd {
            Commands::Off => {
                cmd_enter!("Off");
                false
            }
            Commands::On => {
                cmd_enter!("On");
                true
            }
            Commands::Toggle => {
                cmd_enter!("Toggle");
                !self.get(endpoint).unwrap_or(false)
            }
        };

        match self.set(endpoint, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("Unable to update endpoint {}: {}", endpoint, e);
                false
            }
        }
    }
}
