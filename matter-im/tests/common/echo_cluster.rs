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

use matter_im::{
    command_args,
    data_model::dispatcher::{ClusterKind, CommandContext, Direction, Dispatcher},
    interaction_model::{command_handler::PendingWork, path::EndptId},
};
use num_derive::FromPrimitive;

pub const ID: u32 = 0xABCD;

#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    EchoReq = 0x00,
    EchoResp = 0x01,
    // Answered later, through `EchoCluster::complete_deferred`
    DeferredEchoReq = 0x02,
}

command_args! {
    pub struct EchoArgs {
        pub value: u8,
    }
}

/// Multiplies the value it receives by a per-endpoint factor
pub struct EchoCluster {
    multipliers: HashMap<EndptId, u8>,
    deferred: Mutex<Vec<(PendingWork, EchoArgs)>>,
}

impl EchoCluster {
    pub fn register(dispatcher: &mut Dispatcher, multipliers: &[(EndptId, u8)]) -> Arc<Self> {
        for (endpoint, _) in multipliers {
            dispatcher
                .add_cluster(*endpoint, ID, ClusterKind::Server, None)
                .unwrap();
        }
        let cluster = Arc::new(Self {
            multipliers: multipliers.iter().copied().collect(),
            deferred: Mutex::new(Vec::new()),
        });

        let c = cluster.clone();
        dispatcher
            .register_command(
                ID,
                Commands::EchoReq as u32,
                Direction::ClientToServer,
                None,
                move |ctx: &mut CommandContext, args: EchoArgs| {
                    let value = args.value.wrapping_mul(c.multiplier(ctx.endpoint()));
                    ctx.add_response(Commands::EchoResp as u32, &EchoArgs { value })
                        .is_ok()
                },
            )
            .unwrap();

        let c = cluster.clone();
        dispatcher
            .register_command(
                ID,
                Commands::DeferredEchoReq as u32,
                Direction::ClientToServer,
                None,
                move |ctx: &mut CommandContext, args: EchoArgs| match ctx.prepare_pending_work() {
                    Ok(work) => {
                        c.deferred.lock().unwrap().push((work, args));
                        true
                    }
                    Err(_) => false,
                },
            )
            .unwrap();

        cluster
    }

    fn multiplier(&self, endpoint: EndptId) -> u8 {
        self.multipliers.get(&endpoint).copied().unwrap_or(1)
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.lock().unwrap().len()
    }

    /// Answers every deferred request, in the order received, dropping the
    /// pending work tokens as it goes
    pub fn complete_deferred(&self) {
        let deferred: Vec<_> = self.deferred.lock().unwrap().drain(..).collect();
        for (work, args) in deferred {
            let value = args
                .value
                .wrapping_mul(self.multiplier(work.path().endpoint_id));
            work.add_response(Commands::EchoResp as u32, &EchoArgs { value })
                .unwrap();
        }
    }
}
