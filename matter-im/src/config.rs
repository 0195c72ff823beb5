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

use std::time::Duration;

/// How client clusters put their commands on the wire
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum InvokeStrategy {
    /// Invoke-Request carrying TLV encoded command fields
    #[default]
    InteractionModel,
    /// Raw ZCL frames with sequentially encoded fields
    LegacyZcl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImConfig {
    pub max_command_handlers: usize,
    pub max_command_senders: usize,
    pub max_write_clients: usize,
    /// Upper bound of any single message payload we build
    pub max_payload: usize,
    pub response_timeout: Duration,
    pub invoke_strategy: InvokeStrategy,
}

pub const DEFAULT_MAX_PAYLOAD: usize = 1024;
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

impl Default for ImConfig {
    fn default() -> Self {
        Self {
            max_command_handlers: DEFAULT_POOL_SIZE,
            max_command_senders: DEFAULT_POOL_SIZE,
            max_write_clients: DEFAULT_POOL_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            invoke_strategy: InvokeStrategy::default(),
        }
    }
}

impl ImConfig {
    pub fn with_invoke_strategy(mut self, strategy: InvokeStrategy) -> Self {
        self.invoke_strategy = strategy;
        self
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }
}
