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

use colored::*;
use log::{info, trace};
use std::{collections::VecDeque, fmt, sync::Mutex};

use crate::error::{Error, ErrorCode};

/// Node id used when no peer is bound
pub const ANY_NODE_ID: u64 = u64::MAX;

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum Role {
    #[default]
    Initiator = 0,
    Responder = 1,
}

pub fn get_role(is_initiator: bool) -> Role {
    if is_initiator {
        Role::Initiator
    } else {
        Role::Responder
    }
}

/// One message handed to the exchange for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoTx {
    pub proto_id: u16,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// The slice of an exchange the interaction model needs.
///
/// Session establishment, encryption and retransmission live below this
/// trait. Methods take `&self` so that a deferred command completion can
/// send from whichever thread releases the last pending-work token.
pub trait ExchangeContext: Send + Sync {
    fn id(&self) -> u16;

    fn role(&self) -> Role;

    /// Node id of the peer, `ANY_NODE_ID` if unknown
    fn peer_node_id(&self) -> u64;

    fn send_message(&self, proto_id: u16, opcode: u8, payload: Vec<u8>) -> Result<(), Error>;

    fn close(&self);

    fn is_open(&self) -> bool;
}

#[derive(Debug, PartialEq, Default)]
enum State {
    #[default]
    Open,
    Close,
}

#[derive(Debug, Default)]
struct Inner {
    state: State,
    outbox: VecDeque<ProtoTx>,
}

/// An exchange that queues outgoing messages until the transport drains
/// them with [`Exchange::take_outgoing`].
#[derive(Debug)]
pub struct Exchange {
    id: u16,
    role: Role,
    peer_node_id: u64,
    inner: Mutex<Inner>,
}

impl Exchange {
    pub fn new(id: u16, role: Role, peer_node_id: u64) -> Exchange {
        Exchange {
            id,
            role,
            peer_node_id,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Removes and returns everything sent so far
    pub fn take_outgoing(&self) -> Vec<ProtoTx> {
        match self.inner.lock() {
            Ok(mut inner) => inner.outbox.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().map(|i| i.outbox.len()).unwrap_or(0)
    }
}

impl ExchangeContext for Exchange {
    fn id(&self) -> u16 {
        self.id
    }

    fn role(&self) -> Role {
        self.role
    }

    fn peer_node_id(&self) -> u64 {
        self.peer_node_id
    }

    fn send_message(&self, proto_id: u16, opcode: u8, payload: Vec<u8>) -> Result<(), Error> {
        let mut inner = self.inner.lock()?;
        if inner.state != State::Open {
            return Err(ErrorCode::NoExchange.into());
        }

        trace!("payload: {:x?}", payload);
        info!(
            "{} with proto id: {} opcode: {} on exchange {}",
            "Sending".blue(),
            proto_id,
            opcode,
            self.id
        );
        inner.outbox.push_back(ProtoTx {
            proto_id,
            opcode,
            payload,
        });
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = State::Close;
        }
    }

    fn is_open(&self) -> bool {
        self.inner
            .lock()
            .map(|i| i.state == State::Open)
            .unwrap_or(false)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exch_id: {}, role: {:?}, peer: {:#x}, open: {}",
            self.id,
            self.role,
            self.peer_node_id,
            self.is_open()
        )
    }
}
