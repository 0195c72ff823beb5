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

//! Routes decoded command invocations to the callbacks clusters register.
//!
//! The registry is filled in at start-up and only read afterwards, so one
//! `Arc<Dispatcher>` serves every command handler and sender concurrently.

use std::collections::HashMap;

use log::{info, warn};

use super::{
    fields::{CommandArgs, FieldReader, FieldsFn},
    zcl::ZclHeader,
};
use crate::{
    error::{Error, ErrorCode},
    interaction_model::{
        command_handler::PendingWork,
        path::{AttrId, ClusterId, CommandId, CommandPathParams, EndptId},
        status::{StatusElement, ZclStatus},
    },
    tlv::{print_tlv_list, TLVElement},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// Which side of a cluster an endpoint implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterKind {
    Server,
    Client,
}

impl Direction {
    /// The side of the cluster that receives commands travelling this way
    pub fn receiver(&self) -> ClusterKind {
        match self {
            Direction::ClientToServer => ClusterKind::Server,
            Direction::ServerToClient => ClusterKind::Client,
        }
    }
}

/// Everything needed to route one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRequest {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
    pub command: CommandId,
    pub direction: Direction,
    pub mfg_code: Option<u16>,
}

impl DispatchRequest {
    pub fn new(path: &CommandPathParams, direction: Direction) -> Self {
        Self {
            endpoint: path.endpoint_id,
            cluster: path.cluster_id,
            command: path.command_id,
            direction,
            mfg_code: None,
        }
    }

    pub fn is_mfg_specific(&self) -> bool {
        self.mfg_code.is_some()
    }

    pub fn path(&self) -> CommandPathParams {
        CommandPathParams::new(self.endpoint, self.cluster, self.command)
    }
}

/// Command fields as they arrived
#[derive(Debug, Clone, Copy)]
pub enum CommandPayload<'a> {
    /// The fields structure of a CommandDataIB, absent for commands sent
    /// without one
    Tlv(Option<TLVElement<'a>>),
    /// Sequential fields following a ZCL header
    Zcl(&'a [u8]),
}

/// Where a command callback puts its results. Implemented by the command
/// handler for each element it dispatches.
pub trait ResponseSink {
    /// Adds a command response; `fields` writes its arguments in whichever
    /// wire format the sink uses
    fn add_response(&mut self, path: CommandPathParams, fields: &FieldsFn) -> Result<(), Error>;

    fn add_status(&mut self, path: CommandPathParams, status: StatusElement) -> Result<(), Error>;

    fn prepare_pending_work(&mut self) -> Result<PendingWork, Error>;
}

/// What a command callback sees of the command it handles
pub struct CommandContext<'c> {
    request: DispatchRequest,
    sink: Option<&'c mut dyn ResponseSink>,
}

impl<'c> CommandContext<'c> {
    pub fn new(request: DispatchRequest, sink: Option<&'c mut dyn ResponseSink>) -> Self {
        Self { request, sink }
    }

    /// Context for commands nobody will answer, such as responses arriving
    /// at a client
    pub fn detached(request: DispatchRequest) -> Self {
        Self::new(request, None)
    }

    pub fn request(&self) -> &DispatchRequest {
        &self.request
    }

    pub fn path(&self) -> CommandPathParams {
        self.request.path()
    }

    pub fn endpoint(&self) -> EndptId {
        self.request.endpoint
    }

    fn sink(&mut self) -> Result<&mut dyn ResponseSink, Error> {
        match self.sink.as_mut() {
            Some(sink) => Ok(&mut **sink),
            None => Err(ErrorCode::NoHandler.into()),
        }
    }

    /// Answers with `command` of the same cluster, on the command's endpoint
    pub fn add_response<A: CommandArgs>(
        &mut self,
        command: CommandId,
        args: &A,
    ) -> Result<(), Error> {
        let path = CommandPathParams::new(self.request.endpoint, self.request.cluster, command);
        self.add_response_to(path, args)
    }

    pub fn add_response_to<A: CommandArgs>(
        &mut self,
        path: CommandPathParams,
        args: &A,
    ) -> Result<(), Error> {
        self.sink()?.add_response(path, &|w| args.write_fields(w))
    }

    pub fn add_status(&mut self, status: ZclStatus) -> Result<(), Error> {
        let path = self.path();
        self.sink()?.add_status(path, status.into())
    }

    /// Defers the answer. The command's result is whatever is added through
    /// the returned token before it is dropped.
    pub fn prepare_pending_work(&mut self) -> Result<PendingWork, Error> {
        self.sink()?.prepare_pending_work()
    }
}

type CommandCallback = Box<
    dyn Fn(&mut CommandContext, &mut FieldReader<'_>) -> Result<bool, Error> + Send + Sync,
>;

type AttributeCallback =
    Box<dyn Fn(EndptId, &TLVElement<'_>) -> Result<(), ZclStatus> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClusterKey {
    endpoint: EndptId,
    cluster: ClusterId,
    kind: ClusterKind,
    mfg_code: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CommandKey {
    cluster: ClusterId,
    command: CommandId,
    direction: Direction,
    mfg_code: Option<u16>,
}

#[derive(Default)]
pub struct Dispatcher {
    clusters: Vec<ClusterKey>,
    commands: HashMap<CommandKey, CommandCallback>,
    attributes: HashMap<(ClusterId, AttrId), AttributeCallback>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that `endpoint` implements one side of `cluster`
    pub fn add_cluster(
        &mut self,
        endpoint: EndptId,
        cluster: ClusterId,
        kind: ClusterKind,
        mfg_code: Option<u16>,
    ) -> Result<(), Error> {
        let key = ClusterKey {
            endpoint,
            cluster,
            kind,
            mfg_code,
        };
        if self.clusters.contains(&key) {
            return Err(ErrorCode::Duplicate.into());
        }
        self.clusters.push(key);
        Ok(())
    }

    /// Registers the callback for one command. Its arguments are fully
    /// decoded before the callback runs; it returns whether it handled the
    /// command.
    pub fn register_command<A, F>(
        &mut self,
        cluster: ClusterId,
        command: CommandId,
        direction: Direction,
        mfg_code: Option<u16>,
        callback: F,
    ) -> Result<(), Error>
    where
        A: CommandArgs + 'static,
        F: Fn(&mut CommandContext, A) -> bool + Send + Sync + 'static,
    {
        let key = CommandKey {
            cluster,
            command,
            direction,
            mfg_code,
        };
        if self.commands.contains_key(&key) {
            return Err(ErrorCode::Duplicate.into());
        }
        self.commands.insert(
            key,
            Box::new(move |ctx: &mut CommandContext<'_>, reader: &mut FieldReader<'_>| {
                let args = A::read_fields(reader)?;
                Ok(callback(ctx, args))
            }),
        );
        Ok(())
    }

    /// Registers the write handler of one attribute, on every endpoint
    /// implementing the cluster's server side
    pub fn register_attribute<F>(
        &mut self,
        cluster: ClusterId,
        attr: AttrId,
        callback: F,
    ) -> Result<(), Error>
    where
        F: Fn(EndptId, &TLVElement<'_>) -> Result<(), ZclStatus> + Send + Sync + 'static,
    {
        if self.attributes.contains_key(&(cluster, attr)) {
            return Err(ErrorCode::Duplicate.into());
        }
        self.attributes.insert((cluster, attr), Box::new(callback));
        Ok(())
    }

    pub fn cluster_exists(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        kind: ClusterKind,
        mfg_code: Option<u16>,
    ) -> bool {
        self.clusters.contains(&ClusterKey {
            endpoint,
            cluster,
            kind,
            mfg_code,
        })
    }

    /// Decodes and runs one command, returning the status it earned
    pub fn dispatch(
        &self,
        request: &DispatchRequest,
        payload: CommandPayload<'_>,
        ctx: &mut CommandContext,
    ) -> ZclStatus {
        let cluster_exists = self.cluster_exists(
            request.endpoint,
            request.cluster,
            request.direction.receiver(),
            request.mfg_code,
        );
        let callback = self.commands.get(&CommandKey {
            cluster: request.cluster,
            command: request.command,
            direction: request.direction,
            mfg_code: request.mfg_code,
        });

        let callback = match (cluster_exists, callback) {
            (true, Some(callback)) => callback,
            (exists, _) => {
                warn!(
                    "No {:?} handler for command {:#04x} of cluster {:#06x} on endpoint {}",
                    request.direction, request.command, request.cluster, request.endpoint
                );
                return ZclStatus::for_dispatch(false, exists, request.is_mfg_specific());
            }
        };

        let reader = match payload {
            CommandPayload::Tlv(fields) => {
                if let Some(fields) = fields {
                    print_tlv_list(fields.container_span().unwrap_or_default());
                }
                FieldReader::tlv(fields)
            }
            CommandPayload::Zcl(data) => Ok(FieldReader::zcl(data)),
        };

        let result = reader.and_then(|mut reader| callback(ctx, &mut reader));
        match result {
            Ok(handled) => ZclStatus::for_dispatch(handled, true, request.is_mfg_specific()),
            Err(e) if e.is_decode_failure() => {
                info!(
                    "Malformed command {:#04x} of cluster {:#06x}: {}",
                    request.command, request.cluster, e
                );
                ZclStatus::MalformedCommand
            }
            Err(e) => {
                warn!("Command {:#04x} failed: {}", request.command, e);
                ZclStatus::from(&e)
            }
        }
    }

    /// Dispatches a legacy ZCL frame addressed to `endpoint`/`cluster`
    pub fn dispatch_zcl(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        frame: &[u8],
        ctx_sink: Option<&mut dyn ResponseSink>,
    ) -> ZclStatus {
        let (header, payload) = match ZclHeader::parse(frame) {
            Ok(parsed) => parsed,
            Err(_) => return ZclStatus::MalformedCommand,
        };

        if !header.is_cluster_specific() {
            return if header.mfg_code.is_some() {
                ZclStatus::UnsupManufGeneralCommand
            } else {
                ZclStatus::UnsupGeneralCommand
            };
        }

        let request = DispatchRequest {
            endpoint,
            cluster,
            command: header.command as CommandId,
            direction: header.direction(),
            mfg_code: header.mfg_code,
        };
        let mut ctx = CommandContext::new(request, ctx_sink);
        self.dispatch(&request, CommandPayload::Zcl(payload), &mut ctx)
    }

    /// Applies an attribute write
    pub fn write_attribute(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attr: AttrId,
        data: &TLVElement<'_>,
    ) -> ZclStatus {
        if !self.cluster_exists(endpoint, cluster, ClusterKind::Server, None) {
            return ZclStatus::UnsupportedCluster;
        }
        match self.attributes.get(&(cluster, attr)) {
            Some(callback) => match callback(endpoint, data) {
                Ok(()) => ZclStatus::Success,
                Err(status) => status,
            },
            None => ZclStatus::UnsupportedAttribute,
        }
    }
}
