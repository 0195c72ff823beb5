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

//! Interaction Model command and write engine for Matter (Smart-Home)
//!
//! This crate implements the part of the Matter interaction model that
//! carries commands and attribute writes between nodes: the TLV codec, the
//! cluster command dispatcher, the responder side command handler with
//! deferred completion, and the initiator side command sender and write
//! client. Sessions and transport sit below the [`ExchangeContext`] trait.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use matter_im::config::ImConfig;
//! use matter_im::data_model::cluster_on_off::OnOffCluster;
//! use matter_im::data_model::dispatcher::Dispatcher;
//! use matter_im::interaction_model::delegate::NoopDelegate;
//! use matter_im::interaction_model::engine::InteractionModelEngine;
//!
//! let mut dispatcher = Dispatcher::new();
//! let light = OnOffCluster::new().register(&mut dispatcher, &[1]).unwrap();
//! let engine = InteractionModelEngine::new(
//!     ImConfig::default(),
//!     dispatcher,
//!     Arc::new(NoopDelegate),
//! );
//! assert_eq!(light.get(1), Some(false));
//! # let _ = engine;
//! ```
//!
//! [`ExchangeContext`]: crate::transport::exchange::ExchangeContext

pub mod config;
pub mod controller;
pub mod data_model;
pub mod error;
pub mod interaction_model;
pub mod tlv;
pub mod transport;
pub mod utils;
