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

use log::{info, warn};

use super::{
    core::{OpCode, PROTO_ID_INTERACTION_MODEL},
    messages::{
        ib::{AttrData, AttrDataTag, AttrStatus},
        msg::{WriteReq, WriteRespTag},
    },
    path::{confirm_concrete, AttributePathParams},
    status::{StatusElement, ZclStatus},
};
use crate::{
    data_model::dispatcher::Dispatcher,
    error::Error,
    tlv::{get_root_node_struct, FromTLV, TLVElement, TLVWriter, TagType, ToTLV},
    transport::exchange::ExchangeContext,
    utils::writebuf::WriteBuf,
};

/// Responder side of a write interaction. Every attribute data element gets
/// one attribute status, in the order received.
pub struct WriteHandler {
    dispatcher: Arc<Dispatcher>,
    max_payload: usize,
}

impl WriteHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, max_payload: usize) -> Self {
        Self {
            dispatcher,
            max_payload,
        }
    }

    pub fn handle_write_req(
        &self,
        exchange: &dyn ExchangeContext,
        payload: &[u8],
    ) -> Result<(), Error> {
        let root = get_root_node_struct(payload)?;
        let write_req = WriteReq::from_tlv(&root)?;
        if write_req.more_chunked {
            warn!("Chunked writes are not supported, treating the request as complete");
        }

        let mut wb = WriteBuf::new(self.max_payload);
        let mut tw = TLVWriter::new(&mut wb);
        tw.start_struct(TagType::Anonymous)?;
        tw.start_array(TagType::Context(WriteRespTag::WriteResponses as u8))?;
        for element in write_req.write_requests.elements() {
            self.write_attr(&element)
                .to_tlv(&mut tw, TagType::Anonymous)?;
        }
        tw.end_container()?;
        tw.end_container()?;

        if write_req.suppress_response {
            info!("Write response suppressed");
            exchange.close();
            return Ok(());
        }
        let sent = exchange.send_message(
            PROTO_ID_INTERACTION_MODEL,
            OpCode::WriteResponse as u8,
            wb.into_vec(),
        );
        exchange.close();
        sent
    }

    fn write_attr(&self, element: &TLVElement) -> AttrStatus {
        let path = AttributePathParams::from_tag(element, AttrDataTag::Path as u8)
            .unwrap_or_default();

        let status = match element.validate().and_then(|_| AttrData::from_tlv(element)) {
            Err(e) => {
                warn!("Malformed attribute data {}: {}", path, e);
                ZclStatus::InvalidValue
            }
            Ok(data) => match confirm_concrete(&data.path) {
                Err(_) => {
                    warn!("Wildcard write to {} is not supported", data.path);
                    ZclStatus::UnsupportedAttribute
                }
                Ok(attr) => {
                    info!("Writing attribute {}", data.path);
                    self.dispatcher.write_attribute(
                        data.path.endpoint_id,
                        data.path.cluster_id,
                        attr,
                        &data.data,
                    )
                }
            },
        };
        AttrStatus::new(path, StatusElement::from_zcl(status))
    }
}
