//! Sender side of a link

use fe2o3_amqp_reactor_types::{
    definitions::{DeliveryNumber, DeliveryTag, Role, SenderSettleMode},
    messaging::Message,
    performatives::{Flow, Transfer},
};
use serde_bytes::ByteBuf;

use super::{Delivery, Link, SendError, Sendable};

impl Link {
    /// Sends a message.
    ///
    /// Only legal once the link is attached and holds credit, which is what
    /// a `sendable` event signals. The transfer is emitted once control
    /// returns to the engine.
    pub fn send(&mut self, sendable: impl Into<Sendable>) -> Result<DeliveryTag, SendError> {
        if self.role != Role::Sender {
            return Err(SendError::NotSender);
        }
        if !self.is_open() {
            return Err(SendError::NotAttached);
        }
        if self.link_credit == 0 {
            return Err(SendError::InsufficientCredit);
        }

        let sendable = sendable.into();
        let settled = match self.local.attach.snd_settle_mode {
            SenderSettleMode::Settled => true,
            SenderSettleMode::Unsettled => false,
            SenderSettleMode::Mixed => sendable.settled.unwrap_or(false),
        };

        let tag = ByteBuf::from(self.next_tag.to_be_bytes().to_vec());
        self.next_tag = self.next_tag.wrapping_add(1);
        self.link_credit -= 1;
        self.delivery_count = self.delivery_count.wrapping_add(1);

        let delivery = Delivery::outgoing(
            tag.clone(),
            sendable.message,
            sendable.message_format,
            settled,
        );
        self.deliveries.insert(tag.clone(), delivery);
        self.outgoing.push_back(tag.clone());

        #[cfg(feature = "tracing")]
        tracing::trace!(name = %self.name(), settled, credit = self.link_credit, "send");
        #[cfg(feature = "log")]
        log::trace!("send on {} settled={} credit={}", self.name(), settled, self.link_credit);

        Ok(tag)
    }

    /// Recomputes the credit from a flow sent by the receiver. Returns whether
    /// the sender holds credit afterwards
    pub(crate) fn on_sender_flow(&mut self, flow: &Flow) -> bool {
        let initial = self
            .local
            .attach
            .initial_delivery_count
            .unwrap_or_default();
        let delivery_count_rcv = flow.delivery_count.unwrap_or(initial);
        let link_credit_rcv = flow.link_credit.unwrap_or(0);

        // link_credit_snd := delivery_count_rcv + link_credit_rcv - delivery_count_snd
        let credit = delivery_count_rcv
            .wrapping_add(link_credit_rcv)
            .wrapping_sub(self.delivery_count);
        self.link_credit = if credit > link_credit_rcv { 0 } else { credit };
        self.drain = flow.drain;
        if flow.echo {
            self.flow_pending = true;
        }

        self.link_credit > 0 && self.attach_sent
    }

    /// Spends the remaining credit if the receiver asked for a drain
    pub(crate) fn complete_drain(&mut self) {
        if self.drain && self.link_credit > 0 && self.outgoing.is_empty() {
            self.delivery_count = self.delivery_count.wrapping_add(self.link_credit);
            self.link_credit = 0;
            self.flow_pending = true;
        }
    }

    pub(crate) fn has_pending_transfer(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// The next transfer to emit
    pub(crate) fn take_transfer(&mut self, delivery_id: DeliveryNumber) -> Option<(Transfer, Message)> {
        let handle = self.output_handle();
        while let Some(tag) = self.outgoing.pop_front() {
            let Some(delivery) = self.deliveries.get_mut(&tag) else {
                continue;
            };
            delivery.set_id(delivery_id);
            delivery.transferred = true;
            let payload = delivery.take_message().unwrap_or_default();
            let transfer = Transfer {
                handle,
                delivery_id: Some(delivery_id),
                delivery_tag: Some(tag),
                message_format: Some(delivery.message_format()),
                settled: Some(delivery.local_settled()),
                more: false,
                rcv_settle_mode: None,
                state: None,
                resume: false,
                aborted: false,
                batchable: false,
            };
            return Some((transfer, payload));
        }
        None
    }
}
