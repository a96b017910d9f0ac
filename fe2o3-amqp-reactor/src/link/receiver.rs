//! Receiver side of a link

use fe2o3_amqp_reactor_types::{
    definitions::{DeliveryNumber, DeliveryTag, ReceiverSettleMode, Role},
    messaging::Message,
    performatives::{Flow, Transfer},
    states::LinkState,
};

use super::{Delivery, Link};

impl Link {
    /// Issues `credit` more credit to the sender. Does nothing on a sender
    pub fn add_credit(&mut self, credit: u32) {
        if self.role != Role::Receiver {
            return;
        }
        self.link_credit = self.link_credit.saturating_add(credit);
        self.flow_pending = true;
    }

    /// Credit the receiver keeps issued. Zero turns automatic flow off
    pub fn set_credit_window(&mut self, credit_window: u32) {
        self.credit_window = credit_window;
    }

    /// Messages the sender reported as available
    pub fn available(&self) -> u32 {
        self.available
    }

    pub(crate) fn on_receiver_flow(&mut self, flow: &Flow) {
        if let Some(delivery_count) = flow.delivery_count {
            // A drained sender advances its delivery count, which consumes credit
            let advanced = delivery_count.wrapping_sub(self.delivery_count);
            self.link_credit = self.link_credit.saturating_sub(advanced);
            self.delivery_count = delivery_count;
        }
        if let Some(available) = flow.available {
            self.available = available;
        }
        if flow.echo {
            self.flow_pending = true;
        }
    }

    /// Issues a new window of credit once half of it has been consumed
    pub(crate) fn top_up_credit(&mut self) {
        if self.credit_window == 0 || self.state != LinkState::Attached || self.detach_requested {
            return;
        }
        if self.link_credit <= self.credit_window / 2 {
            self.link_credit = self.credit_window;
            self.flow_pending = true;
        }
    }

    /// Records an incoming transfer. Returns the tag of the new delivery
    pub(crate) fn on_transfer(
        &mut self,
        transfer: Transfer,
        delivery_id: DeliveryNumber,
        payload: Message,
    ) -> DeliveryTag {
        self.delivery_count = self.delivery_count.wrapping_add(1);
        self.link_credit = self.link_credit.saturating_sub(1);

        let tag = transfer.delivery_tag.unwrap_or_default();
        let remote_settled = transfer.settled.unwrap_or(false);
        // A presettled delivery has no disposition left to wait for
        let settle_on_outcome =
            remote_settled || self.local.attach.rcv_settle_mode == ReceiverSettleMode::First;
        let delivery = Delivery::incoming(
            tag.clone(),
            delivery_id,
            payload,
            transfer.message_format.unwrap_or_default(),
            remote_settled,
            transfer.state,
            settle_on_outcome,
        );
        self.deliveries.insert(tag.clone(), delivery);
        tag
    }
}
