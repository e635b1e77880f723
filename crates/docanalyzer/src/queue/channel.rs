//! In-process dispatch over a bounded crossbeam channel.
//!
//! Not durable: messages die with the process. Suitable for a single
//! process running both the HTTP boundary and the worker pool.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender,
};

use super::{Delivery, DispatchMessage, DispatchQueue, Receipt};
use crate::error::QueueError;

pub struct ChannelQueue {
    sender: Mutex<Option<Sender<DispatchMessage>>>,
    receiver: Receiver<DispatchMessage>,
    send_timeout: Duration,
}

impl ChannelQueue {
    pub fn new(capacity: usize, send_timeout: Duration) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            send_timeout,
        }
    }

    /// Stops accepting writes. Consumers drain what is left, then see
    /// `BrokerUnavailable`.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl DispatchQueue for ChannelQueue {
    fn enqueue(&self, message: &DispatchMessage) -> Result<(), QueueError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| QueueError::BrokerUnavailable("channel closed".to_string()))?;

        sender
            .send_timeout(message.clone(), self.send_timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => QueueError::BrokerUnavailable(format!(
                    "channel full for {}ms",
                    self.send_timeout.as_millis()
                )),
                SendTimeoutError::Disconnected(_) => {
                    QueueError::BrokerUnavailable("channel disconnected".to_string())
                }
            })
    }

    fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(Delivery {
                message,
                attempt: 1,
                receipt: Receipt::Channel,
            })),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::BrokerUnavailable(
                "channel disconnected".to_string(),
            )),
        }
    }

    fn ack(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        Ok(())
    }

    fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.receiver.len() as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
