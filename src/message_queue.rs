// Copyright (C) 2025  Rafael Carvalho <contact@rafaelrc.com>

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as published by
// the Free Software Foundation.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

// SPDX-License-Identifier: GPL-3.0-only

//! Channel whose receiving side can be waited on with epoll, next to the Wayland socket.

use std::sync::{mpsc, Arc};

use nix::sys::{
    epoll::{Epoll, EpollEvent, EpollFlags},
    eventfd::{EfdFlags, EventFd},
};

use crate::error::Error;

pub struct MessageQueueSender<T> {
    sender: mpsc::Sender<T>,
    eventfd: Arc<EventFd>,
}

pub struct MessageQueueReceiver<T> {
    receiver: mpsc::Receiver<T>,
    eventfd: Arc<EventFd>,
}

/// Creates a queue and registers it in `epoll`, tagged with `queue_id`
pub fn message_queue<T>(
    epoll: &Epoll,
    queue_id: u64,
) -> Result<(MessageQueueSender<T>, MessageQueueReceiver<T>), Error> {
    let (sender, receiver) = mpsc::channel::<T>();

    let eventfd = EventFd::from_flags(EfdFlags::EFD_SEMAPHORE | EfdFlags::EFD_CLOEXEC)
        .map_err(|error| Error::MessageQueue(error.into()))?;
    epoll
        .add(&eventfd, EpollEvent::new(EpollFlags::EPOLLIN, queue_id))
        .map_err(Error::Poll)?;

    let eventfd = Arc::new(eventfd);

    log::debug!(target: "MessageQueue::new", "Created new message queue with ID {queue_id}");
    Ok((
        MessageQueueSender {
            sender,
            eventfd: eventfd.clone(),
        },
        MessageQueueReceiver { receiver, eventfd },
    ))
}

impl<T> Clone for MessageQueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            eventfd: self.eventfd.clone(),
        }
    }
}

impl<T> MessageQueueSender<T> {
    pub fn send(&self, payload: T) -> Result<(), Error> {
        self.sender
            .send(payload)
            .map_err(|_| Error::MessageQueue("Message queue receiver was dropped".into()))?;
        self.eventfd
            .write(1)
            .map_err(|error| Error::MessageQueue(error.into()))?;
        Ok(())
    }
}

impl<T> MessageQueueReceiver<T> {
    /// Takes one message. Blocks if none was sent, so only call it once epoll reported the queue.
    pub fn recv(&self) -> Result<T, Error> {
        self.eventfd
            .read()
            .map_err(|error| Error::MessageQueue(error.into()))?;
        self.receiver
            .recv()
            .map_err(|error| Error::MessageQueue(error.into()))
    }
}
