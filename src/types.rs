use ctf_graph::message::Message;
use ctf_ir::trace::{Packet, Stream};
use std::rc::Rc;
use trace_recorder_parser::{
    streaming::event::{IsrEvent, TaskEvent},
    types::{ObjectHandle, ObjectName, Priority},
};

/// The active task or ISR context, tracked across `sched_switch`/IRQ
/// events the same way the kernel's `current` pointer would be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub handle: ObjectHandle,
    pub name: ObjectName,
    pub priority: Priority,
}

impl From<TaskEvent> for Context {
    fn from(value: TaskEvent) -> Self {
        Self {
            handle: value.handle,
            name: value.name,
            priority: value.priority,
        }
    }
}

impl From<IsrEvent> for Context {
    fn from(value: IsrEvent) -> Self {
        Self {
            handle: value.handle,
            name: value.name,
            priority: value.priority,
        }
    }
}

/// The batch of messages produced by one `SourceComponent::next` call,
/// built against a fixed stream/packet pair. Replaces the original's
/// `BorrowedCtfState`, which borrowed a caller-owned `bt_message` array
/// and a `bt_self_message_iterator` to create messages against; here
/// messages are plain owned values and the "borrow" collapses to a
/// `Vec` the converter appends to.
pub struct MessageBatch {
    stream: Rc<Stream>,
    packet: Rc<Packet>,
    messages: Vec<Message>,
}

impl MessageBatch {
    pub fn new(stream: Rc<Stream>, packet: Rc<Packet>) -> Self {
        Self {
            stream,
            packet,
            messages: Vec::new(),
        }
    }

    pub fn stream(&self) -> &Rc<Stream> {
        &self.stream
    }

    pub fn packet(&self) -> &Rc<Packet> {
        &self.packet
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
