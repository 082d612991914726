//! Lock-free command mailbox between a control context (buttons, MIDI,
//! a UI task) and the looper's per-block compute.
//!
//! A `heapless` single-producer single-consumer queue. The control context
//! keeps the [`CommandSender`], the looper owns the [`CommandReceiver`] and
//! drains it at the top of every block. `N` slots hold `N - 1` commands.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::constants::COMMAND_QUEUE_SLOTS;

use super::Command;

/// Backing storage, usually a `static`.
pub type CommandQueue = Queue<Command, COMMAND_QUEUE_SLOTS>;

/// Producer half, held by whoever posts commands.
pub type CommandSender<'q> = Producer<'q, Command, COMMAND_QUEUE_SLOTS>;

/// Consumer half, handed to [`Looper::attach_mailbox`](super::Looper::attach_mailbox).
pub type CommandReceiver<'q> = Consumer<'q, Command, COMMAND_QUEUE_SLOTS>;
