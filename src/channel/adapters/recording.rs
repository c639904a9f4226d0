//! In-memory channel that records every operation.

use crate::channel::{
    domain::{ChannelTarget, MessageHandle},
    ports::{ChannelError, ChannelGateway, ChannelResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// One operation observed by [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A message was posted.
    Posted {
        /// Chat addressed.
        target: ChannelTarget,
        /// Handle assigned to the message.
        handle: MessageHandle,
        /// Posted text.
        text: String,
    },
    /// A message was edited.
    Edited {
        /// Chat addressed.
        target: ChannelTarget,
        /// Edited message.
        handle: MessageHandle,
        /// Replacement text.
        text: String,
    },
    /// A message was deleted.
    Deleted {
        /// Chat addressed.
        target: ChannelTarget,
        /// Deleted message.
        handle: MessageHandle,
    },
}

/// Channel adapter keeping a transcript instead of talking to a network.
///
/// Failures can be injected for the next `n` posts to exercise delivery
/// retries.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    state: Arc<RwLock<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    next_handle: u64,
    failing_posts: usize,
    events: Vec<ChannelEvent>,
    visible: BTreeMap<(ChannelTarget, u64), String>,
}

fn poisoned(err: impl std::fmt::Display) -> ChannelError {
    ChannelError::transport(std::io::Error::other(err.to_string()))
}

fn handle_number(target: &ChannelTarget, handle: &MessageHandle) -> ChannelResult<u64> {
    handle
        .as_str()
        .parse()
        .map_err(|_| ChannelError::UnknownHandle {
            target: target.clone(),
            handle: handle.clone(),
        })
}

impl RecordingChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` posts fail with a transport error.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] when the lock is poisoned.
    pub fn fail_next_posts(&self, count: usize) -> ChannelResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.failing_posts = count;
        Ok(())
    }

    /// Returns every recorded operation in order.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] when the lock is poisoned.
    pub fn events(&self) -> ChannelResult<Vec<ChannelEvent>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.events.clone())
    }

    /// Returns the texts currently visible in a chat, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] when the lock is poisoned.
    pub fn visible(&self, target: &ChannelTarget) -> ChannelResult<Vec<String>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .visible
            .iter()
            .filter(|((chat, _), _)| chat == target)
            .map(|(_, text)| text.clone())
            .collect())
    }

    /// Returns the number of successful posts.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] when the lock is poisoned.
    pub fn post_count(&self) -> ChannelResult<usize> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .events
            .iter()
            .filter(|event| matches!(event, ChannelEvent::Posted { .. }))
            .count())
    }
}

#[async_trait]
impl ChannelGateway for RecordingChannel {
    async fn post(&self, target: &ChannelTarget, text: &str) -> ChannelResult<MessageHandle> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.failing_posts > 0 {
            state.failing_posts -= 1;
            return Err(ChannelError::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "injected post failure",
            )));
        }
        state.next_handle += 1;
        let number = state.next_handle;
        let handle = MessageHandle::new(number.to_string());
        state
            .visible
            .insert((target.clone(), number), text.to_owned());
        state.events.push(ChannelEvent::Posted {
            target: target.clone(),
            handle: handle.clone(),
            text: text.to_owned(),
        });
        Ok(handle)
    }

    async fn edit(
        &self,
        target: &ChannelTarget,
        handle: &MessageHandle,
        text: &str,
    ) -> ChannelResult<()> {
        let number = handle_number(target, handle)?;
        let mut state = self.state.write().map_err(poisoned)?;
        let slot = state
            .visible
            .get_mut(&(target.clone(), number))
            .ok_or_else(|| ChannelError::UnknownHandle {
                target: target.clone(),
                handle: handle.clone(),
            })?;
        text.clone_into(slot);
        state.events.push(ChannelEvent::Edited {
            target: target.clone(),
            handle: handle.clone(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn delete(&self, target: &ChannelTarget, handle: &MessageHandle) -> ChannelResult<()> {
        let number = handle_number(target, handle)?;
        let mut state = self.state.write().map_err(poisoned)?;
        if state.visible.remove(&(target.clone(), number)).is_none() {
            return Err(ChannelError::UnknownHandle {
                target: target.clone(),
                handle: handle.clone(),
            });
        }
        state.events.push(ChannelEvent::Deleted {
            target: target.clone(),
            handle: handle.clone(),
        });
        Ok(())
    }
}
