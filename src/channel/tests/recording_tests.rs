//! Post, edit and delete semantics of the recording channel.

use crate::channel::{
    adapters::RecordingChannel,
    domain::{ChannelTarget, MessageHandle},
    ports::{ChannelError, ChannelGateway},
};
use eyre::ensure;
use rstest::{fixture, rstest};

#[fixture]
fn target() -> ChannelTarget {
    ChannelTarget::new("telegram", "1001")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn post_appends_and_edit_replaces(target: ChannelTarget) -> eyre::Result<()> {
    let channel = RecordingChannel::new();
    let first = channel.post(&target, "one").await?;
    channel.post(&target, "two").await?;
    channel.edit(&target, &first, "one, edited").await?;

    ensure!(
        channel.visible(&target)? == ["one, edited", "two"],
        "unexpected transcript {:?}",
        channel.visible(&target)?
    );
    ensure!(channel.post_count()? == 2, "edits are not posts");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_message(target: ChannelTarget) -> eyre::Result<()> {
    let channel = RecordingChannel::new();
    let handle = channel.post(&target, "status").await?;
    channel.delete(&target, &handle).await?;
    ensure!(channel.visible(&target)?.is_empty(), "message removed");

    let again = channel.delete(&target, &handle).await;
    ensure!(
        matches!(again, Err(ChannelError::UnknownHandle { .. })),
        "second delete fails"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn injected_failures_are_consumed(target: ChannelTarget) -> eyre::Result<()> {
    let channel = RecordingChannel::new();
    channel.fail_next_posts(1)?;
    ensure!(
        matches!(
            channel.post(&target, "hi").await,
            Err(ChannelError::Transport(_))
        ),
        "first post fails"
    );
    channel.post(&target, "hi").await?;
    ensure!(channel.visible(&target)? == ["hi"], "second post lands");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn chats_are_isolated(target: ChannelTarget) -> eyre::Result<()> {
    let channel = RecordingChannel::new();
    let other = ChannelTarget::new("telegram", "2002");
    channel.post(&target, "mine").await?;
    let result = channel
        .edit(&other, &MessageHandle::new("1"), "theirs")
        .await;
    ensure!(result.is_err(), "handle belongs to another chat");
    ensure!(channel.visible(&other)?.is_empty(), "other chat untouched");
    Ok(())
}
