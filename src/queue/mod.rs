//! Job Source
//!
//! Unbounded, lazily pulled sequences of job ids. A source suspends while
//! no id is available and fails with [`QueueError::Closed`] once its
//! underlying connection is gone; that failure ends the consumer loop.

mod sled_queue;

pub use sled_queue::SledJobQueue;

use crate::error::QueueError;
use crate::store::JobId;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

/// Something job ids can be pulled from.
#[async_trait]
pub trait JobSource: Send {
    /// Wait for the next job id.
    async fn next_id(&mut self) -> Result<JobId, QueueError>;
}

/// In-process source fed through a [`JobSender`].
pub struct ChannelJobSource {
    receiver: mpsc::UnboundedReceiver<JobId>,
}

/// Sending half of a [`ChannelJobSource`]. Dropping every sender closes
/// the source.
#[derive(Clone)]
pub struct JobSender {
    sender: mpsc::UnboundedSender<JobId>,
}

impl JobSender {
    pub fn send(&self, job_id: impl Into<JobId>) -> Result<(), QueueError> {
        self.sender.send(job_id.into()).map_err(|_| QueueError::Closed)
    }
}

/// Create a connected sender/source pair.
pub fn channel() -> (JobSender, ChannelJobSource) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (JobSender { sender }, ChannelJobSource { receiver })
}

#[async_trait]
impl JobSource for ChannelJobSource {
    async fn next_id(&mut self) -> Result<JobId, QueueError> {
        self.receiver.recv().await.ok_or(QueueError::Closed)
    }
}

#[async_trait]
impl<S: JobSource + ?Sized> JobSource for Box<S> {
    async fn next_id(&mut self) -> Result<JobId, QueueError> {
        (**self).next_id().await
    }
}

/// Turn a source into a stream of ids. The stream yields the fatal error
/// once and then ends.
pub fn job_ids<S: JobSource>(source: S) -> impl Stream<Item = Result<JobId, QueueError>> {
    stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next_id().await {
            Ok(id) => Some((Ok(id), Some(source))),
            Err(err) => Some((Err(err), None)),
        }
    })
}
