use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::segment::Segment;
use crate::transport::SegmentTransport;

/// A transport that plays back a fixed list of peer segments and keeps track of everything that
///  was handed to it.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: RwLock<VecDeque<Segment>>,
    sent: RwLock<Vec<Segment>>,
    wait_contexts: RwLock<Vec<Option<Segment>>>,
}
impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = Segment>) -> Self {
        ScriptedTransport {
            responses: RwLock::new(responses.into_iter().collect()),
            sent: Default::default(),
            wait_contexts: Default::default(),
        }
    }

    /// returns segments passed to `send_packet`, clearing the internal buffer
    pub async fn sent_packets(&self) -> Vec<Segment> {
        let mut lock = self.sent.write().await;
        std::mem::take(&mut *lock)
    }

    /// the `last_sent` argument of every `wait_for_segment` call so far
    pub async fn wait_contexts(&self) -> Vec<Option<Segment>> {
        self.wait_contexts.read().await.clone()
    }

    pub async fn num_remaining_responses(&self) -> usize {
        self.responses.read().await.len()
    }
}

#[async_trait]
impl SegmentTransport for ScriptedTransport {
    async fn wait_for_segment(&self, last_sent: Option<Segment>) -> anyhow::Result<Segment> {
        self.wait_contexts.write().await.push(last_sent);
        self.responses.write().await
            .pop_front()
            .ok_or_else(|| anyhow!("no more scripted segments"))
    }

    async fn send_packet(&self, segment: &Segment) -> anyhow::Result<()> {
        self.sent.write().await.push(segment.clone());
        Ok(())
    }
}
