use crate::core::pipeline::error::CompileError;
use crate::core::pipeline::schema::ChannelRef;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Prefix applied to pipeline-level external input channels.
pub const EXTERNAL_PREFIX: &str = "IN_";
/// Prefix applied to channels synthesized for merge points.
pub const MERGE_PREFIX: &str = "MIX_";

/// A stage input role reading a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConsumerRef {
    pub stage: String,
    pub role: String,
}

impl ConsumerRef {
    pub fn new(stage: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for ConsumerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stage, self.role)
    }
}

/// Where a channel's data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelOrigin {
    /// Declared output role of a stage.
    Output { stage: String, role: String },
    /// Pipeline-level external input.
    External { input: String },
    /// One branch of a fork over `parent`, dedicated to `consumer`.
    Branch { parent: String, consumer: ConsumerRef },
    /// Mix of `parents` feeding a merge-point input.
    Merge {
        parents: Vec<String>,
        consumer: ConsumerRef,
    },
}

impl ChannelOrigin {
    fn owner(&self) -> String {
        match self {
            ChannelOrigin::Output { stage, .. } => stage.clone(),
            ChannelOrigin::External { input } => format!("@{}", input),
            ChannelOrigin::Branch { consumer, .. } | ChannelOrigin::Merge { consumer, .. } => {
                consumer.stage.clone()
            }
        }
    }
}

/// Named single-producer conduit between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub name: String,
    pub origin: ChannelOrigin,
    pub consumers: Vec<ConsumerRef>,
}

impl Channel {
    /// Stage id owning the channel. External inputs have no producing stage.
    pub fn producer(&self) -> Option<&str> {
        match &self.origin {
            ChannelOrigin::Output { stage, .. } => Some(stage),
            ChannelOrigin::External { .. } => None,
            ChannelOrigin::Branch { .. } | ChannelOrigin::Merge { .. } => None,
        }
    }
}

/// Deterministic name for an output role of a stage.
pub fn output_channel_name(stage: &str, role: &str) -> String {
    format!("{}_{}", stage, role)
}

/// Deterministic name for an external input channel.
pub fn external_channel_name(input: &str) -> String {
    format!("{}{}", EXTERNAL_PREFIX, input)
}

/// Deterministic name for the channel feeding a merge-point input.
pub fn merge_channel_name(consumer: &ConsumerRef) -> String {
    format!("{}{}_{}", MERGE_PREFIX, consumer.stage, consumer.role)
}

#[derive(Debug)]
struct Feed {
    slots: Vec<Option<String>>,
    resolved: bool,
}

/// Tracks every channel of one compilation and what feeds each stage input.
///
/// Owned by the assembler for a single `compile` call. `finalize` consumes
/// the registry and freezes the channel table.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: IndexMap<String, Channel>,
    producers: BTreeMap<ChannelRef, String>,
    feeds: BTreeMap<ConsumerRef, Feed>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declared output of `stage`, deriving its channel name.
    pub fn register(&mut self, stage: &str, role: &str) -> Result<&Channel, CompileError> {
        let key = ChannelRef::stage(stage, role);
        if self.producers.contains_key(&key) {
            return Err(CompileError::DuplicateOutput {
                stage: stage.to_string(),
                role: role.to_string(),
            });
        }
        let name = output_channel_name(stage, role);
        self.insert(
            name.clone(),
            ChannelOrigin::Output {
                stage: stage.to_string(),
                role: role.to_string(),
            },
        )?;
        self.producers.insert(key, name.clone());
        Ok(&self.channels[&name])
    }

    /// Register a pipeline-level external input.
    pub fn register_external(&mut self, input: &str) -> Result<&Channel, CompileError> {
        let key = ChannelRef::external(input);
        if self.producers.contains_key(&key) {
            return Err(CompileError::InvalidStage {
                stage: format!("@{}", input),
                reason: "external input is declared more than once".to_string(),
            });
        }
        let name = external_channel_name(input);
        self.insert(
            name.clone(),
            ChannelOrigin::External {
                input: input.to_string(),
            },
        )?;
        self.producers.insert(key, name.clone());
        Ok(&self.channels[&name])
    }

    /// Register a channel synthesized by the fork/merge resolver.
    pub fn register_derived(
        &mut self,
        name: &str,
        origin: ChannelOrigin,
    ) -> Result<&Channel, CompileError> {
        self.insert(name.to_string(), origin)?;
        Ok(&self.channels[name])
    }

    fn insert(&mut self, name: String, origin: ChannelOrigin) -> Result<(), CompileError> {
        if let Some(existing) = self.channels.get(&name) {
            return Err(CompileError::ChannelNameCollision {
                channel: name,
                first: existing.origin.owner(),
                second: origin.owner(),
            });
        }
        tracing::trace!(channel = %name, "registered channel");
        self.channels.insert(
            name.clone(),
            Channel {
                name,
                origin,
                consumers: Vec::new(),
            },
        );
        Ok(())
    }

    /// Channel produced by a stage output or external input, if registered.
    pub fn output(&self, reference: &ChannelRef) -> Option<&Channel> {
        self.producers
            .get(reference)
            .and_then(|name| self.channels.get(name))
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Declare that `consumer` reads `sources` channels, one slot per source.
    pub fn expect_feed(&mut self, consumer: ConsumerRef, sources: usize) {
        self.feeds.insert(
            consumer,
            Feed {
                slots: vec![None; sources],
                resolved: false,
            },
        );
    }

    /// Wire `channel` into the given source slot of `consumer`.
    pub fn attach(
        &mut self,
        consumer: &ConsumerRef,
        slot: usize,
        channel: &str,
    ) -> Result<(), CompileError> {
        let feed = self.feeds.get_mut(consumer).ok_or_else(|| {
            CompileError::UnresolvedInput {
                stage: consumer.stage.clone(),
                role: consumer.role.clone(),
                reference: channel.to_string(),
            }
        })?;
        match feed.slots.get_mut(slot) {
            Some(entry) => {
                *entry = Some(channel.to_string());
                Ok(())
            }
            None => Err(CompileError::UnresolvedInput {
                stage: consumer.stage.clone(),
                role: consumer.role.clone(),
                reference: channel.to_string(),
            }),
        }
    }

    /// Slots wired into `consumer`, in source order. `None` marks a slot not yet filled.
    pub fn feed_slots(&self, consumer: &ConsumerRef) -> Vec<Option<String>> {
        self.feeds
            .get(consumer)
            .map(|feed| feed.slots.clone())
            .unwrap_or_default()
    }

    /// Record that `consumer` reads `channel` through fork or merge scaffolding.
    pub fn note_consumer(&mut self, channel: &str, consumer: &ConsumerRef) {
        if let Some(channel) = self.channels.get_mut(channel) {
            if !channel.consumers.contains(consumer) {
                channel.consumers.push(consumer.clone());
            }
        }
    }

    /// Replace all slots of `consumer` with a single merged channel.
    pub fn collapse_feed(&mut self, consumer: &ConsumerRef, channel: &str) {
        if let Some(feed) = self.feeds.get_mut(consumer) {
            feed.slots = vec![Some(channel.to_string())];
        }
    }

    /// Look up the single channel feeding input `role` of `stage` and record the consumer.
    pub fn resolve(&mut self, stage: &str, role: &str) -> Result<&Channel, CompileError> {
        let consumer = ConsumerRef::new(stage, role);
        let unresolved = |reference: String| CompileError::UnresolvedInput {
            stage: stage.to_string(),
            role: role.to_string(),
            reference,
        };

        let feed = self
            .feeds
            .get_mut(&consumer)
            .ok_or_else(|| unresolved(format!("{}.<unwired>", stage)))?;
        let name = match feed.slots.as_slice() {
            [Some(name)] => name.clone(),
            [None] => return Err(unresolved("<not yet produced>".to_string())),
            _ => return Err(unresolved("<unmerged sources>".to_string())),
        };
        feed.resolved = true;

        let channel = self
            .channels
            .get_mut(&name)
            .ok_or_else(|| unresolved(name.clone()))?;
        if !channel.consumers.contains(&consumer) {
            channel.consumers.push(consumer);
        }
        Ok(channel)
    }

    /// Freeze the registry, failing on any wired input that was never resolved.
    pub fn finalize(self) -> Result<Vec<Channel>, CompileError> {
        for (consumer, feed) in &self.feeds {
            if !feed.resolved {
                let channel = feed
                    .slots
                    .iter()
                    .flatten()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| "<unwired>".to_string());
                return Err(CompileError::DanglingChannel {
                    channel,
                    stage: consumer.stage.clone(),
                    role: consumer.role.clone(),
                });
            }
        }
        Ok(self.channels.into_values().collect())
    }
}
