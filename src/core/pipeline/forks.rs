//! Fan-out (fork) and fan-in (merge) scaffolding between stage blocks.

use crate::core::pipeline::channel::{merge_channel_name, ChannelOrigin, ChannelRegistry, ConsumerRef};
use crate::core::pipeline::error::CompileError;
use crate::core::pipeline::order::PlannedConsumer;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkBranch {
    pub channel: String,
    pub consumer: ConsumerRef,
}

/// Split of one shared channel into a branch per consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkGroup {
    pub source: String,
    pub branches: Vec<ForkBranch>,
}

/// Mix of several channels into the single channel an input reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeGroup {
    pub channel: String,
    pub consumer: ConsumerRef,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scaffold {
    Fork(ForkGroup),
    Merge(MergeGroup),
}

impl Scaffold {
    /// Workflow statement implementing the split or mix.
    pub fn render(&self) -> String {
        match self {
            Scaffold::Fork(fork) => {
                let names: Vec<&str> = fork.branches.iter().map(|b| b.channel.as_str()).collect();
                format!("{}.into{{ {} }}", fork.source, names.join("; "))
            }
            Scaffold::Merge(merge) => {
                let (first, rest) = match merge.sources.split_first() {
                    Some((first, rest)) => (first.as_str(), rest),
                    None => ("Channel.empty()", &[][..]),
                };
                format!(
                    "{}.mix({}).set{{ {} }}",
                    first,
                    rest.join(", "),
                    merge.channel
                )
            }
        }
    }

    /// Channels this scaffold defines.
    pub fn defined_channels(&self) -> Vec<&str> {
        match self {
            Scaffold::Fork(fork) => fork.branches.iter().map(|b| b.channel.as_str()).collect(),
            Scaffold::Merge(merge) => vec![merge.channel.as_str()],
        }
    }
}

/// Wires channels into consumer feeds, synthesizing branches and merges as needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkMergeResolver;

impl ForkMergeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Distribute `source` to its final consumer set.
    ///
    /// A single consumer reads `source` directly. Several consumers each get a
    /// dedicated branch channel and a fork scaffold is returned.
    pub fn fork(
        &self,
        registry: &mut ChannelRegistry,
        source: &str,
        consumers: &[PlannedConsumer],
    ) -> Result<Option<Scaffold>, CompileError> {
        match consumers {
            [] => {
                tracing::debug!(channel = %source, "channel has no consumers");
                Ok(None)
            }
            [only] => {
                registry.attach(&only.consumer, only.slot, source)?;
                Ok(None)
            }
            _ => {
                let mut per_stage: BTreeMap<&str, usize> = BTreeMap::new();
                for planned in consumers {
                    *per_stage.entry(planned.consumer.stage.as_str()).or_default() += 1;
                }

                let mut branches = Vec::with_capacity(consumers.len());
                for planned in consumers {
                    let consumer = &planned.consumer;
                    let name = if per_stage[consumer.stage.as_str()] > 1 {
                        format!("{}_{}_{}", source, consumer.stage, consumer.role)
                    } else {
                        format!("{}_{}", source, consumer.stage)
                    };
                    registry.register_derived(
                        &name,
                        ChannelOrigin::Branch {
                            parent: source.to_string(),
                            consumer: consumer.clone(),
                        },
                    )?;
                    registry.note_consumer(source, consumer);
                    registry.attach(consumer, planned.slot, &name)?;
                    branches.push(ForkBranch {
                        channel: name,
                        consumer: consumer.clone(),
                    });
                }
                tracing::debug!(channel = %source, branches = branches.len(), "forked channel");
                Ok(Some(Scaffold::Fork(ForkGroup {
                    source: source.to_string(),
                    branches,
                })))
            }
        }
    }

    /// Collapse the sources wired into a merge-point input into one channel.
    pub fn merge(
        &self,
        registry: &mut ChannelRegistry,
        consumer: &ConsumerRef,
    ) -> Result<Option<Scaffold>, CompileError> {
        let slots = registry.feed_slots(consumer);
        if slots.len() < 2 {
            return Ok(None);
        }
        let mut sources = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Some(channel) => sources.push(channel),
                None => {
                    return Err(CompileError::UnresolvedInput {
                        stage: consumer.stage.clone(),
                        role: consumer.role.clone(),
                        reference: "<merge source not yet produced>".to_string(),
                    })
                }
            }
        }

        let name = merge_channel_name(consumer);
        registry.register_derived(
            &name,
            ChannelOrigin::Merge {
                parents: sources.clone(),
                consumer: consumer.clone(),
            },
        )?;
        for source in &sources {
            registry.note_consumer(source, consumer);
        }
        registry.collapse_feed(consumer, &name);
        tracing::debug!(channel = %name, sources = sources.len(), "merged channels");
        Ok(Some(Scaffold::Merge(MergeGroup {
            channel: name,
            consumer: consumer.clone(),
            sources,
        })))
    }
}
