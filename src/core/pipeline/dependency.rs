//! Automatic insertion of the upstream stages a stage kind requires.

use crate::core::pipeline::error::CompileError;
use crate::core::pipeline::schema::{ChannelRef, InputBinding, StageSpec};
use crate::core::pipeline::template::{StageTemplate, TemplateCatalog};
use std::collections::{HashMap, HashSet, VecDeque};

/// Splice a stage of every required kind missing upstream in front of the
/// stage that requires it. Returns the number of stages added.
///
/// The inserted stage takes over each shared role: it reads what the
/// dependent stage read on that role, and the dependent reads its output.
pub fn insert_required_stages(
    stages: &mut Vec<StageSpec>,
    catalog: &TemplateCatalog,
) -> Result<usize, CompileError> {
    let mut queue: VecDeque<(usize, Vec<String>)> = (0..stages.len())
        .map(|idx| (idx, vec![stages[idx].kind.clone()]))
        .collect();
    let mut added = 0;

    while let Some((idx, chain)) = queue.pop_front() {
        let template = lookup(catalog, &stages[idx], &stages[idx].kind)?;
        for required in &template.requires {
            if has_upstream_kind(stages, idx, required) {
                continue;
            }
            if chain.contains(required) {
                return Err(CompileError::InvalidStage {
                    stage: stages[idx].id.clone(),
                    reason: format!("stage kind requirements loop back to '{}'", required),
                });
            }
            let required_template = lookup(catalog, &stages[idx], required)?;
            let (dependency, rebound) = splice(&stages[idx], template, required_template)?;
            tracing::debug!(
                stage = %stages[idx].id,
                inserted = %dependency.id,
                kind = %required,
                "inserted required upstream stage"
            );

            let dependent = &mut stages[idx];
            for role in rebound {
                let from = vec![ChannelRef::stage(&dependency.id, &role)];
                match dependent.inputs.iter_mut().find(|b| b.role == role) {
                    Some(binding) => binding.from = from,
                    None => dependent.inputs.push(InputBinding { role, from }),
                }
            }

            let mut next = chain.clone();
            next.push(required.clone());
            stages.push(dependency);
            queue.push_back((stages.len() - 1, next));
            added += 1;
        }
    }
    Ok(added)
}

fn lookup<'a>(
    catalog: &'a TemplateCatalog,
    stage: &StageSpec,
    kind: &str,
) -> Result<&'a StageTemplate, CompileError> {
    catalog
        .lookup(kind)
        .ok_or_else(|| CompileError::UnknownStageKind {
            stage: stage.id.clone(),
            kind: kind.to_string(),
        })
}

/// Build the inserted stage and list the dependent's roles it now feeds.
fn splice(
    dependent: &StageSpec,
    template: &StageTemplate,
    required: &StageTemplate,
) -> Result<(StageSpec, Vec<String>), CompileError> {
    let mut dependency = StageSpec::new(required.label_for(&dependent.id), required.kind.clone());
    dependency.outputs = required.outputs.iter().map(|r| r.name.clone()).collect();

    let mut rebound = Vec::new();
    for role in &required.outputs {
        if template.input(&role.name).is_none() {
            continue;
        }
        match dependent.input(&role.name) {
            Some(binding) if required.input(&role.name).is_some() => {
                dependency.inputs.push(binding.clone());
            }
            Some(_) => continue,
            None => {}
        }
        rebound.push(role.name.clone());
    }

    if rebound.is_empty() {
        return Err(CompileError::InvalidStage {
            stage: dependent.id.clone(),
            reason: format!(
                "required kind '{}' shares no role with '{}'",
                required.kind, template.kind
            ),
        });
    }
    Ok((dependency, rebound))
}

/// True when a stage of `kind` feeds `idx`, directly or transitively.
fn has_upstream_kind(stages: &[StageSpec], idx: usize, kind: &str) -> bool {
    let by_id: HashMap<&str, usize> = stages
        .iter()
        .enumerate()
        .map(|(i, stage)| (stage.id.as_str(), i))
        .collect();
    let mut seen = HashSet::from([idx]);
    let mut pending = vec![idx];
    while let Some(current) = pending.pop() {
        for source in stages[current].inputs.iter().flat_map(|b| &b.from) {
            let ChannelRef::Stage { stage, .. } = source else {
                continue;
            };
            let Some(&upstream) = by_id.get(stage.as_str()) else {
                continue;
            };
            if stages[upstream].kind == kind {
                return true;
            }
            if seen.insert(upstream) {
                pending.push(upstream);
            }
        }
    }
    false
}
