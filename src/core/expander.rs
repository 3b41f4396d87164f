//! # Matrix Expander Module / 矩阵展开模块
//!
//! Turns the declarative matrix into the concrete, ordered list of job
//! variants. Expansion is a pure function: nothing is executed, so every
//! configuration problem surfaces before a single job is scheduled.
//!
//! 将声明式矩阵转换为具体的、有序的作业变体列表。展开是纯函数：
//! 不执行任何操作，因此所有配置问题都会在调度任何作业之前暴露出来。

use crate::core::config::{Axis, JobTemplate, MatrixDocument, Overrides, Scalar};
use crate::core::error::ConfigError;
use crate::core::models::{AxisValue, Variant};
use std::collections::{BTreeMap, HashSet};

/// Fragment fields that map onto variant attributes instead of the environment.
const KNOWN_FIELDS: [&str; 4] = ["os", "toolchain", "args", "command"];

/// Expands `axes` into variants, merging the override fragment of every
/// selected value on top of `template`.
///
/// With several axes the result is their cartesian product, first-declared
/// axis outermost. Within a variant, fragments apply in axis declaration order
/// and the later fragment wins on a field collision.
///
/// 将 `axes` 展开为变体，并把每个选定值的覆盖片段合并到 `template` 之上。
/// 多个轴时结果为它们的笛卡尔积，最先声明的轴在最外层。在单个变体内，
/// 片段按轴的声明顺序应用，字段冲突时后声明的片段获胜。
///
/// # Errors
/// Returns a [`ConfigError`] if there are no axes, an axis is empty or
/// duplicated, a value repeats, a value has no override entry, or two
/// combinations produce the same variant id.
pub fn expand(
    axes: &[Axis],
    overrides: &Overrides,
    template: &JobTemplate,
) -> Result<Vec<Variant>, ConfigError> {
    validate_axes(axes, overrides)?;

    let combinations = axes.iter().fold(vec![Vec::new()], |acc, axis| {
        acc.into_iter()
            .flat_map(|prefix: Vec<AxisValue>| {
                axis.values.iter().map(move |value| {
                    let mut combo = prefix.clone();
                    combo.push(AxisValue {
                        axis: axis.name.clone(),
                        value: value.clone(),
                    });
                    combo
                })
            })
            .collect::<Vec<_>>()
    });

    let mut seen_ids = HashSet::new();
    let mut variants = Vec::with_capacity(combinations.len());
    for axis_values in combinations {
        let variant = resolve_variant(axis_values, overrides, template);
        if !seen_ids.insert(variant.id.clone()) {
            return Err(ConfigError::DuplicateVariant(variant.id));
        }
        variants.push(variant);
    }
    Ok(variants)
}

/// Expands a loaded document: builds its template, then calls [`expand`].
pub fn expand_document(document: &MatrixDocument) -> Result<Vec<Variant>, ConfigError> {
    let template = document.template()?;
    expand(&document.axes, &document.overrides, &template)
}

fn validate_axes(axes: &[Axis], overrides: &Overrides) -> Result<(), ConfigError> {
    if axes.is_empty() {
        return Err(ConfigError::NoAxes);
    }

    let mut axis_names = HashSet::new();
    // Values key the override table, so they must be unique across all axes.
    let mut values = HashSet::new();
    for axis in axes {
        if !axis_names.insert(axis.name.as_str()) {
            return Err(ConfigError::DuplicateAxis(axis.name.clone()));
        }
        if axis.values.is_empty() {
            return Err(ConfigError::EmptyAxis(axis.name.clone()));
        }
        for value in &axis.values {
            if !values.insert(value.as_str()) {
                return Err(ConfigError::DuplicateValue {
                    axis: axis.name.clone(),
                    value: value.clone(),
                });
            }
            if !overrides.contains_key(value) {
                return Err(ConfigError::MissingOverride {
                    axis: axis.name.clone(),
                    value: value.clone(),
                });
            }
        }
    }
    Ok(())
}

fn resolve_variant(
    axis_values: Vec<AxisValue>,
    overrides: &Overrides,
    template: &JobTemplate,
) -> Variant {
    let mut merged: BTreeMap<&str, &Scalar> = BTreeMap::new();
    for av in &axis_values {
        if let Some(fragment) = overrides.get(&av.value) {
            for (field, scalar) in fragment {
                merged.insert(field.as_str(), scalar);
            }
        }
    }

    let text = |field: &str| merged.get(field).map(|s| s.to_string());

    let env = merged
        .iter()
        .filter(|(field, _)| !KNOWN_FIELDS.contains(*field))
        .map(|(field, scalar)| (field.to_string(), scalar.to_string()))
        .collect();

    let id = axis_values
        .iter()
        .map(|av| av.value.as_str())
        .collect::<Vec<_>>()
        .join("-");

    Variant {
        id,
        os: text("os").unwrap_or_else(|| std::env::consts::OS.to_string()),
        toolchain: text("toolchain").filter(|t| !t.is_empty()),
        command: text("command").unwrap_or_else(|| template.command.clone()),
        args: text("args").unwrap_or_else(|| template.args.clone()),
        env,
        steps: template.steps.clone(),
        axis_values,
    }
}
