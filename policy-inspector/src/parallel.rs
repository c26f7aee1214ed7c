//! Concurrent evaluation of independent device groups

use anyhow::{Context, Result};
use policy_engine::{EngineOptions, GroupReport, PolicyBundle, ShadowEvaluator, ShadowReport};
use std::sync::Arc;

/// One blocking worker per device group, each with its own resolver cache
pub async fn evaluate_parallel(
    bundle: Arc<PolicyBundle>,
    options: EngineOptions,
    filter: &[String],
) -> Result<ShadowReport> {
    let names: Vec<String> = bundle.select(filter)?.into_iter().map(str::to_string).collect();

    let mut handles = Vec::with_capacity(names.len());
    for name in names {
        let bundle = Arc::clone(&bundle);
        handles.push(tokio::task::spawn_blocking(
            move || -> policy_engine::Result<GroupReport> {
                let catalog = bundle.catalog_for(&name)?;
                let scope = bundle.scope(&name)?;
                ShadowEvaluator::new(options).evaluate_group(&name, &scope.rules, &catalog)
            },
        ));
    }

    // Awaiting in spawn order keeps the bundle's device group order
    let mut report = ShadowReport::new(options);
    for handle in handles {
        let group = handle.await.context("Evaluation worker failed")??;
        report.push(group);
    }
    Ok(report)
}
