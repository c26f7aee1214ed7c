//! Shadowing evaluation over ordered rule lists

use crate::address::catalog::AddressCatalog;
use crate::address::resolver::AddressResolver;
use crate::check::{AddressMode, CheckOutcome, CheckRegistry, EngineOptions, PreparedRule};
use crate::error::{EngineError, Result};
use crate::rule::SecurityRule;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

/// A preceding rule that fully covers a later one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowingMatch {
    pub rule: String,
    pub index: u32,
    pub checks: Vec<CheckOutcome>,
}

/// Outcome for one enabled rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleVerdict {
    pub rule: String,
    pub index: u32,
    /// Every preceding rule that shadows this one, in evaluation order
    pub shadowed_by: Vec<ShadowingMatch>,
}

impl RuleVerdict {
    pub fn is_shadowed(&self) -> bool {
        !self.shadowed_by.is_empty()
    }
}

/// Results for one device group, in rule evaluation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub device_group: String,
    pub verdicts: Vec<RuleVerdict>,
    /// Rules excluded from comparison because they are disabled
    pub disabled: Vec<String>,
}

impl GroupReport {
    pub fn shadowed(&self) -> impl Iterator<Item = &RuleVerdict> {
        self.verdicts.iter().filter(|v| v.is_shadowed())
    }

    pub fn shadowed_count(&self) -> usize {
        self.shadowed().count()
    }

    pub fn verdict(&self, rule: &str) -> Option<&RuleVerdict> {
        self.verdicts.iter().find(|v| v.rule == rule)
    }
}

/// Results for a whole run, keyed by device group in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowReport {
    pub options: EngineOptions,
    pub groups: IndexMap<String, GroupReport>,
}

impl ShadowReport {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            groups: IndexMap::new(),
        }
    }

    pub fn push(&mut self, report: GroupReport) {
        self.groups.insert(report.device_group.clone(), report);
    }

    pub fn shadowed_count(&self) -> usize {
        self.groups.values().map(GroupReport::shadowed_count).sum()
    }
}

/// Lifecycle of one device group's evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    Comparing,
    Done,
}

/// Evaluation of a single device group.
///
/// Construction checks the ordering contract: rules are taken in ascending
/// `index` order and an index may appear only once.
pub struct GroupRun<'a> {
    device_group: &'a str,
    rules: Vec<&'a SecurityRule>,
    catalog: &'a AddressCatalog,
    state: GroupState,
}

impl<'a> GroupRun<'a> {
    pub fn new(device_group: &'a str, rules: &'a [SecurityRule], catalog: &'a AddressCatalog) -> Result<Self> {
        let mut ordered: Vec<&SecurityRule> = rules.iter().collect();
        ordered.sort_by_key(|rule| rule.index);

        let mut seen: HashMap<u32, &str> = HashMap::new();
        for rule in &ordered {
            if let Some(first) = seen.insert(rule.index, &rule.name) {
                return Err(EngineError::DuplicateIndex {
                    device_group: device_group.to_string(),
                    index: rule.index,
                    first: first.to_string(),
                    second: rule.name.clone(),
                });
            }
        }

        Ok(Self {
            device_group,
            rules: ordered,
            catalog,
            state: GroupState::Pending,
        })
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Compare every enabled rule against every enabled rule before it
    pub fn run(&mut self, registry: &CheckRegistry) -> GroupReport {
        self.state = GroupState::Comparing;

        let disabled: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| !rule.enabled)
            .map(|rule| rule.name.clone())
            .collect();

        let prepared = self.prepare(registry.options());
        let mut verdicts = Vec::with_capacity(prepared.len());

        for (i, later) in prepared.iter().enumerate() {
            let mut shadowed_by = Vec::new();

            for preceding in &prepared[..i] {
                let checks = registry.run(preceding, later);
                if checks.iter().all(|check| check.covers) {
                    tracing::debug!(
                        "{}: rule {} is shadowed by {}",
                        self.device_group,
                        later.rule.name,
                        preceding.rule.name
                    );
                    shadowed_by.push(ShadowingMatch {
                        rule: preceding.rule.name.clone(),
                        index: preceding.rule.index,
                        checks,
                    });
                } else if let Some(failed) = checks.iter().find(|check| !check.covers) {
                    tracing::trace!(
                        "{}: {} not covered by {} ({}: {})",
                        self.device_group,
                        later.rule.name,
                        preceding.rule.name,
                        failed.dimension,
                        failed.reason
                    );
                }
            }

            verdicts.push(RuleVerdict {
                rule: later.rule.name.clone(),
                index: later.rule.index,
                shadowed_by,
            });
        }

        let report = GroupReport {
            device_group: self.device_group.to_string(),
            verdicts,
            disabled,
        };

        tracing::info!(
            "Device group {}: {} rules evaluated, {} disabled, {} shadowed",
            self.device_group,
            report.verdicts.len(),
            report.disabled.len(),
            report.shadowed_count()
        );

        self.state = GroupState::Done;
        report
    }

    fn prepare(&self, options: &EngineOptions) -> Vec<PreparedRule<'a>> {
        let enabled = self.rules.iter().copied().filter(|rule| rule.enabled);

        match options.address_mode {
            AddressMode::Basic => enabled.map(PreparedRule::basic).collect(),
            AddressMode::Advanced => {
                // One cache per device group; catalogs differ between groups
                let mut resolver = AddressResolver::new(self.catalog);
                let prepared: Vec<PreparedRule<'a>> = enabled
                    .map(|rule| PreparedRule {
                        rule,
                        source: Some(resolver.resolve_all(rule.source_addresses.names())),
                        destination: Some(resolver.resolve_all(rule.destination_addresses.names())),
                    })
                    .collect();
                tracing::debug!(
                    "{}: resolved {} address references",
                    self.device_group,
                    resolver.cached()
                );
                prepared
            }
        }
    }
}

/// Runs the configured checks over device groups
#[derive(Debug, Clone)]
pub struct ShadowEvaluator {
    registry: CheckRegistry,
}

impl ShadowEvaluator {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            registry: CheckRegistry::for_options(&options),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        self.registry.options()
    }

    /// Evaluate one device group
    pub fn evaluate_group(
        &self,
        device_group: &str,
        rules: &[SecurityRule],
        catalog: &AddressCatalog,
    ) -> Result<GroupReport> {
        let mut run = GroupRun::new(device_group, rules, catalog)?;
        Ok(run.run(&self.registry))
    }

    /// Evaluate independent device groups, preserving their order
    pub fn evaluate<'a, I>(&self, groups: I) -> Result<ShadowReport>
    where
        I: IntoIterator<Item = (&'a str, &'a [SecurityRule], &'a AddressCatalog)>,
    {
        let mut report = ShadowReport::new(*self.options());
        for (device_group, rules, catalog) in groups {
            report.push(self.evaluate_group(device_group, rules, catalog)?);
        }
        Ok(report)
    }
}
