//! Report rendering

use anyhow::{Context, Result};
use chrono::Utc;
use policy_engine::config::ReportConfig;
use policy_engine::{GroupReport, PolicyBundle, ReportFormat, RuleField, SecurityRule, ShadowReport};
use serde::Serialize;
use std::fmt::Write;

#[derive(Serialize)]
struct Document<'a> {
    generated_at: String,
    report: &'a ShadowReport,
}

/// Render a report in the configured format
pub fn render(report: &ShadowReport, bundle: &PolicyBundle, config: &ReportConfig) -> Result<String> {
    let mut report = report.clone();
    if !config.show_clear {
        for group in report.groups.values_mut() {
            group.verdicts.retain(|verdict| verdict.is_shadowed());
        }
    }

    match config.format {
        ReportFormat::Text => Ok(render_text(&report, bundle)),
        ReportFormat::Json => {
            let document = Document {
                generated_at: Utc::now().to_rfc3339(),
                report: &report,
            };
            let mut out = serde_json::to_string_pretty(&document).context("Failed to encode JSON report")?;
            out.push('\n');
            Ok(out)
        }
        ReportFormat::Toml => {
            let document = Document {
                generated_at: Utc::now().to_rfc3339(),
                report: &report,
            };
            toml::to_string(&document).context("Failed to encode TOML report")
        }
        ReportFormat::Csv => render_csv(&report),
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Device Group")]
    device_group: &'a str,
    #[serde(rename = "Index")]
    index: u32,
    #[serde(rename = "Rule")]
    rule: &'a str,
    #[serde(rename = "Shadowing Index")]
    shadowing_index: Option<u32>,
    #[serde(rename = "Shadowed By")]
    shadowed_by: Option<&'a str>,
}

/// One row per (shadowed rule, shadowing rule) pair; clear rules get a row
/// with empty shadowing columns
fn render_csv(report: &ShadowReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for group in report.groups.values() {
        for verdict in &group.verdicts {
            let base = CsvRow {
                device_group: &group.device_group,
                index: verdict.index,
                rule: &verdict.rule,
                shadowing_index: None,
                shadowed_by: None,
            };
            if verdict.shadowed_by.is_empty() {
                writer.serialize(&base).context("Failed to encode CSV report")?;
            }
            for matched in &verdict.shadowed_by {
                writer
                    .serialize(CsvRow {
                        shadowing_index: Some(matched.index),
                        shadowed_by: Some(&matched.rule),
                        ..base
                    })
                    .context("Failed to encode CSV report")?;
            }
        }
    }

    let bytes = writer.into_inner().context("Failed to flush CSV report")?;
    String::from_utf8(bytes).context("CSV report is not UTF-8")
}

fn render_text(report: &ShadowReport, bundle: &PolicyBundle) -> String {
    let mut out = String::new();

    for group in report.groups.values() {
        render_group(&mut out, group, bundle);
    }

    let _ = writeln!(out, "Total shadowed rules: {}", report.shadowed_count());
    out
}

fn render_group(out: &mut String, group: &GroupReport, bundle: &PolicyBundle) {
    let _ = writeln!(
        out,
        "Device group: {} ({} disabled, {} shadowed)",
        group.device_group,
        group.disabled.len(),
        group.shadowed_count()
    );

    let rules = bundle
        .scope(&group.device_group)
        .map(|scope| scope.rules.as_slice())
        .unwrap_or_default();
    let find = |name: &str| rules.iter().find(|rule| rule.name == name);

    for verdict in &group.verdicts {
        if !verdict.is_shadowed() {
            let _ = writeln!(out, "  ok   #{} {}", verdict.index, verdict.rule);
            continue;
        }

        let _ = writeln!(out, "  SHADOWED #{} {}", verdict.index, verdict.rule);
        for matched in &verdict.shadowed_by {
            let _ = writeln!(out, "    by #{} {}", matched.index, matched.rule);
            for check in &matched.checks {
                let _ = writeln!(out, "      {:<20} {}", check.dimension.id(), check.reason);
            }
            if let (Some(later), Some(preceding)) = (find(&verdict.rule), find(&matched.rule)) {
                render_comparison(out, later, preceding);
            }
        }
    }
    out.push('\n');
}

/// Side-by-side attributes of the shadowed rule and its shadowing rule
fn render_comparison(out: &mut String, later: &SecurityRule, preceding: &SecurityRule) {
    for field in RuleField::ALL {
        let _ = writeln!(
            out,
            "      {:<22} {:<30} | {}",
            field.label(),
            later.field(field),
            preceding.field(field)
        );
    }
}
