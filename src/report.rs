use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{InsightReport, PredictionKind};

pub fn build_report(
    scope: Option<&str>,
    generated_on: NaiveDate,
    report: &InsightReport,
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all students");

    let _ = writeln!(output, "# SUMRY Progress Insights");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- Goals on track: {}% of {} goals",
        report.on_track_percent, report.total_goals
    );
    let _ = writeln!(
        output,
        "- Students at risk: {}",
        report.at_risk_students.len()
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Student Performance");

    if report.performance.is_empty() {
        let _ = writeln!(output, "No students on the roster.");
    } else {
        for row in report.performance.iter() {
            let _ = writeln!(
                output,
                "- {}: avg {:.1} across {} goals, {} ({})",
                row.student_name, row.average_score, row.goal_count, row.trend, row.direction
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## At-Risk Students");

    if report.at_risk_students.is_empty() {
        let _ = writeln!(output, "No students flagged at risk.");
    } else {
        for risk in report.at_risk_students.iter() {
            let _ = writeln!(
                output,
                "- {}: {} of {} goals off track",
                risk.student_name, risk.off_track_goals, risk.goal_count
            );
        }
        for intervention in report.interventions.iter() {
            let _ = writeln!(
                output,
                "  - Recommended for {}: {} ({}, priority {})",
                intervention.student_name,
                intervention.strategy,
                intervention.duration,
                intervention.priority
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Predictions");

    if report.predictions.is_empty() {
        let _ = writeln!(output, "No goals with enough data for a trend call.");
    } else {
        for prediction in report.predictions.iter() {
            let label = match prediction.kind {
                PredictionKind::Success => "likely to hit target",
                PredictionKind::Warning => "progress has stalled",
            };
            let timeframe = prediction
                .timeframe
                .as_deref()
                .map(|t| format!(" within {t}"))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} / {}: {}{} (confidence {}, slope {:.2})",
                prediction.student_name,
                prediction.goal_description,
                label,
                timeframe,
                prediction.confidence,
                prediction.slope
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Velocity");

    if report.velocity.is_empty() {
        let _ = writeln!(output, "No progress logs recorded.");
    } else {
        for point in report.velocity.iter() {
            let _ = writeln!(
                output,
                "- Week of {}: avg score {:.1} across {} logs",
                point.week_start, point.avg_score, point.log_count
            );
        }
        if !report.forecast.is_empty() {
            let projected: Vec<String> = report
                .forecast
                .iter()
                .map(|score| format!("{score:.1}"))
                .collect();
            let _ = writeln!(output, "- Projected next scores: {}", projected.join(", "));
        }
    }

    output
}

pub fn build_summary(report: &InsightReport, limit: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Goals on track: {}% of {}",
        report.on_track_percent, report.total_goals
    );

    if report.at_risk_students.is_empty() {
        let _ = writeln!(output, "No students flagged at risk.");
    } else {
        let _ = writeln!(output, "Students at risk:");
        for risk in report.at_risk_students.iter() {
            let _ = writeln!(
                output,
                "- {} ({} of {} goals off track)",
                risk.student_name, risk.off_track_goals, risk.goal_count
            );
        }
    }

    if report.predictions.is_empty() {
        let _ = writeln!(output, "No predictions yet.");
    } else {
        let _ = writeln!(output, "Predictions:");
        for prediction in report.predictions.iter() {
            let label = match prediction.kind {
                PredictionKind::Success => "likely to hit target",
                PredictionKind::Warning => "progress has stalled",
            };
            let _ = writeln!(
                output,
                "- {} / {}: {} (confidence {})",
                prediction.student_name, prediction.goal_description, label, prediction.confidence
            );
        }
    }

    let _ = writeln!(output, "Student performance:");
    for row in report.performance.iter().take(limit) {
        let _ = writeln!(
            output,
            "- {}: avg {:.1} across {} goals, {} ({})",
            row.student_name, row.average_score, row.goal_count, row.trend, row.direction
        );
    }

    output
}
