use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use uuid::Uuid;

use crate::models::{
    Direction, Goal, InsightReport, Intervention, Prediction, PredictionKind, ProgressLog,
    RiskStatus, Student, StudentPerformance, StudentRisk, TrendLabel, VelocityPoint,
};

const ON_TRACK_THRESHOLD: f64 = 0.80;
const OFF_TRACK_THRESHOLD: f64 = 0.50;
const MIN_TREND_LOGS: usize = 3;
const MAX_PREDICTIONS: usize = 5;
const MAX_INTERVENTIONS: usize = 3;
const FORECAST_HORIZON: usize = 4;
const SUCCESS_CONFIDENCE: u32 = 85;
const WARNING_CONFIDENCE: u32 = 78;

/// Computes the full dashboard report from a read-only snapshot. Pure and
/// deterministic; recomputed from scratch on every call.
pub fn generate_insights(
    students: &[Student],
    goals: &[Goal],
    logs: &[ProgressLog],
) -> InsightReport {
    let by_goal = logs_by_goal(logs);
    let risk = classify_students(students, goals, &by_goal);
    let at_risk: Vec<StudentRisk> = risk
        .into_iter()
        .filter(|r| r.status == RiskStatus::AtRisk)
        .collect();

    InsightReport {
        on_track_percent: on_track_percent(goals, &by_goal),
        total_goals: goals.len(),
        predictions: build_predictions(students, goals, &by_goal),
        performance: performance_matrix(students, goals, logs),
        interventions: build_interventions(&at_risk),
        velocity: weekly_velocity(logs),
        forecast: forecast_scores(logs),
        at_risk_students: at_risk,
    }
}

/// Ordinary least squares slope of scores against index position 0..n-1,
/// using the closed-form sums for the arithmetic x progression.
/// Returns None below two points (degenerate denominator).
pub fn regression_slope(scores: &[f64]) -> Option<f64> {
    let n = scores.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let sum_x = nf * (nf - 1.0) / 2.0;
    let sum_x2 = nf * (nf - 1.0) * (2.0 * nf - 1.0) / 6.0;
    let sum_y: f64 = scores.iter().sum();
    let sum_xy: f64 = scores.iter().enumerate().map(|(i, y)| i as f64 * y).sum();

    let denominator = nf * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }
    Some((nf * sum_xy - sum_x * sum_y) / denominator)
}

fn logs_by_goal(logs: &[ProgressLog]) -> HashMap<Uuid, Vec<&ProgressLog>> {
    let mut by_goal: HashMap<Uuid, Vec<&ProgressLog>> = HashMap::new();
    for log in logs {
        by_goal.entry(log.goal_id).or_default().push(log);
    }
    for entries in by_goal.values_mut() {
        entries.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
    }
    by_goal
}

/// Average of the 3 most recent scores, normalized against the
/// baseline-to-target range. None with fewer than 3 logs; a degenerate
/// range (target == baseline) normalizes to 0.
fn normalized_progress(goal: &Goal, sorted_logs: &[&ProgressLog]) -> Option<f64> {
    if sorted_logs.len() < MIN_TREND_LOGS {
        return None;
    }
    let recent = &sorted_logs[sorted_logs.len() - MIN_TREND_LOGS..];
    let avg = recent.iter().map(|l| l.score).sum::<f64>() / MIN_TREND_LOGS as f64;
    let range = goal.target - goal.baseline;
    if range == 0.0 {
        return Some(0.0);
    }
    Some((avg - goal.baseline) / range)
}

fn on_track_percent(goals: &[Goal], by_goal: &HashMap<Uuid, Vec<&ProgressLog>>) -> u32 {
    if goals.is_empty() {
        return 0;
    }
    let on_track = goals
        .iter()
        .filter(|goal| {
            by_goal
                .get(&goal.id)
                .and_then(|logs| normalized_progress(goal, logs))
                .is_some_and(|progress| progress >= ON_TRACK_THRESHOLD)
        })
        .count();
    ((on_track as f64 / goals.len() as f64) * 100.0).round() as u32
}

fn classify_students(
    students: &[Student],
    goals: &[Goal],
    by_goal: &HashMap<Uuid, Vec<&ProgressLog>>,
) -> Vec<StudentRisk> {
    students
        .iter()
        .map(|student| {
            let own_goals: Vec<&Goal> =
                goals.iter().filter(|g| g.student_id == student.id).collect();
            let off_track = own_goals
                .iter()
                .filter(|goal| {
                    by_goal
                        .get(&goal.id)
                        .and_then(|logs| normalized_progress(goal, logs))
                        .is_some_and(|progress| progress < OFF_TRACK_THRESHOLD)
                })
                .count();

            let status = if own_goals.is_empty() {
                RiskStatus::InsufficientData
            } else if off_track * 2 >= own_goals.len() {
                RiskStatus::AtRisk
            } else {
                RiskStatus::Steady
            };

            StudentRisk {
                student_id: student.id,
                student_name: student.name.clone(),
                goal_count: own_goals.len(),
                off_track_goals: off_track,
                status,
            }
        })
        .collect()
}

fn build_predictions(
    students: &[Student],
    goals: &[Goal],
    by_goal: &HashMap<Uuid, Vec<&ProgressLog>>,
) -> Vec<Prediction> {
    let names: HashMap<Uuid, &str> = students
        .iter()
        .map(|s| (s.id, s.name.as_str()))
        .collect();

    let mut predictions = Vec::new();
    for goal in goals {
        if predictions.len() == MAX_PREDICTIONS {
            break;
        }
        let Some(sorted_logs) = by_goal.get(&goal.id) else {
            continue;
        };
        if sorted_logs.len() < MIN_TREND_LOGS {
            continue;
        }
        let scores: Vec<f64> = sorted_logs.iter().map(|l| l.score).collect();
        let Some(slope) = regression_slope(&scores) else {
            continue;
        };
        let Some(&latest) = scores.last() else {
            continue;
        };

        let (kind, confidence, timeframe) = if slope > 1.0 && latest >= 0.8 * goal.target {
            (
                PredictionKind::Success,
                SUCCESS_CONFIDENCE,
                Some("2-3 weeks".to_string()),
            )
        } else if slope < 0.5 {
            (PredictionKind::Warning, WARNING_CONFIDENCE, None)
        } else {
            continue;
        };

        predictions.push(Prediction {
            goal_id: goal.id,
            student_name: names
                .get(&goal.student_id)
                .copied()
                .unwrap_or("unknown")
                .to_string(),
            goal_description: goal.description.clone(),
            kind,
            confidence,
            timeframe,
            slope,
        });
    }
    predictions
}

fn performance_matrix(
    students: &[Student],
    goals: &[Goal],
    logs: &[ProgressLog],
) -> Vec<StudentPerformance> {
    let goal_owner: HashMap<Uuid, Uuid> =
        goals.iter().map(|g| (g.id, g.student_id)).collect();
    let mut goal_counts: HashMap<Uuid, usize> = HashMap::new();
    for goal in goals {
        *goal_counts.entry(goal.student_id).or_default() += 1;
    }
    let mut by_student: HashMap<Uuid, Vec<&ProgressLog>> = HashMap::new();
    for log in logs {
        if let Some(&student_id) = goal_owner.get(&log.goal_id) {
            by_student.entry(student_id).or_default().push(log);
        }
    }

    students
        .iter()
        .map(|student| {
            let mut own_logs = by_student.remove(&student.id).unwrap_or_default();
            own_logs.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));

            let average_score = if own_logs.is_empty() {
                0.0
            } else {
                own_logs.iter().map(|l| l.score).sum::<f64>() / own_logs.len() as f64
            };

            let trend = if average_score >= 80.0 {
                TrendLabel::ExcellentProgress
            } else if average_score >= 60.0 {
                TrendLabel::GoodProgress
            } else {
                TrendLabel::NeedsSupport
            };

            let direction = match (own_logs.first(), own_logs.last()) {
                (Some(first), Some(last)) if own_logs.len() >= 2 => {
                    if last.score > first.score {
                        Direction::Improving
                    } else if last.score < first.score {
                        Direction::Declining
                    } else {
                        Direction::Stable
                    }
                }
                _ => Direction::InsufficientData,
            };

            StudentPerformance {
                student_id: student.id,
                student_name: student.name.clone(),
                average_score,
                goal_count: goal_counts.get(&student.id).copied().unwrap_or(0),
                trend,
                direction,
            }
        })
        .collect()
}

fn build_interventions(at_risk: &[StudentRisk]) -> Vec<Intervention> {
    at_risk
        .iter()
        .take(MAX_INTERVENTIONS)
        .map(|risk| Intervention {
            student_name: risk.student_name.clone(),
            strategy: "Add a scheduled 1:1 instruction block and review goal supports \
                       with the IEP team"
                .to_string(),
            duration: "4 weeks".to_string(),
            priority: "high".to_string(),
        })
        .collect()
}

/// Mean score and log count per ISO week (Monday start), ascending.
fn weekly_velocity(logs: &[ProgressLog]) -> Vec<VelocityPoint> {
    let mut weeks: HashMap<NaiveDate, (f64, usize)> = HashMap::new();
    for log in logs {
        let offset = log.recorded_at.weekday().num_days_from_monday() as i64;
        let week_start = log.recorded_at - Duration::days(offset);
        let entry = weeks.entry(week_start).or_insert((0.0, 0));
        entry.0 += log.score;
        entry.1 += 1;
    }

    let mut velocity: Vec<VelocityPoint> = weeks
        .into_iter()
        .map(|(week_start, (total, count))| VelocityPoint {
            week_start,
            avg_score: total / count as f64,
            log_count: count,
        })
        .collect();
    velocity.sort_by(|a, b| a.week_start.cmp(&b.week_start));
    velocity
}

/// Projects the next 4 scores from the overall trend line, anchored at the
/// latest recorded score and clamped to the 0-100 scale.
fn forecast_scores(logs: &[ProgressLog]) -> Vec<f64> {
    if logs.len() < MIN_TREND_LOGS {
        return Vec::new();
    }
    let mut sorted: Vec<&ProgressLog> = logs.iter().collect();
    sorted.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
    let scores: Vec<f64> = sorted.iter().map(|l| l.score).collect();

    let Some(slope) = regression_slope(&scores) else {
        return Vec::new();
    };
    let Some(&latest) = scores.last() else {
        return Vec::new();
    };

    (1..=FORECAST_HORIZON)
        .map(|step| (latest + slope * step as f64).clamp(0.0, 100.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn student(name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }

    fn goal(student: &Student, baseline: f64, target: f64, description: &str) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            student_id: student.id,
            baseline,
            target,
            description: description.to_string(),
        }
    }

    fn log(goal: &Goal, score: f64, day: u32) -> ProgressLog {
        ProgressLog {
            id: Uuid::new_v4(),
            goal_id: goal.id,
            score,
            recorded_at: NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date"),
        }
    }

    fn logs(goal: &Goal, scores: &[f64]) -> Vec<ProgressLog> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| log(goal, score, 2 + i as u32))
            .collect()
    }

    #[test]
    fn empty_collections_yield_neutral_report() {
        let report = generate_insights(&[], &[], &[]);
        assert_eq!(report.on_track_percent, 0);
        assert_eq!(report.total_goals, 0);
        assert!(report.at_risk_students.is_empty());
        assert!(report.predictions.is_empty());
        assert!(report.performance.is_empty());
        assert!(report.interventions.is_empty());
        assert!(report.velocity.is_empty());
        assert!(report.forecast.is_empty());
    }

    #[test]
    fn slope_matches_known_sequences() {
        assert_eq!(regression_slope(&[10.0, 20.0, 30.0]), Some(10.0));
        assert_eq!(regression_slope(&[50.0, 50.0, 50.0]), Some(0.0));
        assert_eq!(regression_slope(&[5.0]), None);
        assert_eq!(regression_slope(&[]), None);
    }

    #[test]
    fn on_track_boundary_at_eighty_percent() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let exactly_80 = logs(&reading, &[80.0, 80.0, 80.0]);
        let report = generate_insights(
            &[avery.clone()],
            std::slice::from_ref(&reading),
            &exactly_80,
        );
        assert_eq!(report.on_track_percent, 100);

        let just_below = logs(&reading, &[79.9, 79.9, 79.9]);
        let report = generate_insights(&[avery], std::slice::from_ref(&reading), &just_below);
        assert_eq!(report.on_track_percent, 0);
    }

    #[test]
    fn goals_with_fewer_than_three_logs_are_not_on_track() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let two_logs = logs(&reading, &[95.0, 95.0]);
        let report = generate_insights(&[avery], std::slice::from_ref(&reading), &two_logs);
        assert_eq!(report.on_track_percent, 0);
        assert_eq!(report.total_goals, 1);
        assert!(report.forecast.is_empty());
    }

    #[test]
    fn degenerate_range_goals_normalize_to_zero() {
        let avery = student("Avery Lee");
        let maintenance = goal(&avery, 90.0, 90.0, "Sight word maintenance");
        let high = logs(&maintenance, &[90.0, 90.0, 90.0]);
        let report = generate_insights(
            &[avery],
            std::slice::from_ref(&maintenance),
            &high,
        );

        assert_eq!(report.on_track_percent, 0);
        assert_eq!(report.at_risk_students.len(), 1);
        assert_eq!(report.at_risk_students[0].off_track_goals, 1);
        assert_eq!(report.predictions.len(), 1);
        assert_eq!(report.predictions[0].kind, PredictionKind::Warning);
    }

    #[test]
    fn at_risk_when_at_least_half_of_goals_are_off_track() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let math = goal(&avery, 0.0, 100.0, "Math computation");

        // Both off-track.
        let mut all_logs = logs(&reading, &[40.0, 40.0, 40.0]);
        all_logs.extend(logs(&math, &[30.0, 30.0, 30.0]));
        let report = generate_insights(
            &[avery.clone()],
            &[reading.clone(), math.clone()],
            &all_logs,
        );
        assert_eq!(report.at_risk_students.len(), 1);
        assert_eq!(report.at_risk_students[0].off_track_goals, 2);

        // Exactly half off-track still counts.
        let mut half_logs = logs(&reading, &[40.0, 40.0, 40.0]);
        half_logs.extend(logs(&math, &[90.0, 90.0, 90.0]));
        let report = generate_insights(
            &[avery.clone()],
            &[reading.clone(), math.clone()],
            &half_logs,
        );
        assert_eq!(report.at_risk_students.len(), 1);
        assert_eq!(report.at_risk_students[0].off_track_goals, 1);

        // Nothing off-track.
        let mut good_logs = logs(&reading, &[90.0, 90.0, 90.0]);
        good_logs.extend(logs(&math, &[90.0, 90.0, 90.0]));
        let report = generate_insights(&[avery], &[reading, math], &good_logs);
        assert!(report.at_risk_students.is_empty());
    }

    #[test]
    fn zero_goal_students_classify_as_insufficient_data() {
        let jules = student("Jules Moreno");
        let report = generate_insights(&[jules], &[], &[]);
        assert!(report.at_risk_students.is_empty());
        assert!(report.interventions.is_empty());
        assert_eq!(report.performance.len(), 1);
        assert_eq!(report.performance[0].average_score, 0.0);
    }

    #[test]
    fn rising_scores_near_target_predict_success() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let rising = logs(&reading, &[70.0, 80.0, 90.0]);
        let report = generate_insights(&[avery], std::slice::from_ref(&reading), &rising);

        assert_eq!(report.predictions.len(), 1);
        let prediction = &report.predictions[0];
        assert_eq!(prediction.kind, PredictionKind::Success);
        assert_eq!(prediction.confidence, 85);
        assert_eq!(prediction.timeframe.as_deref(), Some("2-3 weeks"));
        assert_eq!(prediction.slope, 10.0);
    }

    #[test]
    fn rising_scores_far_from_target_predict_nothing() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let rising_low = logs(&reading, &[10.0, 20.0, 30.0]);
        let report = generate_insights(&[avery], std::slice::from_ref(&reading), &rising_low);
        assert!(report.predictions.is_empty());
    }

    #[test]
    fn flat_scores_predict_a_warning() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let flat = logs(&reading, &[50.0, 50.0, 50.0]);
        let report = generate_insights(&[avery], std::slice::from_ref(&reading), &flat);

        assert_eq!(report.predictions.len(), 1);
        let prediction = &report.predictions[0];
        assert_eq!(prediction.kind, PredictionKind::Warning);
        assert_eq!(prediction.confidence, 78);
        assert!(prediction.timeframe.is_none());
    }

    #[test]
    fn predictions_are_capped_at_five() {
        let avery = student("Avery Lee");
        let goals: Vec<Goal> = (0..7)
            .map(|i| goal(&avery, 0.0, 100.0, &format!("Goal {i}")))
            .collect();
        let mut all_logs = Vec::new();
        for g in &goals {
            all_logs.extend(logs(g, &[50.0, 50.0, 50.0]));
        }
        let report = generate_insights(&[avery], &goals, &all_logs);
        assert_eq!(report.predictions.len(), 5);
    }

    #[test]
    fn trend_labels_partition_at_sixty_and_eighty() {
        let cases = [
            (59.0, TrendLabel::NeedsSupport),
            (60.0, TrendLabel::GoodProgress),
            (79.0, TrendLabel::GoodProgress),
            (80.0, TrendLabel::ExcellentProgress),
        ];
        for (score, expected) in cases {
            let kiara = student("Kiara Patel");
            let writing = goal(&kiara, 0.0, 100.0, "Written expression");
            let flat = logs(&writing, &[score, score, score]);
            let report = generate_insights(&[kiara], std::slice::from_ref(&writing), &flat);
            assert_eq!(report.performance[0].trend, expected, "avg {score}");
        }
    }

    #[test]
    fn direction_compares_latest_against_earliest_score() {
        let kiara = student("Kiara Patel");
        let writing = goal(&kiara, 0.0, 100.0, "Written expression");

        let up = logs(&writing, &[40.0, 55.0, 70.0]);
        let report = generate_insights(
            &[kiara.clone()],
            std::slice::from_ref(&writing),
            &up,
        );
        assert_eq!(report.performance[0].direction, Direction::Improving);

        let down = logs(&writing, &[70.0, 55.0, 40.0]);
        let report = generate_insights(
            &[kiara.clone()],
            std::slice::from_ref(&writing),
            &down,
        );
        assert_eq!(report.performance[0].direction, Direction::Declining);

        let single = logs(&writing, &[70.0]);
        let report = generate_insights(&[kiara], std::slice::from_ref(&writing), &single);
        assert_eq!(report.performance[0].direction, Direction::InsufficientData);
        assert!(report.forecast.is_empty());
    }

    #[test]
    fn performance_only_counts_a_students_own_logs() {
        let avery = student("Avery Lee");
        let jules = student("Jules Moreno");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let all_logs = logs(&reading, &[70.0, 80.0, 90.0]);
        let report = generate_insights(
            &[avery, jules],
            std::slice::from_ref(&reading),
            &all_logs,
        );

        assert_eq!(report.performance.len(), 2);
        assert!((report.performance[0].average_score - 80.0).abs() < 1e-9);
        assert_eq!(report.performance[0].goal_count, 1);
        assert_eq!(report.performance[1].average_score, 0.0);
        assert_eq!(report.performance[1].goal_count, 0);
    }

    #[test]
    fn interventions_are_capped_at_three() {
        let students: Vec<Student> = (0..5).map(|i| student(&format!("Student {i}"))).collect();
        let mut goals = Vec::new();
        let mut all_logs = Vec::new();
        for s in &students {
            let g = goal(s, 0.0, 100.0, "Reading fluency");
            all_logs.extend(logs(&g, &[30.0, 30.0, 30.0]));
            goals.push(g);
        }
        let report = generate_insights(&students, &goals, &all_logs);
        assert_eq!(report.at_risk_students.len(), 5);
        assert_eq!(report.interventions.len(), 3);
        assert!(report.interventions.iter().all(|i| i.priority == "high"));
    }

    #[test]
    fn velocity_buckets_by_week_in_ascending_order() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        // 2026-03-02 is a Monday; day 4 is the same ISO week, day 9 the next.
        let all_logs = vec![
            log(&reading, 40.0, 9),
            log(&reading, 50.0, 2),
            log(&reading, 70.0, 4),
        ];
        let report = generate_insights(&[avery], std::slice::from_ref(&reading), &all_logs);

        assert_eq!(report.velocity.len(), 2);
        assert_eq!(
            report.velocity[0].week_start,
            NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
        );
        assert_eq!(report.velocity[0].log_count, 2);
        assert!((report.velocity[0].avg_score - 60.0).abs() < 1e-9);
        assert_eq!(report.velocity[1].log_count, 1);
    }

    #[test]
    fn forecast_extends_the_trend_and_clamps_to_scale() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 0.0, 100.0, "Reading fluency");
        let rising = logs(&reading, &[70.0, 80.0, 90.0]);
        let report = generate_insights(
            &[avery.clone()],
            std::slice::from_ref(&reading),
            &rising,
        );
        // Slope 10 from a latest score of 90: 100, 100, 100, 100 after clamping.
        assert_eq!(report.forecast, vec![100.0, 100.0, 100.0, 100.0]);

        let gentle = logs(&reading, &[50.0, 51.0, 52.0]);
        let report = generate_insights(&[avery], std::slice::from_ref(&reading), &gentle);
        assert_eq!(report.forecast, vec![53.0, 54.0, 55.0, 56.0]);
    }

    #[test]
    fn identical_inputs_yield_identical_reports() {
        let avery = student("Avery Lee");
        let reading = goal(&avery, 20.0, 90.0, "Reading fluency");
        let all_logs = logs(&reading, &[40.0, 55.0, 65.0, 72.0]);

        let first = generate_insights(
            &[avery.clone()],
            std::slice::from_ref(&reading),
            &all_logs,
        );
        let second = generate_insights(&[avery], std::slice::from_ref(&reading), &all_logs);
        assert_eq!(
            serde_json::to_value(&first).expect("serializable"),
            serde_json::to_value(&second).expect("serializable")
        );
    }
}
