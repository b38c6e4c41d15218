use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Goal {
    pub id: Uuid,
    pub student_id: Uuid,
    pub baseline: f64,
    pub target: f64,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ProgressLog {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub score: f64,
    pub recorded_at: NaiveDate,
}

/// Everything the dashboard surfaces, computed in one pass over a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub on_track_percent: u32,
    pub total_goals: usize,
    pub at_risk_students: Vec<StudentRisk>,
    pub predictions: Vec<Prediction>,
    pub performance: Vec<StudentPerformance>,
    pub interventions: Vec<Intervention>,
    pub velocity: Vec<VelocityPoint>,
    pub forecast: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    AtRisk,
    Steady,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentRisk {
    pub student_id: Uuid,
    pub student_name: String,
    pub goal_count: usize,
    pub off_track_goals: usize,
    pub status: RiskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    Success,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub goal_id: Uuid,
    pub student_name: String,
    pub goal_description: String,
    pub kind: PredictionKind,
    pub confidence: u32,
    pub timeframe: Option<String>,
    pub slope: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    ExcellentProgress,
    GoodProgress,
    NeedsSupport,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrendLabel::ExcellentProgress => "Excellent progress",
            TrendLabel::GoodProgress => "Good progress",
            TrendLabel::NeedsSupport => "Needs support",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Direction::Improving => "improving",
            Direction::Declining => "declining",
            Direction::Stable => "stable",
            Direction::InsufficientData => "insufficient data",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentPerformance {
    pub student_id: Uuid,
    pub student_name: String,
    pub average_score: f64,
    pub goal_count: usize,
    pub trend: TrendLabel,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize)]
pub struct Intervention {
    pub student_name: String,
    pub strategy: String,
    pub duration: String,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VelocityPoint {
    pub week_start: NaiveDate,
    pub avg_score: f64,
    pub log_count: usize,
}
