use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Goal, ProgressLog, Student};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
        ),
    ];

    for (id, name) in students {
        sqlx::query(
            r#"
            INSERT INTO sumry.students (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
            SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(pool)
        .await?;
    }

    let goals = vec![
        ("Avery Lee", "Reading fluency", 20.0, 90.0),
        ("Avery Lee", "Math computation", 30.0, 85.0),
        ("Jules Moreno", "Written expression", 10.0, 80.0),
        ("Kiara Patel", "Self-regulation", 40.0, 95.0),
    ];

    for (student_name, description, baseline, target) in goals {
        let student_id: Uuid =
            sqlx::query("SELECT id FROM sumry.students WHERE name = $1")
                .bind(student_name)
                .fetch_one(pool)
                .await?
                .get("id");

        sqlx::query(
            r#"
            INSERT INTO sumry.goals (id, student_id, baseline, target, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (student_id, description) DO UPDATE
            SET baseline = EXCLUDED.baseline, target = EXCLUDED.target
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(baseline)
        .bind(target)
        .bind(description)
        .execute(pool)
        .await?;
    }

    let logs = vec![
        (
            "seed-001",
            "Avery Lee",
            "Reading fluency",
            42.0,
            NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?,
        ),
        (
            "seed-002",
            "Avery Lee",
            "Reading fluency",
            55.0,
            NaiveDate::from_ymd_opt(2026, 2, 9).context("invalid date")?,
        ),
        (
            "seed-003",
            "Avery Lee",
            "Reading fluency",
            63.0,
            NaiveDate::from_ymd_opt(2026, 2, 16).context("invalid date")?,
        ),
        (
            "seed-004",
            "Jules Moreno",
            "Written expression",
            25.0,
            NaiveDate::from_ymd_opt(2026, 2, 5).context("invalid date")?,
        ),
        (
            "seed-005",
            "Jules Moreno",
            "Written expression",
            26.0,
            NaiveDate::from_ymd_opt(2026, 2, 12).context("invalid date")?,
        ),
        (
            "seed-006",
            "Jules Moreno",
            "Written expression",
            24.0,
            NaiveDate::from_ymd_opt(2026, 2, 19).context("invalid date")?,
        ),
        (
            "seed-007",
            "Kiara Patel",
            "Self-regulation",
            70.0,
            NaiveDate::from_ymd_opt(2026, 2, 10).context("invalid date")?,
        ),
    ];

    for (source_key, student_name, description, score, recorded_at) in logs {
        let goal_id: Uuid = sqlx::query(
            r#"
            SELECT g.id FROM sumry.goals g
            JOIN sumry.students s ON s.id = g.student_id
            WHERE s.name = $1 AND g.description = $2
            "#,
        )
        .bind(student_name)
        .bind(description)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO sumry.progress_logs (id, goal_id, score, recorded_at, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(goal_id)
        .bind(score)
        .bind(recorded_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_students(
    pool: &PgPool,
    student: Option<&str>,
) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from("SELECT id, name FROM sumry.students");
    if student.is_some() {
        query.push_str(" WHERE name = $1");
    }
    query.push_str(" ORDER BY name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = student {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut students = Vec::new();

    for row in records {
        students.push(Student {
            id: row.get("id"),
            name: row.get("name"),
        });
    }

    Ok(students)
}

pub async fn fetch_goals(pool: &PgPool, student: Option<&str>) -> anyhow::Result<Vec<Goal>> {
    let mut query = String::from(
        "SELECT g.id, g.student_id, g.baseline, g.target, g.description \
         FROM sumry.goals g",
    );
    if student.is_some() {
        query.push_str(" JOIN sumry.students s ON s.id = g.student_id WHERE s.name = $1");
    }
    query.push_str(" ORDER BY g.description");

    let mut rows = sqlx::query(&query);
    if let Some(value) = student {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut goals = Vec::new();

    for row in records {
        goals.push(Goal {
            id: row.get("id"),
            student_id: row.get("student_id"),
            baseline: row.get("baseline"),
            target: row.get("target"),
            description: row.get("description"),
        });
    }

    Ok(goals)
}

pub async fn fetch_logs(
    pool: &PgPool,
    student: Option<&str>,
) -> anyhow::Result<Vec<ProgressLog>> {
    let mut query = String::from(
        "SELECT l.id, l.goal_id, l.score, l.recorded_at FROM sumry.progress_logs l",
    );
    if student.is_some() {
        query.push_str(
            " JOIN sumry.goals g ON g.id = l.goal_id \
             JOIN sumry.students s ON s.id = g.student_id \
             WHERE s.name = $1",
        );
    }
    query.push_str(" ORDER BY l.recorded_at");

    let mut rows = sqlx::query(&query);
    if let Some(value) = student {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut logs = Vec::new();

    for row in records {
        logs.push(ProgressLog {
            id: row.get("id"),
            goal_id: row.get("goal_id"),
            score: row.get("score"),
            recorded_at: row.get("recorded_at"),
        });
    }

    Ok(logs)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_name: String,
        goal_description: String,
        baseline: f64,
        target: f64,
        score: f64,
        recorded_at: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO sumry.students (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
            SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.student_name)
        .fetch_one(pool)
        .await?
        .get("id");

        let goal_id: Uuid = sqlx::query(
            r#"
            INSERT INTO sumry.goals (id, student_id, baseline, target, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (student_id, description) DO UPDATE
            SET baseline = EXCLUDED.baseline, target = EXCLUDED.target
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(row.baseline)
        .bind(row.target)
        .bind(&row.goal_description)
        .fetch_one(pool)
        .await?
        .get("id");

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO sumry.progress_logs (id, goal_id, score, recorded_at, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(goal_id)
        .bind(row.score)
        .bind(row.recorded_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
