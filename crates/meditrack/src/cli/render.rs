//! Text rendering for CLI output.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::Result;
use crate::journal::{DashboardStats, Notice, NoticeLevel};
use crate::model::{PatientConsultation, ProfessionalGoal, Reflection, DATE_FORMAT, TIME_FORMAT};

use super::OutputFormat;

/// Widest a table cell gets before it is cut.
const MAX_CELL_WIDTH: usize = 40;

/// One line per notice.
#[must_use]
pub fn notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Success => format!("ok: {}", notice.message),
        NoticeLevel::Error => format!("error: {}", notice.message),
    }
}

/// Consultations in the requested format.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn patients(items: &[&PatientConsultation], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(&items),
        OutputFormat::Table => Ok(table(
            &["ID", "DATE", "TIME", "CODE", "CATEGORY", "MIN", "REASON"],
            items
                .iter()
                .map(|p| {
                    vec![
                        p.id.to_string(),
                        p.consultation_date.format(DATE_FORMAT).to_string(),
                        p.consultation_time.format(TIME_FORMAT).to_string(),
                        p.anonymous_id.clone(),
                        category_name(p),
                        p.duration_minutes.to_string(),
                        p.reason.clone(),
                    ]
                })
                .collect(),
        )),
        OutputFormat::Plain => Ok(items
            .iter()
            .map(|p| patient_block(p))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// A single consultation with every field.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn patient(item: &PatientConsultation, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(item),
        OutputFormat::Table | OutputFormat::Plain => Ok(patient_block(item)),
    }
}

fn patient_block(p: &PatientConsultation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", p.anonymous_id, p.id);
    let _ = writeln!(
        out,
        "  When:      {} {}",
        p.consultation_date.format(DATE_FORMAT),
        p.consultation_time.format(TIME_FORMAT)
    );
    let _ = writeln!(out, "  Category:  {}", category_name(p));
    let _ = writeln!(out, "  Duration:  {} min", p.duration_minutes);
    let _ = writeln!(out, "  Reason:    {}", p.reason);
    for (label, text) in [
        ("Diagnosis", &p.diagnosis),
        ("Treatment", &p.treatment),
        ("Notes", &p.observations),
        ("Lessons", &p.lessons_learned),
    ] {
        if !text.is_empty() {
            let _ = writeln!(out, "  {:<10} {text}", format!("{label}:"));
        }
    }
    if let Some(date) = p.follow_up_date {
        let _ = writeln!(out, "  Follow-up: {}", date.format(DATE_FORMAT));
    }
    out
}

fn category_name(p: &PatientConsultation) -> String {
    p.category.map_or_else(|| "-".to_string(), |c| c.to_string())
}

/// Goals in the requested format.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn goals(items: &[&ProfessionalGoal], format: OutputFormat) -> Result<String> {
    let target = |g: &ProfessionalGoal| {
        g.target_date
            .map_or_else(String::new, |d| d.format(DATE_FORMAT).to_string())
    };
    match format {
        OutputFormat::Json => json(&items),
        OutputFormat::Table => Ok(table(
            &["ID", "STATUS", "TARGET", "GOAL"],
            items
                .iter()
                .map(|g| vec![g.id.to_string(), g.status.to_string(), target(g), g.goal.clone()])
                .collect(),
        )),
        OutputFormat::Plain => Ok(items
            .iter()
            .map(|g| {
                let check = if g.is_pending() { ' ' } else { 'x' };
                match g.target_date {
                    Some(_) => format!("[{check}] {} (by {}) {}", g.goal, target(g), g.id),
                    None => format!("[{check}] {} {}", g.goal, g.id),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Reflections in the requested format.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn reflections(items: &[Reflection], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json(&items),
        OutputFormat::Table => Ok(table(
            &["ID", "DATE", "LEARNING", "CHALLENGES", "ACHIEVEMENTS"],
            items
                .iter()
                .map(|r| {
                    vec![
                        r.id.to_string(),
                        r.date.format(DATE_FORMAT).to_string(),
                        r.learning.clone(),
                        r.challenges.clone(),
                        r.achievements.clone(),
                    ]
                })
                .collect(),
        )),
        OutputFormat::Plain => Ok(items
            .iter()
            .map(|r| {
                let mut out = format!("{} ({})\n  Learned: {}\n", r.date.format(DATE_FORMAT), r.id, r.learning);
                if !r.challenges.is_empty() {
                    let _ = writeln!(out, "  Challenges: {}", r.challenges);
                }
                if !r.achievements.is_empty() {
                    let _ = writeln!(out, "  Achievements: {}", r.achievements);
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Dashboard summary with a bar per histogram day.
#[must_use]
pub fn dashboard(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Consultations:      {}", stats.total_consultations);
    let _ = writeln!(out, "Minutes:            {}", stats.total_minutes);
    let _ = writeln!(out, "Top category:       {}", stats.most_common_category);
    let _ = writeln!(out, "Pending goals:      {}", stats.pending_goals);
    let _ = writeln!(out);
    for bucket in &stats.weekly {
        let _ = writeln!(
            out,
            "{} {} {:>3} {}",
            bucket.label,
            bucket.date.format(DATE_FORMAT),
            bucket.count,
            "#".repeat(bucket.count)
        );
    }
    out
}

/// Pretty JSON.
///
/// # Errors
///
/// Fails if `value` cannot be serialized.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Left-aligned columns with a header row. Long cells are cut.
#[must_use]
pub fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "(none)".to_string();
    }

    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(|cell| cut(&cell)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    out.extend(rows.iter().map(|row| line(row.iter().map(String::as_str).collect())));
    out.join("\n")
}

fn cut(cell: &str) -> String {
    let single_line = cell.replace('\n', " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        return single_line;
    }
    let mut cut: String = single_line.chars().take(MAX_CELL_WIDTH - 1).collect();
    cut.push('…');
    cut
}
