//! Read-only aggregations over graded attempts.
//!
//! Weakness is attributed at exam granularity: every topic tagged on an exam shares
//! the outcome of an attempt on that exam.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::PrimitiveDateTime;

/// A graded attempt together with the topics of its exam.
#[derive(Debug, Clone)]
pub(crate) struct AttemptOutcome {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
    pub(crate) completed_at: PrimitiveDateTime,
    pub(crate) topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct TopicFailureCount {
    pub(crate) name: String,
    pub(crate) count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopicFailRate {
    pub(crate) name: String,
    pub(crate) fail_rate: f64,
    pub(crate) failed: usize,
    pub(crate) total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentSummary {
    pub(crate) total_attempts: usize,
    pub(crate) average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassStats {
    pub(crate) total_attempts: usize,
    pub(crate) average_score: f64,
    pub(crate) pass_rate: f64,
    pub(crate) topics: Vec<String>,
    pub(crate) weak_topics: Vec<String>,
}

/// Score and pass flag of one graded attempt on a single exam.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GradedScore {
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ExamActivity {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) graded_attempts: usize,
    pub(crate) score_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecentExam {
    pub(crate) title: String,
    pub(crate) attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InstructorOverview {
    pub(crate) total_exams: usize,
    pub(crate) total_attempts: usize,
    pub(crate) average_score: f64,
    pub(crate) recent_activity: Vec<RecentExam>,
}

/// One row of an instructor's exam history; the average is rounded to a whole score.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExamHistory {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) graded_attempts: usize,
    pub(crate) average_score: f64,
}

pub(crate) const RECENT_EXAMS_LIMIT: usize = 5;

/// Topics ranked by how many failed attempts touched them, worst first.
pub(crate) fn failure_counts(attempts: &[AttemptOutcome], limit: usize) -> Vec<TopicFailureCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for attempt in attempts.iter().filter(|attempt| !attempt.is_passed) {
        for topic in distinct_topics(attempt) {
            *counts.entry(topic).or_default() += 1;
        }
    }

    let mut ranked: Vec<TopicFailureCount> = counts
        .into_iter()
        .map(|(name, count)| TopicFailureCount { name: name.to_string(), count })
        .collect();
    // BTreeMap iteration is name-ordered and sort_by is stable, so ties stay alphabetical.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Per-topic failure rate across all attempts; topics that were never failed are omitted.
pub(crate) fn fail_rates(attempts: &[AttemptOutcome]) -> Vec<TopicFailRate> {
    let mut tallies: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for attempt in attempts {
        for topic in distinct_topics(attempt) {
            let (failed, total) = tallies.entry(topic).or_default();
            *total += 1;
            if !attempt.is_passed {
                *failed += 1;
            }
        }
    }

    let mut ranked: Vec<TopicFailRate> = tallies
        .into_iter()
        .filter(|(_, (failed, _))| *failed > 0)
        .map(|(name, (failed, total))| TopicFailRate {
            name: name.to_string(),
            fail_rate: percentage(failed, total),
            failed,
            total,
        })
        .collect();
    ranked.sort_by(|a, b| b.fail_rate.partial_cmp(&a.fail_rate).unwrap_or(Ordering::Equal));
    ranked
}

pub(crate) fn student_summary(attempts: &[AttemptOutcome]) -> StudentSummary {
    let total_attempts = attempts.len();
    let score_sum: f64 = attempts.iter().map(|attempt| attempt.score).sum();

    StudentSummary { total_attempts, average_score: mean(score_sum, total_attempts) }
}

/// Class view for one exam. Below `threshold` average, every exam topic is weak.
pub(crate) fn class_stats(scores: &[GradedScore], topics: Vec<String>, threshold: f64) -> ClassStats {
    let total_attempts = scores.len();
    let average_score = mean(scores.iter().map(|entry| entry.score).sum(), total_attempts);
    let passed = scores.iter().filter(|entry| entry.is_passed).count();
    let pass_rate = percentage(passed, total_attempts);

    let weak_topics =
        if total_attempts > 0 && average_score < threshold { topics.clone() } else { Vec::new() };

    ClassStats { total_attempts, average_score, pass_rate, topics, weak_topics }
}

pub(crate) fn instructor_overview(mut exams: Vec<ExamActivity>) -> InstructorOverview {
    let total_exams = exams.len();
    let total_attempts: usize = exams.iter().map(|exam| exam.graded_attempts).sum();
    let score_sum: f64 = exams.iter().map(|exam| exam.score_sum).sum();

    exams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let recent_activity = exams
        .into_iter()
        .take(RECENT_EXAMS_LIMIT)
        .map(|exam| RecentExam { title: exam.title, attempts: exam.graded_attempts })
        .collect();

    InstructorOverview {
        total_exams,
        total_attempts,
        average_score: mean(score_sum, total_attempts),
        recent_activity,
    }
}

/// Every exam of an instructor, newest first, with its graded attempt count.
pub(crate) fn exam_history(mut exams: Vec<ExamActivity>) -> Vec<ExamHistory> {
    exams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    exams
        .into_iter()
        .map(|exam| ExamHistory {
            average_score: mean(exam.score_sum, exam.graded_attempts).round(),
            id: exam.id,
            title: exam.title,
            created_at: exam.created_at,
            graded_attempts: exam.graded_attempts,
        })
        .collect()
}

fn distinct_topics(attempt: &AttemptOutcome) -> BTreeSet<&str> {
    attempt.topics.iter().map(String::as_str).collect()
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (100.0 * part as f64) / whole as f64
    }
}
