// src/services/grader.rs

use std::collections::HashMap;

use crate::config::GRADE_DECIMALS;
use crate::models::attempt::{AnswerSubmission, GradeSummary, SkillResult};
use crate::models::package::PackageQuestion;

/// Pluggable scorer seam. The platform only depends on the shape of the
/// summary a grader returns; the scoring algorithm itself is a collaborator.
pub trait Grader: Send + Sync {
    fn grade(
        &self,
        questions: &[PackageQuestion],
        answers: &[AnswerSubmission],
        passing_grade: f64,
    ) -> GradeSummary;
}

/// Default grader: the final grade is the arithmetic mean of per-skill
/// scores over the package's skill universe.
///
/// A skill with no recorded answer scores 0, it is not excluded from the
/// average. Intentional strictness: unanswered skills drag the grade down.
pub struct MeanScoreGrader;

impl Grader for MeanScoreGrader {
    fn grade(
        &self,
        questions: &[PackageQuestion],
        answers: &[AnswerSubmission],
        passing_grade: f64,
    ) -> GradeSummary {
        // Skill universe comes from the package, first-seen order.
        let mut skills: Vec<(String, String)> = Vec::new();
        for q in questions {
            if !skills.iter().any(|(id, _)| id == &q.skill_id) {
                skills.push((q.skill_id.clone(), q.skill_name.clone()));
            }
        }

        let scores: HashMap<&str, f64> = answers
            .iter()
            .map(|a| (a.skill_id.as_str(), a.score))
            .collect();

        let per_skill: Vec<SkillResult> = skills
            .into_iter()
            .map(|(skill_id, skill_name)| {
                let score = scores.get(skill_id.as_str()).copied().unwrap_or(0.0);
                SkillResult {
                    passed: score >= passing_grade,
                    skill_id,
                    skill_name,
                    score,
                }
            })
            .collect();

        // Intermediate sums stay exact; truncation happens only here.
        let final_grade = if per_skill.is_empty() {
            0.0
        } else {
            let sum: f64 = per_skill.iter().map(|s| s.score).sum();
            truncate_grade(sum / per_skill.len() as f64)
        };

        GradeSummary {
            final_grade,
            passed: final_grade >= passing_grade,
            per_skill,
        }
    }
}

/// Truncates (never rounds) to the declared precision.
fn truncate_grade(value: f64) -> f64 {
    let factor = 10f64.powi(GRADE_DECIMALS as i32);
    (value * factor).trunc() / factor
}
