//! Turning a free-text exam analysis into ranked question predictions.
use serde::{Deserialize, Serialize};

const MAX_QUESTIONS: usize = 8;
const MAX_PARAGRAPHS: usize = 7;
const MIN_LINE_LEN: usize = 30;
const MIN_PARAGRAPH_LEN: usize = 40;
const MAX_QUESTION_CHARS: usize = 200;
const FIRST_SCORE: i64 = 95;
const SCORE_STEP: i64 = 4;
const SCORE_FLOOR: i64 = 52;
const KEYWORDS: [&str; 6] = ["explain", "describe", "what", "define", "compare", "derive"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Probability {
    #[serde(rename = "very high")]
    VeryHigh,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "medium")]
    Medium,
}

impl Probability {
    pub fn from_score(score: i64) -> Self {
        if score > 88 {
            Probability::VeryHigh
        } else if score > 76 {
            Probability::High
        } else {
            Probability::Medium
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictedQuestion {
    pub q: String,
    pub topic: String,
    pub prob: Probability,
    pub score: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictReq {
    pub subject: String,
    /// Display name used in the prompt, defaults to `subject`.
    pub subject_name: Option<String>,
    /// Past-paper text; read from the papers directory when absent.
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub subject: String,
    pub questions: Vec<PredictedQuestion>,
    pub raw_analysis: String,
}

fn strip_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c.is_whitespace() || c.is_ascii_digit() || matches!(c, '.' | '-' | '*' | '•' | '#')
    })
}

fn looks_like_question(line: &str) -> bool {
    if line.contains('?') {
        return true;
    }
    let lower = line.to_lowercase();
    KEYWORDS.iter().any(|k| lower.contains(k))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn parse_analysis(raw: &str, subject: &str) -> Vec<PredictedQuestion> {
    let mut questions = Vec::new();
    let mut score = FIRST_SCORE;

    let candidates = raw
        .split('\n')
        .map(|l| strip_marker(l).trim())
        .filter(|l| l.chars().count() > MIN_LINE_LEN && looks_like_question(l));

    for line in candidates {
        questions.push(PredictedQuestion {
            q: truncate_chars(line, MAX_QUESTION_CHARS),
            topic: subject.to_string(),
            prob: Probability::from_score(score),
            score,
        });
        score = (score - SCORE_STEP).max(SCORE_FLOOR);
        if questions.len() >= MAX_QUESTIONS {
            break;
        }
    }

    if questions.len() < 3 {
        let paragraphs = split_paragraphs(raw)
            .into_iter()
            .filter(|p| p.trim().chars().count() > MIN_PARAGRAPH_LEN)
            .take(MAX_PARAGRAPHS);
        for (i, p) in paragraphs.enumerate() {
            let s = 90 - (i as i64) * 6;
            questions.push(PredictedQuestion {
                q: truncate_chars(strip_marker(p), MAX_QUESTION_CHARS).trim().to_string(),
                topic: subject.to_string(),
                prob: Probability::from_score(s),
                score: s,
            });
        }
    }

    questions
}

// Paragraphs are separated by one or more blank lines.
fn split_paragraphs(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = raw;
    while let Some(pos) = rest.find("\n\n") {
        out.push(&rest[..pos]);
        rest = rest[pos..].trim_start_matches('\n');
    }
    out.push(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_question_like_lines_with_decreasing_scores() {
        let raw = "Here are the predictions:\n\
            1. Explain the working of Dijkstra's algorithm with an example.\n\
            2. What is dynamic programming and how does memoization help?\n\
            - Derive the time complexity of merge sort using recurrence.\n\
            short line?\n";
        let qs = parse_analysis(raw, "AOA");
        assert_eq!(qs.len(), 3);
        assert!(qs[0].q.starts_with("Explain the working"));
        assert_eq!(qs[0].score, 95);
        assert_eq!(qs[0].prob, Probability::VeryHigh);
        assert_eq!(qs[1].score, 91);
        assert_eq!(qs[2].score, 87);
        assert_eq!(qs[2].prob, Probability::High);
        assert!(qs.iter().all(|q| q.topic == "AOA"));
    }

    #[test]
    fn caps_at_eight_and_floors_score() {
        let raw: String = (0..20)
            .map(|i| format!("{i}. Explain concept number {i} in complete and careful detail\n"))
            .collect();
        let qs = parse_analysis(&raw, "DBMS");
        assert_eq!(qs.len(), 8);
        assert_eq!(qs[7].score, 95 - 7 * 4);
        assert!(qs.iter().all(|q| q.score >= 52));
    }

    #[test]
    fn falls_back_to_paragraphs() {
        let raw = "Normalization is heavily tested every single year in this paper.\n\n\n\
                   Transactions and ACID properties show up in most of the papers.\n\n\
                   tiny";
        let qs = parse_analysis(raw, "DBMS");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].score, 90);
        assert_eq!(qs[0].prob, Probability::VeryHigh);
        assert_eq!(qs[1].score, 84);
        assert_eq!(qs[1].prob, Probability::High);
    }

    #[test]
    fn probability_buckets() {
        assert_eq!(Probability::from_score(89), Probability::VeryHigh);
        assert_eq!(Probability::from_score(88), Probability::High);
        assert_eq!(Probability::from_score(77), Probability::High);
        assert_eq!(Probability::from_score(76), Probability::Medium);
    }

    #[test]
    fn question_text_is_capped() {
        let long = format!("Explain {}", "x".repeat(400));
        let qs = parse_analysis(&long, "JAVA");
        assert_eq!(qs[0].q.chars().count(), 200);
    }
}
