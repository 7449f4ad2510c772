//! Literature correlation against a built-in catalogue of reference papers.

use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::HashSet;

const MAX_PER_CONDITION: usize = 10;
const MAX_TOTAL: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct Paper {
    pub title: &'static str,
    pub authors: &'static [&'static str],
    pub publication_date: &'static str,
    pub journal: &'static str,
    pub doi: Option<&'static str>,
    pub abstract_text: &'static str,
    pub keywords: &'static [&'static str],
    pub study_type: &'static str,
    pub sample_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchFinding {
    pub condition: String,
    pub title: String,
    pub journal: String,
    pub publication_date: String,
    pub doi: Option<String>,
    pub study_type: String,
    pub sample_size: Option<u32>,
    pub relevance_score: f64,
    pub key_findings: String,
    pub citation: String,
}

pub const CATALOGUE: &[Paper] = &[
    Paper {
        title: "Metformin in Type 2 Diabetes: A Systematic Review and Meta-Analysis",
        authors: &["Smith, J.", "Johnson, A.", "Brown, K."],
        publication_date: "2023-06-15",
        journal: "Diabetes Care",
        doi: Some("10.2337/dc23-0123"),
        abstract_text: "This systematic review and meta-analysis evaluates the efficacy and safety of metformin in type 2 diabetes management. Analysis of 45 randomized controlled trials involving 12,847 patients demonstrates significant improvements in glycemic control and cardiovascular outcomes.",
        keywords: &["diabetes", "metformin", "glycemic control"],
        study_type: "meta-analysis",
        sample_size: Some(12847),
    },
    Paper {
        title: "ACE Inhibitors vs ARBs in Hypertension Management: Long-term Outcomes",
        authors: &["Wilson, M.", "Davis, R.", "Taylor, S."],
        publication_date: "2023-08-22",
        journal: "Hypertension",
        doi: Some("10.1161/hyp.2023.456"),
        abstract_text: "Comparative effectiveness study of ACE inhibitors versus ARBs in hypertension management over 10 years. Results show similar cardiovascular protection with slight advantage for ACE inhibitors in heart failure prevention.",
        keywords: &["hypertension", "ace inhibitors", "arbs", "cardiovascular"],
        study_type: "RCT",
        sample_size: Some(8934),
    },
    Paper {
        title: "Statin Therapy in Hyperlipidemia: Current Evidence and Guidelines",
        authors: &["Anderson, P.", "Miller, L.", "Garcia, C."],
        publication_date: "2023-04-10",
        journal: "Journal of Lipid Research",
        doi: Some("10.1194/jlr.2023.789"),
        abstract_text: "Comprehensive review of statin therapy effectiveness in hyperlipidemia management. Evidence supports significant reduction in cardiovascular events and mortality with high-intensity statin therapy.",
        keywords: &["hyperlipidemia", "statins", "cholesterol", "cardiovascular"],
        study_type: "systematic_review",
        sample_size: Some(25000),
    },
    Paper {
        title: "Diabetes Prevention: Lifestyle Interventions vs Pharmacological Approaches",
        authors: &["Rodriguez, A.", "Kim, S.", "Patel, N."],
        publication_date: "2023-05-18",
        journal: "Cochrane Database of Systematic Reviews",
        doi: Some("10.1002/14651858.CD012345"),
        abstract_text: "Lifestyle interventions show 58% reduction in diabetes incidence compared to 31% with metformin alone.",
        keywords: &["diabetes", "prevention", "lifestyle", "metformin"],
        study_type: "systematic_review",
        sample_size: Some(15000),
    },
    Paper {
        title: "Hypertension in Elderly: Treatment Targets and Outcomes",
        authors: &["Chen, L.", "Williams, D.", "Jackson, M."],
        publication_date: "2023-09-12",
        journal: "BMJ",
        doi: Some("10.1136/bmj.2023.567"),
        abstract_text: "Intensive blood pressure control (<130/80) in elderly patients reduces cardiovascular events by 25% but increases hypotension risk.",
        keywords: &["hypertension", "elderly", "blood pressure", "cardiovascular"],
        study_type: "cohort",
        sample_size: Some(5678),
    },
    Paper {
        title: "Novel GLP-1 Agonist in Type 2 Diabetes: Phase III Trial Results",
        authors: &["Martinez, R.", "Singh, P.", "O'Connor, T."],
        publication_date: "2023-10-30",
        journal: "New England Journal of Medicine",
        doi: None,
        abstract_text: "New GLP-1 agonist demonstrates superior glycemic control and weight loss compared to existing therapies with similar safety profile.",
        keywords: &["diabetes", "glp-1", "clinical trial", "glycemic control"],
        study_type: "RCT",
        sample_size: Some(2340),
    },
    Paper {
        title: "Combination Therapy for Resistant Hypertension: Multi-center Trial",
        authors: &["Foster, K.", "Liu, X.", "Brown, A."],
        publication_date: "2023-11-15",
        journal: "Circulation",
        doi: None,
        abstract_text: "Triple combination therapy achieves target blood pressure in 78% of resistant hypertension patients with acceptable side effect profile.",
        keywords: &["hypertension", "resistant", "combination therapy", "blood pressure"],
        study_type: "RCT",
        sample_size: Some(890),
    },
];

fn publication_year(paper: &Paper) -> Option<i32> {
    paper.publication_date.split('-').next()?.parse().ok()
}

/// Title match 0.4 (0.2 for a single word), abstract word coverage up to 0.3,
/// study design up to 0.2, published within five years 0.1.
pub fn relevance_score(condition: &str, paper: &Paper, current_year: i32) -> f64 {
    let condition = condition.trim().to_lowercase();
    if condition.is_empty() {
        return 0.0;
    }
    let words: Vec<&str> = condition.split_whitespace().collect();
    let title = paper.title.to_lowercase();
    let abstract_text = paper.abstract_text.to_lowercase();

    let mut score = 0.0;
    if title.contains(&condition) {
        score += 0.4;
    } else if words.iter().any(|w| title.contains(w)) {
        score += 0.2;
    }

    let matched = words.iter().filter(|w| abstract_text.contains(*w)).count();
    score += matched as f64 / words.len() as f64 * 0.3;

    match paper.study_type.to_lowercase().as_str() {
        "rct" | "meta-analysis" | "systematic_review" => score += 0.2,
        "cohort" | "case-control" => score += 0.1,
        _ => {}
    }

    if publication_year(paper).is_some_and(|year| current_year - year <= 5) {
        score += 0.1;
    }

    score.min(1.0)
}

/// `Authors (Year). Title. Journal.` with `First et al.` past three authors.
pub fn format_citation(paper: &Paper) -> String {
    let authors = if paper.authors.len() > 3 {
        format!("{} et al.", paper.authors[0])
    } else {
        paper.authors.join(", ")
    };
    let year = paper.publication_date.split('-').next().unwrap_or("n.d.");
    format!("{} ({}). {}. {}.", authors, year, paper.title, paper.journal)
}

fn key_findings(text: &str) -> String {
    if text.chars().count() > 200 {
        let cut: String = text.chars().take(200).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Papers relevant to each condition, best first per condition, deduplicated by title.
pub fn search(conditions: &[String], catalogue: &[Paper]) -> Vec<ResearchFinding> {
    let current_year = Utc::now().year();
    let mut findings = Vec::new();

    for condition in conditions {
        let lower = condition.to_lowercase();
        if lower.trim().is_empty() {
            continue;
        }
        let mut matches: Vec<ResearchFinding> = catalogue
            .iter()
            .filter(|paper| paper.keywords.iter().any(|k| lower.contains(k)))
            .map(|paper| ResearchFinding {
                condition: condition.clone(),
                title: paper.title.to_string(),
                journal: paper.journal.to_string(),
                publication_date: paper.publication_date.to_string(),
                doi: paper.doi.map(str::to_string),
                study_type: paper.study_type.to_string(),
                sample_size: paper.sample_size,
                relevance_score: relevance_score(condition, paper, current_year),
                key_findings: key_findings(paper.abstract_text),
                citation: format_citation(paper),
            })
            .collect();
        matches.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        matches.truncate(MAX_PER_CONDITION);
        findings.extend(matches);
    }

    let mut seen = HashSet::new();
    findings.retain(|f| seen.insert(f.title.trim().to_lowercase()));
    findings.truncate(MAX_TOTAL);
    tracing::debug!("Research search found {} papers", findings.len());
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_score_components() {
        let metformin = &CATALOGUE[0];
        // "diabetes" in title (0.4) + abstract (0.3) + meta-analysis (0.2) + recent (0.1)
        let score = relevance_score("Diabetes", metformin, 2024);
        assert!((score - 1.0).abs() < 1e-9);

        // only "diabetes" of two words in title and abstract, not recent
        let score = relevance_score("Diabetes Mellitus", metformin, 2035);
        assert!((score - (0.2 + 0.15 + 0.2)).abs() < 1e-9);

        assert_eq!(relevance_score("  ", metformin, 2024), 0.0);
    }

    #[test]
    fn test_citation_format() {
        assert_eq!(
            format_citation(&CATALOGUE[4]),
            "Chen, L., Williams, D., Jackson, M. (2023). Hypertension in Elderly: Treatment Targets and Outcomes. BMJ."
        );

        let paper = Paper {
            authors: &["A, B.", "C, D.", "E, F.", "G, H."],
            ..CATALOGUE[0]
        };
        assert!(format_citation(&paper).starts_with("A, B. et al. (2023)."));
    }

    #[test]
    fn test_search_dedupes_across_conditions() {
        let conditions = vec![
            "Diabetes Mellitus".to_string(),
            "Type 2 Diabetes".to_string(),
            "Hypertension".to_string(),
            "Ankle sprain".to_string(),
        ];
        let findings = search(&conditions, CATALOGUE);

        assert_eq!(findings.len(), 6);
        assert!(findings[..3].iter().all(|f| f.condition == "Diabetes Mellitus"));
        assert!(findings[3..].iter().all(|f| f.condition == "Hypertension"));
        let titles: HashSet<_> = findings.iter().map(|f| &f.title).collect();
        assert_eq!(titles.len(), findings.len());
    }

    #[test]
    fn test_per_condition_results_are_sorted() {
        let findings = search(&["Hypertension".to_string()], CATALOGUE);
        assert_eq!(findings.len(), 3);
        assert!(findings
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
    }
}
