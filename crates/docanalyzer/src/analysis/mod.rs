//! Analysis collaborator: turns extracted document text plus a client
//! query into a report.
//!
//! [`StepwiseAnalyst`] runs a configured sequence of [`AnalysisStep`]s
//! against any [`ChatCompletion`] backend and joins their outputs. The
//! default backend is the OpenAI-compatible client in [`openai`].

pub mod openai;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub use openai::OpenAiClient;

/// Query used when the client leaves it blank.
pub const DEFAULT_QUERY: &str = "Analyze this financial document for investment insights";

/// Returns the trimmed query, or [`DEFAULT_QUERY`] when blank.
pub fn effective_query(query: Option<&str>) -> String {
    match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => DEFAULT_QUERY.to_string(),
    }
}

/// Everything an analyst gets to see about one job.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub job_id: String,
    pub filename: String,
    pub query: String,
    pub text: String,
}

/// Produces analysis output for a document. May fail or take arbitrarily
/// long; callers impose their own deadline.
pub trait Analyst: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStep {
    FinancialAnalysis,
    InvestmentAnalysis,
    RiskAssessment,
    DocumentVerification,
}

impl AnalysisStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinancialAnalysis => "financial_analysis",
            Self::InvestmentAnalysis => "investment_analysis",
            Self::RiskAssessment => "risk_assessment",
            Self::DocumentVerification => "document_verification",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::FinancialAnalysis => "Financial Analysis",
            Self::InvestmentAnalysis => "Investment Analysis",
            Self::RiskAssessment => "Risk Assessment",
            Self::DocumentVerification => "Document Verification",
        }
    }

    /// System prompt for the step.
    pub fn role(&self) -> &'static str {
        match self {
            Self::FinancialAnalysis => {
                "You are a senior financial analyst. Read the supplied financial document \
                 and answer the user's question. Ground every statement in figures from the \
                 document and say so when the document does not contain the information."
            }
            Self::InvestmentAnalysis => {
                "You are an investment analyst. Using only the supplied financial document, \
                 describe the investment considerations it supports, with the figures behind \
                 each one. Do not recommend specific trades."
            }
            Self::RiskAssessment => {
                "You are a risk analyst. Identify the financial, operational and market risks \
                 disclosed or implied by the supplied document and rate each as low, medium \
                 or high with a one-line justification."
            }
            Self::DocumentVerification => {
                "You verify documents. State whether the supplied document is a financial \
                 document, what kind (annual report, statement, filing, other) and which \
                 reporting period it covers."
            }
        }
    }

    /// User message for the step.
    pub fn prompt(&self, request: &AnalysisRequest) -> String {
        let task = match self {
            Self::FinancialAnalysis => "Analyze the financial document below.",
            Self::InvestmentAnalysis => "Assess the investment picture of the document below.",
            Self::RiskAssessment => "Create a risk assessment for the document below.",
            Self::DocumentVerification => "Check whether the document below is financial.",
        };
        format!(
            "{}\nUser query: {}\nFile: {}\n\n--- DOCUMENT START ---\n{}\n--- DOCUMENT END ---",
            task, request.query, request.filename, request.text
        )
    }
}

impl fmt::Display for AnalysisStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single system+user exchange with a chat model.
pub trait ChatCompletion: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> Result<String, AnalysisError>;
}

/// Runs each step in order; any failing step fails the whole analysis.
pub struct StepwiseAnalyst<C> {
    client: C,
    steps: Vec<AnalysisStep>,
    max_document_chars: usize,
}

impl<C: ChatCompletion> StepwiseAnalyst<C> {
    pub fn new(client: C, steps: Vec<AnalysisStep>, max_document_chars: usize) -> Self {
        Self {
            client,
            steps,
            max_document_chars,
        }
    }

    pub fn steps(&self) -> &[AnalysisStep] {
        &self.steps
    }
}

impl<C: ChatCompletion> Analyst for StepwiseAnalyst<C> {
    fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let request = AnalysisRequest {
            text: truncate_chars(&request.text, self.max_document_chars),
            ..request.clone()
        };

        let mut sections = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let _span = tracing::info_span!("analysis.step", step = step.as_str()).entered();
            log::debug!("Running {} for job {}", step, request.job_id);

            let output = self.client.complete(step.role(), &step.prompt(&request))?;
            let output = output.trim();
            if output.is_empty() {
                return Err(AnalysisError::EmptyOutput);
            }
            sections.push((*step, output.to_string()));
        }

        Ok(compose_report(sections))
    }
}

/// A single section is returned as-is; several are joined under headings.
fn compose_report(sections: Vec<(AnalysisStep, String)>) -> String {
    if sections.len() == 1 {
        return sections.into_iter().map(|(_, s)| s).collect();
    }
    sections
        .into_iter()
        .map(|(step, output)| format!("## {}\n\n{}", step.title(), output))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            log::warn!(
                "Document text truncated to {} characters for analysis",
                max_chars
            );
            text[..byte_idx].to_string()
        }
        None => text.to_string(),
    }
}
