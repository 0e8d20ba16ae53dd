/// Keywords that mark an issue as a bug report (matched case-insensitively).
pub const BUG_KEYWORDS: &[&str] = &["error", "bug", "traceback", "exception", "failed", "crash"];

pub const DEBUGGING_NOTE: &str = "\n\n---\n**🧠 AI Debugging Note:** This PR attempts to fix a reported issue. Review the changes carefully, especially around error handling and input validation.";

/// An issue as delivered by the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
}

/// Everything needed to open a pull request for an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

pub fn branch_name_for(issue_number: u64) -> String {
    format!("ai-fix-{}", issue_number)
}

/// Case-insensitive substring check of `text` against [`BUG_KEYWORDS`].
pub fn contains_bug_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    BUG_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

impl Issue {
    pub fn new(number: u64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn branch_name(&self) -> String {
        branch_name_for(self.number)
    }

    /// Title and description in the shape the prompt builder expects.
    pub fn combined_text(&self) -> String {
        format!("Title: {}\nDescription:\n{}", self.title, self.body)
    }

    pub fn commit_message(&self) -> String {
        format!("AI generated code for Issue #{}", self.number)
    }

    pub fn looks_like_bug_report(&self) -> bool {
        contains_bug_keyword(&self.title) || contains_bug_keyword(&self.body)
    }

    pub fn pull_request_body(&self) -> String {
        let mut body = format!("Automation by Gemini AI.\nFixes #{}.", self.number);
        if self.looks_like_bug_report() {
            body.push_str(DEBUGGING_NOTE);
        }
        body
    }

    pub fn pull_request_draft(&self, base_branch: &str) -> PullRequestDraft {
        PullRequestDraft {
            title: format!("AI Fix: {}", self.title),
            body: self.pull_request_body(),
            head: self.branch_name(),
            base: base_branch.to_string(),
        }
    }
}
