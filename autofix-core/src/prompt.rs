use crate::language::Language;

/// Whether the model writes the target file from scratch or rewrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Create,
    Update,
}

impl GenerationMode {
    /// The file's presence decides the mode, not its content: an existing
    /// empty file is still updated.
    pub fn for_current(current_content: Option<&str>) -> Self {
        match current_content {
            Some(_) => GenerationMode::Update,
            None => GenerationMode::Create,
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationMode::Create => write!(f, "create"),
            GenerationMode::Update => write!(f, "update"),
        }
    }
}

/// System instruction shared by both prompt shapes.
pub fn get_system_instruction(language: &Language) -> String {
    include_str!("../system_instruction.txt")
        .trim_end()
        .replace("{language}", language.name)
}

/// Build the prompt sent to the model.
///
/// With no current content this is a creation prompt; otherwise the model is
/// shown the existing file and asked for a full replacement.
pub fn build_prompt(
    target_file: &str,
    language: &Language,
    current_content: Option<&str>,
    issue_text: &str,
) -> String {
    let mut prompt = get_system_instruction(language);
    prompt.push_str("\n\n");

    match current_content {
        None => {
            prompt.push_str(&format!(
                "Task: Create a NEW {} file named '{}'.\n",
                language.name, target_file
            ));
            prompt.push_str("Requirements described in the issue:\n");
            prompt.push_str(&format!("\"{}\"\n\n", issue_text));
            prompt.push_str("Generate the full code for this new file.\n");
        }
        Some(current) => {
            prompt.push_str(&format!(
                "Task: Update the existing code inside '{}'.\n\n",
                target_file
            ));
            prompt.push_str("Current Code:\n");
            prompt.push_str(&format!(
                "```{}\n{}\n```\n\n",
                language.fence_tag.unwrap_or(""),
                current
            ));
            prompt.push_str("Requested Changes based on issue:\n");
            prompt.push_str(&format!("\"{}\"\n\n", issue_text));
            prompt.push_str("Provide the FULL updated code ready for replacement.\n");
        }
    }

    prompt
}
