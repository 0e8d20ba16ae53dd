use std::path::Path;

/// Source language of the target file, derived from its extension.
///
/// The name goes into the system instruction and the fence tag is the
/// marker the model tends to open its code blocks with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub fence_tag: Option<&'static str>,
}

const KNOWN_LANGUAGES: &[(&str, Language)] = &[
    ("py", Language::new("Python", "python")),
    ("rs", Language::new("Rust", "rust")),
    ("js", Language::new("JavaScript", "javascript")),
    ("ts", Language::new("TypeScript", "typescript")),
    ("go", Language::new("Go", "go")),
    ("java", Language::new("Java", "java")),
    ("rb", Language::new("Ruby", "ruby")),
    ("c", Language::new("C", "c")),
    ("cpp", Language::new("C++", "cpp")),
    ("sh", Language::new("shell", "bash")),
    ("html", Language::new("HTML", "html")),
];

impl Language {
    const fn new(name: &'static str, fence_tag: &'static str) -> Self {
        Self {
            name,
            fence_tag: Some(fence_tag),
        }
    }

    /// Fallback when the extension is missing or unknown.
    pub const GENERIC: Language = Language {
        name: "software",
        fence_tag: None,
    };

    pub fn from_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        extension
            .and_then(|ext| {
                KNOWN_LANGUAGES
                    .iter()
                    .find(|(known, _)| *known == ext)
                    .map(|(_, language)| *language)
            })
            .unwrap_or(Self::GENERIC)
    }
}
