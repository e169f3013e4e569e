use crate::text::normalize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const FAQ_EXCERPT_CHARS: usize = 4000;
const CONTEXT_CHARS: usize = 1200;
const OFFER_SNIPPET_CHARS: usize = 900;
const PREFERRED_DOC_MARKER: &str = "reglement+offre";
const OFFER_KEYS: [&str; 4] = [
    "offre septembre",
    "cours d’essai",
    "cours d'essai",
    "essai gratuit",
];
const OFFER_HEADINGS: [&str; 3] = ["## OFFRE SEPTEMBRE", "OFFRE SEPTEMBRE", "Offre — Cours d’essai"];
// Reverse FAQ matching ("is the message part of a known question?") only
// makes sense once the message is more than a word or two.
const MIN_REVERSE_MATCH_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Deserialize)]
struct RawFaqEntry {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KnowledgeDoc {
    pub source: PathBuf,
    pub text: String,
}

/// Read-only reference material loaded once at startup: the FAQ file and
/// the studio's markdown/text documents.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    faq: Vec<(String, FaqEntry)>,
    faq_excerpt: String,
    context: String,
    offer_snippet: String,
}

impl KnowledgeBase {
    /// Never fails: unreadable or malformed sources are logged and skipped.
    pub fn load(faq_path: &Path, doc_dirs: &[PathBuf]) -> Self {
        let faq = load_faq(faq_path);
        let docs = load_documents(doc_dirs);
        info!(
            target: "knowledge",
            faq_entries = faq.len(),
            documents = docs.len(),
            msg = "knowledge base loaded"
        );
        Self::from_parts(faq, &docs)
    }

    pub fn from_parts(faq: Vec<FaqEntry>, docs: &[KnowledgeDoc]) -> Self {
        let faq_excerpt = truncate_chars(
            &faq.iter()
                .map(|entry| format!("Q: {}\nR: {}", entry.question, entry.answer))
                .collect::<Vec<_>>()
                .join("\n\n"),
            FAQ_EXCERPT_CHARS,
        );
        let context = build_context(docs, CONTEXT_CHARS);
        let offer_snippet = extract_offer_snippet(docs);
        let faq = faq
            .into_iter()
            .map(|entry| (normalize(&entry.question), entry))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        Self {
            faq,
            faq_excerpt,
            context,
            offer_snippet,
        }
    }

    pub fn faq_len(&self) -> usize {
        self.faq.len()
    }

    /// `Q:/R:` digest of the FAQ for the system prompt.
    pub fn faq_excerpt(&self) -> &str {
        &self.faq_excerpt
    }

    /// Short excerpt of the studio documents for the system prompt.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The free-trial section of the documents, if they describe one.
    pub fn offer_snippet(&self) -> Option<&str> {
        Some(self.offer_snippet.as_str()).filter(|snippet| !snippet.is_empty())
    }

    /// Answer of the first FAQ question found in `message` (or containing it).
    pub fn lookup(&self, message: &str) -> Option<&str> {
        let message = normalize(message);
        if message.is_empty() {
            return None;
        }
        self.faq
            .iter()
            .find(|(question, _)| {
                message.contains(question.as_str())
                    || (message.len() >= MIN_REVERSE_MATCH_CHARS
                        && question.contains(message.as_str()))
            })
            .map(|(_, entry)| entry.answer.as_str())
    }
}

/// FAQ entries from a JSON array of `{question, answer}`; entries missing
/// either side are dropped and any file error yields an empty list.
pub fn load_faq(path: &Path) -> Vec<FaqEntry> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) => {
            warn!(target: "knowledge", path = ?path, error = %err, "FAQ file unavailable");
            return Vec::new();
        }
    };
    parse_faq(&data).unwrap_or_else(|err| {
        warn!(target: "knowledge", path = ?path, error = %err, "FAQ file is not valid JSON");
        Vec::new()
    })
}

fn parse_faq(data: &str) -> serde_json::Result<Vec<FaqEntry>> {
    let raw: Vec<RawFaqEntry> = serde_json::from_str(data)?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| {
            let question = entry.question?.trim().to_string();
            let answer = entry.answer?.trim().to_string();
            (!question.is_empty() && !answer.is_empty()).then_some(FaqEntry { question, answer })
        })
        .collect())
}

/// Non-empty `.md` and `.txt` files found anywhere under `dirs`.
pub fn load_documents(dirs: &[PathBuf]) -> Vec<KnowledgeDoc> {
    let mut docs = Vec::new();
    for dir in dirs.iter().filter(|dir| dir.is_dir()) {
        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("txt")
                });
            if !is_text {
                continue;
            }
            match std::fs::read(path) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    if !text.trim().is_empty() {
                        docs.push(KnowledgeDoc {
                            source: path.to_path_buf(),
                            text,
                        });
                    }
                }
                Err(err) => {
                    warn!(
                        target: "knowledge",
                        path = ?path,
                        error = %err,
                        "skipping unreadable document"
                    );
                }
            }
        }
    }
    docs
}

fn build_context(docs: &[KnowledgeDoc], limit_chars: usize) -> String {
    let mut ordered: Vec<&KnowledgeDoc> = docs.iter().collect();
    ordered.sort_by_key(|doc| {
        !doc.source
            .to_string_lossy()
            .to_lowercase()
            .contains(PREFERRED_DOC_MARKER)
    });

    let mut parts = Vec::new();
    let mut total = 0;
    for doc in ordered {
        let text = doc.text.trim();
        if text.is_empty() {
            continue;
        }
        let remaining = limit_chars.saturating_sub(total);
        if remaining == 0 {
            break;
        }
        let chunk = truncate_chars(text, remaining);
        total += chunk.chars().count();
        let name = doc
            .source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        parts.push(format!("[{name}]\n{chunk}"));
    }
    parts.join("\n\n")
}

fn extract_offer_snippet(docs: &[KnowledgeDoc]) -> String {
    let Some(doc) = docs.iter().find(|doc| {
        let lower = doc.text.to_lowercase();
        OFFER_KEYS.iter().any(|key| lower.contains(key))
    }) else {
        return String::new();
    };

    let start = OFFER_HEADINGS
        .iter()
        .find_map(|heading| doc.text.find(heading))
        .unwrap_or(0);
    truncate_chars(&doc.text[start..], OFFER_SNIPPET_CHARS)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entry(question: &str, answer: &str) -> FaqEntry {
        FaqEntry {
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }

    fn doc(source: &str, text: &str) -> KnowledgeDoc {
        KnowledgeDoc {
            source: PathBuf::from(source),
            text: text.to_string(),
        }
    }

    #[test]
    fn parse_faq_drops_incomplete_entries() {
        let json = r#"[
            {"question": "Quel âge minimum ?", "answer": "Dès 3 ans."},
            {"question": "  ", "answer": "orphan"},
            {"question": "Sans réponse"},
            {"answer": "Sans question"}
        ]"#;
        let faq = parse_faq(json).expect("valid json");
        assert_eq!(faq, vec![entry("Quel âge minimum ?", "Dès 3 ans.")]);
    }

    #[test]
    fn missing_or_malformed_faq_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_faq(&dir.path().join("absent.json")).is_empty());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(load_faq(&broken).is_empty());
    }

    #[test]
    fn load_reads_faq_and_documents_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let faq_path = dir.path().join("faq.json");
        fs::write(
            &faq_path,
            r#"[{"question": "Faut-il un certificat médical ?", "answer": "Oui, à l'inscription."}]"#,
        )
        .unwrap();
        let docs_dir = dir.path().join("docs");
        fs::create_dir_all(docs_dir.join("nested")).unwrap();
        fs::write(docs_dir.join("nested/reglement.md"), "Règlement intérieur.").unwrap();
        fs::write(docs_dir.join("image.png"), "not text").unwrap();
        fs::write(docs_dir.join("empty.txt"), "   ").unwrap();

        let kb = KnowledgeBase::load(&faq_path, &[docs_dir, dir.path().join("missing")]);
        assert_eq!(kb.faq_len(), 1);
        assert!(kb.faq_excerpt().starts_with("Q: Faut-il un certificat médical ?"));
        assert_eq!(kb.context(), "[reglement.md]\nRèglement intérieur.");
    }

    #[test]
    fn lookup_matches_in_both_directions() {
        let kb = KnowledgeBase::from_parts(
            vec![
                entry("certificat médical", "Oui, il est obligatoire."),
                entry("Quel est l'âge minimum pour l'éveil ?", "Dès 3 ans."),
            ],
            &[],
        );
        assert_eq!(
            kb.lookup("Faut-il un CERTIFICAT medical ?"),
            Some("Oui, il est obligatoire.")
        );
        assert_eq!(kb.lookup("age minimum"), Some("Dès 3 ans."));
        assert_eq!(kb.lookup("ok"), None);
        assert_eq!(kb.lookup("?!"), None);
    }

    #[test]
    fn context_prefers_the_rules_document_and_respects_budget() {
        let long = "x".repeat(2000);
        let docs = vec![
            doc("data/horaires.md", &long),
            doc("data/reglement+offre.md", "Règles et offre."),
        ];
        let context = build_context(&docs, CONTEXT_CHARS);
        assert!(context.starts_with("[reglement+offre.md]\nRègles et offre."));
        let body_chars: usize = context.chars().filter(|c| *c == 'x').count();
        assert_eq!(body_chars, CONTEXT_CHARS - "Règles et offre.".chars().count());
    }

    #[test]
    fn offer_snippet_starts_at_heading() {
        let docs = vec![
            doc("data/infos.md", "Horaires du lundi."),
            doc(
                "data/offre.md",
                "Intro.\n## OFFRE SEPTEMBRE\nUn cours d'essai gratuit par personne.",
            ),
        ];
        let kb = KnowledgeBase::from_parts(Vec::new(), &docs);
        assert_eq!(
            kb.offer_snippet(),
            Some("## OFFRE SEPTEMBRE\nUn cours d'essai gratuit par personne.")
        );
        assert_eq!(KnowledgeBase::default().offer_snippet(), None);
    }
}
