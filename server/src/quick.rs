use crate::keywords::{OFFER_TERMS, SHOW_TERMS};
use crate::knowledge::{truncate_chars, KnowledgeBase};
use crate::reply::PROMO_MSG;
use crate::text::{fuzzy_matches, DEFAULT_THRESHOLD};

const GALA_TICKETS_URL: &str = "https://www.helloasso.com/associations/steps/evenements/gala-2025";
const DEFAULT_OFFER_DETAILS: &str = concat!(
    "Du 1er au 30 septembre : 1 cours d’essai gratuit par personne, sur le cours de votre choix ",
    "(dans la limite des places). Réservation obligatoire en ligne/WhatsApp. ",
    "Venez 10 minutes en avance avec une tenue adaptée."
);
const OFFER_DETAILS_CHARS: usize = 900;

/// A canned reply that makes the model call unnecessary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickAnswer {
    Show(String),
    TrialOffer(String),
    Faq(String),
}

impl QuickAnswer {
    pub fn kind(&self) -> &'static str {
        match self {
            QuickAnswer::Show(_) => "show",
            QuickAnswer::TrialOffer(_) => "trial_offer",
            QuickAnswer::Faq(_) => "faq",
        }
    }

    pub fn into_text(self) -> String {
        match self {
            QuickAnswer::Show(text) | QuickAnswer::TrialOffer(text) | QuickAnswer::Faq(text) => {
                text
            }
        }
    }
}

/// Checks the short-circuits in priority order: the show, the trial
/// offer (promo month only), then the local FAQ.
pub fn quick_answer(
    user_text: &str,
    knowledge: &KnowledgeBase,
    promo_active: bool,
) -> Option<QuickAnswer> {
    if fuzzy_matches(user_text, SHOW_TERMS, DEFAULT_THRESHOLD) {
        return Some(QuickAnswer::Show(format!(
            "Oui, le gala approche ! 🎭 Vous pouvez dès maintenant réserver vos places ici :\n[Acheter une place]({GALA_TICKETS_URL})"
        )));
    }

    if promo_active && fuzzy_matches(user_text, OFFER_TERMS, DEFAULT_THRESHOLD) {
        let details = knowledge
            .offer_snippet()
            .map(|snippet| truncate_chars(snippet, OFFER_DETAILS_CHARS))
            .unwrap_or_else(|| DEFAULT_OFFER_DETAILS.to_string());
        return Some(QuickAnswer::TrialOffer(format!("{PROMO_MSG}\n\n{details}")));
    }

    knowledge
        .lookup(user_text)
        .map(|answer| QuickAnswer::Faq(answer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{FaqEntry, KnowledgeDoc};
    use std::path::PathBuf;

    fn faq_kb() -> KnowledgeBase {
        KnowledgeBase::from_parts(
            vec![FaqEntry {
                question: "certificat médical".to_string(),
                answer: "Oui, un certificat est demandé.".to_string(),
            }],
            &[],
        )
    }

    #[test]
    fn show_questions_get_ticket_link() {
        let answer = quick_answer("C'est quand le spectacle ?", &KnowledgeBase::default(), false)
            .expect("show answer");
        assert_eq!(answer.kind(), "show");
        assert!(answer.into_text().contains(GALA_TICKETS_URL));
    }

    #[test]
    fn show_wins_over_faq_and_offer() {
        let answer = quick_answer("gala et essai gratuit", &faq_kb(), true).expect("answer");
        assert_eq!(answer.kind(), "show");
    }

    #[test]
    fn trial_offer_only_during_promo() {
        let kb = KnowledgeBase::default();
        let answer = quick_answer("je peux faire un essai ?", &kb, true).expect("offer");
        assert_eq!(
            answer,
            QuickAnswer::TrialOffer(format!("{PROMO_MSG}\n\n{DEFAULT_OFFER_DETAILS}"))
        );
        assert_eq!(quick_answer("je peux faire un essai ?", &kb, false), None);
    }

    #[test]
    fn trial_offer_uses_document_snippet() {
        let kb = KnowledgeBase::from_parts(
            Vec::new(),
            &[KnowledgeDoc {
                source: PathBuf::from("data/offre.md"),
                text: "OFFRE SEPTEMBRE : essai gratuit le mercredi.".to_string(),
            }],
        );
        let text = quick_answer("offre d'essai", &kb, true)
            .expect("offer")
            .into_text();
        assert!(text.ends_with("OFFRE SEPTEMBRE : essai gratuit le mercredi."));
    }

    #[test]
    fn faq_answer_returned_verbatim() {
        let answer = quick_answer("Faut-il un certificat médical ?", &faq_kb(), false);
        assert_eq!(
            answer,
            Some(QuickAnswer::Faq("Oui, un certificat est demandé.".to_string()))
        );
        assert_eq!(quick_answer("Quels sont les horaires ?", &faq_kb(), false), None);
    }
}
