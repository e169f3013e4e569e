use crate::knowledge::KnowledgeBase;

const PERSONA: &str = "\
Tu es **Betty**, l’assistante du Centre de Danse Delphine Letort.
Style: chaleureuse, bienveillante, précise et naturelle. **Ne parle jamais d’IA/LLM/OpenAI**.";

const STUDIO_FACTS: &str = "\
Cours:
- Delphine Letort (DE) : classique (dès 6 ans), street jazz, lyrical jazz.
- Marie : éveil (dès 3 ans, samedi matin).
- Parcours recommandé : éveil (dès 3 ans) puis classique (dès 6 ans). Aucune limite d’âge supérieure.
- Aussi : soul jazz, jazz new school, technique création, breakdance (dès 8 ans), street ados/adultes.
- Sophrologie : Marie OLICHET (06 69 16 13 50).
- Contact : 06 63 11 15 75 • contactdelphineletort@gmail.com
- Studio : 53 avenue Bollée, Le Mans.";

const SHOP_GUIDANCE: &str = "\
Équipement & Boutique:
- Tenues: justaucorps, collants, cache-cœur/tunique/jupe; chaussures: demi-pointes, pointes si niveau approprié.
- Oriente vers la boutique locale « Petit Rat » (53 avenue Bollée) pour tailles, conseils et accessoires (ex. Repetto).
- Ne donne pas de prix; renvoie au magasin.";

const RULES: &str = "\
Règles:
- **1 seul lien** cliquable par message (format [texte](url)).
- Si la demande est floue, pose une courte question.
- Ne répète pas l’introduction à chaque réponse ; n’invente rien ; en cas de doute, renvoie vers le site.
- Objectif discret: aider la personne à se projeter et à s’inscrire (ton doux, sans forcer).";

const PROMO_INSTRUCTION: &str = "\
IMPORTANT (période courante) : en septembre, propose proactivement l’offre « 1 cours d’essai gratuit par personne ». \
Rappelle que la réservation est obligatoire via le lien Inscription (places limitées).";

/// System message sent with every model call.
pub fn system_prompt(knowledge: &KnowledgeBase, promo_active: bool) -> String {
    let mut sections = vec![PERSONA.to_string()];

    if !knowledge.faq_excerpt().is_empty() {
        sections.push(format!("Infos utiles (résumé):\n{}", knowledge.faq_excerpt()));
    }
    sections.push(STUDIO_FACTS.to_string());
    sections.push(SHOP_GUIDANCE.to_string());
    sections.push(RULES.to_string());
    if promo_active {
        sections.push(PROMO_INSTRUCTION.to_string());
    }
    if !knowledge.context().is_empty() {
        sections.push(format!(
            "Contexte (extraits internes, ne pas citer textuellement si inutile) :\n{}",
            knowledge.context()
        ));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{FaqEntry, KnowledgeDoc};
    use std::path::PathBuf;

    #[test]
    fn prompt_without_knowledge_has_persona_and_rules() {
        let prompt = system_prompt(&KnowledgeBase::default(), false);
        assert!(prompt.starts_with("Tu es **Betty**"));
        assert!(prompt.contains("**1 seul lien**"));
        assert!(!prompt.contains("Infos utiles"));
        assert!(!prompt.contains("Contexte"));
        assert!(!prompt.contains("IMPORTANT"));
    }

    #[test]
    fn prompt_embeds_faq_context_and_promo() {
        let kb = KnowledgeBase::from_parts(
            vec![FaqEntry {
                question: "Parking ?".to_string(),
                answer: "Oui, rue voisine.".to_string(),
            }],
            &[KnowledgeDoc {
                source: PathBuf::from("data/reglement.md"),
                text: "Tenue correcte exigée.".to_string(),
            }],
        );
        let prompt = system_prompt(&kb, true);
        assert!(prompt.contains("Q: Parking ?\nR: Oui, rue voisine."));
        assert!(prompt.contains("[reglement.md]\nTenue correcte exigée."));
        assert!(prompt.contains("IMPORTANT (période courante)"));
    }
}
