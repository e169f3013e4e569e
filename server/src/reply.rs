//! Business rules applied to every outgoing reply, model-generated or
//! canned. Steps run in a fixed order and each one is idempotent, so a
//! reply that already carries a decoration is left alone.

use crate::config::CtaPolicy;
use crate::intent::SiteLinks;
use crate::keywords::{CLOTHES_TERMS, ENROLLMENT_TERMS, PROMO_TRIGGER_TERMS};
use crate::text::{fuzzy_matches, DEFAULT_THRESHOLD};
use once_cell::sync::Lazy;
use regex::Regex;

pub const SHOP_MARKER: &str = "Petit Rat";
pub const SHOP_ADDRESS: &str = "53 avenue Bollée, Le Mans";

pub static SHOP_BLURB: Lazy<String> = Lazy::new(|| {
    format!(
        concat!(
            "Pour l’équipement, la boutique **Petit Rat** ({}). ",
            "Vous y trouverez **toutes les tailles** en **pointes** et **demi-pointes**, ",
            "**collants**, **justaucorps**, **tuniques**, **jupes**, **cache-cœur**, **pédilles**, ",
            "**accessoires** et **sacs**, y compris des **marques de danse** reconnues (ex. **Repetto**)."
        ),
        SHOP_ADDRESS
    )
});

pub const DEFLECTION: &str = "Je suis Betty 😊. Je préfère vérifier pour bien vous répondre.";

pub const PROMO_MSG: &str = concat!(
    "**En septembre : 1 cours d’essai gratuit** par personne (places limitées). ",
    "Réservation obligatoire via le lien *Inscription* du site ou WhatsApp. ",
    "L’essai n’engage pas ; si vous poursuivez, le règlement intérieur s’applique."
);

pub const ENROLLMENT_NUDGE: &str =
    "💡 Pour vous inscrire rapidement, cliquez sur **la petite bulle bleue en bas à droite**.";

const CTA_PHRASES: [&str; 3] = [
    "Souhaitez-vous en savoir plus ?",
    "Voulez-vous en savoir plus ?",
    "Aimeriez-vous en savoir plus ?",
];

// "AI" stays case-sensitive so the French "ai" never matches.
static META_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(IA|intelligence artificielle|LLM|OpenAI|ChatGPT|GPT(?:-[\w.]+)*",
        r"|mod[eè]le de langage|API|(?-i:AI))\b"
    ))
    .expect("meta pattern is valid")
});
// Anchor may be empty and an optional "title" may follow the URL.
static MARKDOWN_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\]]*)\]\((https?://[^\s)]+)(?:\s+"[^"]*")?\)"#)
        .expect("link pattern is valid")
});
static CLICKABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\(https?://").expect("clickable pattern is valid"));
static CTA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)en savoir plus\s*\?").expect("cta pattern is valid"));

/// Request facts the rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    pub user_text: &'a str,
    /// Messages sent in this session, including the current one.
    pub message_count: u64,
    /// Current calendar month, 1 to 12.
    pub month: u32,
}

#[derive(Debug, Clone)]
pub struct ReplyPipeline {
    links: SiteLinks,
    cta_policy: CtaPolicy,
    promo_month: Option<u32>,
    nudge_every: u64,
}

impl ReplyPipeline {
    pub fn new(
        links: SiteLinks,
        cta_policy: CtaPolicy,
        promo_month: Option<u32>,
        nudge_every: u64,
    ) -> Self {
        Self {
            links,
            cta_policy,
            promo_month,
            nudge_every,
        }
    }

    pub fn promo_active(&self, month: u32) -> bool {
        self.promo_month == Some(month)
    }

    pub fn finish(&self, raw: &str, ctx: &ReplyContext<'_>) -> String {
        let reply = redact_meta(raw.trim());
        let reply = attach_shop(reply, ctx.user_text);
        let reply = self.attach_link(reply, ctx.user_text);
        let reply = keep_first_link(&reply);
        let reply = self.soft_cta(reply, ctx.message_count);
        let reply = self.promo_banner(reply, ctx);
        self.enrollment_nudge(reply, ctx)
    }

    fn attach_link(&self, reply: String, user_text: &str) -> String {
        if CLICKABLE_RE.is_match(&reply) {
            return reply;
        }
        match self.links.link_for(user_text) {
            Some(link) => format!("{reply}\n\n{link}"),
            None => reply,
        }
    }

    fn soft_cta(&self, reply: String, message_count: u64) -> String {
        if !self.cta_policy.fires(message_count)
            || reply.trim_end().ends_with('?')
            || CTA_RE.is_match(&reply)
        {
            return reply;
        }
        let slot = message_count.saturating_sub(1) % CTA_PHRASES.len() as u64;
        let phrase = CTA_PHRASES[slot as usize];
        format!("{reply}\n\n{phrase}")
    }

    fn promo_banner(&self, reply: String, ctx: &ReplyContext<'_>) -> String {
        if !self.promo_active(ctx.month)
            || reply.contains(PROMO_MSG)
            || !fuzzy_matches(ctx.user_text, PROMO_TRIGGER_TERMS, DEFAULT_THRESHOLD)
        {
            return reply;
        }
        format!("{PROMO_MSG}\n\n{reply}")
    }

    fn enrollment_nudge(&self, reply: String, ctx: &ReplyContext<'_>) -> String {
        if reply.contains(ENROLLMENT_NUDGE) {
            return reply;
        }
        let periodic = self.nudge_every > 0
            && ctx.message_count > 0
            && ctx.message_count % self.nudge_every == 0;
        if periodic || fuzzy_matches(ctx.user_text, ENROLLMENT_TERMS, DEFAULT_THRESHOLD) {
            format!("{reply}\n\n{ENROLLMENT_NUDGE}")
        } else {
            reply
        }
    }
}

/// Replaces the whole reply when it talks about being a model.
pub fn redact_meta(reply: &str) -> String {
    if META_RE.is_match(reply) {
        DEFLECTION.to_string()
    } else {
        reply.to_string()
    }
}

/// Appends the shop blurb when the visitor asks about outfits or shoes.
pub fn attach_shop(reply: String, user_text: &str) -> String {
    if reply.contains(SHOP_MARKER)
        || !fuzzy_matches(user_text, CLOTHES_TERMS, DEFAULT_THRESHOLD)
    {
        return reply;
    }
    format!("{reply}\n\n{}", SHOP_BLURB.as_str())
}

/// Keeps the first markdown link clickable and reduces the others to
/// their anchor text.
pub fn keep_first_link(text: &str) -> String {
    let mut links = MARKDOWN_LINK_RE.captures_iter(text);
    let Some(first) = links.next() else {
        return text.to_string();
    };
    let first_end = first.get(0).map_or(0, |m| m.end());

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..first_end]);
    let mut cursor = first_end;
    for link in links {
        let (Some(whole), Some(anchor)) = (link.get(0), link.get(1)) else {
            continue;
        };
        out.push_str(&text[cursor..whole.start()]);
        out.push_str(anchor.as_str());
        cursor = whole.end();
    }
    out.push_str(&text[cursor..]);
    out
}
