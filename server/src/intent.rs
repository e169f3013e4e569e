use once_cell::sync::Lazy;
use regex::Regex;

/// What the visitor is asking about, as far as picking a link goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Schedule,
    Pricing,
    Courses,
    Contact,
    Camps,
    Directions,
    Gallery,
}

/// Pages of the studio website a reply may point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitePage {
    Schedule,
    Pricing,
    Courses,
    Contact,
    Camps,
    Directions,
    Gallery,
}

impl Intent {
    pub fn anchor(&self) -> &'static str {
        match self {
            Intent::Schedule => "Voir le planning",
            Intent::Pricing => "Consulter les tarifs",
            Intent::Courses => "Découvrir les cours",
            Intent::Contact => "Nous contacter",
            Intent::Camps => "Voir les stages",
            Intent::Directions => "Plan d’accès",
            Intent::Gallery => "Voir la galerie",
        }
    }

    pub fn page(&self) -> SitePage {
        match self {
            Intent::Schedule => SitePage::Schedule,
            Intent::Pricing => SitePage::Pricing,
            Intent::Courses => SitePage::Courses,
            Intent::Contact => SitePage::Contact,
            Intent::Camps => SitePage::Camps,
            Intent::Directions => SitePage::Directions,
            Intent::Gallery => SitePage::Gallery,
        }
    }
}

// Evaluated top to bottom and the first hit wins, so broad patterns shadow
// later ones: "inscription" always lands on pricing, and "quand ont lieu
// les cours" on the schedule rather than the course catalog.
static INTENT_RULES: Lazy<Vec<(Regex, Intent)>> = Lazy::new(|| {
    [
        (
            r"(?i)\b(horaires?|heures?|jours?|planning|disponibilit|quand|créneau|creneau)\b",
            Intent::Schedule,
        ),
        (
            r"(?i)\b(tarifs?|prix|co[uû]ts?|payer|adh[ée]sion|inscriptions?)\b",
            Intent::Pricing,
        ),
        (
            r"(?i)\b(cours?|styles?|disciplines?|profs?|âge|ages?|enfants?|ados?|adultes?)\b",
            Intent::Courses,
        ),
        (
            r"(?i)\b(contact|mail|t[ée]l[ée]phone|appeler|renseignements?)\b",
            Intent::Contact,
        ),
        (r"(?i)\b(stages?|vacances|intensif|workshop)\b", Intent::Camps),
        (
            r"(?i)\b(adresse|venir|acc[eè]s|parking|plan|situ[ée]?)\b",
            Intent::Directions,
        ),
        (r"(?i)\b(galerie|photos?|vid[ée]os?)\b", Intent::Gallery),
    ]
    .into_iter()
    .map(|(pattern, intent)| {
        (
            Regex::new(pattern).expect("intent patterns are valid regexes"),
            intent,
        )
    })
    .collect()
});

/// First rule whose pattern matches `text`.
pub fn classify(text: &str) -> Option<Intent> {
    INTENT_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, intent)| *intent)
}

/// Absolute URLs of the studio website.
#[derive(Debug, Clone)]
pub struct SiteLinks {
    base: String,
}

impl SiteLinks {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, page: SitePage) -> String {
        let path = match page {
            SitePage::Schedule | SitePage::Courses => "/cours",
            SitePage::Pricing => "/tarifs",
            // No dedicated map page yet; the contact page carries the address.
            SitePage::Contact | SitePage::Directions => "/contact",
            SitePage::Camps => "/stages",
            SitePage::Gallery => "/galerie",
        };
        format!("{}{}", self.base, path)
    }

    /// Markdown link for the page that answers `text`, if any.
    pub fn link_for(&self, text: &str) -> Option<String> {
        classify(text).map(|intent| format!("[{}]({})", intent.anchor(), self.url(intent.page())))
    }
}
