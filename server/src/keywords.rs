//! Keyword sets fed to the fuzzy matcher. Spelling mistakes seen in real
//! visitor messages are listed next to the correct forms.

/// Outfits, shoes and the partner shop.
pub const CLOTHES_TERMS: &[&str] = &[
    "tenue",
    "tenues",
    "vetement",
    "vêtement",
    "vêtements",
    "habit",
    "habits",
    "habiys",
    "habiy",
    "chaussure",
    "chaussures",
    "pointes",
    "demi pointes",
    "demi-pointes",
    "demipointes",
    "justaucorps",
    "collants",
    "cache coeur",
    "cache-cœur",
    "boutique",
    "magasin",
    "petit rat",
    "p tit rat",
    "ptit rat",
    "p'tit rat",
];

/// Signs that the visitor is ready to sign up.
pub const ENROLLMENT_TERMS: &[&str] = &[
    "inscription",
    "s inscrire",
    "inscrire",
    "m inscrire",
    "je veux m inscrire",
    "ok",
    "d accord",
    "d’accord",
    "oui",
    "let s go",
    "go",
];

/// Questions about the free trial lesson itself.
pub const OFFER_TERMS: &[&str] = &[
    "essai",
    "essayer",
    "offre",
    "septembre",
    "test",
    "découvrir",
    "essayer un cours",
    "essai gratuit",
    "cours d'essai",
    "cours d’essai",
];

/// Anything money or sign-up related, which is worth a promo banner.
pub const PROMO_TRIGGER_TERMS: &[&str] = &[
    "prix",
    "tarif",
    "inscription",
    "essai",
    "gratuit",
    "septembre",
    "offre",
    "cours",
    "test",
];

/// Year-end show.
pub const SHOW_TERMS: &[&str] = &[
    "spectacle",
    "gala",
    "représentation",
    "scène",
    "show",
    "représente",
];
