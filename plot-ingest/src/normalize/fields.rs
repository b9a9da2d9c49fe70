//! Lecture des champs canoniques dans les attributs source

use std::sync::OnceLock;

use regex::Regex;
use shapefile_zip::{AttributeValue, Attributes};

/// Valeur du premier alias dont la colonne existe
///
/// La casse exacte est préférée, puis une correspondance insensible à la casse.
/// Les alias suivants sont ignorés dès qu'une colonne correspond, même si sa
/// valeur est vide: le champ est alors absent.
pub fn lookup<'a>(attributes: &'a Attributes, aliases: &[String]) -> Option<&'a AttributeValue> {
    aliases
        .iter()
        .find_map(|alias| column(attributes, alias))
        .filter(|value| !value.is_null())
}

fn column<'a>(attributes: &'a Attributes, alias: &str) -> Option<&'a AttributeValue> {
    attributes.get(alias).or_else(|| {
        attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(alias))
            .map(|(_, value)| value)
    })
}

/// Texte du premier alias présent
pub fn lookup_text(attributes: &Attributes, aliases: &[String]) -> Option<String> {
    lookup(attributes, aliases).and_then(AttributeValue::as_text)
}

fn non_numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.,\-]").expect("valid regex"))
}

/// Prix depuis un nombre ou un texte ("$1,250.00", "1 250,50 €")
///
/// Une valeur négative, non finie ou illisible donne `None`.
pub fn coerce_price(value: &AttributeValue) -> Option<f64> {
    let price = match value {
        AttributeValue::Number(n) => Some(*n),
        AttributeValue::Text(text) => parse_price_text(text),
        _ => None,
    }?;

    (price.is_finite() && price >= 0.0).then_some(price)
}

fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned = non_numeric_re().replace_all(text.trim(), "");
    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let normalized = match (last_dot, last_comma) {
        // Le dernier séparateur rencontré est le séparateur décimal
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && decimals <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned.into_owned(),
    };

    normalized.parse::<f64>().ok()
}
