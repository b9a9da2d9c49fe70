//! Parser pour les fichiers CPG (page de code de la table attributaire)

use encoding_rs::Encoding;

/// Déduit l'encodage depuis le contenu d'un fichier .cpg
///
/// Accepte les libellés WHATWG (`UTF-8`, `ISO-8859-1`, `windows-1252`) et les
/// formes courtes produites par les logiciels SIG (`1252`, `88591`, `ANSI 1251`).
pub fn parse(data: &[u8]) -> Option<&'static Encoding> {
    let label = String::from_utf8_lossy(data);
    let label = label.trim().trim_start_matches('\u{feff}');
    if label.is_empty() {
        return None;
    }

    if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
        return Some(encoding);
    }

    let upper = label.to_ascii_uppercase();
    let code = upper
        .trim_start_matches("ANSI")
        .trim_start_matches("CP")
        .trim();

    let normalized = match code {
        "65001" => "utf-8".to_string(),
        "437" | "850" => "windows-1252".to_string(), // DOS latin, au plus proche
        c if c.starts_with("8859") => format!("iso-8859-{}", c.trim_start_matches("8859").trim_start_matches(['-', '_'])),
        c if c.chars().all(|ch| ch.is_ascii_digit()) => format!("windows-{}", c),
        _ => return None,
    };

    Encoding::for_label(normalized.as_bytes())
}

/// Mappe l'octet "language driver" de l'en-tête DBF vers un encodage
pub fn from_language_driver(ldid: u8) -> Option<&'static Encoding> {
    match ldid {
        0x01 | 0x02 | 0x03 | 0x57 | 0x58 | 0x59 => Some(encoding_rs::WINDOWS_1252),
        0x13 | 0x7B => Some(encoding_rs::SHIFT_JIS),
        0x4D | 0x7A => Some(encoding_rs::GBK),
        0x4E | 0x79 => Some(encoding_rs::EUC_KR),
        0x4F | 0x78 => Some(encoding_rs::BIG5),
        0x64 | 0xC8 => Some(encoding_rs::WINDOWS_1250),
        0x65 | 0x26 => Some(encoding_rs::IBM866),
        0xC9 => Some(encoding_rs::WINDOWS_1251),
        0xCA => Some(encoding_rs::WINDOWS_1254),
        0xCB => Some(encoding_rs::WINDOWS_1253),
        0x7D => Some(encoding_rs::WINDOWS_1255),
        0x7E => Some(encoding_rs::WINDOWS_1256),
        _ => None,
    }
}
