//! Link pattern matcher.
//!
//! Detects the three textual reference dialects embedded in rich-text and
//! rule-data fields of a serialized document:
//!
//! - World references: `@Actor[...]`, `@Item[...]`, `@JournalEntry[...]`,
//!   a raw 16-character world compendium reference, or a `@UUID[...]` whose
//!   body does not start with `Compendium.` — never allowed in shipped
//!   content.
//! - Legacy compendium references:
//!   `@Compendium[<system>.<pack>.<DocType>.<name>]{label}`.
//! - UUID references:
//!   `@UUID[Compendium.<system>.<pack>.<DocType>.<nameOrId>]{label}`.
//!
//! The scan runs over the whole JSON-serialized document rather than walking
//! the object tree, because references can appear inside arbitrarily nested
//! rich-text fields and structured rule payloads alike. Tokens are parsed by
//! a hand-written scanner over the reference grammar, so document names
//! containing regex metacharacters cannot mis-parse.

/// Which reference dialect a match belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDialect {
    /// A reference into the live world; always an error in shipped content.
    World,
    /// The legacy `@Compendium[...]` form.
    Compendium,
    /// The `@UUID[Compendium....]` form.
    Uuid,
}

/// One detected reference token.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMatch {
    pub dialect: LinkDialect,
    /// Byte offset of the `@` that opens the token.
    pub start: usize,
    /// Byte offset one past the token, including any `{label}`.
    pub end: usize,
    /// The full matched text.
    pub raw: String,
    /// Source system id, for compendium dialects.
    pub system: Option<String>,
    /// Pack name, for compendium dialects.
    pub pack_name: Option<String>,
    /// Document type tag, for compendium dialects.
    pub doc_type: Option<String>,
    /// The final reference segment: a document name or id. For world
    /// references this is the whole bracket body.
    pub target: String,
    /// Inline display label, when a `{...}` suffix is present.
    pub label: Option<String>,
}

impl LinkMatch {
    /// True when the reference addresses a journal entry page. Page-level
    /// links use a different addressing scheme and are left untouched by
    /// both rewrite directions.
    pub fn is_journal_page(&self) -> bool {
        self.doc_type.as_deref() == Some("JournalEntryPage")
            || self.target.contains(".JournalEntryPage.")
    }
}

/// Document types that can be referenced from the live world by bare id.
const WORLD_DOC_TAGS: &[&str] = &["Actor", "Item", "JournalEntry"];

/// Scan serialized document text for reference tokens, in text order.
///
/// Matches never overlap: scanning resumes after each complete token.
pub fn scan_links(text: &str) -> Vec<LinkMatch> {
    let bytes = text.as_bytes();
    let mut matches = Vec::new();
    let mut pos = 0;

    while let Some(at) = find_byte(bytes, b'@', pos) {
        pos = at + 1;

        let ident_end = scan_ident(bytes, at + 1);
        if ident_end == at + 1 || bytes.get(ident_end) != Some(&b'[') {
            continue;
        }
        let ident = &text[at + 1..ident_end];

        let Some(close) = find_byte(bytes, b']', ident_end + 1) else {
            continue;
        };
        let body = &text[ident_end + 1..close];

        let mut end = close + 1;
        let mut label = None;
        if bytes.get(end) == Some(&b'{') {
            if let Some(label_close) = find_byte(bytes, b'}', end + 1) {
                label = Some(text[end + 1..label_close].to_string());
                end = label_close + 1;
            }
        }

        if let Some(m) = classify(ident, body, label, at, end, text) {
            matches.push(m);
            pos = end;
        }
    }

    matches
}

/// The first world reference in the text, if any.
pub fn first_world_ref(text: &str) -> Option<LinkMatch> {
    scan_links(text)
        .into_iter()
        .find(|m| m.dialect == LinkDialect::World)
}

fn classify(
    ident: &str,
    body: &str,
    label: Option<String>,
    start: usize,
    end: usize,
    text: &str,
) -> Option<LinkMatch> {
    let raw = text[start..end].to_string();
    let world = |target: &str| LinkMatch {
        dialect: LinkDialect::World,
        start,
        end,
        raw: raw.clone(),
        system: None,
        pack_name: None,
        doc_type: None,
        target: target.to_string(),
        label: label.clone(),
    };

    if WORLD_DOC_TAGS.contains(&ident) {
        return Some(world(body));
    }

    match ident {
        "Compendium" => {
            // A bare 16-character body is a reference into a world compendium.
            if crate::core::slug::is_document_id(body) {
                return Some(world(body));
            }
            let (system, pack, doc_type, target) = split_reference(body)?;
            Some(LinkMatch {
                dialect: LinkDialect::Compendium,
                start,
                end,
                raw,
                system: Some(system),
                pack_name: Some(pack),
                doc_type: Some(doc_type),
                target,
                label,
            })
        }
        "UUID" => {
            let Some(rest) = body.strip_prefix("Compendium.") else {
                // `@UUID[Item.xyz]` and friends address the live world.
                return Some(world(body));
            };
            let (system, pack, doc_type, target) = split_reference(rest)?;
            Some(LinkMatch {
                dialect: LinkDialect::Uuid,
                start,
                end,
                raw,
                system: Some(system),
                pack_name: Some(pack),
                doc_type: Some(doc_type),
                target,
                label,
            })
        }
        // Other enrichers (@Check, @Damage, @Localize, ...) are not links.
        _ => None,
    }
}

/// Split `<system>.<pack>.<DocType>.<target>`; the target segment may itself
/// contain dots (document names and page paths do).
fn split_reference(body: &str) -> Option<(String, String, String, String)> {
    let mut parts = body.splitn(4, '.');
    let system = parts.next()?.to_string();
    let pack = parts.next()?.to_string();
    let doc_type = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    if system.is_empty() || pack.is_empty() || doc_type.is_empty() || target.is_empty() {
        return None;
    }
    Some((system, pack, doc_type, target))
}

fn scan_ident(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    pos
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}
