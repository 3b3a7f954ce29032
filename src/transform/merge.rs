//! Direct merge of an XML fragment into an existing document, and its reverse.

use anyhow::Result;

use super::xml::{Document, Element};

/// Merged as the root's first child rather than appended: the configuration
/// schema requires `configSections` to precede every other section.
const FIRST_CHILD_ELEMENT: &str = "configSections";

/// Merge `fragment` into `existing` and return the new document text.
pub fn merge_documents(existing: &str, fragment: &str) -> Result<String> {
    let mut document = Document::parse(existing)?;
    let fragment = Document::parse(fragment)?;
    merge_into(&mut document.root, &fragment.root, true);
    document.to_xml_string()
}

/// Strip what `fragment` would have merged from `existing`.
pub fn unmerge_documents(existing: &str, fragment: &str) -> Result<String> {
    let mut document = Document::parse(existing)?;
    let fragment = Document::parse(fragment)?;
    remove_from(&mut document.root, &fragment.root);
    document.to_xml_string()
}

/// The document created when the merge target does not exist yet.
pub fn new_document(fragment: &str) -> Result<String> {
    Document::parse(fragment)?.to_xml_string()
}

pub fn merge_into(target: &mut Element, fragment: &Element, is_root: bool) {
    for (key, value) in &fragment.attributes {
        if target.attr(key).is_none() {
            target.attributes.push((key.clone(), value.clone()));
        }
    }

    for child in fragment.elements() {
        let matched = best_match(target, child)
            .filter(|&i| target.element_at(i).is_some_and(|existing| !has_conflict(existing, child)));
        match matched.and_then(|i| target.element_at_mut(i)) {
            Some(existing) => merge_into(existing, child, false),
            None if is_root && child.name == FIRST_CHILD_ELEMENT => target.insert_first(child.clone()),
            None => target.push_element(child.clone()),
        }
    }
}

pub fn remove_from(target: &mut Element, fragment: &Element) {
    target
        .attributes
        .retain(|(key, value)| fragment.attr(key) != Some(value.as_str()));

    for child in fragment.elements() {
        let Some(index) = best_match(target, child) else {
            continue;
        };
        let Some(existing) = target.element_at_mut(index) else {
            continue;
        };
        if has_conflict(existing, child) {
            continue;
        }
        remove_from(existing, child);
        if existing.attributes.is_empty() && !existing.has_elements() {
            target.children.remove(index);
        }
    }
}

/// Index of the same-named child sharing the most equal attributes with
/// `wanted`; the first such child wins ties.
fn best_match(parent: &Element, wanted: &Element) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for index in parent.element_indices(&wanted.name) {
        let Some(candidate) = parent.element_at(index) else {
            continue;
        };
        let score = wanted
            .attributes
            .iter()
            .filter(|(key, value)| candidate.attr(key) == Some(value.as_str()))
            .count();
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Both elements carry an attribute with different values.
fn has_conflict(existing: &Element, wanted: &Element) -> bool {
    existing
        .attributes
        .iter()
        .any(|(key, value)| wanted.attr(key).is_some_and(|other| other != value.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Document {
        Document::parse(text).unwrap()
    }

    fn merged(existing: &str, fragment: &str) -> Document {
        parse(&merge_documents(existing, fragment).unwrap())
    }

    #[test]
    fn test_merge_adds_missing_elements_and_attributes() {
        // --- Setup ---
        let existing = r#"<configuration><system.web><compilation debug="true"/></system.web></configuration>"#;
        let fragment = r#"<configuration><system.web><compilation targetFramework="4.5"/><httpRuntime/></system.web></configuration>"#;

        // --- Execute ---
        let doc = merged(existing, fragment);

        // --- Verify ---
        let web = doc.root.elements().next().unwrap();
        let names: Vec<&str> = web.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["compilation", "httpRuntime"]);
        let compilation = web.elements().next().unwrap();
        assert_eq!(compilation.attr("debug"), Some("true"));
        assert_eq!(compilation.attr("targetFramework"), Some("4.5"));
    }

    #[test]
    fn test_conflicting_elements_are_appended() {
        let existing = r#"<configuration><appSettings><add key="a" value="1"/></appSettings></configuration>"#;
        let fragment = r#"<configuration><appSettings><add key="b" value="2"/></appSettings></configuration>"#;

        let doc = merged(existing, fragment);
        let settings = doc.root.elements().next().unwrap();
        let keys: Vec<&str> = settings.elements().filter_map(|e| e.attr("key")).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_merge_picks_best_matching_sibling() {
        let existing = r#"<c><add key="a" value="1"/><add key="b" value="2"/></c>"#;
        let fragment = r#"<c><add key="b" value="2" extra="x"/></c>"#;

        let doc = merged(existing, fragment);
        let adds: Vec<&Element> = doc.root.elements().collect();
        assert_eq!(adds.len(), 2);
        assert_eq!(adds[1].attr("extra"), Some("x"));
        assert_eq!(adds[0].attr("extra"), None);
    }

    #[test]
    fn test_config_sections_go_first() {
        let existing = r#"<configuration><appSettings/></configuration>"#;
        let fragment = r#"<configuration><configSections><section name="s"/></configSections></configuration>"#;

        let doc = merged(existing, fragment);
        let names: Vec<&str> = doc.root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["configSections", "appSettings"]);
    }

    #[test]
    fn test_nested_config_sections_are_appended() {
        let existing = r#"<configuration><other><x/></other></configuration>"#;
        let fragment = r#"<configuration><other><configSections/></other></configuration>"#;

        let doc = merged(existing, fragment);
        let other = doc.root.elements().next().unwrap();
        let names: Vec<&str> = other.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "configSections"]);
    }

    #[test]
    fn test_unmerge_reverses_merge() {
        // --- Setup ---
        let existing = r#"<configuration><appSettings><add key="a" value="1"/></appSettings></configuration>"#;
        let fragment = r#"<configuration><appSettings><add key="b" value="2"/></appSettings><system.web><httpRuntime maxRequestLength="10"/></system.web></configuration>"#;

        // --- Execute ---
        let installed = merge_documents(existing, fragment).unwrap();
        let reverted = unmerge_documents(&installed, fragment).unwrap();

        // --- Verify ---
        assert_eq!(parse(&reverted), parse(existing));
    }

    #[test]
    fn test_unmerge_keeps_user_modified_elements() {
        let existing = r#"<configuration><appSettings><add key="b" value="changed"/></appSettings></configuration>"#;
        let fragment = r#"<configuration><appSettings><add key="b" value="2"/></appSettings></configuration>"#;

        let doc = parse(&unmerge_documents(existing, fragment).unwrap());
        let settings = doc.root.elements().next().unwrap();
        assert_eq!(settings.elements().count(), 1);
    }

    #[test]
    fn test_new_document_from_fragment() {
        let text = new_document("<configuration><appSettings/></configuration>").unwrap();
        assert_eq!(parse(&text).root.name, "configuration");
    }
}
