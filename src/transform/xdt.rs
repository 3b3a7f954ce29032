//! Declarative XML document transforms (`xdt:Transform` / `xdt:Locator`).

use anyhow::{Context, Result, bail};

use super::xml::{Document, Element, Node};

const XDT_NAMESPACE: &str = "http://schemas.microsoft.com/XML-Document-Transform";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Insert,
    InsertIfMissing,
    Remove,
    RemoveAll,
    Replace,
    SetAttributes(Vec<String>),
    RemoveAttributes(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Locator {
    Match(Vec<String>),
}

/// Split `Name(a, b)` into `("Name", ["a", "b"])`.
fn parse_call(text: &str) -> Result<(&str, Vec<String>)> {
    let text = text.trim();
    let Some(open) = text.find('(') else {
        return Ok((text, Vec::new()));
    };
    let inner = text[open + 1..]
        .strip_suffix(')')
        .with_context(|| format!("Missing ')' in '{}'", text))?;
    let args = inner
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect();
    Ok((text[..open].trim(), args))
}

impl Verb {
    fn parse(text: &str) -> Result<Self> {
        let (name, args) = parse_call(text)?;
        Ok(match name {
            "Insert" => Verb::Insert,
            "InsertIfMissing" => Verb::InsertIfMissing,
            "Remove" => Verb::Remove,
            "RemoveAll" => Verb::RemoveAll,
            "Replace" => Verb::Replace,
            "SetAttributes" => Verb::SetAttributes(args),
            "RemoveAttributes" => Verb::RemoveAttributes(args),
            _ => bail!("Unsupported transform '{}'", text),
        })
    }
}

impl Locator {
    fn parse(text: &str) -> Result<Self> {
        match parse_call(text)? {
            ("Match", args) if !args.is_empty() => Ok(Locator::Match(args)),
            _ => bail!("Unsupported locator '{}'", text),
        }
    }

    fn matches(&self, candidate: &Element, pattern: &Element) -> bool {
        match self {
            Locator::Match(names) => names
                .iter()
                .all(|name| candidate.attr(name) == pattern.attr(name)),
        }
    }
}

/// Names of the transform attributes, derived from the prefix bound to the
/// transform namespace (`xdt` unless declared otherwise).
struct Names {
    prefix: String,
    transform: String,
    locator: String,
}

impl Names {
    fn for_document(root: &Element) -> Self {
        let prefix = root
            .attributes
            .iter()
            .find(|(key, value)| key.starts_with("xmlns:") && value == XDT_NAMESPACE)
            .map(|(key, _)| key["xmlns:".len()..].to_string())
            .unwrap_or_else(|| "xdt".to_string());
        Self {
            transform: format!("{}:Transform", prefix),
            locator: format!("{}:Locator", prefix),
            prefix,
        }
    }

    fn is_transform_attribute(&self, key: &str) -> bool {
        key.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with(':'))
            || key == format!("xmlns:{}", self.prefix)
    }

    /// Deep copy of `element` without transform attributes.
    fn clean(&self, element: &Element) -> Element {
        Element {
            name: element.name.clone(),
            attributes: element
                .attributes
                .iter()
                .filter(|(key, _)| !self.is_transform_attribute(key))
                .cloned()
                .collect(),
            children: element
                .children
                .iter()
                .map(|node| match node {
                    Node::Element(e) => Node::Element(self.clean(e)),
                    other => other.clone(),
                })
                .collect(),
        }
    }
}

/// Apply the transform document `transform` to `existing`.
pub fn transform_documents(existing: &str, transform: &str) -> Result<String> {
    let mut document = Document::parse(existing)?;
    let transform = Document::parse(transform)?;
    apply(&mut document.root, &transform.root)?;
    document.to_xml_string()
}

pub fn apply(target: &mut Element, transform: &Element) -> Result<()> {
    if target.name != transform.name {
        bail!(
            "Transform root <{}> does not match document root <{}>",
            transform.name,
            target.name
        );
    }
    let names = Names::for_document(transform);
    apply_children(target, transform, &names)
}

fn apply_children(target: &mut Element, transform: &Element, names: &Names) -> Result<()> {
    for child in transform.elements() {
        let verb = child.attr(&names.transform).map(Verb::parse).transpose()?;
        let locator = child.attr(&names.locator).map(Locator::parse).transpose()?;
        let matched: Vec<usize> = target
            .element_indices(&child.name)
            .into_iter()
            .filter(|&i| {
                target
                    .element_at(i)
                    .is_some_and(|e| locator.as_ref().is_none_or(|l| l.matches(e, child)))
            })
            .collect();

        match verb {
            Some(Verb::Insert) => target.push_element(names.clean(child)),
            Some(Verb::InsertIfMissing) => {
                if matched.is_empty() {
                    target.push_element(names.clean(child));
                }
            }
            Some(Verb::Remove) => {
                if let Some(&first) = matched.first() {
                    target.children.remove(first);
                }
            }
            Some(Verb::RemoveAll) => {
                for &index in matched.iter().rev() {
                    target.children.remove(index);
                }
            }
            Some(Verb::Replace) => {
                for &index in &matched {
                    target.children[index] = Node::Element(names.clean(child));
                }
            }
            Some(Verb::SetAttributes(list)) => {
                for &index in &matched {
                    if let Some(element) = target.element_at_mut(index) {
                        for (key, value) in &child.attributes {
                            let listed = list.is_empty() || list.iter().any(|n| n == key);
                            if listed && !names.is_transform_attribute(key) {
                                element.set_attr(key, value);
                            }
                        }
                        apply_children(element, child, names)?;
                    }
                }
            }
            Some(Verb::RemoveAttributes(list)) => {
                for &index in &matched {
                    if let Some(element) = target.element_at_mut(index) {
                        for key in &list {
                            element.remove_attr(key);
                        }
                        apply_children(element, child, names)?;
                    }
                }
            }
            None => {
                for &index in &matched {
                    if let Some(element) = target.element_at_mut(index) {
                        apply_children(element, child, names)?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(existing: &str, transform: &str) -> Document {
        Document::parse(&transform_documents(existing, transform).unwrap()).unwrap()
    }

    fn keys(element: &Element) -> Vec<String> {
        element
            .elements()
            .filter_map(|e| e.attr("key").map(String::from))
            .collect()
    }

    const CONFIG: &str = r#"<configuration>
  <appSettings>
    <add key="a" value="1"/>
    <add key="b" value="2"/>
  </appSettings>
</configuration>"#;

    #[test]
    fn test_insert_and_insert_if_missing() {
        let transform = r#"<configuration xmlns:xdt="http://schemas.microsoft.com/XML-Document-Transform">
  <appSettings>
    <add key="c" value="3" xdt:Transform="Insert"/>
    <add key="a" value="9" xdt:Transform="InsertIfMissing" xdt:Locator="Match(key)"/>
    <add key="d" value="4" xdt:Transform="InsertIfMissing" xdt:Locator="Match(key)"/>
  </appSettings>
</configuration>"#;

        let doc = run(CONFIG, transform);
        let settings = doc.root.elements().next().unwrap();
        assert_eq!(keys(settings), vec!["a", "b", "c", "d"]);
        let inserted = settings.elements().nth(2).unwrap();
        assert_eq!(
            inserted.attributes,
            vec![
                ("key".to_string(), "c".to_string()),
                ("value".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_remove_with_locator() {
        let transform = r#"<configuration xmlns:xdt="http://schemas.microsoft.com/XML-Document-Transform">
  <appSettings>
    <add key="b" xdt:Transform="Remove" xdt:Locator="Match(key)"/>
  </appSettings>
</configuration>"#;

        let doc = run(CONFIG, transform);
        assert_eq!(keys(doc.root.elements().next().unwrap()), vec!["a"]);
    }

    #[test]
    fn test_remove_all() {
        let transform = r#"<configuration xmlns:xdt="http://schemas.microsoft.com/XML-Document-Transform">
  <appSettings>
    <add xdt:Transform="RemoveAll"/>
  </appSettings>
</configuration>"#;

        let doc = run(CONFIG, transform);
        assert!(keys(doc.root.elements().next().unwrap()).is_empty());
    }

    #[test]
    fn test_set_and_remove_attributes() {
        let transform = r#"<configuration xmlns:xdt="http://schemas.microsoft.com/XML-Document-Transform">
  <appSettings>
    <add key="a" value="10" extra="x" xdt:Transform="SetAttributes(value)" xdt:Locator="Match(key)"/>
    <add key="b" xdt:Transform="RemoveAttributes(value)" xdt:Locator="Match(key)"/>
  </appSettings>
</configuration>"#;

        let doc = run(CONFIG, transform);
        let adds: Vec<&Element> = doc.root.elements().next().unwrap().elements().collect();
        assert_eq!(adds[0].attr("value"), Some("10"));
        assert_eq!(adds[0].attr("extra"), None);
        assert_eq!(adds[1].attr("value"), None);
        assert_eq!(adds[1].attr("key"), Some("b"));
    }

    #[test]
    fn test_replace() {
        let transform = r#"<configuration xmlns:xdt="http://schemas.microsoft.com/XML-Document-Transform">
  <appSettings xdt:Transform="Replace">
    <add key="only" value="1"/>
  </appSettings>
</configuration>"#;

        let doc = run(CONFIG, transform);
        let settings = doc.root.elements().next().unwrap();
        assert_eq!(keys(settings), vec!["only"]);
        assert!(settings.attributes.is_empty());
    }

    #[test]
    fn test_custom_prefix() {
        let transform = r#"<configuration xmlns:t="http://schemas.microsoft.com/XML-Document-Transform">
  <appSettings>
    <add key="z" t:Transform="Insert"/>
  </appSettings>
</configuration>"#;

        let doc = run(CONFIG, transform);
        assert_eq!(keys(doc.root.elements().next().unwrap()), vec!["a", "b", "z"]);
    }

    #[test]
    fn test_unsupported_verbs_and_locators_fail() {
        let verb = r#"<configuration xmlns:xdt="http://schemas.microsoft.com/XML-Document-Transform"><appSettings xdt:Transform="XSLT(file.xsl)"/></configuration>"#;
        assert!(transform_documents(CONFIG, verb).is_err());

        let locator = r#"<configuration xmlns:xdt="http://schemas.microsoft.com/XML-Document-Transform"><appSettings xdt:Locator="XPath(/a)"/></configuration>"#;
        assert!(transform_documents(CONFIG, locator).is_err());
    }

    #[test]
    fn test_root_mismatch_fails() {
        assert!(transform_documents(CONFIG, "<other/>").is_err());
    }

    #[test]
    fn test_parse_call() {
        let (name, args) = parse_call("SetAttributes(a, b)").unwrap();
        assert_eq!(name, "SetAttributes");
        assert_eq!(args, vec!["a", "b"]);
        assert!(parse_call("Match(a").is_err());
    }
}
