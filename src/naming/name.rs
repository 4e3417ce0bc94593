//! Hierarchical names.

use std::fmt;

use crate::naming::NamingError;

/// A parsed, hierarchical name such as `java:/jms/ConnectionFactory`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<String>,
}

impl Name {
    /// Components in order, outermost first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Return a new name with `component` appended.
    pub fn join(&self, component: &str) -> Name {
        let mut components = self.components.clone();
        components.extend(
            component
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        );
        Name { components }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

/// Parser for `/`-separated names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameParser;

impl NameParser {
    /// Parse a name string.
    ///
    /// Leading, trailing and doubled separators are ignored, so
    /// `/topic/` and `topic` parse to the same name. A blank string is
    /// rejected: an unset configuration value must not resolve to the root.
    pub fn parse(&self, raw: &str) -> Result<Name, NamingError> {
        let components: Vec<String> = raw
            .trim()
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        if components.is_empty() {
            return Err(NamingError::InvalidName(raw.to_string()));
        }

        Ok(Name { components })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_components() {
        let name = NameParser.parse("java:/jms/ConnectionFactory").unwrap();
        assert_eq!(name.components(), &["java:", "jms", "ConnectionFactory"]);
        assert_eq!(name.to_string(), "java:/jms/ConnectionFactory");
    }

    #[test]
    fn test_separators_are_normalized() {
        let a = NameParser.parse("/topic/").unwrap();
        let b = NameParser.parse("topic").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_blank_name_rejected() {
        assert_eq!(
            NameParser.parse("").unwrap_err(),
            NamingError::InvalidName(String::new())
        );
        assert!(NameParser.parse(" / ").is_err());
    }

    #[test]
    fn test_join() {
        let ns = NameParser.parse("topic").unwrap();
        assert_eq!(ns.join("chat/rooms").to_string(), "topic/chat/rooms");
        assert_eq!(ns.len(), 1);
    }
}
