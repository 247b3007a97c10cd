use std::collections::BTreeSet;
use std::fmt;

/// 限定符标签，名称可选
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Qualifier {
    pub tag: String,
    pub name: Option<String>,
}

impl Qualifier {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: None,
        }
    }

    /// `Named("alpha")` 形式的限定符
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            tag: "Named".to_string(),
            name: Some(name.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "@{}(\"{}\")", self.tag, name),
            None => write!(f, "@{}", self.tag),
        }
    }
}

/// 不可变的限定符集合，空集合即默认限定符
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Qualifiers(BTreeSet<Qualifier>);

impl Qualifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(qualifiers: impl IntoIterator<Item = Qualifier>) -> Self {
        Self(qualifiers.into_iter().collect())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::of([Qualifier::named(name)])
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Qualifier> for Qualifiers {
    fn from(qualifier: Qualifier) -> Self {
        Self::of([qualifier])
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("@Default");
        }
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualifier_sets_ignore_order() {
        let a = Qualifiers::of([Qualifier::new("Primary"), Qualifier::named("alpha")]);
        let b = Qualifiers::of([Qualifier::named("alpha"), Qualifier::new("Primary")]);

        assert_eq!(a, b);
        assert_ne!(a, Qualifiers::named("alpha"));
    }

    #[test]
    fn test_default_qualifiers() {
        assert!(Qualifiers::none().is_default());
        assert!(!Qualifiers::named("alpha").is_default());
        assert_eq!(Qualifiers::none().to_string(), "@Default");
        assert_eq!(Qualifiers::named("alpha").to_string(), "@Named(\"alpha\")");
    }
}
