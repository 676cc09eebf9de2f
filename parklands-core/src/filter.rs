//! Tag filters selecting relevant features from the external feature service.

/// Acceptable values for one tag key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSelector {
    /// Match any value carried under the key.
    Any,
    /// Match any of the listed values.
    OneOf(Vec<String>),
}

/// Ordered mapping of feature-classification keys to acceptable value sets.
///
/// Clause order is preserved; query builders emit one clause per entry.
///
/// # Examples
/// ```
/// use parklands_core::{TagFilter, TagSelector};
///
/// let filter = TagFilter::new()
///     .with_values("leisure", ["nature_reserve"])
///     .with_any("protection_title");
/// assert_eq!(filter.len(), 2);
/// let clauses: Vec<_> = filter.iter().collect();
/// assert_eq!(clauses[0].0, "leisure");
/// assert_eq!(clauses[1].1, &TagSelector::Any);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    clauses: Vec<(String, TagSelector)>,
}

impl TagFilter {
    /// An empty filter; populate it with the builder methods.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// The filter used for national-park-class protected areas.
    ///
    /// # Examples
    /// ```
    /// use parklands_core::TagFilter;
    ///
    /// assert_eq!(TagFilter::national_parks().len(), 4);
    /// ```
    #[must_use]
    pub fn national_parks() -> Self {
        Self::new()
            .with_values("boundary", ["national_park"])
            .with_values("protect_class", ["2"])
            .with_values("designation", ["national_park"])
            .with_values("protected_area", ["national_park"])
    }

    /// Append a clause with an explicit selector.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, selector: TagSelector) -> Self {
        self.clauses.push((key.into(), selector));
        self
    }

    /// Append a clause accepting any value under `key`.
    #[must_use]
    pub fn with_any(self, key: impl Into<String>) -> Self {
        self.with(key, TagSelector::Any)
    }

    /// Append a clause accepting the listed values under `key`.
    #[must_use]
    pub fn with_values<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.with(key, TagSelector::OneOf(values))
    }

    /// Iterate the clauses in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagSelector)> {
        self.clauses
            .iter()
            .map(|(key, selector)| (key.as_str(), selector))
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the filter carries no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn national_parks_reproduces_the_standard_tags() {
        let filter = TagFilter::national_parks();
        let clauses: Vec<_> = filter.iter().collect();
        assert_eq!(
            clauses,
            vec![
                ("boundary", &TagSelector::OneOf(vec!["national_park".into()])),
                ("protect_class", &TagSelector::OneOf(vec!["2".into()])),
                (
                    "designation",
                    &TagSelector::OneOf(vec!["national_park".into()])
                ),
                (
                    "protected_area",
                    &TagSelector::OneOf(vec!["national_park".into()])
                ),
            ]
        );
    }

    #[rstest]
    fn clause_order_is_preserved() {
        let filter = TagFilter::new().with_any("b").with_any("a");
        let keys: Vec<_> = filter.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
