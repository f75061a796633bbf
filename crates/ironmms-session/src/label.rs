use std::collections::BTreeMap;

/// Dataset member labels, keyed by dataset reference
/// (`DOMAIN/LN$DataSet`).
///
/// The mapping for a given reference is immutable once registered: two
/// reports on the same dataset always yield identical entry labels.
#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    map: BTreeMap<String, Vec<String>>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the ordered member labels of one dataset. A repeated
    /// registration for the same reference is ignored.
    pub fn register(&mut self, dataset_ref: impl Into<String>, labels: Vec<String>) {
        let dataset_ref = dataset_ref.into();

        if let Some(existing) = self.map.get(&dataset_ref) {
            if *existing != labels {
                warn!(%dataset_ref, "Ignoring conflicting label registration");
            }
            return;
        }

        self.map.insert(dataset_ref, labels);
    }

    pub fn labels_for(&self, dataset_ref: &str) -> Option<&[String]> {
        self.map.get(dataset_ref).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

impl From<BTreeMap<String, Vec<String>>> for LabelMap {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self { map }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins() {
        let mut labels = LabelMap::new();

        labels.register("D/LLN0$DS", vec!["a".to_owned(), "b".to_owned()]);
        labels.register("D/LLN0$DS", vec!["x".to_owned()]);

        assert_eq!(
            labels.labels_for("D/LLN0$DS"),
            Some(["a".to_owned(), "b".to_owned()].as_slice())
        );
    }
}
